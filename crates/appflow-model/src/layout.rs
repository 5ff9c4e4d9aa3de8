//! Form layouts and their components.
//!
//! A layout is an ordered list of components for one page. Groups refer to
//! their children by id; a group whose `maxCount` is above one and which has
//! a `group` data model binding is a repeating group.
//!
//! # Document shapes
//!
//! The layout endpoint returns either a single page:
//!
//! ```text
//! { "data": { "layout": [ ... ] } }
//! ```
//!
//! or a map of page id to page:
//!
//! ```text
//! { "Page1": { "data": { "layout": [ ... ] } }, "Page2": { ... } }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, Result};

/// Page id used when the backend delivers a single unnamed layout.
pub const DEFAULT_LAYOUT_ID: &str = "FormLayout";

/// Binding key holding the array path of a repeating group.
pub const GROUP_BINDING: &str = "group";

/// Binding key used by single-value components.
pub const SIMPLE_BINDING: &str = "simpleBinding";

/// Component type.
///
/// Only the types the runtime treats specially are named; everything else
/// is kept verbatim in [`ComponentKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentKind {
    Group,
    FileUpload,
    FileUploadWithTag,
    DatePicker,
    Other(String),
}

impl ComponentKind {
    /// Type name as written in layout documents.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Group => "Group",
            Self::FileUpload => "FileUpload",
            Self::FileUploadWithTag => "FileUploadWithTag",
            Self::DatePicker => "DatePicker",
            Self::Other(name) => name,
        }
    }

    /// Whether this component stores attachments rather than form data.
    pub fn is_file_upload(&self) -> bool {
        matches!(self, Self::FileUpload | Self::FileUploadWithTag)
    }
}

impl From<String> for ComponentKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Group" => Self::Group,
            "FileUpload" => Self::FileUpload,
            "FileUploadWithTag" => Self::FileUploadWithTag,
            "DatePicker" => Self::DatePicker,
            _ => Self::Other(value),
        }
    }
}

impl From<ComponentKind> for String {
    fn from(value: ComponentKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edit settings for a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEdit {
    /// Children are listed as `page:componentId`.
    #[serde(default)]
    pub multi_page: bool,
}

/// A single layout component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: ComponentKind,

    /// Binding key (e.g. `simpleBinding`) to data model path.
    #[serde(default)]
    pub data_model_bindings: BTreeMap<String, String>,

    /// Text key (e.g. `title`) to text resource id.
    #[serde(default)]
    pub text_resource_bindings: BTreeMap<String, String>,

    #[serde(default)]
    pub required: bool,

    /// Child component ids (groups only).
    #[serde(default)]
    pub children: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<GroupEdit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_number_of_attachments: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_number_of_attachments: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<String>,

    /// Display format of a date picker, e.g. `DD.MM.YYYY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Component {
    /// Create a component with no bindings.
    pub fn new(id: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data_model_bindings: BTreeMap::new(),
            text_resource_bindings: BTreeMap::new(),
            required: false,
            children: Vec::new(),
            max_count: None,
            edit: None,
            min_number_of_attachments: None,
            max_number_of_attachments: None,
            min_date: None,
            max_date: None,
            format: None,
        }
    }

    /// Add a data model binding.
    #[must_use]
    pub fn with_binding(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.data_model_bindings.insert(key.into(), path.into());
        self
    }

    /// Add a text resource binding.
    #[must_use]
    pub fn with_text(mut self, key: impl Into<String>, text_id: impl Into<String>) -> Self {
        self.text_resource_bindings.insert(key.into(), text_id.into());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Turn this component into a repeating group over `binding`.
    #[must_use]
    pub fn repeating(mut self, binding: impl Into<String>, max_count: u32) -> Self {
        self.data_model_bindings
            .insert(GROUP_BINDING.to_string(), binding.into());
        self.max_count = Some(max_count);
        self
    }

    #[must_use]
    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    /// The array path bound to a group, if any.
    pub fn group_binding(&self) -> Option<&str> {
        self.data_model_bindings
            .get(GROUP_BINDING)
            .map(String::as_str)
    }

    /// Whether this component renders one row per array element.
    pub fn is_repeating_group(&self) -> bool {
        self.kind == ComponentKind::Group
            && self.group_binding().is_some()
            && self.max_count.is_some_and(|max| max > 1)
    }

    /// Child ids with any `page:` prefix removed.
    pub fn child_ids(&self) -> impl Iterator<Item = &str> {
        let multi_page = self.edit.as_ref().is_some_and(|edit| edit.multi_page);
        self.children.iter().map(move |child| {
            if multi_page {
                child.split_once(':').map_or(child.as_str(), |(_, id)| id)
            } else {
                child.as_str()
            }
        })
    }
}

/// The components of one page, in document order.
pub type Layout = Vec<Component>;

/// All pages of the current layout set, keyed by page id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Layouts(BTreeMap<String, Layout>);

impl Layouts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a layout document in either the single-page or multi-page shape.
    pub fn from_document(document: &Value) -> Result<Self> {
        let Some(object) = document.as_object() else {
            return Err(ModelError::InvalidLayout {
                reason: "expected a JSON object".to_string(),
            });
        };

        if let Some(layout) = object.get("data").and_then(|data| data.get("layout")) {
            let mut layouts = Self::new();
            layouts.insert(DEFAULT_LAYOUT_ID, decode_layout(layout)?);
            return Ok(layouts);
        }

        let mut layouts = Self::new();
        for (page, content) in object {
            let layout = content
                .get("data")
                .and_then(|data| data.get("layout"))
                .ok_or_else(|| ModelError::InvalidLayout {
                    reason: format!("page '{page}' has no data.layout"),
                })?;
            layouts.insert(page.clone(), decode_layout(layout)?);
        }
        Ok(layouts)
    }

    pub fn insert(&mut self, id: impl Into<String>, layout: Layout) {
        self.0.insert(id.into(), layout);
    }

    pub fn get(&self, id: &str) -> Option<&Layout> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Layout)> {
        self.0.iter().map(|(id, layout)| (id.as_str(), layout))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Find a component by id across all pages, returning its page id too.
    pub fn find_component(&self, id: &str) -> Option<(&str, &Component)> {
        self.iter().find_map(|(page, layout)| {
            layout
                .iter()
                .find(|component| component.id == id)
                .map(|component| (page, component))
        })
    }
}

fn decode_layout(value: &Value) -> Result<Layout> {
    serde_json::from_value(value.clone()).map_err(|e| ModelError::decode("layout", e))
}

/// Look up a component by id within one page.
pub fn find<'a>(layout: &'a [Component], id: &str) -> Option<&'a Component> {
    layout.iter().find(|component| component.id == id)
}

/// The group that lists `id` as a child, if any.
pub fn parent_group<'a>(layout: &'a [Component], id: &str) -> Option<&'a Component> {
    layout.iter().find(|component| {
        component.id != id
            && component.kind == ComponentKind::Group
            && component.child_ids().any(|child| child == id)
    })
}

/// The components listed as children of `group_id`, in layout order.
pub fn group_children<'a>(layout: &'a [Component], group_id: &str) -> Vec<&'a Component> {
    let Some(group) = find(layout, group_id) else {
        return Vec::new();
    };
    let children: Vec<&str> = group.child_ids().collect();
    layout
        .iter()
        .filter(|component| children.contains(&component.id.as_str()))
        .collect()
}

/// Settings document for a layout set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    #[serde(default)]
    pub pages: PageSettings,
}

/// Page ordering from the settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSettings {
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
}

impl LayoutSettings {
    pub fn from_document(document: &Value) -> Result<Self> {
        serde_json::from_value(document.clone())
            .map_err(|e| ModelError::decode("layout settings", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_single_page_document() {
        let doc = json!({
            "data": { "layout": [
                { "id": "name", "type": "Input", "dataModelBindings": { "simpleBinding": "Person.Name" }, "required": true }
            ]}
        });
        let layouts = Layouts::from_document(&doc).unwrap();
        let layout = layouts.get(DEFAULT_LAYOUT_ID).unwrap();
        assert_eq!(layout.len(), 1);
        assert!(layout[0].required);
        assert_eq!(layout[0].kind, ComponentKind::Other("Input".to_string()));
    }

    #[test]
    fn decodes_multi_page_document() {
        let doc = json!({
            "Page1": { "data": { "layout": [ { "id": "a", "type": "Input" } ] } },
            "Page2": { "data": { "layout": [ { "id": "b", "type": "FileUpload" } ] } }
        });
        let layouts = Layouts::from_document(&doc).unwrap();
        assert_eq!(layouts.ids().collect::<Vec<_>>(), vec!["Page1", "Page2"]);
        let (page, component) = layouts.find_component("b").unwrap();
        assert_eq!(page, "Page2");
        assert!(component.kind.is_file_upload());
    }

    #[test]
    fn rejects_page_without_layout() {
        let doc = json!({ "Page1": { "nope": true } });
        assert!(Layouts::from_document(&doc).is_err());
    }

    #[test]
    fn repeating_group_needs_binding_and_max_count() {
        let plain = Component::new("g", ComponentKind::Group);
        assert!(!plain.is_repeating_group());

        let single = Component::new("g", ComponentKind::Group).repeating("G", 1);
        assert!(!single.is_repeating_group());

        let repeating = Component::new("g", ComponentKind::Group).repeating("G", 5);
        assert!(repeating.is_repeating_group());
        assert_eq!(repeating.group_binding(), Some("G"));
    }

    #[test]
    fn multi_page_children_strip_prefix() {
        let mut group =
            Component::new("g", ComponentKind::Group).with_children(["0:a", "1:b"]);
        group.edit = Some(GroupEdit { multi_page: true });
        assert_eq!(group.child_ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn finds_parent_and_children() {
        let layout = vec![
            Component::new("outer", ComponentKind::Group).with_children(["inner", "field"]),
            Component::new("inner", ComponentKind::Group).with_children(["leaf"]),
            Component::new("field", ComponentKind::Other("Input".into())),
            Component::new("leaf", ComponentKind::Other("Input".into())),
        ];
        assert_eq!(parent_group(&layout, "leaf").unwrap().id, "inner");
        assert_eq!(parent_group(&layout, "inner").unwrap().id, "outer");
        assert!(parent_group(&layout, "outer").is_none());
        let children: Vec<_> = group_children(&layout, "outer")
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(children, vec!["inner", "field"]);
    }
}
