//! Required-field checks.

use std::collections::BTreeSet;

use appflow_binding::{FormData, Node};
use appflow_model::layout::GROUP_BINDING;
use appflow_model::{Messages, TextResources};

use crate::issue::Severity;
use crate::result::{LayoutValidations, SIMPLE_BINDING};

/// Report every required binding with no value on one page.
///
/// File uploads are checked by the component pass instead. Hidden nodes,
/// and nodes inside hidden groups, are never reported.
pub fn validate_empty_fields(
    nodes: &[Node],
    form_data: &FormData,
    hidden: &BTreeSet<String>,
    texts: &TextResources,
    messages: &Messages,
) -> LayoutValidations {
    let mut validations = LayoutValidations::new();
    for node in nodes {
        if !node.component.required || node.kind().is_file_upload() || node.is_hidden(hidden) {
            continue;
        }
        for (binding_key, path) in &node.bindings {
            if binding_key == GROUP_BINDING {
                continue;
            }
            let filled = form_data.get(path).is_some_and(|value| !value.is_empty());
            if filled {
                continue;
            }
            let name = field_name(node, binding_key, texts, messages);
            validations
                .entry(node.id.clone())
                .or_default()
                .entry(binding_key.clone())
                .or_default()
                .push(
                    Severity::Error,
                    messages.format("form_filler.error_required", &[&name]),
                );
        }
    }
    validations
}

/// Name of a field as shown in a required-field message.
pub fn field_name(node: &Node, binding_key: &str, texts: &TextResources, messages: &Messages) -> String {
    if binding_key != SIMPLE_BINDING {
        let key = format!("form_filler.{binding_key}");
        let text = match texts.get(&key) {
            Some(resource) => resource.value.clone(),
            None => messages.get(&key).to_string(),
        };
        return lower_first(&text);
    }

    let bindings = &node.component.text_resource_bindings;
    if let Some(short_name) = bindings.get("shortName") {
        return texts.resolve(short_name).to_string();
    }
    if let Some(title) = bindings.get("title") {
        return lower_first(texts.resolve(title));
    }
    messages.get("validation.generic_field").to_string()
}

/// Lower-case the first letter unless the word looks like an acronym.
fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    if chars.next().is_some_and(char::is_uppercase) {
        return text.to_string();
    }
    first.to_lowercase().chain(text.chars().skip(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use appflow_binding::expand_layout;
    use appflow_model::{Component, ComponentKind, RepeatingGroups, TextResource};

    fn texts() -> TextResources {
        TextResources {
            language: "en".into(),
            resources: vec![
                TextResource::new("name.title", "Full name"),
                TextResource::new("org.title", "NAV number"),
                TextResource::new("form_filler.address", "Street Address"),
            ],
        }
    }

    #[test]
    fn reports_required_visible_fields() {
        let layout = vec![
            Component::new("name", ComponentKind::Other("Input".into()))
                .with_binding(SIMPLE_BINDING, "Name")
                .with_text("title", "name.title")
                .required(),
            Component::new("optional", ComponentKind::Other("Input".into()))
                .with_binding(SIMPLE_BINDING, "Optional"),
            Component::new("hidden", ComponentKind::Other("Input".into()))
                .with_binding(SIMPLE_BINDING, "Hidden")
                .required(),
            Component::new("upload", ComponentKind::FileUpload).required(),
        ];
        let nodes = expand_layout(&layout, &RepeatingGroups::new());
        let hidden: BTreeSet<String> = ["hidden".to_string()].into();

        let result = validate_empty_fields(&nodes, &FormData::new(), &hidden, &texts(), &Messages::default());
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(
            result["name"][SIMPLE_BINDING].errors,
            vec!["You must fill in full name"]
        );
    }

    #[test]
    fn filled_fields_pass_and_rows_are_checked() {
        let layout = vec![
            Component::new("g", ComponentKind::Group)
                .repeating("G", 3)
                .with_children(["f"]),
            Component::new("f", ComponentKind::Other("Input".into()))
                .with_binding(SIMPLE_BINDING, "G.F")
                .required(),
        ];
        let mut groups = RepeatingGroups::new();
        groups.set_count("g", 2);
        let nodes = expand_layout(&layout, &groups);
        let mut form = FormData::new();
        form.insert("G[0].F".into(), "0".into());

        let result = validate_empty_fields(&nodes, &form, &BTreeSet::new(), &texts(), &Messages::default());
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["f-1"]);
    }

    #[test]
    fn field_names() {
        let layout = vec![
            Component::new("org", ComponentKind::Other("Input".into()))
                .with_binding("address", "Addr")
                .with_text("title", "org.title"),
        ];
        let nodes = expand_layout(&layout, &RepeatingGroups::new());
        let texts = texts();
        let messages = Messages::default();
        assert_eq!(field_name(&nodes[0], SIMPLE_BINDING, &texts, &messages), "NAV number");
        assert_eq!(field_name(&nodes[0], "address", &texts, &messages), "street Address");
    }
}
