//! Data model schema lookup.
//!
//! Resolves a schema-relative field path (indices stripped) to its JSON
//! schema node, following `$ref`, `allOf` and array `items` along the way.

use serde_json::Value;

use crate::path::strip_indices;

/// Schema annotation marking a node that maps to an XML attribute.
pub const XSD_TYPE_KEY: &str = "@xsdType";
pub const XML_ATTRIBUTE: &str = "XmlAttribute";

const MAX_REF_DEPTH: usize = 32;

/// A data model JSON schema together with its root element.
#[derive(Debug, Clone, PartialEq)]
pub struct DataModelSchema {
    document: Value,
    root_path: String,
}

impl DataModelSchema {
    pub fn new(document: Value) -> Self {
        let root_path = root_element_path(&document);
        Self {
            document,
            root_path,
        }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// `$ref`-style pointer to the root element, empty when the schema
    /// describes the model at its top level.
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Draft 2020-12 schemas are validated against the document root.
    pub fn is_2020_12(&self) -> bool {
        self.document
            .get("$schema")
            .and_then(Value::as_str)
            .is_some_and(|uri| uri.contains("2020-12"))
    }

    /// The node that describes the data model's top-level object.
    ///
    /// `None` when the root path points at nothing.
    pub fn root(&self) -> Option<&Value> {
        if self.root_path.is_empty() {
            return Some(&self.document);
        }
        resolve_pointer(&self.document, &self.root_path)
    }

    /// Resolve a `$ref` string against this document.
    pub fn resolve_ref(&self, reference: &str) -> Option<&Value> {
        resolve_pointer(&self.document, reference)
    }

    /// Follow `$ref` chains until reaching a concrete node.
    pub fn resolve<'a>(&'a self, mut node: &'a Value) -> Option<&'a Value> {
        for _ in 0..MAX_REF_DEPTH {
            match node.get("$ref").and_then(Value::as_str) {
                Some(reference) => node = self.resolve_ref(reference)?,
                None => return Some(node),
            }
        }
        tracing::warn!("schema $ref chain too deep");
        None
    }

    /// Schema node for a binding. Indices in `binding` are ignored.
    pub fn field(&self, binding: &str) -> Option<&Value> {
        let stripped = strip_indices(binding);
        let mut node = self.root()?;
        for field in stripped.split('.') {
            node = self.step_into_items(node)?;
            node = self.property(node, field)?;
        }
        self.resolve(node)
    }

    /// Whether `binding` has a node in the schema.
    pub fn contains(&self, binding: &str) -> bool {
        self.field(binding).is_some()
    }

    /// Whether `binding` maps to an XML attribute.
    pub fn is_attribute(&self, binding: &str) -> bool {
        self.field(binding).is_some_and(is_attribute)
    }

    /// Declared JSON type of the scalar at `binding`.
    ///
    /// Array fields report their item type. A type list such as
    /// `["integer", "null"]` reports its first non-null entry.
    pub fn scalar_type(&self, binding: &str) -> Option<&str> {
        let node = self.step_into_items(self.field(binding)?)?;
        match node.get("type")? {
            Value::String(kind) => Some(kind.as_str()),
            Value::Array(kinds) => kinds
                .iter()
                .filter_map(Value::as_str)
                .find(|kind| *kind != "null"),
            _ => None,
        }
    }

    fn step_into_items<'a>(&'a self, node: &'a Value) -> Option<&'a Value> {
        let node = self.resolve(node)?;
        match node.get("items") {
            Some(items) => self.resolve(items),
            None => Some(node),
        }
    }

    fn property<'a>(&'a self, node: &'a Value, field: &str) -> Option<&'a Value> {
        if let Some(found) = node.get("properties").and_then(|props| props.get(field)) {
            return Some(found);
        }
        node.get("allOf")
            .and_then(Value::as_array)?
            .iter()
            .filter_map(|member| self.resolve(member))
            .find_map(|member| self.property(member, field))
    }
}

/// Locate the root element of a data model schema.
///
/// Checked in order: `info.rootNode`, the SERES `info.meldingsnavn`
/// property's `$ref`, then the `$ref` of the first root property.
pub fn root_element_path(schema: &Value) -> String {
    let info = schema.get("info");
    if let Some(root) = info.and_then(|info| info.get("rootNode")).and_then(Value::as_str) {
        return root.to_string();
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let reference_of = |name: &str| {
        properties
            .and_then(|props| props.get(name))
            .and_then(|prop| prop.get("$ref"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    if let Some(name) = info.and_then(|info| info.get("meldingsnavn")).and_then(Value::as_str)
        && properties.is_some()
    {
        return reference_of(name);
    }

    properties
        .and_then(|props| props.keys().next())
        .map(|first| reference_of(first))
        .unwrap_or_default()
}

/// Whether a schema node is annotated as an XML attribute.
pub fn is_attribute(node: &Value) -> bool {
    node.get(XSD_TYPE_KEY).and_then(Value::as_str) == Some(XML_ATTRIBUTE)
}

fn resolve_pointer<'a>(document: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#').unwrap_or(reference);
    if pointer.is_empty() {
        return Some(document);
    }
    document.pointer(pointer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> DataModelSchema {
        DataModelSchema::new(json!({
            "properties": { "melding": { "$ref": "#/definitions/Skjema" } },
            "definitions": {
                "Skjema": {
                    "properties": {
                        "Name": { "type": "string" },
                        "orgnr": { "type": "string", "@xsdType": "XmlAttribute" },
                        "Group": { "type": "array", "items": { "$ref": "#/definitions/Row" } }
                    }
                },
                "Row": {
                    "allOf": [
                        { "properties": { "Field": { "type": "integer" } } },
                        { "$ref": "#/definitions/Extra" }
                    ]
                },
                "Extra": { "properties": { "Note": { "type": "string" } } }
            }
        }))
    }

    #[test]
    fn root_from_first_property() {
        assert_eq!(schema().root_path(), "#/definitions/Skjema");
    }

    #[test]
    fn root_prefers_info_root_node_then_meldingsnavn() {
        let with_root = json!({ "info": { "rootNode": "#/$defs/X" }, "properties": {} });
        assert_eq!(root_element_path(&with_root), "#/$defs/X");

        let seres = json!({
            "info": { "meldingsnavn": "melding" },
            "properties": {
                "other": { "$ref": "#/definitions/Other" },
                "melding": { "$ref": "#/definitions/Melding" }
            }
        });
        assert_eq!(root_element_path(&seres), "#/definitions/Melding");
        assert_eq!(root_element_path(&json!({})), "");
    }

    #[test]
    fn field_lookup_through_items_and_all_of() {
        let schema = schema();
        assert_eq!(schema.field("Name").unwrap()["type"], "string");
        assert_eq!(schema.field("Group[3].Field").unwrap()["type"], "integer");
        assert_eq!(schema.field("Group.Note").unwrap()["type"], "string");
        assert!(schema.field("Group[0].Missing").is_none());
        assert!(!schema.contains("Unknown"));
    }

    #[test]
    fn attribute_detection() {
        let schema = schema();
        assert!(schema.is_attribute("orgnr"));
        assert!(!schema.is_attribute("Name"));
    }

    #[test]
    fn scalar_type_reads_items_and_nullable_lists() {
        let schema = DataModelSchema::new(json!({
            "properties": {
                "Count": { "type": ["null", "integer"] },
                "Flags": { "type": "array", "items": { "type": "boolean" } },
                "Name": { "type": "string" }
            }
        }));
        assert_eq!(schema.scalar_type("Count"), Some("integer"));
        assert_eq!(schema.scalar_type("Flags[2]"), Some("boolean"));
        assert_eq!(schema.scalar_type("Name"), Some("string"));
        assert_eq!(schema.scalar_type("Missing"), None);
    }

    #[test]
    fn draft_detection() {
        let schema = DataModelSchema::new(json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "properties": { "A": { "type": "string" } }
        }));
        assert!(schema.is_2020_12());
    }
}
