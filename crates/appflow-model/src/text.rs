//! Text resources and the validation message catalogue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Prefix of a text variable data source bound to a data model.
pub const DATA_MODEL_SOURCE_PREFIX: &str = "dataModel.";

/// Data source of a text variable bound to instance fields.
pub const INSTANCE_CONTEXT_SOURCE: &str = "instanceContext";

/// Placeholder substituted into a text resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextVariable {
    /// Field path or context key to read.
    pub key: String,
    /// `dataModel.<dataType>` or `instanceContext`.
    pub data_source: String,
}

impl TextVariable {
    /// The data type this variable reads from, when bound to a data model.
    pub fn data_type(&self) -> Option<&str> {
        self.data_source.strip_prefix(DATA_MODEL_SOURCE_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResource {
    pub id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<TextVariable>,
    /// Value before variable interpolation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unparsed_value: Option<String>,
}

impl TextResource {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            variables: Vec::new(),
            unparsed_value: None,
        }
    }
}

/// Text resources for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResources {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub resources: Vec<TextResource>,
}

impl TextResources {
    /// Resolve `key` to its text, falling back to the key itself.
    pub fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        self.resources
            .iter()
            .find(|resource| resource.id == key)
            .map_or(key, |resource| resource.value.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&TextResource> {
        self.resources.iter().find(|resource| resource.id == key)
    }

    /// Data types referenced by `dataModel.*` variables.
    pub fn data_model_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self
            .resources
            .iter()
            .flat_map(|resource| resource.variables.iter())
            .filter_map(|variable| variable.data_type().map(str::to_string))
            .collect();
        sources.sort();
        sources.dedup();
        sources
    }

    /// Replace `{n}` placeholders with the resolved value of variable `n`.
    ///
    /// Interpolation always starts from the unparsed value, so calling this
    /// again after the data changed re-renders rather than compounds.
    pub fn interpolate<F>(&mut self, mut resolve: F)
    where
        F: FnMut(&TextVariable) -> Option<String>,
    {
        for resource in &mut self.resources {
            if resource.variables.is_empty() {
                continue;
            }
            let template = resource
                .unparsed_value
                .get_or_insert_with(|| resource.value.clone())
                .clone();
            let mut rendered = template;
            for (index, variable) in resource.variables.iter().enumerate() {
                let value = resolve(variable).unwrap_or_else(|| variable.key.clone());
                rendered = rendered.replace(&format!("{{{index}}}"), &value);
            }
            resource.value = rendered;
        }
    }
}

/// Catalogue of user-facing validation messages with `{0}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Messages(BTreeMap<String, String>);

impl Default for Messages {
    fn default() -> Self {
        let entries = [
            ("form_filler.error_required", "You must fill in {0}"),
            ("form_filler.file_uploader_validation_error_file_number_1", "To continue you must upload"),
            ("form_filler.file_uploader_validation_error_file_number_2", "attachments"),
            ("form_filler.file_uploader_validation_error_no_chosen_tag", "You must choose"),
            ("form_filler.file_uploader_validation_error_exceeds_max_files", "You can upload at most {0} attachments"),
            ("validation.generic_field", "this field"),
            ("date_picker.invalid_date_message", "Invalid date format. Use the format {0}."),
            ("date_picker.min_date_exeeded", "Date is before the allowed range"),
            ("date_picker.max_date_exeeded", "Date is after the allowed range"),
            ("validation_errors.min", "Minimum valid value is {0}"),
            ("validation_errors.max", "Maximum valid value is {0}"),
            ("validation_errors.minLength", "Use {0} or more characters"),
            ("validation_errors.maxLength", "Exceeds maximum number of characters ({0})"),
            ("validation_errors.pattern", "Invalid input"),
            ("validation_errors.required", "Field is required"),
            ("validation_errors.enum", "Only {0} are permitted values"),
            ("validation_errors.multipleOf", "Value must be a multiple of {0}"),
        ];
        Self(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        )
    }
}

impl Messages {
    /// Empty catalogue; every lookup falls back to the key.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw template for `key`, or the key itself.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.0.get(key).map_or(key, String::as_str)
    }

    /// Template for `key` with `{n}` replaced by `params[n]`.
    pub fn format(&self, key: &str, params: &[&str]) -> String {
        let mut text = self.get(key).to_string();
        for (index, param) in params.iter().enumerate() {
            text = text.replace(&format!("{{{index}}}"), param);
        }
        text
    }
}
