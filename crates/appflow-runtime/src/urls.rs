//! Backend endpoint URLs.

use crate::config::RuntimeConfig;

/// Builds the app's endpoint URLs from the configured app root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUrls {
    base: String,
    instance: Option<String>,
    language: String,
}

impl AppUrls {
    pub fn new(base_url: &str, instance: Option<&str>, language: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            instance: instance.map(|id| id.trim_matches('/').to_string()),
            language: language.to_string(),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(&config.base_url, config.instance.as_deref(), &config.language)
    }

    /// Instance id as `{partyId}/{instanceGuid}`.
    pub fn instance_id(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    pub fn application_metadata(&self) -> String {
        format!("{}/api/v1/applicationmetadata", self.base)
    }

    pub fn texts(&self) -> String {
        format!("{}/api/v1/texts/{}", self.base, self.language)
    }

    pub fn layout_sets(&self) -> String {
        format!("{}/api/layoutsets", self.base)
    }

    pub fn layouts(&self, layout_set: Option<&str>) -> String {
        self.scoped("api/layouts", layout_set)
    }

    pub fn layout_settings(&self, layout_set: Option<&str>) -> String {
        self.scoped("api/layoutsettings", layout_set)
    }

    pub fn rule_handler(&self, layout_set: Option<&str>) -> String {
        self.scoped("api/rulehandler", layout_set)
    }

    /// Dynamics and calculation rules.
    pub fn rule_configuration(&self, layout_set: Option<&str>) -> String {
        self.scoped("api/ruleconfiguration", layout_set)
    }

    pub fn json_schema(&self, data_type: &str) -> String {
        format!("{}/api/jsonschema/{data_type}", self.base)
    }

    /// Initial data for a stateless layout set.
    pub fn stateless_data(&self, data_type: &str) -> String {
        format!("{}/v1/data?dataType={data_type}", self.base)
    }

    pub fn instance(&self) -> Option<String> {
        Some(format!("{}/instances/{}", self.base, self.instance.as_deref()?))
    }

    pub fn data_element(&self, data_element_id: &str) -> Option<String> {
        Some(format!("{}/data/{data_element_id}", self.instance()?))
    }

    /// Server validation of one data element.
    pub fn data_element_validate(&self, data_element_id: &str) -> Option<String> {
        Some(format!("{}/validate", self.data_element(data_element_id)?))
    }

    pub fn process(&self) -> Option<String> {
        Some(format!("{}/process", self.instance()?))
    }

    pub fn process_next(&self) -> Option<String> {
        Some(format!("{}/process/next", self.instance()?))
    }

    pub fn validate(&self) -> Option<String> {
        Some(format!("{}/validate", self.instance()?))
    }

    fn scoped(&self, path: &str, layout_set: Option<&str>) -> String {
        match layout_set {
            Some(set) => format!("{}/{path}/{set}", self.base),
            None => format!("{}/{path}", self.base),
        }
    }
}
