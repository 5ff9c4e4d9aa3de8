//! Validation issue types reported by the backend.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Issue severity level.
///
/// The backend sends severities as integer codes; names are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Severity {
    #[default]
    Unspecified,
    /// Blocks submission.
    Error,
    /// Should be reviewed; blocks only when stopping on warnings.
    Warning,
    Informational,
    /// A previously reported message no longer applies.
    Fixed,
    Success,
}

impl Severity {
    /// Parse severity from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unspecified" => Some(Self::Unspecified),
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "informational" | "info" => Some(Self::Informational),
            "fixed" => Some(Self::Fixed),
            "success" => Some(Self::Success),
            _ => None,
        }
    }

    /// Map the backend's numeric code.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Error),
            2 => Some(Self::Warning),
            3 => Some(Self::Informational),
            4 => Some(Self::Fixed),
            5 => Some(Self::Success),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Informational => "Informational",
            Self::Fixed => "Fixed",
            Self::Success => "Success",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u64),
            Name(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Severity::from_code(code),
            Raw::Name(name) => Severity::parse(&name),
        };
        Ok(parsed.unwrap_or_default())
    }
}

/// One issue from `GET /instances/{id}/validate`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// Data model binding or component id the issue refers to.
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    /// Message text or text resource key.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            description: Some(description.into()),
            severity,
            ..Self::default()
        }
    }

    /// The field, treating an empty string as absent.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref().filter(|field| !field.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_from_code_or_name() {
        let issues: Vec<ValidationIssue> = serde_json::from_value(json!([
            { "field": "A", "severity": 1, "description": "x" },
            { "field": "B", "severity": "Warning", "description": "y" },
            { "field": "C", "severity": 4, "description": "z" },
            { "field": "D", "severity": 99 }
        ]))
        .unwrap();
        let severities: Vec<_> = issues.iter().map(|issue| issue.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Error, Severity::Warning, Severity::Fixed, Severity::Unspecified]
        );
    }

    #[test]
    fn empty_field_is_absent() {
        let issue = ValidationIssue::new("", Severity::Error, "task level");
        assert_eq!(issue.field(), None);
    }
}
