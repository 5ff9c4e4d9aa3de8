//! Compiled data model schema and structural checks.
//!
//! Form data leaves are strings, so every check coerces: a field declared
//! `integer` is valid when its text parses as one. Empty values are left to
//! the required-field pass.

use std::collections::HashMap;

use appflow_binding::{DataModelSchema, FormData};
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::Value;

use crate::error::{Result, SchemaError};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const YEAR_PATTERN: &str = r"^\d{4}$";
const YEAR_MONTH_PATTERN: &str = r"^\d{4}-(0[1-9]|1[0-2])$";

/// Schema keyword a value violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Type,
    Format,
    Pattern,
    MinLength,
    MaxLength,
    Minimum,
    Maximum,
    ExclusiveMinimum,
    ExclusiveMaximum,
    Enum,
    Const,
    MultipleOf,
}

impl Keyword {
    /// Suffix of the `validation_errors.*` catalogue key.
    pub fn text_key(&self) -> &'static str {
        match self {
            Self::Minimum | Self::ExclusiveMinimum => "min",
            Self::Maximum | Self::ExclusiveMaximum => "max",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::Pattern | Self::Format | Self::Type => "pattern",
            Self::Enum | Self::Const => "enum",
            Self::MultipleOf => "multipleOf",
        }
    }

    /// Type and format failures mean the value cannot be stored at all.
    pub fn is_data_type_error(&self) -> bool {
        matches!(self, Self::Type | Self::Format)
    }
}

/// One failed check on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    /// Binding of the offending value, indices included.
    pub binding: String,
    pub keyword: Keyword,
    /// Keyword parameter to interpolate into the message.
    pub param: String,
    /// Text resource key from the field's `errorMessage`.
    pub error_message: Option<String>,
}

/// A schema checked for broken references and patterns, ready to validate.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    schema: DataModelSchema,
    patterns: HashMap<String, Regex>,
    email: Regex,
    year: Regex,
    year_month: Regex,
}

impl CompiledSchema {
    /// Compile a schema document.
    ///
    /// Fails when any `$ref` does not resolve, any `pattern` is not a valid
    /// regex, or the root element cannot be found.
    pub fn compile(document: Value) -> Result<Self> {
        let schema = DataModelSchema::new(document);
        if schema.root().is_none() {
            return Err(SchemaError::MissingRoot {
                path: schema.root_path().to_string(),
            });
        }

        let mut references = Vec::new();
        let mut pattern_texts = Vec::new();
        collect_keywords(schema.document(), &mut references, &mut pattern_texts);

        if let Some(reference) = references
            .into_iter()
            .find(|reference| schema.resolve_ref(reference).is_none())
        {
            return Err(SchemaError::InvalidRef {
                reference: reference.to_string(),
            });
        }

        let mut patterns = HashMap::new();
        for pattern in pattern_texts {
            if !patterns.contains_key(pattern) {
                patterns.insert(pattern.to_string(), compile_pattern(pattern)?);
            }
        }

        tracing::debug!(
            root = %schema.root_path(),
            patterns = patterns.len(),
            "compiled data model schema"
        );
        Ok(Self {
            schema,
            patterns,
            email: compile_pattern(EMAIL_PATTERN)?,
            year: compile_pattern(YEAR_PATTERN)?,
            year_month: compile_pattern(YEAR_MONTH_PATTERN)?,
        })
    }

    pub fn schema(&self) -> &DataModelSchema {
        &self.schema
    }

    /// Check every field in `form_data` against its schema node.
    ///
    /// Fields without a schema node are skipped.
    pub fn validate(&self, form_data: &FormData) -> Vec<SchemaViolation> {
        form_data
            .iter()
            .flat_map(|(binding, value)| self.validate_field(binding, value))
            .collect()
    }

    /// Check a single value against the schema node for `binding`.
    pub fn validate_field(&self, binding: &str, value: &str) -> Vec<SchemaViolation> {
        if value.is_empty() {
            return Vec::new();
        }
        let Some(node) = self.schema.field(binding) else {
            return Vec::new();
        };
        let error_message = node
            .get("errorMessage")
            .and_then(Value::as_str)
            .map(str::to_string);

        self.check(node, value)
            .into_iter()
            .map(|(keyword, param)| SchemaViolation {
                binding: binding.to_string(),
                keyword,
                param,
                error_message: error_message.clone(),
            })
            .collect()
    }

    fn check(&self, node: &Value, value: &str) -> Vec<(Keyword, String)> {
        let mut failures = Vec::new();

        let types = declared_types(node);
        if !types.is_empty() && !types.iter().any(|kind| matches_type(kind, value)) {
            failures.push((Keyword::Type, types.join(",")));
            return failures;
        }

        if let Some(format) = node.get("format").and_then(Value::as_str)
            && !self.matches_format(format, value)
        {
            failures.push((Keyword::Format, format.to_string()));
        }

        if let Some(pattern) = node.get("pattern").and_then(Value::as_str)
            && let Some(regex) = self.patterns.get(pattern)
            && !regex.is_match(value)
        {
            failures.push((Keyword::Pattern, pattern.to_string()));
        }

        let length = value.chars().count();
        if let Some(limit) = node.get("minLength").and_then(Value::as_u64)
            && (length as u64) < limit
        {
            failures.push((Keyword::MinLength, limit.to_string()));
        }
        if let Some(limit) = node.get("maxLength").and_then(Value::as_u64)
            && (length as u64) > limit
        {
            failures.push((Keyword::MaxLength, limit.to_string()));
        }

        if let Ok(number) = value.trim().parse::<f64>() {
            check_bounds(node, number, &mut failures);
        }

        if let Some(allowed) = node.get("enum").and_then(Value::as_array) {
            let allowed: Vec<String> = allowed.iter().map(value_text).collect();
            if !allowed.iter().any(|candidate| candidate == value) {
                failures.push((Keyword::Enum, allowed.join(", ")));
            }
        }
        if let Some(constant) = node.get("const") {
            let expected = value_text(constant);
            if expected != value {
                failures.push((Keyword::Const, expected));
            }
        }

        failures
    }

    fn matches_format(&self, format: &str, value: &str) -> bool {
        match format {
            "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
            "date-time" => DateTime::parse_from_rfc3339(value).is_ok(),
            "email" => self.email.is_match(value),
            "year" => self.year.is_match(value),
            "year-month" => self.year_month.is_match(value),
            _ => true,
        }
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn check_bounds(node: &Value, number: f64, failures: &mut Vec<(Keyword, String)>) {
    let limit = |key: &str| node.get(key).and_then(Value::as_f64);
    let text = |key: &str| node.get(key).map(value_text).unwrap_or_default();

    if limit("minimum").is_some_and(|min| number < min) {
        failures.push((Keyword::Minimum, text("minimum")));
    }
    if limit("maximum").is_some_and(|max| number > max) {
        failures.push((Keyword::Maximum, text("maximum")));
    }
    if limit("exclusiveMinimum").is_some_and(|min| number <= min) {
        failures.push((Keyword::ExclusiveMinimum, text("exclusiveMinimum")));
    }
    if limit("exclusiveMaximum").is_some_and(|max| number >= max) {
        failures.push((Keyword::ExclusiveMaximum, text("exclusiveMaximum")));
    }
    if let Some(step) = limit("multipleOf").filter(|step| *step > 0.0) {
        let ratio = number / step;
        if (ratio - ratio.round()).abs() > 1e-9 {
            failures.push((Keyword::MultipleOf, text("multipleOf")));
        }
    }
}

/// The `type` keyword as a list; empty when absent.
fn declared_types(node: &Value) -> Vec<&str> {
    match node.get("type") {
        Some(Value::String(kind)) => vec![kind.as_str()],
        Some(Value::Array(kinds)) => kinds.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn matches_type(kind: &str, value: &str) -> bool {
    let trimmed = value.trim();
    match kind {
        "string" => true,
        "integer" => {
            trimmed.parse::<i64>().is_ok()
                || trimmed
                    .parse::<f64>()
                    .is_ok_and(|number| number.is_finite() && number.fract() == 0.0)
        }
        "number" => trimmed.parse::<f64>().is_ok_and(f64::is_finite),
        "boolean" => matches!(trimmed, "true" | "false"),
        "null" => trimmed.is_empty(),
        _ => false,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Gather every `$ref` string and `pattern` string in the document.
fn collect_keywords<'a>(node: &'a Value, references: &mut Vec<&'a str>, patterns: &mut Vec<&'a str>) {
    match node {
        Value::Object(object) => {
            for (key, child) in object {
                match (key.as_str(), child) {
                    ("$ref", Value::String(reference)) => references.push(reference),
                    ("pattern", Value::String(pattern)) => patterns.push(pattern),
                    _ => collect_keywords(child, references, patterns),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_keywords(item, references, patterns);
            }
        }
        _ => {}
    }
}
