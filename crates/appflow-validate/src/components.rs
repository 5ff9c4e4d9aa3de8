//! Component-specific checks: attachments and dates.

use std::collections::{BTreeMap, BTreeSet};

use appflow_binding::{FormData, Node};
use appflow_model::{ComponentKind, Instance, Messages};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::issue::Severity;
use crate::result::{LayoutValidations, SIMPLE_BINDING};

/// Separates an attachment id from its message in tag errors.
pub const UNIT_SEPARATOR: char = '\u{1f}';

const DEFAULT_MIN_DATE: (i32, u32, u32) = (1900, 1, 1);
const DEFAULT_MAX_DATE: (i32, u32, u32) = (2100, 1, 1);
const DEFAULT_DATE_FORMAT: &str = "DD.MM.YYYY";

/// An uploaded file as seen by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub tags: Vec<String>,
}

/// Uploaded files keyed by the id of the component that owns them.
pub type Attachments = BTreeMap<String, Vec<Attachment>>;

/// Attachments on an instance, grouped by data type.
///
/// File upload components store their files under a data type named after
/// the component.
pub fn attachments_from_instance(instance: &Instance) -> Attachments {
    let mut attachments = Attachments::new();
    for element in &instance.data {
        attachments
            .entry(element.data_type.clone())
            .or_default()
            .push(Attachment {
                id: element.id.clone(),
                tags: element.tags.clone(),
            });
    }
    attachments
}

/// Run component checks for every visible node of one page.
pub fn validate_components(
    nodes: &[Node],
    form_data: &FormData,
    attachments: &Attachments,
    hidden: &BTreeSet<String>,
    messages: &Messages,
) -> LayoutValidations {
    let mut validations = LayoutValidations::new();
    for node in nodes {
        if node.is_hidden(hidden) {
            continue;
        }
        let errors = match node.kind() {
            ComponentKind::FileUpload => file_upload_errors(node, attachments, messages),
            ComponentKind::FileUploadWithTag => tagged_upload_errors(node, attachments, messages),
            ComponentKind::DatePicker => {
                let value = node
                    .bindings
                    .get(SIMPLE_BINDING)
                    .and_then(|binding| form_data.get(binding));
                date_errors(node, value.map(String::as_str), messages)
            }
            _ => continue,
        };
        let binding = validations
            .entry(node.id.clone())
            .or_default()
            .entry(SIMPLE_BINDING.to_string())
            .or_default();
        for error in errors {
            binding.push(Severity::Error, error);
        }
    }
    validations
}

fn uploaded<'a>(node: &Node, attachments: &'a Attachments) -> &'a [Attachment] {
    attachments
        .get(&node.base_id)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn attachment_count_errors(node: &Node, count: usize, messages: &Messages) -> Vec<String> {
    let component = &node.component;
    let min = component.min_number_of_attachments.unwrap_or(0) as usize;
    let mut errors = Vec::new();
    if count < min {
        errors.push(format!(
            "{} {} {}",
            messages.get("form_filler.file_uploader_validation_error_file_number_1"),
            min,
            messages.get("form_filler.file_uploader_validation_error_file_number_2"),
        ));
    }
    if let Some(max) = component.max_number_of_attachments
        && count > max as usize
    {
        errors.push(messages.format(
            "form_filler.file_uploader_validation_error_exceeds_max_files",
            &[&max.to_string()],
        ));
    }
    errors
}

fn file_upload_errors(node: &Node, attachments: &Attachments, messages: &Messages) -> Vec<String> {
    attachment_count_errors(node, uploaded(node, attachments).len(), messages)
}

fn tagged_upload_errors(node: &Node, attachments: &Attachments, messages: &Messages) -> Vec<String> {
    let files = uploaded(node, attachments);
    let errors = attachment_count_errors(node, files.len(), messages);
    if !errors.is_empty() {
        return errors;
    }
    let tag_title = node
        .component
        .text_resource_bindings
        .get("tagTitle")
        .map(|title| title.to_lowercase())
        .unwrap_or_default();
    files
        .iter()
        .filter(|file| file.tags.is_empty())
        .map(|file| {
            format!(
                "{}{UNIT_SEPARATOR}{} {tag_title}.",
                file.id,
                messages.get("form_filler.file_uploader_validation_error_no_chosen_tag"),
            )
        })
        .collect()
}

fn date_errors(node: &Node, value: Option<&str>, messages: &Messages) -> Vec<String> {
    let Some(value) = value.filter(|value| !value.is_empty()) else {
        return Vec::new();
    };
    let component = &node.component;
    let Some(date) = parse_iso_date(value) else {
        let format = component.format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
        return vec![messages.format("date_picker.invalid_date_message", &[format])];
    };

    let min = date_constraint(component.min_date.as_deref(), DEFAULT_MIN_DATE);
    let max = date_constraint(component.max_date.as_deref(), DEFAULT_MAX_DATE);
    if min.is_some_and(|min| date < min) {
        vec![messages.get("date_picker.min_date_exeeded").to_string()]
    } else if max.is_some_and(|max| date > max) {
        vec![messages.get("date_picker.max_date_exeeded").to_string()]
    } else {
        Vec::new()
    }
}

/// Parse an ISO 8601 date or date-time, keeping the calendar date.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

fn date_constraint(constraint: Option<&str>, default: (i32, u32, u32)) -> Option<NaiveDate> {
    match constraint {
        Some("today") => Some(Utc::now().date_naive()),
        Some(text) => parse_iso_date(text),
        None => NaiveDate::from_ymd_opt(default.0, default.1, default.2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appflow_binding::expand_layout;
    use appflow_model::{Component, RepeatingGroups};

    fn nodes(components: Vec<Component>) -> Vec<Node> {
        expand_layout(&components, &RepeatingGroups::new())
    }

    fn attachment(id: &str, tags: &[&str]) -> Attachment {
        Attachment {
            id: id.into(),
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
        }
    }

    #[test]
    fn file_upload_bounds() {
        let mut upload = Component::new("upload", ComponentKind::FileUpload);
        upload.min_number_of_attachments = Some(1);
        upload.max_number_of_attachments = Some(2);
        let nodes = nodes(vec![upload]);
        let messages = Messages::default();
        let hidden = BTreeSet::new();

        let none = validate_components(&nodes, &FormData::new(), &Attachments::new(), &hidden, &messages);
        assert_eq!(
            none["upload"][SIMPLE_BINDING].errors,
            vec!["To continue you must upload 1 attachments"]
        );

        let mut attachments = Attachments::new();
        attachments.insert(
            "upload".into(),
            vec![attachment("a", &[]), attachment("b", &[]), attachment("c", &[])],
        );
        let many = validate_components(&nodes, &FormData::new(), &attachments, &hidden, &messages);
        assert_eq!(
            many["upload"][SIMPLE_BINDING].errors,
            vec!["You can upload at most 2 attachments"]
        );
    }

    #[test]
    fn tagged_upload_reports_missing_tags() {
        let mut upload = Component::new("docs", ComponentKind::FileUploadWithTag)
            .with_text("tagTitle", "Document Type");
        upload.min_number_of_attachments = Some(0);
        let nodes = nodes(vec![upload]);
        let mut attachments = Attachments::new();
        attachments.insert(
            "docs".into(),
            vec![attachment("f1", &["invoice"]), attachment("f2", &[])],
        );
        let result = validate_components(
            &nodes,
            &FormData::new(),
            &attachments,
            &BTreeSet::new(),
            &Messages::default(),
        );
        assert_eq!(
            result["docs"][SIMPLE_BINDING].errors,
            vec![format!("f2{UNIT_SEPARATOR}You must choose document type.")]
        );
    }

    #[test]
    fn date_picker_format_and_bounds() {
        let mut picker = Component::new("date", ComponentKind::DatePicker)
            .with_binding(SIMPLE_BINDING, "Date");
        picker.min_date = Some("2020-01-01".into());
        let nodes = nodes(vec![picker]);
        let messages = Messages::default();
        let check = |value: &str| {
            let mut form = FormData::new();
            form.insert("Date".into(), value.into());
            validate_components(&nodes, &form, &Attachments::new(), &BTreeSet::new(), &messages)["date"]
                [SIMPLE_BINDING]
                .errors
                .clone()
        };

        assert!(check("2021-05-05").is_empty());
        assert!(check("2021-05-05T12:00:00Z").is_empty());
        assert_eq!(check("2019-12-31"), vec!["Date is before the allowed range"]);
        assert_eq!(check("2200-01-01"), vec!["Date is after the allowed range"]);
        assert_eq!(
            check("05.05.2021"),
            vec!["Invalid date format. Use the format DD.MM.YYYY."]
        );
    }

    #[test]
    fn hidden_components_are_skipped() {
        let mut upload = Component::new("upload", ComponentKind::FileUpload);
        upload.min_number_of_attachments = Some(1);
        let nodes = nodes(vec![upload]);
        let hidden: BTreeSet<String> = ["upload".to_string()].into();
        let result = validate_components(
            &nodes,
            &FormData::new(),
            &Attachments::new(),
            &hidden,
            &Messages::default(),
        );
        assert!(result.is_empty());
    }
}
