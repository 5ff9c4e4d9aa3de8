//! Tests for full validation runs and result merging.

use std::collections::BTreeSet;

use appflow_binding::FormData;
use appflow_model::{Component, ComponentKind, Layouts, Messages, RepeatingGroups, TextResource, TextResources};
use appflow_validate::{
    Attachments, CompiledSchema, SIMPLE_BINDING, Severity, ValidationContext, ValidationIssue, ValidationMode,
    Validations, can_form_be_saved, map_server_issues, run_client_validation,
};
use serde_json::json;

fn input(id: &str, binding: &str) -> Component {
    Component::new(id, ComponentKind::Other("Input".into())).with_binding(SIMPLE_BINDING, binding)
}

fn layouts() -> Layouts {
    let mut layouts = Layouts::new();
    layouts.insert(
        "personal",
        vec![
            input("name", "Applicant.Name")
                .with_text("title", "name.title")
                .required(),
            input("age", "Applicant.Age"),
            input("nickname", "Applicant.Nickname").required(),
        ],
    );
    layouts.insert(
        "children",
        vec![
            Component::new("kids", ComponentKind::Group)
                .repeating("Applicant.Children", 5)
                .with_children(["kid-name"]),
            input("kid-name", "Applicant.Children.Name")
                .with_text("title", "kid.title")
                .required(),
        ],
    );
    layouts
}

fn schema() -> CompiledSchema {
    CompiledSchema::compile(json!({
        "info": { "rootNode": "#/definitions/Application" },
        "definitions": {
            "Application": {
                "properties": {
                    "Applicant": {
                        "properties": {
                            "Name": { "type": "string", "maxLength": 20 },
                            "Age": { "type": "integer", "minimum": 0 },
                            "Nickname": { "type": "string" },
                            "Children": {
                                "type": "array",
                                "items": {
                                    "properties": { "Name": { "type": "string" } }
                                }
                            }
                        }
                    }
                }
            }
        }
    }))
    .unwrap()
}

fn texts() -> TextResources {
    TextResources {
        language: "en".into(),
        resources: vec![
            TextResource::new("name.title", "Name"),
            TextResource::new("kid.title", "Child name"),
        ],
    }
}

struct Fixture {
    layouts: Layouts,
    schema: CompiledSchema,
    texts: TextResources,
    messages: Messages,
    groups: RepeatingGroups,
    hidden: BTreeSet<String>,
    attachments: Attachments,
    form: FormData,
}

impl Fixture {
    fn new(entries: &[(&str, &str)]) -> Self {
        let mut groups = RepeatingGroups::new();
        groups.set_count("kids", 2);
        Self {
            layouts: layouts(),
            schema: schema(),
            texts: texts(),
            messages: Messages::default(),
            groups,
            hidden: BTreeSet::new(),
            attachments: Attachments::new(),
            form: entries
                .iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                .collect(),
        }
    }

    fn ctx(&self) -> ValidationContext<'_> {
        ValidationContext {
            layouts: &self.layouts,
            page_order: None,
            groups: &self.groups,
            form_data: &self.form,
            schema: Some(&self.schema),
            texts: &self.texts,
            messages: &self.messages,
            hidden: &self.hidden,
            attachments: &self.attachments,
        }
    }
}

fn render(validations: &Validations) -> String {
    validations
        .mapped_errors()
        .into_iter()
        .map(|error| format!("{}/{}: {}", error.layout, error.component_id, error.message))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Client passes
// =============================================================================

#[test]
fn test_partial_run_skips_required_fields() {
    let fixture = Fixture::new(&[("Applicant.Age", "-1")]);
    let result = run_client_validation(&fixture.ctx(), ValidationMode::Partial);

    insta::assert_snapshot!(render(&result.validations), @"personal/age: Minimum valid value is 0");
    assert!(!result.invalid_data_types);
    assert!(can_form_be_saved(&result, ValidationMode::Partial));
}

#[test]
fn test_complete_run_reports_required_fields_in_rendered_rows() {
    let fixture = Fixture::new(&[
        ("Applicant.Name", "Kari"),
        ("Applicant.Nickname", "K"),
        ("Applicant.Children[0].Name", "Ola"),
    ]);
    let result = run_client_validation(&fixture.ctx(), ValidationMode::Complete);

    insta::assert_snapshot!(render(&result.validations), @"children/kid-name-1: You must fill in child name");
    assert!(!can_form_be_saved(&result, ValidationMode::Complete));
}

#[test]
fn test_hidden_required_field_is_not_reported() {
    let mut fixture = Fixture::new(&[("Applicant.Name", "Kari")]);
    fixture.hidden.insert("nickname".into());
    fixture.hidden.insert("kids".into());

    let result = run_client_validation(&fixture.ctx(), ValidationMode::Complete);
    assert!(!result.validations.has_errors());
}

#[test]
fn test_type_errors_block_saving() {
    let fixture = Fixture::new(&[("Applicant.Age", "old")]);
    let result = run_client_validation(&fixture.ctx(), ValidationMode::Partial);

    assert!(result.invalid_data_types);
    assert!(!can_form_be_saved(&result, ValidationMode::Partial));
    assert_eq!(
        result.validations.binding("personal", "age", SIMPLE_BINDING).unwrap().errors,
        vec!["Invalid input"]
    );
}

#[test]
fn test_page_order_limits_pages() {
    let fixture = Fixture::new(&[]);
    let order = vec!["personal".to_string()];
    let mut ctx = fixture.ctx();
    ctx.page_order = Some(&order);
    let result = run_client_validation(&ctx, ValidationMode::Complete);
    assert!(result.validations.layout("children").is_none());
    assert!(result.validations.component_has_errors("personal", "name"));

    let result = run_client_validation(&fixture.ctx(), ValidationMode::Complete);
    assert!(result.validations.layout("children").is_some());
}

// =============================================================================
// Merging
// =============================================================================

#[test]
fn test_merging_a_run_into_itself_adds_no_duplicates() {
    let fixture = Fixture::new(&[("Applicant.Age", "-1")]);
    let result = run_client_validation(&fixture.ctx(), ValidationMode::Complete);

    let mut merged = result.validations.clone();
    merged.merge(&result.validations);
    assert_eq!(merged, result.validations);
}

#[test]
fn test_server_issues_merge_with_client_results() {
    let fixture = Fixture::new(&[("Applicant.Age", "-1")]);
    let mut validations = run_client_validation(&fixture.ctx(), ValidationMode::Partial).validations;

    let issues = vec![
        ValidationIssue::new("Applicant.Age", Severity::Fixed, "Minimum valid value is 0"),
        ValidationIssue::new("applicant.name", Severity::Warning, "Name looks unusual"),
        ValidationIssue::new("Applicant.Children[1].Name", Severity::Error, "Not a child"),
        ValidationIssue::new("", Severity::Error, "Task error"),
    ];
    let server = map_server_issues(&issues, &fixture.layouts, &fixture.texts);
    validations.merge(&server);

    insta::assert_snapshot!(render(&validations), @"children/kid-name-1: Not a child");
    assert_eq!(validations.unmapped_errors(), vec!["Task error"]);
    assert!(validations.has_severity(Severity::Warning));
    assert!(!validations.has_severity(Severity::Fixed));
}
