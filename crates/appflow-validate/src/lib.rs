//! Validation engine for form data.
//!
//! A client validation run has three passes over the rendered nodes of
//! every page:
//!
//! - [`schema`] - type, format, pattern and bound checks from the data
//!   model schema
//! - [`components`] - attachment counts, attachment tags and dates
//! - [`empty`] - required fields without a value (complete runs only)
//!
//! Their results, and the issues reported by the backend ([`server`]),
//! merge into one [`Validations`] tree. [`shift`] keeps that tree aligned
//! when repeating-group rows are deleted.

pub mod components;
pub mod empty;
pub mod error;
pub mod issue;
pub mod result;
pub mod schema;
pub mod server;
pub mod shift;

use std::collections::BTreeSet;

use appflow_binding::{FormData, Node, expand_layout};
use appflow_model::{Layouts, Messages, RepeatingGroups, TextResources};

pub use components::{Attachment, Attachments, UNIT_SEPARATOR, attachments_from_instance, validate_components};
pub use empty::{field_name, validate_empty_fields};
pub use error::{Result, SchemaError};
pub use issue::{Severity, ValidationIssue};
pub use result::{
    BindingValidation, ComponentValidations, FlatError, LayoutValidations, SIMPLE_BINDING, UNMAPPED,
    ValidationMode, ValidationResult, Validations, can_form_be_saved,
};
pub use schema::{CompiledSchema, Keyword, SchemaViolation};
pub use server::{apply_component_issues, map_server_issues};
pub use shift::remove_group_validations_by_index;

/// Everything a validation run reads.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub layouts: &'a Layouts,
    /// Pages to validate, in order. All pages when absent.
    pub page_order: Option<&'a [String]>,
    pub groups: &'a RepeatingGroups,
    pub form_data: &'a FormData,
    /// Compiled data model schema; the schema pass is skipped without one.
    pub schema: Option<&'a CompiledSchema>,
    pub texts: &'a TextResources,
    pub messages: &'a Messages,
    /// Ids of hidden components, either layout ids or row copies.
    pub hidden: &'a BTreeSet<String>,
    pub attachments: &'a Attachments,
}

impl ValidationContext<'_> {
    /// Rendered nodes of every page to validate.
    fn pages(&self) -> Vec<(String, Vec<Node>)> {
        let ids: Vec<&str> = match self.page_order {
            Some(order) => order
                .iter()
                .map(String::as_str)
                .filter(|id| self.layouts.get(id).is_some())
                .collect(),
            None => self.layouts.ids().collect(),
        };
        ids.into_iter()
            .filter_map(|id| {
                let layout = self.layouts.get(id)?;
                Some((id.to_string(), expand_layout(layout, self.groups)))
            })
            .collect()
    }

    fn violation_message(&self, violation: &SchemaViolation) -> String {
        match &violation.error_message {
            Some(key) => self.texts.resolve(key).to_string(),
            None => self.messages.format(
                &format!("validation_errors.{}", violation.keyword.text_key()),
                &[&violation.param],
            ),
        }
    }

    /// Record one schema violation on every node bound to its field.
    fn add_violation(&self, pages: &[(String, Vec<Node>)], violation: &SchemaViolation, into: &mut Validations) {
        let target = violation.binding.to_lowercase();
        let mut mapped = false;
        for (layout_id, nodes) in pages {
            for node in nodes {
                for (binding_key, path) in &node.bindings {
                    if path.to_lowercase() == target {
                        mapped = true;
                        into.add(
                            layout_id,
                            &node.id,
                            binding_key,
                            Severity::Error,
                            self.violation_message(violation),
                        );
                    }
                }
            }
        }
        if !mapped {
            tracing::trace!(binding = %violation.binding, "schema violation on a field with no component");
        }
    }
}

/// Run the client-side validation passes over every page.
///
/// [`ValidationMode::Complete`] adds the required-field pass. Schema
/// violations set [`ValidationResult::invalid_data_types`] when a value
/// does not fit its declared type or format.
pub fn run_client_validation(ctx: &ValidationContext<'_>, mode: ValidationMode) -> ValidationResult {
    let pages = ctx.pages();

    let mut schema_pass = Validations::new();
    let mut invalid_data_types = false;
    if let Some(schema) = ctx.schema {
        let violations = schema.validate(ctx.form_data);
        invalid_data_types = violations.iter().any(|violation| violation.keyword.is_data_type_error());
        for violation in &violations {
            ctx.add_violation(&pages, violation, &mut schema_pass);
        }
    }

    let mut component_pass = Validations::new();
    let mut empty_pass = Validations::new();
    for (layout_id, nodes) in &pages {
        let page = validate_components(nodes, ctx.form_data, ctx.attachments, ctx.hidden, ctx.messages);
        for (component_id, validations) in page {
            component_pass.set_component(layout_id, &component_id, validations);
        }
        if mode == ValidationMode::Complete {
            let page = validate_empty_fields(nodes, ctx.form_data, ctx.hidden, ctx.texts, ctx.messages);
            for (component_id, validations) in page {
                empty_pass.set_component(layout_id, &component_id, validations);
            }
        }
    }

    let validations = Validations::merged([&schema_pass, &component_pass, &empty_pass]);
    tracing::debug!(
        ?mode,
        pages = pages.len(),
        has_errors = validations.has_errors(),
        invalid_data_types,
        "client validation finished"
    );
    ValidationResult::new(validations, invalid_data_types)
}

/// Validate one rendered component after its value changed.
///
/// The result always holds an entry for the component, empty when it is
/// valid, so applying it replaces whatever was reported before.
pub fn validate_single_component(
    ctx: &ValidationContext<'_>,
    layout_id: &str,
    component_id: &str,
) -> ValidationResult {
    let mut validations = Validations::new();
    let Some(layout) = ctx.layouts.get(layout_id) else {
        return ValidationResult::new(validations, false);
    };
    let nodes: Vec<Node> = expand_layout(layout, ctx.groups)
        .into_iter()
        .filter(|node| node.id == component_id)
        .collect();
    let Some(node) = nodes.first() else {
        tracing::debug!(layout = layout_id, component = component_id, "component not rendered");
        return ValidationResult::new(validations, false);
    };

    validations.set_component(layout_id, &node.id, ComponentValidations::new());
    let mut invalid_data_types = false;
    if let Some(schema) = ctx.schema {
        let pages = vec![(layout_id.to_string(), nodes.clone())];
        for path in node.bindings.values() {
            let value = ctx.form_data.get(path).map_or("", String::as_str);
            for violation in schema.validate_field(path, value) {
                invalid_data_types |= violation.keyword.is_data_type_error();
                ctx.add_violation(&pages, &violation, &mut validations);
            }
        }
    }

    let mut others = Validations::new();
    let checks = [
        validate_components(&nodes, ctx.form_data, ctx.attachments, ctx.hidden, ctx.messages),
        validate_empty_fields(&nodes, ctx.form_data, ctx.hidden, ctx.texts, ctx.messages),
    ];
    for page in checks {
        for (id, component) in page {
            let mut merged = others.component(layout_id, &id).cloned().unwrap_or_default();
            for (binding_key, binding) in component {
                merged.entry(binding_key).or_default().merge(&binding);
            }
            others.set_component(layout_id, &id, merged);
        }
    }
    validations.merge(&others);
    ValidationResult::new(validations, invalid_data_types)
}
