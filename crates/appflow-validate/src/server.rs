//! Mapping of backend validation issues onto layout components.

use appflow_binding::{indices_of, instance_id, row_suffix, strip_indices};
use appflow_model::{Component, Layouts, TextResources};

use crate::issue::ValidationIssue;
use crate::result::{ComponentValidations, SIMPLE_BINDING, UNMAPPED, Validations};

const REQUIRED_CODE: &str = "required";

/// Convert issues from `GET /instances/{id}/validate` into [`Validations`].
///
/// An issue whose field names a file upload component (or a row copy of
/// one) is attached to that component. Otherwise the field is compared to
/// every data model binding, ignoring case and row indices, and the
/// component id gets the field's row indices as suffix. Issues matching
/// nothing land in the `unmapped` component of the `unmapped` layout,
/// keyed by their field.
///
/// Backend `required` issues are skipped since the client reports the
/// same thing, unless the description equals the code (custom issues
/// always carry their key in both).
pub fn map_server_issues(issues: &[ValidationIssue], layouts: &Layouts, texts: &TextResources) -> Validations {
    let mut validations = Validations::new();
    for issue in issues {
        if issue.code.as_deref() == Some(REQUIRED_CODE) && issue.code != issue.description {
            continue;
        }
        let message = issue
            .description
            .as_deref()
            .map(|description| texts.resolve(description).to_string())
            .unwrap_or_default();

        let Some(field) = issue.field() else {
            validations.add(UNMAPPED, UNMAPPED, "", issue.severity, message);
            continue;
        };

        let mut mapped = false;
        for (layout_id, layout) in layouts.iter() {
            let Some((component_id, bindings)) = find_component(layout, field) else {
                continue;
            };
            mapped = true;
            for binding_key in bindings {
                validations.add(layout_id, &component_id, &binding_key, issue.severity, message.clone());
            }
        }
        if !mapped {
            tracing::debug!(field, "server validation issue matches no component");
            validations.add(UNMAPPED, UNMAPPED, field, issue.severity, message);
        }
    }
    validations
}

/// The component a field refers to on one page, with the binding keys the
/// issue applies to.
fn find_component(layout: &[Component], field: &str) -> Option<(String, Vec<String>)> {
    if layout
        .iter()
        .any(|component| component.kind.is_file_upload() && row_suffix(field, &component.id).is_some())
    {
        return Some((field.to_string(), vec![SIMPLE_BINDING.to_string()]));
    }

    let stripped = strip_indices(field).to_lowercase();
    layout.iter().find_map(|component| {
        let keys: Vec<String> = component
            .data_model_bindings
            .iter()
            .filter(|(_, binding)| binding.to_lowercase() == stripped)
            .map(|(key, _)| key.clone())
            .collect();
        if keys.is_empty() {
            return None;
        }
        Some((instance_id(&component.id, &indices_of(field)), keys))
    })
}

/// Replace a component's validations with what the server reported for it.
///
/// Used after a single-field save: only the touched component is updated so
/// other components keep their client-side results.
pub fn apply_component_issues(
    target: &mut Validations,
    server: &Validations,
    layout_id: &str,
    component_id: &str,
) {
    let incoming: ComponentValidations = server
        .component(layout_id, component_id)
        .cloned()
        .unwrap_or_default();
    target.set_component(layout_id, component_id, incoming);
}
