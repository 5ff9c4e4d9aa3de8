//! Validation results and how they merge.
//!
//! Results are keyed layout id, then component id (with row suffix), then
//! data model binding key. A missing component key means the component has
//! no issues.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::issue::Severity;

/// Component key collecting issues that match no component.
pub const UNMAPPED: &str = "unmapped";

/// Binding key used by components with a single binding.
pub const SIMPLE_BINDING: &str = appflow_model::layout::SIMPLE_BINDING;

/// Whether a validation run is for saving a draft or for submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValidationMode {
    /// Draft save: required fields are not checked and errors do not block.
    #[default]
    Partial,
    /// Submission: required fields are checked and errors block.
    Complete,
}

/// Messages for one data model binding of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingValidation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success: Vec<String>,
    /// Messages to remove from existing results when merging.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixed: Vec<String>,
}

impl BindingValidation {
    pub fn errors<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            errors: messages.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// The list holding messages of `severity`, if it has one.
    pub fn list_mut(&mut self, severity: Severity) -> Option<&mut Vec<String>> {
        match severity {
            Severity::Error => Some(&mut self.errors),
            Severity::Warning => Some(&mut self.warnings),
            Severity::Informational => Some(&mut self.info),
            Severity::Success => Some(&mut self.success),
            Severity::Fixed => Some(&mut self.fixed),
            Severity::Unspecified => None,
        }
    }

    pub fn list(&self, severity: Severity) -> &[String] {
        match severity {
            Severity::Error => &self.errors,
            Severity::Warning => &self.warnings,
            Severity::Informational => &self.info,
            Severity::Success => &self.success,
            Severity::Fixed => &self.fixed,
            Severity::Unspecified => &[],
        }
    }

    /// Add a message unless it is already present.
    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        if let Some(list) = self.list_mut(severity)
            && !list.contains(&message)
        {
            list.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
            && self.warnings.is_empty()
            && self.info.is_empty()
            && self.success.is_empty()
            && self.fixed.is_empty()
    }

    /// Merge `incoming` into these messages.
    ///
    /// Each list keeps its existing messages and appends the incoming ones
    /// it does not already hold. Messages listed in `incoming.fixed` are
    /// then removed from every list. The result never carries `fixed`.
    pub fn merge(&mut self, incoming: &BindingValidation) {
        for (own, new) in [
            (&mut self.errors, &incoming.errors),
            (&mut self.warnings, &incoming.warnings),
            (&mut self.info, &incoming.info),
            (&mut self.success, &incoming.success),
        ] {
            let unique: Vec<String> = new
                .iter()
                .filter(|message| !own.contains(message))
                .cloned()
                .collect();
            own.extend(unique);
            if !incoming.fixed.is_empty() {
                own.retain(|message| !incoming.fixed.contains(message));
            }
        }
        self.fixed.clear();
    }
}

/// Validations of one component, keyed by binding key.
pub type ComponentValidations = BTreeMap<String, BindingValidation>;

/// Validations of one layout page, keyed by component id.
pub type LayoutValidations = BTreeMap<String, ComponentValidations>;

/// All validations, keyed by layout id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Validations(BTreeMap<String, LayoutValidations>);

/// An error message with the component it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatError {
    pub layout: String,
    pub component_id: String,
    pub message: String,
}

impl Validations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one message, creating the layout, component and binding entries.
    pub fn add(
        &mut self,
        layout: &str,
        component: &str,
        binding_key: &str,
        severity: Severity,
        message: impl Into<String>,
    ) {
        self.binding_mut(layout, component, binding_key)
            .push(severity, message);
    }

    /// Entry for a binding, created empty if absent.
    pub fn binding_mut(
        &mut self,
        layout: &str,
        component: &str,
        binding_key: &str,
    ) -> &mut BindingValidation {
        self.0
            .entry(layout.to_string())
            .or_default()
            .entry(component.to_string())
            .or_default()
            .entry(binding_key.to_string())
            .or_default()
    }

    pub fn layout(&self, layout: &str) -> Option<&LayoutValidations> {
        self.0.get(layout)
    }

    pub fn layout_mut(&mut self, layout: &str) -> Option<&mut LayoutValidations> {
        self.0.get_mut(layout)
    }

    pub fn component(&self, layout: &str, component: &str) -> Option<&ComponentValidations> {
        self.0.get(layout)?.get(component)
    }

    pub fn binding(&self, layout: &str, component: &str, binding_key: &str) -> Option<&BindingValidation> {
        self.component(layout, component)?.get(binding_key)
    }

    /// Replace everything known about a component.
    pub fn set_component(&mut self, layout: &str, component: &str, validations: ComponentValidations) {
        self.0
            .entry(layout.to_string())
            .or_default()
            .insert(component.to_string(), validations);
    }

    pub fn remove_component(&mut self, layout: &str, component: &str) -> Option<ComponentValidations> {
        self.0.get_mut(layout)?.remove(component)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LayoutValidations)> {
        self.0.iter().map(|(id, layout)| (id.as_str(), layout))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|layout| {
            layout
                .values()
                .all(|component| component.values().all(BindingValidation::is_empty))
        })
    }

    /// Merge another result into this one.
    ///
    /// Components present on only one side keep what they have. For a
    /// component present on both sides, each binding merges with
    /// [`BindingValidation::merge`].
    pub fn merge(&mut self, other: &Validations) {
        for (layout_id, layout) in &other.0 {
            let own_layout = self.0.entry(layout_id.clone()).or_default();
            for (component_id, component) in layout {
                let own_component = own_layout.entry(component_id.clone()).or_default();
                for (binding_key, incoming) in component {
                    own_component
                        .entry(binding_key.clone())
                        .or_default()
                        .merge(incoming);
                }
            }
        }
    }

    /// Merge several results, in order, into a new one.
    pub fn merged<'a>(sources: impl IntoIterator<Item = &'a Validations>) -> Validations {
        let mut merged = Validations::new();
        for source in sources {
            merged.merge(source);
        }
        merged
    }

    fn bindings(&self) -> impl Iterator<Item = (&str, &str, &BindingValidation)> {
        self.0.iter().flat_map(|(layout_id, layout)| {
            layout.iter().flat_map(move |(component_id, component)| {
                component
                    .values()
                    .map(move |binding| (layout_id.as_str(), component_id.as_str(), binding))
            })
        })
    }

    /// Whether any binding has at least one error.
    pub fn has_errors(&self) -> bool {
        self.has_severity(Severity::Error)
    }

    /// Whether any binding has a message of `severity`.
    pub fn has_severity(&self, severity: Severity) -> bool {
        self.bindings()
            .any(|(_, _, binding)| !binding.list(severity).is_empty())
    }

    /// Whether a single component has errors.
    pub fn component_has_errors(&self, layout: &str, component: &str) -> bool {
        self.component(layout, component)
            .is_some_and(|bindings| bindings.values().any(|binding| !binding.errors.is_empty()))
    }

    /// Errors that matched no component.
    pub fn unmapped_errors(&self) -> Vec<String> {
        self.bindings()
            .filter(|(_, component_id, _)| *component_id == UNMAPPED)
            .flat_map(|(_, _, binding)| binding.errors.iter().cloned())
            .collect()
    }

    /// Errors that belong to a component, in key order.
    pub fn mapped_errors(&self) -> Vec<FlatError> {
        self.bindings()
            .filter(|(_, component_id, _)| *component_id != UNMAPPED)
            .flat_map(|(layout, component_id, binding)| {
                binding.errors.iter().map(move |message| FlatError {
                    layout: layout.to_string(),
                    component_id: component_id.to_string(),
                    message: message.clone(),
                })
            })
            .collect()
    }

    /// Whether any error on `layout` starts with the required-field prefix.
    ///
    /// `required_template` is the catalogue text with a `{0}` placeholder;
    /// only the part before the placeholder is compared.
    pub fn has_missing_required(&self, layout: &str, required_template: &str) -> bool {
        let prefix = required_template
            .split_once("{0}")
            .map_or(required_template, |(head, _)| head);
        self.bindings()
            .filter(|(layout_id, _, _)| *layout_id == layout)
            .any(|(_, _, binding)| binding.errors.iter().any(|error| error.contains(prefix)))
    }
}

/// Output of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub validations: Validations,
    /// A value could not be coerced to its declared type or format.
    pub invalid_data_types: bool,
}

impl ValidationResult {
    pub fn new(validations: Validations, invalid_data_types: bool) -> Self {
        Self {
            validations,
            invalid_data_types,
        }
    }
}

/// Whether form data may be persisted.
///
/// Type errors always block. Other errors block only in
/// [`ValidationMode::Complete`].
pub fn can_form_be_saved(result: &ValidationResult, mode: ValidationMode) -> bool {
    if result.invalid_data_types {
        return false;
    }
    mode != ValidationMode::Complete || !result.validations.has_errors()
}
