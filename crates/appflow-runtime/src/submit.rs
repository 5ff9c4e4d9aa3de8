//! Save and submit pipeline with debounced auto-save.

use appflow_binding::{filter_for_submit, flatten, unflatten_typed};
use appflow_model::ProcessState;
use appflow_validate::{
    Severity, ValidationIssue, ValidationMode, Validations, apply_component_issues, map_server_issues,
    validate_single_component,
};

use crate::error::{Result, RuntimeError};
use crate::fetch::Fetcher;
use crate::state::Runtime;

/// How a save ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The backend stored the data under a new data element.
    Redirected { from: String, to: String },
    /// Nothing to save to, e.g. a stateless app.
    Skipped,
}

/// How a submit ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Validation stopped the submit. Nothing was advanced.
    Blocked(Validations),
    /// The process moved on to this state.
    Advanced(ProcessState),
}

impl<F: Fetcher> Runtime<F> {
    /// Save the form data to the current data element.
    ///
    /// A `303` answer carries a new data element id; the data is re-read
    /// from there and the save still counts as successful.
    pub async fn save(&mut self) -> Result<SaveOutcome> {
        if self.urls.instance_id().is_none() {
            return Ok(SaveOutcome::Skipped);
        }
        let schema = self
            .state
            .schema
            .as_ref()
            .ok_or(RuntimeError::MissingContext { what: "data model schema" })?;
        let element_id = self
            .state
            .data_element_id
            .clone()
            .ok_or(RuntimeError::MissingContext { what: "data element" })?;
        let url = self
            .urls
            .data_element(&element_id)
            .ok_or(RuntimeError::MissingContext { what: "instance" })?;
        let schema = schema.schema();
        let payload = unflatten_typed(&filter_for_submit(&self.state.form_data, schema), schema);

        self.tracker.start_save();
        let outcome = match self.put_data(&url, &payload, &element_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.tracker.save_failed();
                tracing::warn!(data_element = %element_id, error = %err, "save failed");
                return Err(err);
            }
        };
        self.tracker.save_complete();
        tracing::info!(data_element = %element_id, ?outcome, "form data saved");

        self.run_pending_validation().await;
        Ok(outcome)
    }

    async fn put_data(&mut self, url: &str, payload: &serde_json::Value, element_id: &str) -> Result<SaveOutcome> {
        let err = match self.fetcher.put(url, payload).await {
            Ok(_) => return Ok(SaveOutcome::Saved),
            Err(err) => err,
        };
        let Some(new_id) = err.redirect_target().map(str::to_string) else {
            return Err(err.into());
        };

        tracing::info!(from = %element_id, to = %new_id, "data element replaced by backend");
        let new_url = self
            .urls
            .data_element(&new_id)
            .ok_or(RuntimeError::MissingContext { what: "instance" })?;
        let document = self.fetcher.get(&new_url).await?;
        self.state.form_data = flatten(&document);
        if let Some(instance) = self.state.instance.as_mut() {
            instance.replace_data_element_id(element_id, &new_id);
        }
        self.state.data_element_id = Some(new_id.clone());
        Ok(SaveOutcome::Redirected {
            from: element_id.to_string(),
            to: new_id,
        })
    }

    /// Server validation of the component changed before the last save.
    ///
    /// Failures are logged and leave the client validations in place.
    async fn run_pending_validation(&mut self) {
        let Some(pending) = self.state.pending_validation.take() else {
            return;
        };
        let Some(url) = self
            .state
            .data_element_id
            .as_deref()
            .and_then(|id| self.urls.data_element_validate(id))
        else {
            return;
        };
        let issues: Vec<ValidationIssue> = match self.get_document(&url, "validation issues").await {
            Ok(issues) => issues,
            Err(err) => {
                tracing::warn!(component = %pending.component_id, error = %err, "field validation failed");
                return;
            }
        };

        let server = map_server_issues(&issues, &self.state.layouts, &self.state.texts);
        let attachments = self.state.attachments();
        let client = validate_single_component(
            &self.state.validation_context(&attachments),
            &pending.layout_id,
            &pending.component_id,
        );
        let validations = &mut self.state.validations;
        apply_component_issues(validations, &server, &pending.layout_id, &pending.component_id);
        validations.merge(&client.validations);
        tracing::debug!(component = %pending.component_id, issues = issues.len(), "field validation applied");
    }

    /// Validate everything, save, check the server's verdict and advance
    /// the process.
    pub async fn submit(&mut self) -> Result<SubmitOutcome> {
        let client = self.client_validation(ValidationMode::Complete);
        let stop_on_warnings = self.config.stop_on_warnings;
        let blocked = client.validations.has_errors()
            || client.invalid_data_types
            || (stop_on_warnings && client.validations.has_severity(Severity::Warning));
        if blocked {
            tracing::info!(
                errors = client.validations.mapped_errors().len(),
                invalid_data_types = client.invalid_data_types,
                "submit blocked by client validation"
            );
            return Ok(SubmitOutcome::Blocked(client.validations));
        }

        self.save().await?;

        let url = self
            .urls
            .validate()
            .ok_or(RuntimeError::MissingContext { what: "instance" })?;
        let issues: Vec<ValidationIssue> = self.get_document(&url, "validation issues").await?;
        let server = map_server_issues(&issues, &self.state.layouts, &self.state.texts);
        self.state.validations.merge(&server);
        if self.state.validations.has_errors() {
            tracing::info!(issues = issues.len(), "submit blocked by server validation");
            return Ok(SubmitOutcome::Blocked(self.state.validations.clone()));
        }

        let state = self.process.advance(&self.fetcher, &self.urls).await?.clone();
        self.queues.reset_all();
        Ok(SubmitOutcome::Advanced(state))
    }

    /// Whether a debounced auto-save is due now.
    pub fn auto_save_due(&self) -> bool {
        self.tracker.should_auto_save(&self.config.auto_save)
    }

    /// Wait for the pending auto-save to become due, then save.
    ///
    /// Returns `None` when nothing is pending or auto-save is disabled.
    pub async fn flush_auto_save(&mut self) -> Result<Option<SaveOutcome>> {
        let Some(deadline) = self.tracker.deadline(&self.config.auto_save) else {
            return Ok(None);
        };
        tokio::time::sleep_until(deadline).await;
        tracing::debug!("auto-save due");
        self.save().await.map(Some)
    }
}
