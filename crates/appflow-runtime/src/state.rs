//! Runtime state container and its commands.

use std::collections::BTreeSet;

use appflow_binding::{BindingError, FieldPath, FormData, expand_layout, init_repeating_groups, remove_group_row};
use appflow_model::layout::GROUP_BINDING;
use appflow_model::{
    ApplicationMetadata, Instance, LayoutSets, LayoutSettings, Layouts, Messages, ModelError, ProcessState,
    RepeatingGroups, TaskType, TextResources,
};
use appflow_validate::{
    Attachments, CompiledSchema, ValidationContext, ValidationMode, ValidationResult, Validations,
    attachments_from_instance, remove_group_validations_by_index, run_client_validation,
    validate_single_component,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::autosave::DirtyTracker;
use crate::config::RuntimeConfig;
use crate::error::{QueueError, Result, RuntimeError};
use crate::fetch::Fetcher;
use crate::process::ProcessMachine;
use crate::queue::{
    DataQueuePlan, InfoQueuePlan, Loaded, QueueEvent, QueueKind, QueueState, QueueSupervisor, run_data_queue,
    run_info_queue,
};
use crate::urls::AppUrls;

/// A component whose server validation should run after the next save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingValidation {
    pub layout_id: String,
    pub component_id: String,
}

/// Everything loaded for the current task.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub metadata: Option<ApplicationMetadata>,
    pub instance: Option<Instance>,
    pub layout_sets: Option<LayoutSets>,
    pub layout_set: Option<String>,
    pub layouts: Layouts,
    pub layout_settings: Option<LayoutSettings>,
    pub schema: Option<CompiledSchema>,
    pub rule_model: Option<String>,
    pub dynamics: Option<Value>,
    pub texts: TextResources,
    pub messages: Messages,
    pub form_data: FormData,
    /// Data element the form data is saved to.
    pub data_element_id: Option<String>,
    pub groups: RepeatingGroups,
    /// Ids of components hidden by dynamics.
    pub hidden: BTreeSet<String>,
    pub validations: Validations,
    pub invalid_data_types: bool,
    pub pending_validation: Option<PendingValidation>,
}

impl AppState {
    /// Pages to validate, from the layout settings.
    pub fn page_order(&self) -> Option<&[String]> {
        self.layout_settings
            .as_ref()
            .map(|settings| settings.pages.order.as_slice())
            .filter(|order| !order.is_empty())
    }

    /// Attachments of the instance, keyed by data type.
    pub fn attachments(&self) -> Attachments {
        self.instance.as_ref().map(attachments_from_instance).unwrap_or_default()
    }

    pub fn validation_context<'a>(&'a self, attachments: &'a Attachments) -> ValidationContext<'a> {
        ValidationContext {
            layouts: &self.layouts,
            page_order: self.page_order(),
            groups: &self.groups,
            form_data: &self.form_data,
            schema: self.schema.as_ref(),
            texts: &self.texts,
            messages: &self.messages,
            hidden: &self.hidden,
            attachments,
        }
    }

    /// The rendered component bound to a form data key.
    pub fn bound_component(&self, key: &str) -> Option<PendingValidation> {
        self.layouts.iter().find_map(|(layout_id, layout)| {
            expand_layout(layout, &self.groups)
                .into_iter()
                .find(|node| node.bindings.values().any(|binding| binding == key))
                .map(|node| PendingValidation {
                    layout_id: layout_id.to_string(),
                    component_id: node.id,
                })
        })
    }

    /// Reject a key addressing a row past its group.
    ///
    /// A row is addressable when the group renders it or it is at most one
    /// past the last row stored in the form data.
    fn check_rows(&self, path: &FieldPath) -> std::result::Result<(), BindingError> {
        let segments = path.segments();
        for (position, segment) in segments.iter().enumerate() {
            let Some(index) = segment.index else {
                continue;
            };
            let mut prefix = segments[..=position].to_vec();
            if let Some(last) = prefix.last_mut() {
                last.index = None;
            }
            let group = FieldPath::new(prefix);
            let rendered = self.rendered_rows(&group.to_string());
            let stored = self
                .form_data
                .keys()
                .filter_map(|key| FieldPath::parse(key).ok()?.row_in(&group))
                .max()
                .map_or(0, |row| row + 1);
            if index >= rendered && index > stored {
                return Err(BindingError::RowOutOfRange {
                    id: group.to_string(),
                    index,
                    count: rendered.max(stored),
                });
            }
        }
        Ok(())
    }

    /// Row count of the rendered repeating group bound at `binding`.
    fn rendered_rows(&self, binding: &str) -> usize {
        self.layouts
            .iter()
            .flat_map(|(_, layout)| expand_layout(layout, &self.groups))
            .filter(|node| {
                node.component.is_repeating_group()
                    && node.bindings.get(GROUP_BINDING).is_some_and(|bound| bound == binding)
            })
            .map(|node| self.groups.count(&node.id))
            .max()
            .unwrap_or(0)
    }

    /// Set row counts for every repeating group from the form data.
    fn init_groups(&mut self) {
        let mut groups = RepeatingGroups::new();
        for (_, layout) in self.layouts.iter() {
            for (id, group) in init_repeating_groups(layout, &self.form_data).iter() {
                groups.set(id, group.clone());
            }
        }
        tracing::debug!(groups = groups.len(), "repeating groups initialized");
        self.groups = groups;
    }

    /// Re-render text resources with the current form data and instance.
    fn interpolate_texts(&mut self) {
        let Self {
            texts,
            form_data,
            instance,
            ..
        } = self;
        texts.interpolate(|variable| {
            if variable.data_type().is_some() {
                form_data.get(&variable.key).cloned()
            } else if variable.data_source == "instanceContext" {
                instance.as_ref().and_then(|instance| instance.context_value(&variable.key))
            } else {
                None
            }
        });
    }

    fn refresh_invalid_data_types(&mut self) {
        self.invalid_data_types = self.schema.as_ref().is_some_and(|schema| {
            schema
                .validate(&self.form_data)
                .iter()
                .any(|violation| violation.keyword.is_data_type_error())
        });
    }
}

/// Drives one app session against the backend.
///
/// Owns the state and is the only writer to it; callers issue commands and
/// read the result.
///
/// Auto-save has no background task. With auto-save enabled, the host must
/// await [`Runtime::flush_auto_save`] after [`Runtime::update_field`] or
/// [`Runtime::delete_group_row`]; otherwise edits stay unsaved until the
/// next explicit [`Runtime::save`] or [`Runtime::submit`].
#[derive(Debug)]
pub struct Runtime<F: Fetcher> {
    pub(crate) fetcher: F,
    pub(crate) urls: AppUrls,
    pub(crate) config: RuntimeConfig,
    pub(crate) process: ProcessMachine,
    pub(crate) queues: QueueSupervisor,
    pub(crate) tracker: DirtyTracker,
    pub(crate) state: AppState,
}

impl<F: Fetcher> Runtime<F> {
    pub fn new(fetcher: F, config: RuntimeConfig) -> Self {
        Self {
            fetcher,
            urls: AppUrls::from_config(&config),
            config,
            process: ProcessMachine::new(),
            queues: QueueSupervisor::new(),
            tracker: DirtyTracker::new(),
            state: AppState::default(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn urls(&self) -> &AppUrls {
        &self.urls
    }

    pub fn process_state(&self) -> &ProcessState {
        self.process.state()
    }

    pub fn queue_state(&self, kind: QueueKind) -> &QueueState {
        self.queues.state(kind)
    }

    pub fn subscribe(&self, kind: QueueKind) -> broadcast::Receiver<QueueEvent> {
        self.queues.subscribe(kind)
    }

    /// Whether a queue is in flight.
    pub fn is_loading(&self) -> bool {
        self.queues.is_loading()
    }

    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty()
    }

    /// Hide or show a component, e.g. when dynamics change.
    pub fn set_hidden(&mut self, component_id: &str, hidden: bool) {
        if hidden {
            self.state.hidden.insert(component_id.to_string());
        } else {
            self.state.hidden.remove(component_id);
        }
    }

    /// Load application metadata, texts and, for instances, the instance
    /// and its process.
    pub async fn initialize(&mut self) -> Result<()> {
        let metadata: ApplicationMetadata =
            self.get_document(&self.urls.application_metadata(), "application metadata").await?;
        let stateless = metadata.is_stateless();
        tracing::info!(app = %metadata.id, stateless, "application metadata loaded");
        self.state.metadata = Some(metadata);

        self.state.texts = self.get_document(&self.urls.texts(), "text resources").await?;

        if stateless {
            return Ok(());
        }
        let url = self
            .urls
            .instance()
            .ok_or(RuntimeError::MissingContext { what: "instance" })?;
        let instance: Instance = self.get_document(&url, "instance").await?;
        self.state.instance = Some(instance);
        self.state.interpolate_texts();
        self.process.fetch(&self.fetcher, &self.urls).await?;
        Ok(())
    }

    /// Start the queue for the current process task, or the stateless
    /// queue for stateless apps.
    pub async fn start_queue_for_current_task(&mut self) -> Result<QueueKind> {
        let kind = self.current_queue()?;
        self.start_queue(kind).await?;
        Ok(kind)
    }

    fn current_queue(&self) -> Result<QueueKind> {
        let metadata = self
            .state
            .metadata
            .as_ref()
            .ok_or(RuntimeError::MissingContext { what: "application metadata" })?;
        if metadata.is_stateless() {
            return Ok(QueueKind::Stateless);
        }
        match self.process.task_type() {
            TaskType::Data => Ok(QueueKind::DataTask),
            TaskType::Confirm | TaskType::Feedback | TaskType::Archived => Ok(QueueKind::InfoTask),
            TaskType::Unknown => Err(RuntimeError::MissingContext { what: "process" }),
        }
    }

    /// Run a queue and apply what it loaded.
    ///
    /// Returns `false` when the queue was already running or fulfilled for
    /// the current task.
    pub async fn start_queue(&mut self, kind: QueueKind) -> Result<bool> {
        let task_id = self.process.state().task_id.clone();
        if !self.queues.try_start(kind, task_id.as_deref()) {
            return Ok(false);
        }

        let loaded = match kind {
            QueueKind::DataTask | QueueKind::Stateless => {
                let plan = match self.data_plan(kind) {
                    Ok(plan) => plan,
                    Err(err) => {
                        if let RuntimeError::MissingContext { what } = &err {
                            self.queues.fail(kind, QueueError::MissingContext { what: *what });
                        }
                        return Err(err);
                    }
                };
                run_data_queue(&self.fetcher, &self.urls, &plan, &mut self.queues).await?
            }
            QueueKind::InfoTask => {
                let plan = InfoQueuePlan {
                    task_id,
                    data_elements: self
                        .state
                        .instance
                        .as_ref()
                        .map(|instance| instance.data.clone())
                        .unwrap_or_default(),
                };
                run_info_queue(&self.fetcher, &self.urls, &plan, &mut self.queues).await?
            }
        };

        for resource in loaded {
            self.apply_fetch_result(resource);
        }
        if kind != QueueKind::InfoTask {
            self.state.init_groups();
            self.state.refresh_invalid_data_types();
        }
        Ok(true)
    }

    fn data_plan(&self, kind: QueueKind) -> Result<DataQueuePlan> {
        let metadata = self
            .state
            .metadata
            .as_ref()
            .ok_or(RuntimeError::MissingContext { what: "application metadata" })?;
        if kind == QueueKind::Stateless {
            let set = metadata
                .stateless_layout_set()
                .ok_or(RuntimeError::MissingContext { what: "stateless layout set" })?;
            return Ok(DataQueuePlan {
                stateless_layout_set: Some(set.to_string()),
                ..DataQueuePlan::default()
            });
        }

        let task_id = self
            .process
            .state()
            .task_id
            .clone()
            .ok_or(RuntimeError::MissingContext { what: "process task" })?;
        let data_type = metadata
            .data_type_for_task(&task_id)
            .map(|data_type| data_type.id.clone())
            .ok_or(RuntimeError::MissingContext { what: "data type" })?;
        let data_element_id = self
            .state
            .instance
            .as_ref()
            .and_then(|instance| instance.data_element_of_type(&data_type))
            .map(|element| element.id.clone())
            .ok_or(RuntimeError::MissingContext { what: "data element" })?;
        Ok(DataQueuePlan {
            task_id: Some(task_id),
            data_type: Some(data_type),
            data_element_id: Some(data_element_id),
            stateless_layout_set: None,
        })
    }

    /// Store one loaded resource.
    pub fn apply_fetch_result(&mut self, resource: Loaded) {
        tracing::trace!(member = %resource.member(), "applying fetch result");
        match resource {
            Loaded::FormData {
                data_element_id,
                form_data,
            } => {
                self.state.form_data = form_data;
                self.state.data_element_id = data_element_id;
                self.state.interpolate_texts();
            }
            Loaded::Schema(schema) => self.state.schema = Some(schema),
            Loaded::LayoutSets(sets) => self.state.layout_sets = sets,
            Loaded::Layouts { layout_set, layouts } => {
                self.state.layout_set = layout_set;
                self.state.layouts = layouts;
            }
            Loaded::LayoutSettings(settings) => self.state.layout_settings = settings,
            Loaded::RuleModel(script) => self.state.rule_model = script,
            Loaded::Dynamics(dynamics) => self.state.dynamics = dynamics,
            Loaded::Texts(texts) => {
                self.state.texts = texts;
                self.state.interpolate_texts();
            }
            Loaded::TextData(values) => {
                self.state.form_data.extend(values);
                self.state.interpolate_texts();
            }
        }
    }

    /// Set one form field.
    ///
    /// A path the loaded schema does not know is rejected and the previous
    /// value restored, as is a row index past the group's rows. Otherwise the
    /// bound component is re-validated and an auto-save scheduled.
    pub fn update_field(&mut self, path: &str, value: impl Into<String>) -> Result<()> {
        let parsed = FieldPath::parse(path)?;
        self.state.check_rows(&parsed)?;
        let key = parsed.to_string();
        let previous = self.state.form_data.insert(key.clone(), value.into());

        let known = self
            .state
            .schema
            .as_ref()
            .is_none_or(|schema| schema.schema().contains(&key));
        if !known {
            match previous {
                Some(previous) => self.state.form_data.insert(key.clone(), previous),
                None => self.state.form_data.remove(&key),
            };
            tracing::error!(path = %key, "update to a field outside the data model reverted");
            return Err(RuntimeError::UnknownField { path: key });
        }
        tracing::trace!(path = %key, "field updated");

        if let Some(bound) = self.state.bound_component(&key) {
            let attachments = self.state.attachments();
            let result = validate_single_component(
                &self.state.validation_context(&attachments),
                &bound.layout_id,
                &bound.component_id,
            );
            self.apply_component_result(&bound, &result);
            self.state.pending_validation = Some(bound);
        }
        self.state.refresh_invalid_data_types();

        if self.config.auto_save.enabled {
            self.tracker.mark_dirty();
        }
        Ok(())
    }

    fn apply_component_result(&mut self, bound: &PendingValidation, result: &ValidationResult) {
        let component = result
            .validations
            .component(&bound.layout_id, &bound.component_id)
            .cloned()
            .unwrap_or_default();
        self.state
            .validations
            .set_component(&bound.layout_id, &bound.component_id, component);
    }

    /// Append a row to a repeating group instance. Returns the new row index.
    pub fn add_group_row(&mut self, group_instance: &str) -> usize {
        self.state.groups.add_row(group_instance)
    }

    /// Delete one row of a repeating group, its data and its validations.
    pub fn delete_group_row(&mut self, layout_id: &str, group_instance: &str, index: usize) -> Result<()> {
        let AppState {
            layouts,
            form_data,
            groups,
            validations,
            ..
        } = &mut self.state;
        let layout = layouts
            .get(layout_id)
            .ok_or(RuntimeError::MissingContext { what: "layout" })?;
        // Both removals run on copies; state changes only if both succeed.
        let mut next_data = form_data.clone();
        let mut next_groups = groups.clone();
        let mut next_validations = validations.clone();
        remove_group_row(&mut next_data, &mut next_groups, layout, group_instance, index)?;
        remove_group_validations_by_index(&mut next_validations, layout_id, layout, group_instance, index)?;
        *form_data = next_data;
        *groups = next_groups;
        *validations = next_validations;
        tracing::debug!(group = group_instance, index, "group row deleted");

        if self.config.auto_save.enabled {
            self.tracker.mark_dirty();
        }
        Ok(())
    }

    /// Run client validation and store the result.
    pub fn client_validation(&mut self, mode: ValidationMode) -> ValidationResult {
        let attachments = self.state.attachments();
        let result = run_client_validation(&self.state.validation_context(&attachments), mode);
        self.state.validations = result.validations.clone();
        self.state.invalid_data_types = result.invalid_data_types;
        result
    }

    /// Poll the process until the task changes. Returns whether it did.
    ///
    /// A change resets the queues so the next start loads the new task.
    pub async fn check_if_updated(&mut self) -> Result<bool> {
        let before = self.process.state().clone();
        let after = self
            .process
            .check_if_updated(&self.fetcher, &self.urls, &self.config.poll)
            .await?;
        let changed = after.task_type != before.task_type || after.task_id != before.task_id;
        if changed {
            self.queues.reset_all();
        }
        Ok(changed)
    }

    pub(crate) async fn get_document<T: DeserializeOwned>(&self, url: &str, document: &'static str) -> Result<T> {
        let value = self.fetcher.get(url).await?;
        serde_json::from_value(value).map_err(|e| ModelError::decode(document, e).into())
    }
}
