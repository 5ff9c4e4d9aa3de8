//! Resource queues.
//!
//! Each task type has a fixed set of member fetches. A queue start fires
//! them all on the current task, waits for every one of them and only then
//! announces that the queue is fulfilled. Progress is published on one
//! broadcast channel per queue.

mod barrier;
mod members;
mod run;

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::broadcast;

pub use barrier::CompletionBarrier;
pub use members::Loaded;
pub use run::{DataQueuePlan, InfoQueuePlan, run_data_queue, run_info_queue};

use crate::error::QueueError;

/// Capacity of each queue's event channel.
const EVENT_CAPACITY: usize = 64;

/// The queues the runtime knows how to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueueKind {
    /// Form filling on an instance.
    DataTask,
    /// Confirm, feedback and receipt pages.
    InfoTask,
    /// Form filling without an instance.
    Stateless,
}

impl QueueKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DataTask => "data",
            Self::InfoTask => "info",
            Self::Stateless => "stateless",
        }
    }

    /// Members that must all complete before the queue is fulfilled.
    pub fn members(&self) -> &'static [Member] {
        match self {
            Self::DataTask | Self::Stateless => &[
                Member::FormData,
                Member::Schema,
                Member::LayoutSets,
                Member::Layout,
                Member::LayoutSettings,
                Member::RuleModel,
                Member::Dynamics,
            ],
            Self::InfoTask => &[Member::Texts, Member::TextData],
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One fetch inside a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Member {
    FormData,
    Schema,
    LayoutSets,
    Layout,
    LayoutSettings,
    RuleModel,
    Dynamics,
    Texts,
    /// Data elements referenced by text resource variables.
    TextData,
}

impl Member {
    /// Resource name used in errors and logs.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::FormData => "form data",
            Self::Schema => "data model schema",
            Self::LayoutSets => "layout sets",
            Self::Layout => "layout",
            Self::LayoutSettings => "layout settings",
            Self::RuleModel => "rule model",
            Self::Dynamics => "dynamics",
            Self::Texts => "text resources",
            Self::TextData => "text data",
        }
    }

    /// Optional resources answer `404` when the app does not use them.
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            Self::LayoutSets | Self::LayoutSettings | Self::RuleModel | Self::Dynamics
        )
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

/// Progress notifications for one queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    MemberFulfilled { kind: QueueKind, member: Member },
    /// Sent once per queue start, after every member.
    Fulfilled { kind: QueueKind },
    Failed { kind: QueueKind, error: QueueError },
}

/// Lifecycle of one queue.
///
/// `is_done` is `None` before the first start, `Some(false)` while running
/// or after a failure, and `Some(true)` once fulfilled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueState {
    pub is_done: Option<bool>,
    pub error: Option<QueueError>,
    /// Task the queue was last started for.
    pub task_id: Option<String>,
}

#[derive(Debug)]
struct QueueSlot {
    state: QueueState,
    events: broadcast::Sender<QueueEvent>,
}

impl QueueSlot {
    fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: QueueState::default(),
            events,
        }
    }

    fn publish(&self, event: QueueEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Owns the state and event channel of every queue.
#[derive(Debug)]
pub struct QueueSupervisor {
    slots: BTreeMap<QueueKind, QueueSlot>,
}

impl Default for QueueSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueSupervisor {
    pub fn new() -> Self {
        let slots = [QueueKind::DataTask, QueueKind::InfoTask, QueueKind::Stateless]
            .into_iter()
            .map(|kind| (kind, QueueSlot::new()))
            .collect();
        Self { slots }
    }

    fn slot(&self, kind: QueueKind) -> &QueueSlot {
        // Every kind gets a slot in `new`.
        &self.slots[&kind]
    }

    fn slot_mut(&mut self, kind: QueueKind) -> &mut QueueSlot {
        self.slots.entry(kind).or_insert_with(QueueSlot::new)
    }

    pub fn state(&self, kind: QueueKind) -> &QueueState {
        &self.slot(kind).state
    }

    /// Receive the events of `kind` published from now on.
    pub fn subscribe(&self, kind: QueueKind) -> broadcast::Receiver<QueueEvent> {
        self.slot(kind).events.subscribe()
    }

    /// Mark the queue as started, unless a start is already running or
    /// has completed for the same task.
    ///
    /// Returns whether the caller should run the queue.
    pub fn try_start(&mut self, kind: QueueKind, task_id: Option<&str>) -> bool {
        let slot = self.slot_mut(kind);
        if slot.state.task_id.as_deref() != task_id {
            slot.state = QueueState::default();
        }
        let fresh = match slot.state.is_done {
            None => true,
            Some(false) => slot.state.error.is_some(),
            Some(true) => false,
        };
        if !fresh {
            tracing::debug!(queue = %kind, "queue already started");
            return false;
        }
        slot.state = QueueState {
            is_done: Some(false),
            error: None,
            task_id: task_id.map(str::to_string),
        };
        tracing::info!(queue = %kind, task = task_id.unwrap_or("-"), "queue started");
        true
    }

    pub fn member_fulfilled(&self, kind: QueueKind, member: Member) {
        tracing::debug!(queue = %kind, %member, "member fulfilled");
        self.slot(kind).publish(QueueEvent::MemberFulfilled { kind, member });
    }

    pub fn fulfil(&mut self, kind: QueueKind) {
        let slot = self.slot_mut(kind);
        slot.state.is_done = Some(true);
        slot.state.error = None;
        tracing::info!(queue = %kind, "queue fulfilled");
        slot.publish(QueueEvent::Fulfilled { kind });
    }

    /// Record a failure. The queue stays unfinished until a fresh start.
    pub fn fail(&mut self, kind: QueueKind, error: QueueError) {
        let slot = self.slot_mut(kind);
        tracing::error!(queue = %kind, error = %error, "queue failed");
        slot.state.error = Some(error.clone());
        slot.publish(QueueEvent::Failed { kind, error });
    }

    /// Forget every queue's progress, e.g. after a task transition.
    pub fn reset_all(&mut self) {
        for slot in self.slots.values_mut() {
            slot.state = QueueState::default();
        }
    }

    /// Whether any queue has been started and not yet fulfilled or failed.
    pub fn is_loading(&self) -> bool {
        self.slots
            .values()
            .any(|slot| slot.state.is_done == Some(false) && slot.state.error.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_guard() {
        let mut supervisor = QueueSupervisor::new();
        let kind = QueueKind::DataTask;
        assert_eq!(supervisor.state(kind).is_done, None);

        assert!(supervisor.try_start(kind, Some("Task_1")));
        assert!(supervisor.is_loading());
        assert!(!supervisor.try_start(kind, Some("Task_1")));

        supervisor.fulfil(kind);
        assert_eq!(supervisor.state(kind).is_done, Some(true));
        assert!(!supervisor.try_start(kind, Some("Task_1")));
        assert!(!supervisor.is_loading());

        assert!(supervisor.try_start(kind, Some("Task_2")));
    }

    #[test]
    fn test_failed_queue_stays_unfinished_until_restarted() {
        let mut supervisor = QueueSupervisor::new();
        let kind = QueueKind::InfoTask;
        supervisor.try_start(kind, None);
        supervisor.fail(kind, QueueError::NotFound { resource: "text resources" });

        let state = supervisor.state(kind);
        assert_eq!(state.is_done, Some(false));
        assert!(state.error.is_some());
        assert!(!supervisor.is_loading());

        assert!(supervisor.try_start(kind, None));
        assert_eq!(supervisor.state(kind).error, None);
    }

    #[test]
    fn test_events_reach_subscribers() {
        let mut supervisor = QueueSupervisor::new();
        let mut events = supervisor.subscribe(QueueKind::DataTask);
        supervisor.member_fulfilled(QueueKind::DataTask, Member::Schema);
        supervisor.fulfil(QueueKind::DataTask);

        assert_eq!(
            events.try_recv().unwrap(),
            QueueEvent::MemberFulfilled {
                kind: QueueKind::DataTask,
                member: Member::Schema
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            QueueEvent::Fulfilled { kind: QueueKind::DataTask }
        );
    }
}
