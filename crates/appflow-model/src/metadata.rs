//! Application metadata, instances and layout sets.
//!
//! These documents decide which data type, data element and layout set
//! belong to the current task.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::process::ProcessResponse;

/// `onEntry.show` values that mean "create or pick an instance".
const INSTANCE_ENTRY_MODES: [&str; 2] = ["new-instance", "select-instance"];

/// Data type declared in application metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataType {
    pub id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    /// Present for data types backed by a form data model.
    #[serde(default)]
    pub app_logic: Option<Value>,
}

impl DataType {
    pub fn has_app_logic(&self) -> bool {
        self.app_logic.as_ref().is_some_and(|logic| !logic.is_null())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnEntry {
    #[serde(default)]
    pub show: String,
}

/// Application metadata document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub data_types: Vec<DataType>,
    #[serde(default)]
    pub on_entry: Option<OnEntry>,
}

impl ApplicationMetadata {
    /// Stateless apps show a layout set directly instead of an instance.
    pub fn is_stateless(&self) -> bool {
        self.on_entry.as_ref().is_some_and(|entry| {
            !entry.show.is_empty() && !INSTANCE_ENTRY_MODES.contains(&entry.show.as_str())
        })
    }

    /// Layout set shown on entry for stateless apps.
    pub fn stateless_layout_set(&self) -> Option<&str> {
        self.is_stateless()
            .then(|| self.on_entry.as_ref().map(|entry| entry.show.as_str()))
            .flatten()
    }

    /// The form data type bound to `task_id`.
    pub fn data_type_for_task(&self, task_id: &str) -> Option<&DataType> {
        self.data_types
            .iter()
            .find(|data_type| data_type.has_app_logic() && data_type.task_id.as_deref() == Some(task_id))
    }
}

/// A data element stored on an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataElement {
    pub id: String,
    pub data_type: String,
    /// Tags chosen for an attachment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceOwner {
    #[serde(default)]
    pub party_id: String,
}

/// Instance document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub instance_owner: InstanceOwner,
    #[serde(default)]
    pub data: Vec<DataElement>,
    #[serde(default)]
    pub process: Option<ProcessResponse>,
}

impl Instance {
    /// First data element of the given type.
    pub fn data_element_of_type(&self, data_type: &str) -> Option<&DataElement> {
        self.data.iter().find(|element| element.data_type == data_type)
    }

    /// Replace the id of a data element after the backend re-created it.
    pub fn replace_data_element_id(&mut self, old_id: &str, new_id: &str) {
        if let Some(element) = self.data.iter_mut().find(|element| element.id == old_id) {
            element.id = new_id.to_string();
        }
    }

    /// Value of an `instanceContext` text variable.
    pub fn context_value(&self, key: &str) -> Option<String> {
        match key {
            "instanceId" => Some(self.id.clone()),
            "appId" => Some(self.app_id.clone()),
            "instanceOwnerPartyId" => Some(self.instance_owner.party_id.clone()),
            _ => None,
        }
    }
}

/// Named group of layouts bound to a data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSet {
    pub id: String,
    pub data_type: String,
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// Layout sets document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSets {
    #[serde(default)]
    pub sets: Vec<LayoutSet>,
}

impl LayoutSets {
    pub fn for_task(&self, task_id: &str) -> Option<&LayoutSet> {
        self.sets
            .iter()
            .find(|set| set.tasks.iter().any(|task| task == task_id))
    }

    pub fn for_data_type(&self, data_type: &str) -> Option<&LayoutSet> {
        self.sets.iter().find(|set| set.data_type == data_type)
    }

    pub fn by_id(&self, id: &str) -> Option<&LayoutSet> {
        self.sets.iter().find(|set| set.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata() -> ApplicationMetadata {
        serde_json::from_value(json!({
            "id": "org/app",
            "dataTypes": [
                { "id": "ref-data-as-pdf", "taskId": "Task_1" },
                { "id": "model", "taskId": "Task_1", "appLogic": { "classRef": "App.Model" } },
                { "id": "other", "taskId": "Task_2", "appLogic": { "classRef": "App.Other" } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn data_type_requires_app_logic() {
        let meta = metadata();
        assert_eq!(meta.data_type_for_task("Task_1").unwrap().id, "model");
        assert_eq!(meta.data_type_for_task("Task_2").unwrap().id, "other");
        assert!(meta.data_type_for_task("Task_3").is_none());
    }

    #[test]
    fn stateless_detection() {
        let mut meta = metadata();
        assert!(!meta.is_stateless());
        meta.on_entry = Some(OnEntry {
            show: "new-instance".into(),
        });
        assert!(!meta.is_stateless());
        meta.on_entry = Some(OnEntry {
            show: "stateless".into(),
        });
        assert!(meta.is_stateless());
        assert_eq!(meta.stateless_layout_set(), Some("stateless"));
    }

    #[test]
    fn layout_set_lookup() {
        let sets: LayoutSets = serde_json::from_value(json!({
            "sets": [
                { "id": "form", "dataType": "model", "tasks": ["Task_1"] },
                { "id": "stateless", "dataType": "entry" }
            ]
        }))
        .unwrap();
        assert_eq!(sets.for_task("Task_1").unwrap().id, "form");
        assert_eq!(sets.for_data_type("entry").unwrap().id, "stateless");
        assert!(sets.for_task("Task_9").is_none());
    }
}
