//! Rendered row counts for repeating groups.
//!
//! Top-level groups are keyed by their component id. A group nested inside
//! a repeating group has one instance per parent row, keyed as
//! `{childGroupId}-{parentRow}` (and further `-{row}` suffixes for deeper
//! nesting).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// State for one repeating group instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatingGroup {
    /// Number of rendered rows.
    pub count: usize,

    /// Layout id of the group when the key carries a row suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_group_id: Option<String>,
}

/// Repeating group state keyed by group instance id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepeatingGroups(BTreeMap<String, RepeatingGroup>);

impl RepeatingGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows rendered for `id`; unknown groups have none.
    pub fn count(&self, id: &str) -> usize {
        self.0.get(id).map_or(0, |group| group.count)
    }

    pub fn get(&self, id: &str) -> Option<&RepeatingGroup> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn set(&mut self, id: impl Into<String>, group: RepeatingGroup) {
        self.0.insert(id.into(), group);
    }

    pub fn set_count(&mut self, id: impl Into<String>, count: usize) {
        self.0.entry(id.into()).or_default().count = count;
    }

    /// Append a row and return its index.
    pub fn add_row(&mut self, id: &str) -> usize {
        let group = self.0.entry(id.to_string()).or_default();
        group.count += 1;
        group.count - 1
    }

    /// Drop one row from the count, never going below zero.
    pub fn decrement(&mut self, id: &str) {
        if let Some(group) = self.0.get_mut(id) {
            group.count = group.count.saturating_sub(1);
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<RepeatingGroup> {
        self.0.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RepeatingGroup)> {
        self.0.iter().map(|(id, group)| (id.as_str(), group))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_group_has_no_rows() {
        let groups = RepeatingGroups::new();
        assert_eq!(groups.count("missing"), 0);
    }

    #[test]
    fn add_row_returns_new_index() {
        let mut groups = RepeatingGroups::new();
        assert_eq!(groups.add_row("g"), 0);
        assert_eq!(groups.add_row("g"), 1);
        assert_eq!(groups.count("g"), 2);
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let mut groups = RepeatingGroups::new();
        groups.set_count("g", 1);
        groups.decrement("g");
        groups.decrement("g");
        assert_eq!(groups.count("g"), 0);
    }
}
