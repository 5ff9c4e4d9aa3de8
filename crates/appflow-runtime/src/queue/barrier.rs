//! Wait-for-all barrier over named completion events.

use std::collections::BTreeSet;

/// Tracks which required events have been observed since the barrier was
/// entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionBarrier<T: Ord> {
    required: BTreeSet<T>,
    observed: BTreeSet<T>,
}

impl<T: Ord + Clone> CompletionBarrier<T> {
    /// Enter the barrier, forgetting anything observed before.
    pub fn enter(required: impl IntoIterator<Item = T>) -> Self {
        Self {
            required: required.into_iter().collect(),
            observed: BTreeSet::new(),
        }
    }

    /// Record an event. Returns true when this completed the barrier.
    ///
    /// Events that are not required, or already observed, change nothing.
    pub fn observe(&mut self, event: T) -> bool {
        let was_complete = self.is_complete();
        if self.required.contains(&event) {
            self.observed.insert(event);
        }
        !was_complete && self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.required.is_subset(&self.observed)
    }

    /// Required events not yet observed.
    pub fn missing(&self) -> Vec<T> {
        self.required.difference(&self.observed).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completes_once_after_all_events() {
        let mut barrier = CompletionBarrier::enter(["a", "b", "c"]);
        assert!(!barrier.observe("b"));
        assert!(!barrier.observe("b"));
        assert!(!barrier.observe("x"));
        assert!(!barrier.observe("a"));
        assert_eq!(barrier.missing(), vec!["c"]);
        assert!(barrier.observe("c"));
        assert!(!barrier.observe("c"));
        assert!(barrier.is_complete());
    }

    #[test]
    fn test_enter_resets() {
        let mut barrier = CompletionBarrier::enter([1, 2]);
        barrier.observe(1);
        barrier.observe(2);
        barrier = CompletionBarrier::enter([1, 2]);
        assert!(!barrier.is_complete());
    }
}
