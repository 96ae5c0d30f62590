//! Persisted reconciliation state
//!
//! Loaded at the start of each mutation, saved as a whole at the end.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Handle of an external tracking notification
pub type IssueHandle = i64;

/// Per-record state keyed by record (instance) id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReconciliationState {
    /// Unix seconds of the last link build
    pub last_processed: BTreeMap<i32, i64>,
    /// Open mismatch notifications
    pub issues: BTreeMap<i32, IssueHandle>,
    /// Unix seconds of the last mismatch resolution
    pub last_rip: BTreeMap<i32, i64>,
    /// Goal folder seen when the record was last processed
    pub goal_folders: BTreeMap<i32, i32>,
    /// Records still waiting on a usable rip
    pub pending: Vec<i32>,
}

impl ReconciliationState {
    /// Add a record to the pending list, keeping it duplicate-free
    pub fn mark_pending(&mut self, id: i32) -> bool {
        if self.pending.contains(&id) {
            return false;
        }
        self.pending.push(id);
        true
    }

    pub fn clear_pending(&mut self, id: i32) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| *p != id);
        before != self.pending.len()
    }

    /// Pending ids in ascending order
    pub fn sorted_pending(&self) -> Vec<i32> {
        let mut ids = self.pending.clone();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_pending_is_duplicate_free() {
        let mut state = ReconciliationState::default();
        assert!(state.mark_pending(5));
        assert!(!state.mark_pending(5));
        assert_eq!(state.pending, vec![5]);
    }

    #[test]
    fn test_clear_pending_reports_removal() {
        let mut state = ReconciliationState::default();
        state.mark_pending(9);
        state.mark_pending(3);
        assert!(state.clear_pending(9));
        assert!(!state.clear_pending(9));
        assert_eq!(state.sorted_pending(), vec![3]);
    }
}
