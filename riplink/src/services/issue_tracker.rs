//! Mismatch notification lifecycle
//!
//! One open issue per record at most. A newly detected mismatch opens one;
//! a resolved mismatch closes it and stamps the rip time. The
//! recently-ripped gauge is derived from those stamps.

use crate::config::ReconcileRules;
use crate::error::{ErrorClass, ProcessResult};
use crate::models::{IssueHandle, ReconciliationState};
use crate::services::collaborators::Notifier;
use riplink_common::time::now_unix;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Service gauges reported by `/status`
#[derive(Debug, Default)]
pub struct Gauges {
    needs_rip: AtomicUsize,
    ripped_recently: AtomicUsize,
}

/// Point-in-time copy of [`Gauges`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GaugeSnapshot {
    pub needs_rip: usize,
    pub ripped_recently: usize,
}

impl Gauges {
    pub fn set_needs_rip(&self, value: usize) {
        self.needs_rip.store(value, Ordering::Relaxed);
    }

    pub fn set_ripped_recently(&self, value: usize) {
        self.ripped_recently.store(value, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GaugeSnapshot {
        GaugeSnapshot {
            needs_rip: self.needs_rip.load(Ordering::Relaxed),
            ripped_recently: self.ripped_recently.load(Ordering::Relaxed),
        }
    }
}

/// Records whose last rip falls inside the window
///
/// Records without a goal folder snapshot, or in an excluded goal folder,
/// are not counted.
pub fn count_recent_rips(state: &ReconciliationState, rules: &ReconcileRules, now: i64) -> usize {
    let window = rules.recent_rip_window_hours * 3600;
    state
        .last_rip
        .iter()
        .filter(|(id, ripped_at)| {
            state
                .goal_folders
                .get(*id)
                .is_some_and(|goal| !rules.gauge_excluded_goal_folders.contains(goal))
                && now - **ripped_at < window
        })
        .count()
}

/// What an observation changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueTransition {
    Opened(IssueHandle),
    Closed(IssueHandle),
    Unchanged,
}

pub struct IssueLifecycle {
    notifier: Arc<dyn Notifier>,
    rules: Arc<ReconcileRules>,
    gauges: Arc<Gauges>,
}

impl IssueLifecycle {
    pub fn new(notifier: Arc<dyn Notifier>, rules: Arc<ReconcileRules>, gauges: Arc<Gauges>) -> Self {
        Self {
            notifier,
            rules,
            gauges,
        }
    }

    /// A mismatch was seen; open an issue unless one is already tracked
    pub async fn observe_mismatch(
        &self,
        record_id: i32,
        detail: &str,
        state: &mut ReconciliationState,
    ) -> ProcessResult<IssueTransition> {
        if let Some(&handle) = state.issues.get(&record_id) {
            debug!(record_id, handle, "Mismatch already tracked");
            return Ok(IssueTransition::Unchanged);
        }

        let title = format!("CD rip needed for record {}", record_id);
        let handle = self.notifier.open(&title, detail).await?;
        state.issues.insert(record_id, handle);
        info!(record_id, handle, "Opened mismatch issue");
        Ok(IssueTransition::Opened(handle))
    }

    /// The record is consistent; close a tracked issue and stamp the rip time
    pub async fn observe_resolved(
        &self,
        record_id: i32,
        state: &mut ReconciliationState,
    ) -> ProcessResult<IssueTransition> {
        let Some(&handle) = state.issues.get(&record_id) else {
            return Ok(IssueTransition::Unchanged);
        };

        match self.notifier.close(handle).await {
            Ok(()) => {}
            Err(e) if e.class() == ErrorClass::NotFound => {
                debug!(record_id, handle, "Issue already gone");
            }
            Err(e) => return Err(e),
        }

        state.issues.remove(&record_id);
        state.last_rip.insert(record_id, now_unix());
        self.refresh_recent(state);
        info!(record_id, handle, "Closed mismatch issue");
        Ok(IssueTransition::Closed(handle))
    }

    /// Recompute the recently-ripped gauge from state
    pub fn refresh_recent(&self, state: &ReconciliationState) {
        self.gauges
            .set_ripped_recently(count_recent_rips(state, &self.rules, now_unix()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeNotifier {
        opened: Mutex<Vec<String>>,
        closed: Mutex<Vec<IssueHandle>>,
        close_not_found: bool,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn open(&self, title: &str, _body: &str) -> ProcessResult<IssueHandle> {
            let mut opened = self.opened.lock().unwrap();
            opened.push(title.to_string());
            Ok(100 + opened.len() as IssueHandle)
        }

        async fn close(&self, handle: IssueHandle) -> ProcessResult<()> {
            if self.close_not_found {
                return Err(ProcessError::RecordNotFound(handle as i32));
            }
            self.closed.lock().unwrap().push(handle);
            Ok(())
        }
    }

    fn lifecycle(notifier: Arc<FakeNotifier>) -> (IssueLifecycle, Arc<Gauges>) {
        let gauges = Arc::new(Gauges::default());
        let lifecycle = IssueLifecycle::new(notifier, Arc::new(ReconcileRules::default()), gauges.clone());
        (lifecycle, gauges)
    }

    #[tokio::test]
    async fn test_mismatch_opens_once() {
        let notifier = Arc::new(FakeNotifier::default());
        let (lifecycle, _) = lifecycle(notifier.clone());
        let mut state = ReconciliationState::default();

        let first = lifecycle.observe_mismatch(7, "found 1 of 2", &mut state).await.unwrap();
        assert_eq!(first, IssueTransition::Opened(101));
        let second = lifecycle.observe_mismatch(7, "found 1 of 2", &mut state).await.unwrap();
        assert_eq!(second, IssueTransition::Unchanged);

        assert_eq!(notifier.opened.lock().unwrap().len(), 1);
        assert_eq!(state.issues.get(&7), Some(&101));
    }

    #[tokio::test]
    async fn test_resolution_closes_and_stamps() {
        let notifier = Arc::new(FakeNotifier::default());
        let (lifecycle, gauges) = lifecycle(notifier.clone());
        let mut state = ReconciliationState::default();
        state.issues.insert(7, 55);
        state.goal_folders.insert(7, 1);

        let result = lifecycle.observe_resolved(7, &mut state).await.unwrap();
        assert_eq!(result, IssueTransition::Closed(55));
        assert!(state.issues.is_empty());
        assert!(state.last_rip.contains_key(&7));
        assert_eq!(gauges.snapshot().ripped_recently, 1);
        assert_eq!(*notifier.closed.lock().unwrap(), vec![55]);
    }

    #[tokio::test]
    async fn test_resolution_without_issue_is_noop() {
        let (lifecycle, _) = lifecycle(Arc::new(FakeNotifier::default()));
        let mut state = ReconciliationState::default();
        let result = lifecycle.observe_resolved(7, &mut state).await.unwrap();
        assert_eq!(result, IssueTransition::Unchanged);
        assert!(state.last_rip.is_empty());
    }

    #[tokio::test]
    async fn test_closing_missing_issue_is_success() {
        let notifier = Arc::new(FakeNotifier {
            close_not_found: true,
            ..Default::default()
        });
        let (lifecycle, _) = lifecycle(notifier);
        let mut state = ReconciliationState::default();
        state.issues.insert(7, 55);

        let result = lifecycle.observe_resolved(7, &mut state).await.unwrap();
        assert_eq!(result, IssueTransition::Closed(55));
        assert!(state.issues.is_empty());
    }

    #[test]
    fn test_recent_rip_count_respects_window_and_exclusions() {
        let rules = ReconcileRules::default();
        let now = 1_000_000;
        let mut state = ReconciliationState::default();
        state.last_rip.insert(1, now - 3600);
        state.goal_folders.insert(1, 10);
        // Excluded goal folder
        state.last_rip.insert(2, now - 3600);
        state.goal_folders.insert(2, 1782105);
        // Outside the window
        state.last_rip.insert(3, now - 19 * 3600);
        state.goal_folders.insert(3, 10);
        // No goal folder snapshot
        state.last_rip.insert(4, now - 60);

        assert_eq!(count_recent_rips(&state, &rules, now), 1);
    }
}
