//! Processor facade
//!
//! Owns the collaborators and the reconciliation components, and serializes
//! every state-mutating entry point behind one async mutex so scheduled
//! cycles and externally requested rebuilds never interleave.

use crate::config::ReconcileRules;
use crate::db::StateStore;
use crate::error::{ErrorClass, ProcessResult};
use crate::models::{IssueHandle, ReconciliationState, Record, RipEntry};
use crate::services::{
    Catalog, CommandRunner, ConversionJobs, Escalation, GaugeSnapshot, Gauges, IssueLifecycle,
    LinkOutcome, LinkPipeline, Notifier, Reconciler, RipStore,
};
use riplink_common::config::PathsConfig;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Everything the processor talks to
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn Catalog>,
    pub rips: Arc<dyn RipStore>,
    pub commands: Arc<dyn CommandRunner>,
    pub jobs: Arc<dyn ConversionJobs>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn StateStore>,
}

/// How one record's pass ended, for cycle accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Linked,
    Verified,
    Skipped,
    Throttled,
    Gone,
    Mismatched,
    Failed,
}

/// Summary of one reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub candidates: usize,
    pub linked: usize,
    pub verified: usize,
    pub skipped: usize,
    pub throttled: usize,
    pub mismatched: usize,
    pub failed: usize,
    /// Pending records after the cycle
    pub pending: usize,
}

impl CycleReport {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Linked => self.linked += 1,
            Disposition::Verified => self.verified += 1,
            Disposition::Skipped | Disposition::Gone => self.skipped += 1,
            Disposition::Throttled => self.throttled += 1,
            Disposition::Mismatched => self.mismatched += 1,
            Disposition::Failed => self.failed += 1,
        }
    }
}

pub struct Processor {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn StateStore>,
    reconciler: Arc<Reconciler>,
    pipeline: LinkPipeline,
    issues: IssueLifecycle,
    gauges: Arc<Gauges>,
    rules: Arc<ReconcileRules>,
    /// Serializes mutations; guards the per-cycle escalation allowance
    work: Mutex<Escalation>,
    last_cycle: RwLock<Option<CycleReport>>,
}

impl Processor {
    pub fn new(collaborators: Collaborators, rules: ReconcileRules, paths: PathsConfig) -> Self {
        let rules = Arc::new(rules);
        let gauges = Arc::new(Gauges::default());
        let reconciler = Arc::new(Reconciler::new(
            collaborators.rips.clone(),
            collaborators.jobs.clone(),
            rules.clone(),
            paths.clone(),
        ));
        let pipeline = LinkPipeline::new(
            collaborators.catalog.clone(),
            collaborators.rips.clone(),
            collaborators.commands.clone(),
            reconciler.clone(),
            rules.clone(),
            paths,
        );
        let issues = IssueLifecycle::new(collaborators.notifier.clone(), rules.clone(), gauges.clone());

        Self {
            catalog: collaborators.catalog,
            store: collaborators.store,
            reconciler,
            pipeline,
            issues,
            gauges,
            rules,
            work: Mutex::new(Escalation::new()),
            last_cycle: RwLock::new(None),
        }
    }

    pub fn gauges(&self) -> GaugeSnapshot {
        self.gauges.snapshot()
    }

    /// Report of the most recent completed cycle
    pub async fn last_cycle(&self) -> Option<CycleReport> {
        self.last_cycle.read().await.clone()
    }

    /// Load state and seed the gauges from it
    pub async fn initialize(&self) -> ProcessResult<()> {
        let state = self.store.load().await?;
        self.gauges.set_needs_rip(state.pending.len());
        self.issues.refresh_recent(&state);
        match self.reconciler.rescan().await {
            Ok(rips) => info!(rips, "Initial rip scan complete"),
            Err(e) => warn!(error = %e, "Initial rip scan failed"),
        }
        Ok(())
    }

    /// Rebuild links for a record regardless of throttling or stored paths
    pub async fn force_relink(&self, id: i32) -> ProcessResult<LinkOutcome> {
        let mut work = self.work.lock().await;
        let mut state = self.store.load().await?;
        info!(record_id = id, "Forced relink requested");

        let result = self.pipeline.make_links(id, true, &mut state, &mut work).await;
        self.settle(id, &result, &mut state).await;
        self.persist(&state).await?;
        result
    }

    /// Non-forced link pass after the catalog reports a change
    ///
    /// The record leaves the pending list on success and joins it on
    /// failure. The pass result is returned unchanged.
    pub async fn client_update(&self, id: i32) -> ProcessResult<LinkOutcome> {
        let mut work = self.work.lock().await;
        let mut state = self.store.load().await?;

        let result = self.pipeline.make_links(id, false, &mut state, &mut work).await;
        self.settle(id, &result, &mut state).await;
        self.persist(&state).await?;
        result
    }

    /// Verify one record, relinking on a persisting mismatch
    pub async fn verify(&self, id: i32) -> ProcessResult<LinkOutcome> {
        let _work = self.work.lock().await;
        let mut state = self.store.load().await?;

        let record = self.catalog.get_record(id).await?;
        let result = self.pipeline.verify_or_relink(&record, &mut state).await;
        self.settle(id, &result, &mut state).await;
        self.persist(&state).await?;
        result
    }

    /// Current rip scan
    pub async fn get_ripped(&self) -> Vec<RipEntry> {
        self.reconciler.ripped().await
    }

    /// Record for the lowest pending id, if any
    pub async fn get_missing(&self) -> ProcessResult<Option<Record>> {
        let state = self.store.load().await?;
        match state.sorted_pending().first() {
            Some(&id) => Ok(Some(self.catalog.get_record(id).await?)),
            None => Ok(None),
        }
    }

    /// Handles of every open mismatch issue
    pub async fn get_outstanding(&self) -> ProcessResult<Vec<IssueHandle>> {
        let state = self.store.load().await?;
        Ok(state.issues.values().copied().collect())
    }

    /// One reconciliation cycle over pending and watched records
    pub async fn run_cycle(&self) -> ProcessResult<CycleReport> {
        let mut work = self.work.lock().await;
        work.reset();

        match self.reconciler.rescan().await {
            Ok(rips) => debug!(rips, "Rescanned rips"),
            Err(e) => warn!(error = %e, "Rip scan failed; using previous scan"),
        }

        let mut state = self.store.load().await?;
        let mut candidates: BTreeSet<i32> = state.pending.iter().copied().collect();
        for &folder in &self.rules.watch_folders {
            match self.catalog.query_by_folder(folder).await {
                Ok(records) => candidates.extend(records.iter().map(|r| r.release.instance_id)),
                Err(e) => warn!(folder, error = %e, "Folder query failed"),
            }
        }

        let mut report = CycleReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        for id in candidates {
            let result = self.pipeline.make_links(id, false, &mut state, &mut work).await;
            report.record(self.settle(id, &result, &mut state).await);
        }

        self.issues.refresh_recent(&state);
        self.persist(&state).await?;
        report.pending = state.pending.len();

        info!(
            candidates = report.candidates,
            linked = report.linked,
            verified = report.verified,
            mismatched = report.mismatched,
            failed = report.failed,
            pending = report.pending,
            "Reconciliation cycle complete"
        );
        *self.last_cycle.write().await = Some(report.clone());
        Ok(report)
    }

    /// Apply a pass result to pending ids and issue state
    async fn settle(
        &self,
        id: i32,
        result: &ProcessResult<LinkOutcome>,
        state: &mut ReconciliationState,
    ) -> Disposition {
        let disposition = match result {
            Ok(LinkOutcome::Skipped { .. }) => Disposition::Skipped,
            Ok(LinkOutcome::Linked { .. }) => Disposition::Linked,
            Ok(LinkOutcome::Verified) => Disposition::Verified,
            Err(e) if e.is_benign() => {
                debug!(record_id = id, error = %e, "Nothing to do");
                if e.class() == ErrorClass::OutOfRange {
                    Disposition::Gone
                } else {
                    Disposition::Throttled
                }
            }
            Err(e) => match e.class() {
                ErrorClass::DataLoss => Disposition::Mismatched,
                ErrorClass::NotFound | ErrorClass::InvalidArgument => {
                    warn!(record_id = id, error = %e, "Record unavailable");
                    Disposition::Failed
                }
                _ => {
                    warn!(record_id = id, error = %e, "Link pass failed");
                    Disposition::Failed
                }
            },
        };

        match disposition {
            Disposition::Linked | Disposition::Verified => {
                state.clear_pending(id);
                if let Err(e) = self.issues.observe_resolved(id, state).await {
                    warn!(record_id = id, error = %e, "Unable to close issue");
                }
            }
            Disposition::Skipped | Disposition::Gone => {
                state.clear_pending(id);
            }
            Disposition::Mismatched => {
                state.mark_pending(id);
                let detail = result.as_ref().err().map(|e| e.to_string()).unwrap_or_default();
                if let Err(e) = self.issues.observe_mismatch(id, &detail, state).await {
                    warn!(record_id = id, error = %e, "Unable to open issue");
                }
            }
            Disposition::Failed => {
                state.mark_pending(id);
            }
            Disposition::Throttled => {}
        }

        disposition
    }

    async fn persist(&self, state: &ReconciliationState) -> ProcessResult<()> {
        self.store.save(state).await?;
        self.gauges.set_needs_rip(state.pending.len());
        Ok(())
    }
}
