//! Reconciliation engine
//!
//! Compares what the catalog says a record should have (its rippable
//! TrackSets) against what is linked on disk, and when they disagree tries
//! to close the gap: rescan rips, queue at most one MP3 and one FLAC
//! encode, wait for the filesystem to settle, then count again.

use crate::config::ReconcileRules;
use crate::error::{ProcessError, ProcessResult};
use crate::models::{Record, RipEntry};
use crate::services::collaborators::{ConversionJob, ConversionJobs, Encoding, RipStore};
use crate::services::rip_scanner::build_config;
use crate::services::trackset_builder::build_track_sets;
use riplink_common::config::PathsConfig;
use riplink_common::time::millis_to_duration;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Result of checking one record's linked files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Matched,
    /// Counts still differ after the rebuild attempt
    StillMismatched { found: usize, expected: usize },
}

pub struct Reconciler {
    rips: Arc<dyn RipStore>,
    jobs: Arc<dyn ConversionJobs>,
    rules: Arc<ReconcileRules>,
    paths: PathsConfig,
    scan: RwLock<Vec<RipEntry>>,
}

impl Reconciler {
    pub fn new(
        rips: Arc<dyn RipStore>,
        jobs: Arc<dyn ConversionJobs>,
        rules: Arc<ReconcileRules>,
        paths: PathsConfig,
    ) -> Self {
        Self {
            rips,
            jobs,
            rules,
            paths,
            scan: RwLock::new(Vec::new()),
        }
    }

    /// Rebuild the rip scan; on failure the previous scan is kept
    pub async fn rescan(&self) -> ProcessResult<usize> {
        let entries = build_config(self.rips.as_ref(), &self.paths.recovery_dir_name)?;
        let count = entries.len();
        *self.scan.write().await = entries;
        Ok(count)
    }

    /// Snapshot of the current rip scan
    pub async fn ripped(&self) -> Vec<RipEntry> {
        self.scan.read().await.clone()
    }

    /// Number of files a fully linked record should have
    ///
    /// Counts rippable TrackSets; a release with none (vinyl only, say)
    /// expects one file per TrackSet.
    pub fn expected_tracks(&self, record: &Record) -> ProcessResult<usize> {
        let tape = self.rules.is_tape(record.metadata.goal_folder);
        let sets = build_track_sets(&record.release, tape, &self.rules)?;
        let rippable = sets.iter().filter(|s| self.rules.is_rippable(&s.format)).count();
        Ok(if rippable == 0 { sets.len() } else { rippable })
    }

    /// Queue an MP3 encode for the first wav lacking one
    ///
    /// Returns whether a job was queued. A release with no rip tracks at all is
    /// an error.
    pub async fn convert_to_mp3(&self, release_id: i32) -> ProcessResult<bool> {
        self.convert(release_id, Encoding::Mp3).await?
            .ok_or(ProcessError::RipNotFound(release_id))
    }

    /// Queue a FLAC encode for the first wav lacking one
    ///
    /// A release with no rip is only logged.
    pub async fn convert_to_flac(&self, release_id: i32) -> ProcessResult<bool> {
        match self.convert(release_id, Encoding::Flac).await? {
            Some(queued) => Ok(queued),
            None => {
                info!(release_id, "No rip found for flac conversion");
                Ok(false)
            }
        }
    }

    /// `None` when no rip track exists for the release; an empty rip
    /// directory counts as no rip
    async fn convert(&self, release_id: i32, encoding: Encoding) -> ProcessResult<Option<bool>> {
        let job = {
            let scan = self.scan.read().await;
            let mut tracks = scan
                .iter()
                .filter(|r| r.id == release_id)
                .flat_map(|r| r.tracks.iter())
                .peekable();
            if tracks.peek().is_none() {
                return Ok(None);
            }

            tracks
                .find(|t| match encoding {
                    Encoding::Mp3 => t.needs_mp3(),
                    Encoding::Flac => t.needs_flac(),
                })
                .and_then(|t| t.wav_path.as_deref())
                .map(|wav| self.job_for(wav, encoding))
        };

        let Some(job) = job else {
            return Ok(Some(false));
        };

        info!(release_id, source = %job.source.display(), encoding = encoding.extension(), "Queueing conversion");
        self.jobs.enqueue(job).await?;
        if let Err(e) = self.rescan().await {
            warn!(release_id, error = %e, "Rescan after conversion failed");
        }
        Ok(Some(true))
    }

    fn job_for(&self, wav_path: &str, encoding: Encoding) -> ConversionJob {
        let source = Path::new(&self.paths.rip_dir).join(wav_path);
        let target = source.with_extension(encoding.extension());
        ConversionJob {
            encoding,
            source,
            target,
        }
    }

    fn count_linked(&self, cd_path: &str) -> Option<usize> {
        if cd_path.is_empty() {
            return None;
        }
        match self.rips.count_entries(&PathBuf::from(cd_path)) {
            Ok(count) => Some(count),
            Err(e) => {
                debug!(cd_path, error = %e, "Unable to read linked directory");
                None
            }
        }
    }

    /// Check the linked file count and try to repair a mismatch
    pub async fn verify_record(&self, record: &Record) -> ProcessResult<VerifyOutcome> {
        let instance_id = record.release.instance_id;
        let release_id = record.release.id;
        let cd_path = record.metadata.cd_path.as_str();

        if cd_path.is_empty() {
            warn!(record_id = instance_id, release_id, "Record has no linked MP3 path");
        }

        let expected = self.expected_tracks(record)?;
        let found = self.count_linked(cd_path);
        info!(record_id = instance_id, found = ?found, expected, "Verifying linked tracks");

        if found == Some(expected) {
            return Ok(VerifyOutcome::Matched);
        }

        match self.rescan().await {
            Ok(rips) => debug!(rips, "Rescanned rips"),
            Err(e) => warn!(error = %e, "Bad rip scan"),
        }
        if let Err(e) = self.convert_to_mp3(release_id).await {
            warn!(record_id = instance_id, error = %e, "MP3 conversion failed");
        }
        if let Err(e) = self.convert_to_flac(release_id).await {
            warn!(record_id = instance_id, error = %e, "FLAC conversion failed");
        }

        tokio::time::sleep(millis_to_duration(self.rules.settle_delay_ms)).await;

        match self.count_linked(cd_path) {
            Some(found) if found == expected => Ok(VerifyOutcome::Matched),
            found => Ok(VerifyOutcome::StillMismatched {
                found: found.unwrap_or(0),
                expected,
            }),
        }
    }
}
