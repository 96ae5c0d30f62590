//! Link pipeline
//!
//! For an eligible record, links every rippable track from the rip tree
//! into the MP3 and FLAC output trees and tags the links. Records that are
//! already linked are verified instead.
//!
//! Order of checks for [`LinkPipeline::make_links`]:
//! 1. Eligibility gate (silent skip)
//! 2. Throttle on the last build time
//! 3. Format match (silent skip)
//! 4. Escalation of one stale, already linked record per cycle
//! 5. Build links (forced or never linked) or verify

use crate::config::ReconcileRules;
use crate::error::{ProcessError, ProcessResult};
use crate::models::{BoxState, ReconciliationState, Record, Release};
use crate::services::collaborators::{Catalog, Command, CommandRunner, RipStore};
use crate::services::reconciler::{Reconciler, VerifyOutcome};
use crate::services::trackset_builder::{build_track_sets, TrackSet};
use riplink_common::config::PathsConfig;
use riplink_common::time::{now, now_unix, seconds_since};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
const COVER_FILE_NAME: &str = "cover.jpg";

/// Why a record was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Archived,
    InStorage,
    AwaitingDisposition,
    NotArrived,
    Unreleased,
    DigitalCopy,
    NotRippable,
}

/// What a link pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LinkOutcome {
    Skipped { reason: SkipReason },
    Linked { tracks: usize },
    Verified,
}

/// One-per-cycle allowance to turn a stale record into a forced rebuild
#[derive(Debug, Default)]
pub struct Escalation {
    spent: bool,
}

impl Escalation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the allowance if it is still available
    pub fn take(&mut self) -> bool {
        !std::mem::replace(&mut self.spent, true)
    }

    pub fn reset(&mut self) {
        self.spent = false;
    }
}

/// Source and destination paths for one TrackSet
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPlan {
    pub source_mp3: PathBuf,
    pub source_flac: PathBuf,
    pub link_mp3: PathBuf,
    pub link_flac: PathBuf,
    pub position: u32,
    pub disk: u32,
    pub title: String,
}

impl LinkPlan {
    pub fn new(paths: &PathsConfig, release: &Release, set: &TrackSet) -> Self {
        let rip_name = if release.format_quantity > 1 {
            format!("{}_{}", release.id, set.disk)
        } else {
            release.id.to_string()
        };
        let source_dir = Path::new(&paths.rip_dir).join(rip_name);
        let id = release.id.to_string();

        Self {
            source_mp3: source_dir.join(format!("track{:02}.cdda.mp3", set.position)),
            source_flac: source_dir.join(format!("track{:02}.cdda.flac", set.position)),
            link_mp3: Path::new(&paths.mp3_dir)
                .join(&id)
                .join(format!("track{}-{:02}.cdda.mp3", set.disk, set.position)),
            link_flac: Path::new(&paths.flac_dir)
                .join(&id)
                .join(format!("{}-{:02}.cdda.flac", set.disk, set.position)),
            position: set.position,
            disk: set.disk,
            title: set.title(),
        }
    }

    /// Link and tag commands, in execution order
    pub fn commands(&self, release: &Release, cover: Option<&Path>) -> Vec<Command> {
        let mp3 = self.link_mp3.display().to_string();
        let flac = self.link_flac.display().to_string();
        let artist = release.artist_credit();

        let mut batch = vec![
            Command::new("ln", ["-s".to_string(), self.source_mp3.display().to_string(), mp3.clone()]),
            Command::new("mp3info", ["-n".to_string(), self.position.to_string(), mp3.clone()]),
            Command::new("mp3info", ["-t".to_string(), self.title.clone(), mp3.clone()]),
            Command::new("mp3info", ["-l".to_string(), release.title.clone(), mp3.clone()]),
            Command::new("mp3info", ["-a".to_string(), artist.clone(), mp3.clone()]),
            Command::new(
                "eyeD3",
                [
                    format!("--set-text-frame=TPOS:{}/{}", self.disk, release.format_quantity),
                    mp3.clone(),
                ],
            ),
            Command::new("ln", ["-s".to_string(), self.source_flac.display().to_string(), flac.clone()]),
        ];

        for tag in [
            format!("artist={}", artist),
            format!("tracknumber={}", self.position),
            format!("discnumber={}", self.disk),
            format!("title={}", self.title),
            format!("album={}", release.title),
        ] {
            batch.push(Command::new("metaflac", [format!("--set-tag={}", tag), flac.clone()]));
        }

        if let Some(cover) = cover {
            let cover = cover.display().to_string();
            batch.push(Command::new(
                "eyeD3",
                [format!("--add-image={}:FRONT_COVER", cover), mp3],
            ));
            batch.push(Command::new(
                "metaflac",
                [format!("--import-picture-from={}", cover), flac],
            ));
        }

        batch
    }
}

pub struct LinkPipeline {
    catalog: Arc<dyn Catalog>,
    rips: Arc<dyn RipStore>,
    commands: Arc<dyn CommandRunner>,
    reconciler: Arc<Reconciler>,
    rules: Arc<ReconcileRules>,
    paths: PathsConfig,
}

impl LinkPipeline {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        rips: Arc<dyn RipStore>,
        commands: Arc<dyn CommandRunner>,
        reconciler: Arc<Reconciler>,
        rules: Arc<ReconcileRules>,
        paths: PathsConfig,
    ) -> Self {
        Self {
            catalog,
            rips,
            commands,
            reconciler,
            rules,
            paths,
        }
    }

    /// Eligibility gate; `Some` names the reason to skip
    pub fn gate(&self, record: &Record, force: bool) -> Option<SkipReason> {
        let meta = &record.metadata;
        let rules = &self.rules;

        if !force && rules.archived_categories.iter().any(|c| *c == meta.category) {
            return Some(SkipReason::Archived);
        }
        if meta.box_state == BoxState::InTheBox {
            return Some(SkipReason::InStorage);
        }
        if rules.limbo_folders.contains(&record.release.folder_id) && meta.move_folder.is_none() {
            return Some(SkipReason::AwaitingDisposition);
        }

        // Records predating arrival tracking have no added date and count as arrived
        let assumed = meta.date_added.map_or(true, |added| {
            seconds_since(added) > rules.assume_arrived_after_days * SECONDS_PER_DAY
        });
        if meta.date_arrived.is_none() && !assumed {
            return Some(SkipReason::NotArrived);
        }

        if let Some(released) = record.release.released {
            if released > now().date_naive() {
                return Some(SkipReason::Unreleased);
            }
        }

        None
    }

    /// Format match; `Some` names the reason to skip
    pub fn format_match(&self, record: &Record) -> Option<SkipReason> {
        let goal = record.metadata.goal_folder;
        if self.rules.skip_goal_folders.contains(&goal) {
            return Some(SkipReason::DigitalCopy);
        }
        if self.rules.always_match_goal_folders.contains(&goal) {
            return None;
        }
        let matched = record
            .release
            .formats
            .iter()
            .any(|f| self.rules.match_format_names.iter().any(|m| *m == f.name));
        (!matched).then_some(SkipReason::NotRippable)
    }

    /// Run the link pass for one record
    pub async fn make_links(
        &self,
        id: i32,
        force: bool,
        state: &mut ReconciliationState,
        escalation: &mut Escalation,
    ) -> ProcessResult<LinkOutcome> {
        let record = self.catalog.get_record(id).await?;

        if let Some(reason) = self.gate(&record, force) {
            debug!(record_id = id, reason = ?reason, "Record not eligible");
            return Ok(LinkOutcome::Skipped { reason });
        }

        if !force {
            if let Some(&last) = state.last_processed.get(&id) {
                if seconds_since(last) < self.rules.throttle_days * SECONDS_PER_DAY {
                    return Err(ProcessError::Throttled {
                        record_id: id,
                        elapsed_hours: seconds_since(last) / 3600,
                    });
                }
            }
        }

        if let Some(reason) = self.format_match(&record) {
            debug!(record_id = id, reason = ?reason, "Record format not processed");
            return Ok(LinkOutcome::Skipped { reason });
        }

        // Only a linked record is changed by escalating; unlinked ones are built anyway
        let mut force = force;
        if !force && !record.metadata.cd_path.is_empty() && escalation.take() {
            info!(record_id = id, "Escalating stale record to forced rebuild");
            force = true;
        }

        if force || record.metadata.cd_path.is_empty() {
            let tracks = self.build_links(&record, state).await?;
            return Ok(LinkOutcome::Linked { tracks });
        }

        self.verify_or_relink(&record, state).await
    }

    /// Verify a linked record; a persisting mismatch forces a rebuild and
    /// reports data loss
    pub async fn verify_or_relink(
        &self,
        record: &Record,
        state: &mut ReconciliationState,
    ) -> ProcessResult<LinkOutcome> {
        match self.reconciler.verify_record(record).await? {
            VerifyOutcome::Matched => Ok(LinkOutcome::Verified),
            VerifyOutcome::StillMismatched { found, expected } => {
                let record_id = record.release.instance_id;
                if let Err(e) = self.build_links(record, state).await {
                    warn!(record_id, error = %e, "Relink after mismatch failed");
                }
                Err(ProcessError::DataLoss {
                    record_id,
                    found,
                    expected,
                })
            }
        }
    }

    fn output_dirs(&self, release: &Release) -> (PathBuf, PathBuf) {
        let id = release.id.to_string();
        (
            Path::new(&self.paths.mp3_dir).join(&id),
            Path::new(&self.paths.flac_dir).join(&id),
        )
    }

    /// Build and tag links for every selected TrackSet
    pub async fn build_links(
        &self,
        record: &Record,
        state: &mut ReconciliationState,
    ) -> ProcessResult<usize> {
        let release = &record.release;
        let record_id = release.instance_id;
        let (mp3_out, flac_out) = self.output_dirs(release);
        let cd_path = mp3_out.display().to_string();
        let file_path = flac_out.display().to_string();

        // Record the output location first so a failed build is verified next time
        if record.metadata.cd_path.is_empty() {
            self.catalog.update_record(record_id, &cd_path, &file_path).await?;
        }

        self.rips.create_dir_all(&mp3_out)?;
        self.rips.create_dir_all(&flac_out)?;

        let tape = self.rules.is_tape(record.metadata.goal_folder);
        let sets = build_track_sets(release, tape, &self.rules)?;
        let any_rippable = sets.iter().any(|s| self.rules.is_rippable(&s.format));

        let plans: Vec<LinkPlan> = sets
            .iter()
            .filter(|s| !any_rippable || self.rules.is_rippable(&s.format))
            .map(|s| LinkPlan::new(&self.paths, release, s))
            .collect();

        if let Some(missing) = plans.iter().find(|p| !self.rips.exists(&p.source_mp3)) {
            warn!(record_id, path = %missing.source_mp3.display(), "Missing rip source");
            return Err(ProcessError::MissingTrack {
                path: missing.source_mp3.clone(),
            });
        }

        let cover = self.cover_source(release, &flac_out);
        let mut batch = Vec::new();
        if let Some((uri, path)) = &cover {
            batch.push(Command::new(
                "curl",
                ["-sfL".to_string(), "-o".to_string(), path.display().to_string(), uri.clone()],
            ));
        }
        let cover_path = cover.as_ref().map(|(_, path)| path.as_path());
        for plan in &plans {
            batch.extend(plan.commands(release, cover_path));
        }

        if let Err(e) = self.commands.dispatch(batch).await {
            warn!(record_id, error = %e, "Tagging commands were not accepted");
        }

        self.catalog.update_record(record_id, &cd_path, &file_path).await?;
        state.last_processed.insert(record_id, now_unix());
        state.goal_folders.insert(record_id, record.metadata.goal_folder);

        info!(record_id, tracks = plans.len(), "Built links");
        Ok(plans.len())
    }

    /// Primary image if tagged as such, else the first one
    fn cover_source(&self, release: &Release, flac_out: &Path) -> Option<(String, PathBuf)> {
        let image = release
            .images
            .iter()
            .find(|i| i.image_type == "primary")
            .or_else(|| release.images.first())?;
        Some((image.uri.clone(), flac_out.join(COVER_FILE_NAME)))
    }
}
