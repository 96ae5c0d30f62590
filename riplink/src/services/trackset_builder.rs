//! TrackSet construction
//!
//! A [`TrackSet`] is one physical output audio file. Building runs in four
//! steps over the flattened tracklist:
//!
//! 1. Classify each TRACK node and re-derive a monotonic disk counter from
//!    format and disk transitions.
//! 2. Emit one TrackSet per non-excluded node.
//! 3. Merge adjacent TrackSets until no merge rule applies.
//! 4. Renumber positions per disk, starting at 1.
//!
//! Cassettes skip all of this and always produce two sides.

use crate::config::ReconcileRules;
use crate::error::TrackSetError;
use crate::models::{Release, Track, TrackKind};
use crate::services::position_classifier::{classify, matching_rule, TAPE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

static DIGIT_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d[A-Z]").expect("valid regex"));
static ENDS_LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]$").expect("valid regex"));

/// One output audio file backed by one or more catalog tracks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSet {
    /// Backing tracks, contiguous in flattened order
    pub tracks: Vec<Track>,
    /// Re-derived disk index, not the catalog's printed disk number
    pub disk: u32,
    pub format: String,
    /// 1-based position within the disk
    pub position: u32,
}

impl TrackSet {
    /// Titles of the backing tracks joined with " / "
    pub fn title(&self) -> String {
        self.tracks
            .iter()
            .map(|t| t.title.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }

    pub fn disk_label(&self) -> String {
        self.disk.to_string()
    }

    fn first_position(&self) -> &str {
        self.tracks.first().map(|t| t.position.as_str()).unwrap_or_default()
    }

    fn last_position(&self) -> &str {
        self.tracks.last().map(|t| t.position.as_str()).unwrap_or_default()
    }
}

/// Which merge rule joined two TrackSets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Both positions start with a lowercase letter ("a", "b")
    LowercaseLead,
    /// Both are digit + capital with the same digit ("1A", "1B")
    DigitCapital,
    /// Same lead, sequential lowercase tails ("3a", "3b")
    SequentialSuffix,
    /// Same prefix before the first "." ("2.1", "2.2")
    DottedPrefix,
}

/// Pick the base format: last format that is not a wrapper label
pub fn base_format(release: &Release, rules: &ReconcileRules) -> String {
    let name = release
        .formats
        .iter()
        .rev()
        .map(|f| f.name.as_str())
        .find(|name| !rules.is_wrapper(name))
        .unwrap_or_default();

    if name == "CDr" {
        "CD".to_string()
    } else {
        name.to_string()
    }
}

/// Build the TrackSets for a release
pub fn build_track_sets(
    release: &Release,
    tape: bool,
    rules: &ReconcileRules,
) -> Result<Vec<TrackSet>, TrackSetError> {
    if tape {
        return Ok(tape_sides());
    }

    if release.formats.is_empty() {
        return Err(TrackSetError::NoFormats(release.id));
    }
    if release.tracklist.is_empty() {
        return Err(TrackSetError::EmptyTracklist(release.id));
    }

    let base = base_format(release, rules);
    let mut sets = emit(release, &base);
    merge_to_fixpoint(&mut sets);
    renumber(&mut sets);

    debug!(
        release_id = release.id,
        base_format = %base,
        track_sets = sets.len(),
        "Built track sets"
    );
    Ok(sets)
}

fn tape_sides() -> Vec<TrackSet> {
    ["Side A", "Side B"]
        .iter()
        .zip(1..)
        .map(|(title, position)| TrackSet {
            tracks: vec![Track::new("", title)],
            disk: 1,
            format: TAPE.to_string(),
            position,
        })
        .collect()
}

/// Running disk bookkeeping for the walk
struct DiskWalk {
    format: Option<String>,
    raw_disk: Option<i32>,
    disk: u32,
}

impl DiskWalk {
    fn observe(&mut self, format: &str, raw_disk: Option<i32>) {
        if self.format.as_deref() != Some(format) {
            self.format = Some(format.to_string());
            self.raw_disk = raw_disk;
            self.disk += 1;
        } else if self.raw_disk != raw_disk {
            self.raw_disk = raw_disk;
            self.disk += 1;
        }
    }
}

fn emit(release: &Release, base: &str) -> Vec<TrackSet> {
    let mut walk = DiskWalk {
        format: None,
        raw_disk: None,
        disk: 0,
    };
    let mut sets = Vec::new();
    let mut counter = 1;

    for track in release.flatten() {
        if track.kind != TrackKind::Track {
            continue;
        }

        let class = classify(&track.position);
        let format = class.format.unwrap_or(base);
        walk.observe(format, class.disk);

        if !class.emit {
            debug!(
                position = %track.position,
                rule = matching_rule(&track.position).unwrap_or("none"),
                "Position excluded"
            );
            continue;
        }

        sets.push(TrackSet {
            tracks: vec![track.clone()],
            disk: walk.disk,
            format: format.to_string(),
            position: counter,
        });
        counter += 1;
    }

    sets
}

/// Find the merge rule, if any, that joins `first` and `second`
pub fn merge_rule(first: &TrackSet, second: &TrackSet) -> Option<MergeRule> {
    let p1 = first.first_position();
    let p2 = second.first_position();
    let lead1 = p1.chars().next();
    let lead2 = p2.chars().next();

    let lowercase = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase());
    if lowercase(lead1) && lowercase(lead2) {
        return Some(MergeRule::LowercaseLead);
    }

    if DIGIT_UPPER.is_match(p1) && DIGIT_UPPER.is_match(p2) && lead1 == lead2 {
        return Some(MergeRule::DigitCapital);
    }

    if p1.len() > 1
        && p2.len() > 1
        && ENDS_LOWER.is_match(p1)
        && ENDS_LOWER.is_match(p2)
        && lead1 == lead2
    {
        let tail1 = first.last_position().chars().last();
        let tail2 = second.last_position().chars().last();
        if let (Some(a), Some(b)) = (tail1, tail2) {
            if (a as u32) + 1 == b as u32 {
                return Some(MergeRule::SequentialSuffix);
            }
        }
    }

    let dot1 = p1.split('.').next().unwrap_or_default();
    let dot2 = p2.split('.').next().unwrap_or_default();
    if dot1 == dot2 && dash_within_dot(p1) && dash_within_dot(p2) {
        return Some(MergeRule::DottedPrefix);
    }

    None
}

/// A dashed position may only share a dot prefix if its dash segment is shorter
fn dash_within_dot(position: &str) -> bool {
    if !position.contains('-') {
        return true;
    }
    let dash = position.split('-').next().unwrap_or_default();
    let dot = position.split('.').next().unwrap_or_default();
    dash.len() < dot.len()
}

/// Merge adjacent sets one pair at a time, rescanning from the start
fn merge_to_fixpoint(sets: &mut Vec<TrackSet>) {
    while let Some(index) = first_mergeable(sets) {
        let next = sets.remove(index + 1);
        sets[index].tracks.extend(next.tracks);
    }
}

fn first_mergeable(sets: &[TrackSet]) -> Option<usize> {
    sets.windows(2)
        .position(|pair| merge_rule(&pair[0], &pair[1]).is_some())
}

fn renumber(sets: &mut [TrackSet]) {
    let mut current_disk = None;
    let mut position = 0;
    for set in sets.iter_mut() {
        if current_disk != Some(set.disk) {
            current_disk = Some(set.disk);
            position = 0;
        }
        position += 1;
        set.position = position;
    }
}
