//! Catalog release and record models
//!
//! These mirror what the catalog service returns. The service never writes
//! them back except through [`crate::services::Catalog::update_record`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of a tracklist node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    #[default]
    Track,
    Heading,
    Index,
}

/// One tracklist node as printed by the catalog
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Track {
    /// Free-form position token ("A1", "CD2-3", "1-4", "7\"1-A", ...)
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub kind: TrackKind,
    /// Nested entries, e.g. the movements of an index track
    #[serde(default)]
    pub sub_tracks: Vec<Track>,
}

impl Track {
    /// Convenience constructor for a plain track node
    pub fn new(position: &str, title: &str) -> Self {
        Self {
            position: position.to_string(),
            title: title.to_string(),
            kind: TrackKind::Track,
            sub_tracks: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: TrackKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_sub_tracks(mut self, sub_tracks: Vec<Track>) -> Self {
        self.sub_tracks = sub_tracks;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: i64,
    pub name: String,
}

/// A format entry ("CD", "Vinyl", "Box Set", ...)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Format {
    pub name: String,
    #[serde(default)]
    pub qty: Option<String>,
}

impl Format {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            qty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Image {
    pub uri: String,
    #[serde(default)]
    pub image_type: String,
}

/// Release metadata from the catalog
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Release {
    /// Catalog release id; rip directories are named after it
    pub id: i32,
    /// Collection instance id; records are keyed by it
    pub instance_id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub formats: Vec<Format>,
    /// Number of physical items (disks) in the release
    #[serde(default)]
    pub format_quantity: u32,
    #[serde(default)]
    pub tracklist: Vec<Track>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub folder_id: i32,
    #[serde(default)]
    pub released: Option<NaiveDate>,
}

impl Release {
    /// Depth-first flattening: each node is followed by its sub-tracks
    pub fn flatten(&self) -> Vec<&Track> {
        let mut tracks = Vec::new();
        flatten_into(&self.tracklist, &mut tracks);
        tracks
    }

    /// Artist credit as written into tags ("A, B, C")
    pub fn artist_credit(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn flatten_into<'a>(tracklist: &'a [Track], out: &mut Vec<&'a Track>) {
    for track in tracklist {
        out.push(track);
        flatten_into(&track.sub_tracks, out);
    }
}

/// Whether the physical item is currently out of its storage box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxState {
    #[default]
    Unknown,
    OutOfBox,
    InTheBox,
}

/// Collection-side metadata attached to a release
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Directory holding the linked MP3s; empty until links are first built
    #[serde(default)]
    pub cd_path: String,
    /// Directory holding the linked FLACs
    #[serde(default)]
    pub file_path: String,
    /// Folder the record will move to once processing completes
    #[serde(default)]
    pub goal_folder: i32,
    /// Collection category name (e.g. "LISTED_TO_SELL", "SOLD_ARCHIVE")
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub box_state: BoxState,
    /// Pending folder move, if any
    #[serde(default)]
    pub move_folder: Option<i32>,
    /// Unix seconds
    #[serde(default)]
    pub date_added: Option<i64>,
    /// Unix seconds; `None` until the record physically arrives
    #[serde(default)]
    pub date_arrived: Option<i64>,
}

/// A collection record: release plus collection metadata
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    pub release: Release,
    #[serde(default)]
    pub metadata: RecordMetadata,
}
