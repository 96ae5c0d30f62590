//! On-disk rip scan results

use serde::{Deserialize, Serialize};

/// Files present for one track number inside a rip directory
///
/// Paths are relative to the rip root (`<dir>/<file>`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RipTrack {
    pub track_number: u32,
    pub disk: Option<u32>,
    pub wav_path: Option<String>,
    pub mp3_path: Option<String>,
    pub flac_path: Option<String>,
}

impl RipTrack {
    /// Wav present but the given encoding missing
    pub fn needs_mp3(&self) -> bool {
        self.wav_path.is_some() && self.mp3_path.is_none()
    }

    pub fn needs_flac(&self) -> bool {
        self.wav_path.is_some() && self.flac_path.is_none()
    }
}

/// One top-level rip directory (`<id>` or `<id>_<disk>`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RipEntry {
    /// Catalog release id
    pub id: i32,
    pub disk: Option<u32>,
    /// Directory name relative to the rip root
    pub path: String,
    /// Ordered by first appearance in the directory listing
    pub tracks: Vec<RipTrack>,
}
