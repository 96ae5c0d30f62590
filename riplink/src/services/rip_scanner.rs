//! Rip directory scanning
//!
//! Rebuilds the full list of [`RipEntry`] values from the rip root on every
//! call. Nothing is diffed against an earlier scan.

use crate::error::{ProcessError, ProcessResult};
use crate::models::{RipEntry, RipTrack};
use crate::services::collaborators::RipStore;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static TRACK_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^track(\d{2})").expect("valid regex"));

/// Parse `<id>` or `<id>_<disk>` into (release id, disk)
pub fn parse_rip_dir_name(name: &str) -> ProcessResult<(i32, Option<u32>)> {
    let bad = |reason: String| ProcessError::BadRipName {
        name: name.to_string(),
        reason,
    };

    match name.split_once('_') {
        Some((id, disk)) => {
            let id = id.parse::<i32>().map_err(|e| bad(format!("id: {}", e)))?;
            let disk = disk.parse::<u32>().map_err(|e| bad(format!("disk: {}", e)))?;
            Ok((id, Some(disk)))
        }
        None => {
            let id = name.parse::<i32>().map_err(|e| bad(format!("id: {}", e)))?;
            Ok((id, None))
        }
    }
}

/// Scan every rip directory under the store root
///
/// The directory named `recovery_dir_name` is skipped. A directory whose
/// name does not convert aborts the scan.
pub fn build_config(store: &dyn RipStore, recovery_dir_name: &str) -> ProcessResult<Vec<RipEntry>> {
    let mut entries = Vec::new();

    for dir in store.list_rip_dirs()? {
        if dir == recovery_dir_name {
            continue;
        }

        let (id, disk) = store.convert(&dir).inspect_err(|e| {
            warn!(dir = %dir, error = %e, "Unable to convert rip directory name");
        })?;

        let files = store.list_files(&dir)?;
        let tracks = bucket_tracks(&dir, disk, &files);
        if tracks.is_empty() {
            warn!(release_id = id, disk = ?disk, "Rip directory has no track files");
        }

        entries.push(RipEntry {
            id,
            disk,
            path: dir,
            tracks,
        });
    }

    debug!(rips = entries.len(), "Rebuilt rip scan");
    Ok(entries)
}

/// Group track files by their two-digit track number
fn bucket_tracks(dir: &str, disk: Option<u32>, files: &[String]) -> Vec<RipTrack> {
    let mut tracks: Vec<RipTrack> = Vec::new();

    for file in files {
        let Some(number) = TRACK_FILE
            .captures(file)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };

        let index = match tracks.iter().position(|t| t.track_number == number) {
            Some(index) => index,
            None => {
                tracks.push(RipTrack {
                    track_number: number,
                    disk,
                    ..Default::default()
                });
                tracks.len() - 1
            }
        };

        let relative = format!("{}/{}", dir, file);
        let track = &mut tracks[index];
        if file.ends_with("wav") {
            track.wav_path = Some(relative);
        } else if file.ends_with("mp3") {
            track.mp3_path = Some(relative);
        } else if file.ends_with("flac") {
            track.flac_path = Some(relative);
        }
    }

    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::local_rip_store::LocalRipStore;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_rip_dir_name() {
        assert_eq!(parse_rip_dir_name("12345").unwrap(), (12345, None));
        assert_eq!(parse_rip_dir_name("12345_2").unwrap(), (12345, Some(2)));
        assert!(matches!(
            parse_rip_dir_name("abc"),
            Err(ProcessError::BadRipName { .. })
        ));
        assert!(parse_rip_dir_name("12_x").is_err());
    }

    #[test]
    fn test_wav_and_mp3_tracks_are_bucketed() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("12345");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("track01.cdda.wav"), b"").unwrap();
        fs::write(dir.join("track02.cdda.mp3"), b"").unwrap();

        let store = LocalRipStore::new(temp.path());
        let rips = build_config(&store, "lost+found").unwrap();

        assert_eq!(rips.len(), 1);
        assert_eq!(rips[0].id, 12345);
        assert_eq!(rips[0].tracks.len(), 2);

        let one = rips[0].tracks.iter().find(|t| t.track_number == 1).unwrap();
        assert_eq!(one.wav_path.as_deref(), Some("12345/track01.cdda.wav"));
        assert!(one.mp3_path.is_none());

        let two = rips[0].tracks.iter().find(|t| t.track_number == 2).unwrap();
        assert_eq!(two.mp3_path.as_deref(), Some("12345/track02.cdda.mp3"));
        assert!(two.wav_path.is_none());
    }

    #[test]
    fn test_recovery_dir_skipped_and_disk_carried() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("lost+found")).unwrap();
        let dir = temp.path().join("77_2");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("track03.cdda.flac"), b"").unwrap();
        fs::write(dir.join("track03.cdda.wav"), b"").unwrap();
        fs::write(dir.join("cover.jpg"), b"").unwrap();

        let store = LocalRipStore::new(temp.path());
        let rips = build_config(&store, "lost+found").unwrap();

        assert_eq!(rips.len(), 1);
        assert_eq!(rips[0].disk, Some(2));
        assert_eq!(rips[0].tracks.len(), 1);
        let track = &rips[0].tracks[0];
        assert_eq!(track.disk, Some(2));
        assert!(track.flac_path.is_some() && track.wav_path.is_some());
    }

    #[test]
    fn test_bad_dir_name_aborts_scan() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("not-a-release")).unwrap();

        let store = LocalRipStore::new(temp.path());
        assert!(matches!(
            build_config(&store, "lost+found"),
            Err(ProcessError::BadRipName { .. })
        ));
    }
}
