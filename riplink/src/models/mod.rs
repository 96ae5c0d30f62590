//! Data models for riplink
//!
//! - Catalog releases and records (read-only input)
//! - Rip directory scan results (rebuilt every cycle)
//! - Persisted reconciliation state

pub mod release;
pub mod rip;
pub mod state;

pub use release::{Artist, BoxState, Format, Image, Record, RecordMetadata, Release, Track, TrackKind};
pub use rip::{RipEntry, RipTrack};
pub use state::{IssueHandle, ReconciliationState};
