//! Collaborator seams
//!
//! Everything the reconciliation core talks to lives behind one of these
//! traits: the catalog, the rip filesystem, external command execution,
//! the conversion job queue and the notification tracker. Production
//! implementations live in sibling modules; tests use in-memory fakes.

use crate::error::{ProcessError, ProcessResult};
use crate::models::{IssueHandle, Record};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Catalog service holding records and their collection metadata
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_record(&self, id: i32) -> ProcessResult<Record>;

    /// Store the linked output directories on the record
    async fn update_record(&self, id: i32, cd_path: &str, file_path: &str) -> ProcessResult<()>;

    async fn query_by_folder(&self, folder_id: i32) -> ProcessResult<Vec<Record>>;
}

/// Read-mostly view of the rip filesystem
pub trait RipStore: Send + Sync {
    /// Names of the top-level entries under the rip root that are directories
    fn list_rip_dirs(&self) -> ProcessResult<Vec<String>>;

    /// Names of the plain files directly inside one rip directory
    fn list_files(&self, dir: &str) -> ProcessResult<Vec<String>>;

    fn exists(&self, path: &Path) -> bool;

    /// Number of entries directly inside `path`
    fn count_entries(&self, path: &Path) -> ProcessResult<usize>;

    fn create_dir_all(&self, path: &Path) -> ProcessResult<()>;

    /// Map a rip directory name to (release id, disk)
    fn convert(&self, name: &str) -> ProcessResult<(i32, Option<u32>)> {
        crate::services::rip_scanner::parse_rip_dir_name(name)
    }
}

/// One external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Runs commands outside the pipeline
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Accept a batch for in-order execution
    ///
    /// Returns once the batch is accepted. Exit codes are never reported
    /// back to the caller.
    async fn dispatch(&self, batch: Vec<Command>) -> ProcessResult<()>;
}

/// Target encoding of a conversion job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Mp3,
    Flac,
}

impl Encoding {
    pub fn extension(&self) -> &'static str {
        match self {
            Encoding::Mp3 => "mp3",
            Encoding::Flac => "flac",
        }
    }
}

/// Encode one wav into its sibling mp3/flac
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub encoding: Encoding,
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Queue of long-running encoder jobs; completion is observed on a later scan
#[async_trait]
pub trait ConversionJobs: Send + Sync {
    async fn enqueue(&self, job: ConversionJob) -> ProcessResult<()>;
}

/// External issue tracker
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn open(&self, title: &str, body: &str) -> ProcessResult<IssueHandle>;

    /// Close an issue; an issue that no longer exists counts as closed
    async fn close(&self, handle: IssueHandle) -> ProcessResult<()>;
}

/// Convenience for implementations mapping transport errors
pub(crate) fn catalog_error(err: impl std::fmt::Display) -> ProcessError {
    ProcessError::Catalog(err.to_string())
}
