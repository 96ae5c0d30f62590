//! Test helpers
//!
//! In-memory collaborators plus a temporary rip/mp3/flac layout

#![allow(dead_code)]

use async_trait::async_trait;
use riplink::config::ReconcileRules;
use riplink::db::MemoryStateStore;
use riplink::error::{ProcessError, ProcessResult};
use riplink::models::{Format, IssueHandle, Record, RecordMetadata, Release, Track};
use riplink::processor::{Collaborators, Processor};
use riplink::services::{
    Catalog, Command, CommandRunner, ConversionJob, ConversionJobs, LocalRipStore, Notifier,
};
use riplink_common::config::PathsConfig;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Catalog backed by a map; updates are logged and applied
#[derive(Default)]
pub struct FakeCatalog {
    pub records: Mutex<HashMap<i32, Record>>,
    pub folders: Mutex<HashMap<i32, Vec<i32>>>,
    pub updates: Mutex<Vec<(i32, String, String)>>,
    /// Ids the catalog reports as permanently deleted
    pub gone: Mutex<HashSet<i32>>,
}

impl FakeCatalog {
    pub fn insert(&self, record: Record) {
        self.records
            .lock()
            .unwrap()
            .insert(record.release.instance_id, record);
    }

    pub fn place_in_folder(&self, folder: i32, id: i32) {
        self.folders.lock().unwrap().entry(folder).or_default().push(id);
    }

    pub fn mark_gone(&self, id: i32) {
        self.gone.lock().unwrap().insert(id);
    }

    pub fn record(&self, id: i32) -> Record {
        self.records.lock().unwrap()[&id].clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn get_record(&self, id: i32) -> ProcessResult<Record> {
        if self.gone.lock().unwrap().contains(&id) {
            return Err(ProcessError::RecordGone(id));
        }
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(ProcessError::RecordNotFound(id))
    }

    async fn update_record(&self, id: i32, cd_path: &str, file_path: &str) -> ProcessResult<()> {
        self.updates
            .lock()
            .unwrap()
            .push((id, cd_path.to_string(), file_path.to_string()));
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.metadata.cd_path = cd_path.to_string();
            record.metadata.file_path = file_path.to_string();
        }
        Ok(())
    }

    async fn query_by_folder(&self, folder_id: i32) -> ProcessResult<Vec<Record>> {
        let ids = self.folders.lock().unwrap().get(&folder_id).cloned().unwrap_or_default();
        let records = self.records.lock().unwrap();
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }
}

/// Command runner that only records what it was handed
#[derive(Default)]
pub struct RecordingRunner {
    pub batches: Mutex<Vec<Vec<Command>>>,
}

impl RecordingRunner {
    pub fn command_count(&self) -> usize {
        self.batches.lock().unwrap().iter().map(Vec::len).sum()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn dispatch(&self, batch: Vec<Command>) -> ProcessResult<()> {
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingJobs {
    pub jobs: Mutex<Vec<ConversionJob>>,
}

impl RecordingJobs {
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

#[async_trait]
impl ConversionJobs for RecordingJobs {
    async fn enqueue(&self, job: ConversionJob) -> ProcessResult<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

/// Notifier handing out sequential handles
pub struct FakeNotifier {
    next: AtomicI64,
    pub opened: Mutex<Vec<(String, String)>>,
    pub closed: Mutex<Vec<IssueHandle>>,
}

impl Default for FakeNotifier {
    fn default() -> Self {
        Self {
            next: AtomicI64::new(100),
            opened: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn open(&self, title: &str, body: &str) -> ProcessResult<IssueHandle> {
        self.opened
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }

    async fn close(&self, handle: IssueHandle) -> ProcessResult<()> {
        self.closed.lock().unwrap().push(handle);
        Ok(())
    }
}

/// Temporary rip root plus output trees
pub struct Layout {
    _temp: TempDir,
    pub rips: PathBuf,
    pub mp3: PathBuf,
    pub flac: PathBuf,
}

impl Layout {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let rips = temp.path().join("rips");
        let mp3 = temp.path().join("mp3");
        let flac = temp.path().join("flac");
        for dir in [&rips, &mp3, &flac] {
            fs::create_dir_all(dir).unwrap();
        }
        Self {
            _temp: temp,
            rips,
            mp3,
            flac,
        }
    }

    pub fn paths(&self) -> PathsConfig {
        PathsConfig {
            rip_dir: self.rips.display().to_string(),
            mp3_dir: self.mp3.display().to_string(),
            flac_dir: self.flac.display().to_string(),
            ..Default::default()
        }
    }

    /// Rip directory `name` holding the given extensions for tracks 1..=count
    pub fn write_rip(&self, name: &str, count: u32, extensions: &[&str]) {
        let dir = self.rips.join(name);
        fs::create_dir_all(&dir).unwrap();
        for n in 1..=count {
            for ext in extensions {
                fs::write(dir.join(format!("track{:02}.cdda.{}", n, ext)), b"").unwrap();
            }
        }
    }

    /// Linked MP3 directory for a release holding `count` files
    pub fn write_links(&self, release_id: i32, count: u32) -> PathBuf {
        let dir = self.mp3.join(release_id.to_string());
        fs::create_dir_all(&dir).unwrap();
        for n in 1..=count {
            fs::write(dir.join(format!("track1-{:02}.cdda.mp3", n)), b"").unwrap();
        }
        dir
    }
}

/// Single-CD record with `count` plainly numbered tracks
pub fn cd_record(instance_id: i32, release_id: i32, count: u32) -> Record {
    Record {
        release: Release {
            id: release_id,
            instance_id,
            title: "Album".to_string(),
            formats: vec![Format::named("CD")],
            format_quantity: 1,
            tracklist: (1..=count)
                .map(|n| Track::new(&n.to_string(), &format!("Song {}", n)))
                .collect(),
            ..Default::default()
        },
        metadata: RecordMetadata::default(),
    }
}

pub fn test_rules() -> ReconcileRules {
    ReconcileRules {
        settle_delay_ms: 0,
        ..Default::default()
    }
}

/// Processor wired to fakes over a temporary layout
pub struct Harness {
    pub layout: Layout,
    pub catalog: Arc<FakeCatalog>,
    pub runner: Arc<RecordingRunner>,
    pub jobs: Arc<RecordingJobs>,
    pub notifier: Arc<FakeNotifier>,
    pub store: Arc<MemoryStateStore>,
    pub processor: Arc<Processor>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_rules(test_rules())
    }

    pub fn with_rules(rules: ReconcileRules) -> Self {
        let layout = Layout::new();
        let catalog = Arc::new(FakeCatalog::default());
        let runner = Arc::new(RecordingRunner::default());
        let jobs = Arc::new(RecordingJobs::default());
        let notifier = Arc::new(FakeNotifier::default());
        let store = Arc::new(MemoryStateStore::default());

        let collaborators = Collaborators {
            catalog: catalog.clone(),
            rips: Arc::new(LocalRipStore::new(&layout.rips)),
            commands: runner.clone(),
            jobs: jobs.clone(),
            notifier: notifier.clone(),
            store: store.clone(),
        };
        let processor = Arc::new(Processor::new(collaborators, rules, layout.paths()));

        Self {
            layout,
            catalog,
            runner,
            jobs,
            notifier,
            store,
            processor,
        }
    }
}
