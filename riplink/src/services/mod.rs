//! Reconciliation services
//!
//! - Core logic: position classification, TrackSet building, rip scanning,
//!   reconciliation, link pipeline, issue lifecycle
//! - Collaborator traits and their production implementations

pub mod catalog_client;
pub mod collaborators;
pub mod command_runner;
pub mod conversion_queue;
pub mod issue_tracker;
pub mod link_pipeline;
pub mod local_rip_store;
pub mod notifier_client;
pub mod position_classifier;
pub mod reconciler;
pub mod rip_scanner;
pub mod trackset_builder;

pub use catalog_client::HttpCatalog;
pub use collaborators::{Catalog, Command, CommandRunner, ConversionJob, ConversionJobs, Encoding, Notifier, RipStore};
pub use command_runner::ProcessCommandRunner;
pub use conversion_queue::ConversionQueue;
pub use issue_tracker::{GaugeSnapshot, Gauges, IssueLifecycle, IssueTransition};
pub use link_pipeline::{Escalation, LinkOutcome, LinkPipeline, SkipReason};
pub use local_rip_store::LocalRipStore;
pub use notifier_client::HttpNotifier;
pub use reconciler::{Reconciler, VerifyOutcome};
pub use trackset_builder::{build_track_sets, TrackSet};
