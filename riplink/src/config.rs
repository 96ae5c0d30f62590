//! Configuration resolution for riplink
//!
//! The shared [`TomlConfig`] covers paths, service and endpoint settings.
//! The `[rules]` table of the same file carries [`ReconcileRules`]: the
//! folder and format tables tuned to one catalog's conventions.

use riplink_common::config::TomlConfig;
use riplink_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Catalog-specific decision tables and timing knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileRules {
    /// Goal folders whose records are cassettes (ripped as two sides)
    pub tape_goal_folders: Vec<i32>,
    /// Goal folders never linked (digital copies of CDs)
    pub skip_goal_folders: Vec<i32>,
    /// Goal folders that always count as a processable format
    pub always_match_goal_folders: Vec<i32>,
    /// Release format names that make a record processable
    pub match_format_names: Vec<String>,
    /// TrackSet formats that get one output file per track
    pub rippable_formats: Vec<String>,
    /// Format names ignored when picking a release's base format
    pub wrapper_format_names: Vec<String>,
    /// Categories that are never processed unless forced
    pub archived_categories: Vec<String>,
    /// Folders where a record waits on a disposition decision
    pub limbo_folders: Vec<i32>,
    /// Goal folders left out of the recently-ripped gauge
    pub gauge_excluded_goal_folders: Vec<i32>,
    /// Folders queried for candidates at the start of each cycle
    pub watch_folders: Vec<i32>,
    /// Minimum days between two non-forced link builds
    pub throttle_days: i64,
    /// Delay before re-reading a rip directory after conversion
    pub settle_delay_ms: u64,
    /// Records added longer ago than this are assumed to have arrived
    pub assume_arrived_after_days: i64,
    /// Window for the recently-ripped gauge
    pub recent_rip_window_hours: i64,
}

impl Default for ReconcileRules {
    fn default() -> Self {
        Self {
            tape_goal_folders: Vec::new(),
            skip_goal_folders: vec![268147, 1433217],
            always_match_goal_folders: vec![242018, 1782105, 288751],
            match_format_names: strings(&["File", "CD", "CDr", "Cassette", "Memory Stick"]),
            rippable_formats: strings(&["CD", "CDr", "File"]),
            wrapper_format_names: strings(&["Box Set", "All Media"]),
            archived_categories: strings(&["SOLD_ARCHIVE"]),
            limbo_folders: Vec::new(),
            gauge_excluded_goal_folders: vec![1782105],
            watch_folders: Vec::new(),
            throttle_days: 7,
            settle_delay_ms: 2000,
            assume_arrived_after_days: 60,
            recent_rip_window_hours: 18,
        }
    }
}

impl ReconcileRules {
    pub fn is_tape(&self, goal_folder: i32) -> bool {
        self.tape_goal_folders.contains(&goal_folder)
    }

    pub fn is_rippable(&self, format: &str) -> bool {
        self.rippable_formats.iter().any(|f| f == format)
    }

    pub fn is_wrapper(&self, format: &str) -> bool {
        self.wrapper_format_names.iter().any(|f| f == format)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Wrapper used to pull the `[rules]` table out of the config file
#[derive(Debug, Default, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: ReconcileRules,
}

/// Parse `[rules]` from TOML text; a missing table yields defaults
pub fn parse_rules(toml_text: &str) -> Result<ReconcileRules> {
    let file: RulesFile = toml::from_str(toml_text)
        .map_err(|e| Error::Config(format!("Parse rules failed: {}", e)))?;
    Ok(file.rules)
}

/// Load rules from the config file
pub fn load_rules(path: &Path) -> Result<ReconcileRules> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let rules = parse_rules(&content)?;
    info!(
        tape_goal_folders = rules.tape_goal_folders.len(),
        watch_folders = rules.watch_folders.len(),
        "Loaded reconcile rules from {}",
        path.display()
    );
    Ok(rules)
}

/// Everything the service needs at startup
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub toml: TomlConfig,
    pub rules: ReconcileRules,
}

impl RuntimeConfig {
    /// Load the shared config and rules from one file (or defaults)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let toml = riplink_common::config::load_or_default(explicit)?;
        let rules = match riplink_common::config::config_file_path(explicit) {
            Ok(path) => load_rules(&path)?,
            Err(_) => ReconcileRules::default(),
        };
        Ok(Self { toml, rules })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_rules_table_uses_defaults() {
        let rules = parse_rules("root_folder = \"/tmp/x\"\n").unwrap();
        assert_eq!(rules, ReconcileRules::default());
        assert_eq!(rules.throttle_days, 7);
        assert_eq!(rules.settle_delay_ms, 2000);
    }

    #[test]
    fn test_partial_rules_table_overrides() {
        let rules = parse_rules("[rules]\ntape_goal_folders = [1234]\nthrottle_days = 3\n").unwrap();
        assert!(rules.is_tape(1234));
        assert!(!rules.is_tape(1));
        assert_eq!(rules.throttle_days, 3);
        assert!(rules.is_rippable("CDr"));
    }

    #[test]
    fn test_bad_rules_type_is_config_error() {
        let result = parse_rules("[rules]\nthrottle_days = \"soon\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_wrapper_formats() {
        let rules = ReconcileRules::default();
        assert!(rules.is_wrapper("Box Set"));
        assert!(rules.is_wrapper("All Media"));
        assert!(!rules.is_wrapper("Vinyl"));
    }
}
