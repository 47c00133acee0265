//! Atomic persistence and schema migration for `BrownfieldState`.

use chrono::Utc;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::BrownfieldState;
use crate::errors::{BrownfieldError, Result};
use crate::util::write_json_atomic;

/// Schema written by this build.
pub const SCHEMA_VERSION: &str = "1.1";

/// Version assumed when a payload carries none.
const LEGACY_SCHEMA_VERSION: &str = "1.0";

pub struct StateStore {
    state_file: PathBuf,
}

impl StateStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    pub fn path(&self) -> &Path {
        &self.state_file
    }

    pub fn exists(&self) -> bool {
        self.state_file.exists()
    }

    /// Load and migrate the persisted state.
    pub fn load(&self) -> Result<BrownfieldState> {
        if !self.exists() {
            return Err(BrownfieldError::StateNotFound {
                path: self.state_file.clone(),
            });
        }
        let content = std::fs::read_to_string(&self.state_file).map_err(|source| BrownfieldError::Io {
            path: self.state_file.clone(),
            source,
        })?;
        let raw: Value = serde_json::from_str(&content).map_err(|source| self.corrupted(source))?;
        let migrated = migrate(raw)?;
        let state = serde_json::from_value(migrated).map_err(|source| self.corrupted(source))?;
        debug!(path = %self.state_file.display(), "state loaded");
        Ok(state)
    }

    /// Stamp `updated_at` and write atomically.
    pub fn save(&self, state: &mut BrownfieldState) -> Result<()> {
        state.schema_version = SCHEMA_VERSION.to_string();
        state.updated_at = Utc::now();
        write_json_atomic(&self.state_file, state)?;
        debug!(path = %self.state_file.display(), phase = %state.current_phase, "state saved");
        Ok(())
    }

    fn corrupted(&self, source: serde_json::Error) -> BrownfieldError {
        BrownfieldError::StateCorrupted {
            path: self.state_file.clone(),
            source,
        }
    }
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().ok()?;
    Some((major, minor))
}

/// Upgrade a raw state payload to the current schema.
///
/// Payloads without `schema_version` are treated as 1.0. Versions newer
/// than `SCHEMA_VERSION` are refused.
pub fn migrate(mut raw: Value) -> Result<Value> {
    let found = raw
        .get("schema_version")
        .and_then(Value::as_str)
        .unwrap_or(LEGACY_SCHEMA_VERSION)
        .to_string();
    let unsupported = || BrownfieldError::UnsupportedSchema {
        found: found.clone(),
        supported: SCHEMA_VERSION.to_string(),
    };

    let version = parse_version(&found).ok_or_else(unsupported)?;
    let current = parse_version(SCHEMA_VERSION).ok_or_else(unsupported)?;
    if version > current {
        return Err(unsupported());
    }

    if version < (1, 1) {
        if let Some(obj) = raw.as_object_mut() {
            migrate_1_0(obj);
        }
        info!(from = %found, to = SCHEMA_VERSION, "migrated state schema");
    }
    Ok(raw)
}

/// Map a 1.0 phase name (`phase2_testing`, `TESTING`) to its current form.
fn legacy_phase_name(name: &str) -> String {
    let lower = name.to_lowercase();
    match lower.split_once('_') {
        Some((prefix, rest)) if prefix.starts_with("phase") => rest.to_string(),
        _ => lower,
    }
}

fn migrate_phase_value(value: &mut Value) {
    if let Some(name) = value.as_str() {
        *value = Value::String(legacy_phase_name(name));
    }
}

fn migrate_metrics(value: &mut Value) {
    let Some(metrics) = value.as_object_mut() else {
        return;
    };
    if metrics.contains_key("coverage_percent") {
        return;
    }
    if let Some(coverage) = metrics.remove("coverage") {
        metrics.insert("coverage_percent".to_string(), coverage);
    }
}

fn migrate_1_0(obj: &mut Map<String, Value>) {
    if let Some(phase) = obj.get_mut("current_phase") {
        migrate_phase_value(phase);
    }

    if let Some(Value::Object(stamps)) = obj.remove("phase_timestamps") {
        let renamed: Map<String, Value> = stamps
            .into_iter()
            .map(|(k, v)| (legacy_phase_name(&k), v))
            .collect();
        obj.insert("phase_timestamps".to_string(), Value::Object(renamed));
    }

    for key in ["baseline_metrics", "current_metrics"] {
        if let Some(metrics) = obj.get_mut(key) {
            migrate_metrics(metrics);
        }
    }

    let events = obj
        .entry("re_entry_events")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Some(events) = events.as_array_mut() {
        for event in events {
            if let Some(phase) = event.get_mut("re_entry_phase") {
                migrate_phase_value(phase);
            }
        }
    }

    obj.entry("last_gate_results")
        .or_insert_with(|| Value::Array(Vec::new()));
    obj.insert(
        "schema_version".to_string(),
        Value::String(SCHEMA_VERSION.to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::phase::Phase;
    use serde_json::json;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> StateStore {
        StateStore::new(dir.join(".brownfield/state.json"))
    }

    #[test]
    fn test_load_missing_is_state_not_found() {
        let dir = tempdir().unwrap();
        let err = store_in(dir.path()).load().unwrap_err();
        assert!(matches!(err, BrownfieldError::StateNotFound { .. }));
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let mut state = BrownfieldState::new(
            dir.path().to_path_buf(),
            Metrics {
                coverage_percent: 33.3,
                ..Default::default()
            },
            Some("python".to_string()),
        );
        state.current_phase = Phase::Testing;
        state.enter_phase(Phase::Testing);
        store.save(&mut state).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_corrupted_file_is_fatal() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, BrownfieldError::StateCorrupted { .. }));
        assert_eq!(err.exit_code(), crate::errors::EXIT_FATAL);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let err = migrate(json!({"schema_version": "2.0"})).unwrap_err();
        assert!(matches!(err, BrownfieldError::UnsupportedSchema { ref found, .. } if found == "2.0"));
        assert!(migrate(json!({"schema_version": "1.2"})).is_err());
        assert!(migrate(json!({"schema_version": "garbage"})).is_err());
    }

    #[test]
    fn test_current_schema_passes_through() {
        let raw = json!({"schema_version": "1.1", "current_phase": "quality"});
        assert_eq!(migrate(raw.clone()).unwrap(), raw);
    }

    #[test]
    fn test_legacy_payload_is_migrated() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let legacy = json!({
            "project_root": "/srv/app",
            "current_phase": "phase2_testing",
            "graduated": false,
            "baseline_metrics": {"coverage": 0.0, "max_complexity": 31.0},
            "current_metrics": {"coverage": 42.5, "max_complexity": 12.0},
            "phase_timestamps": {
                "phase0_assessment": {"entered_at": "2024-01-01T00:00:00Z", "completed_at": "2024-01-02T00:00:00Z"},
                "phase2_testing": {"entered_at": "2024-01-03T00:00:00Z"}
            }
        });
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), legacy.to_string()).unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.schema_version, SCHEMA_VERSION);
        assert_eq!(state.current_phase, Phase::Testing);
        assert_eq!(state.current_metrics.coverage_percent, 42.5);
        assert_eq!(state.baseline_metrics.max_complexity, 31.0);
        assert!(state.phase_timestamps[&Phase::Assessment].is_completed());
        assert!(state.re_entry_events.is_empty());
        assert!(state.last_gate_results.is_empty());
    }

    #[test]
    fn test_legacy_phase_names() {
        assert_eq!(legacy_phase_name("phase0_assessment"), "assessment");
        assert_eq!(legacy_phase_name("GRADUATION"), "graduation");
        assert_eq!(legacy_phase_name("quality"), "quality");
    }
}
