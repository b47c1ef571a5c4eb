//! War data persistence
//!
//! The registry is saved as one JSON document. Saving copies a snapshot under
//! the registry lock and serializes after releasing it. Loading is lenient:
//! broken records are dropped one by one, and wars that are already decided
//! are not resurrected after a long downtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::core::error::{Result, TribeWarError};
use crate::core::types::{FactionId, Timestamp, WarId};
use crate::war::record::WarRecord;
use crate::war::registry::{RegistrySnapshot, WarRegistry};

pub const DATA_FILE: &str = "data.json";

/// Slack added to twice the cooldown before an ended war counts as stale
const STALE_GRACE_SECONDS: i64 = 3600;

/// On-disk document
#[derive(Debug, Serialize)]
struct WarDataFile<'a> {
    next_war_id: u64,
    wars: &'a [WarRecord],
}

/// A persisted war with every field optional
///
/// Integer fields are read wide so that out-of-range ids are canonicalized
/// instead of failing the record.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawWarRecord {
    war_id: i64,
    #[serde(alias = "tribe_a")]
    faction_a: i64,
    #[serde(alias = "tribe_b")]
    faction_b: i64,
    declared_at: i64,
    start_at: i64,
    ended_at: i64,
    cooldown_end_a: i64,
    cooldown_end_b: i64,
    cancel_requested_by_a: bool,
    cancel_requested_by_b: bool,
    start_notified: bool,
    cooldown_notified: bool,
}

impl RawWarRecord {
    fn into_record(self) -> Option<WarRecord> {
        if self.war_id <= 0 {
            return None;
        }
        let record = WarRecord {
            war_id: WarId(self.war_id as u64),
            faction_a: FactionId::from_raw(self.faction_a),
            faction_b: FactionId::from_raw(self.faction_b),
            declared_at: self.declared_at,
            start_at: self.start_at,
            ended_at: self.ended_at,
            cooldown_end_a: self.cooldown_end_a,
            cooldown_end_b: self.cooldown_end_b,
            cancel_requested_by_a: self.cancel_requested_by_a,
            cancel_requested_by_b: self.cancel_requested_by_b,
            start_notified: self.start_notified,
            cooldown_notified: self.cooldown_notified,
        };
        record.is_well_formed().then_some(record)
    }
}

/// What a load did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// No data file existed
    pub missing: bool,
    pub loaded: usize,
    /// Structurally invalid records
    pub invalid: usize,
    /// Decided or pathologically old wars
    pub stale: usize,
}

/// JSON file holding the registry
pub struct WarStore {
    path: PathBuf,
}

impl WarStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(DATA_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write a snapshot of the registry; returns the number of wars written
    pub fn save(&self, registry: &WarRegistry) -> Result<usize> {
        let snapshot = registry.snapshot();
        let document = WarDataFile {
            next_war_id: snapshot.next_war_id,
            wars: &snapshot.wars,
        };
        let json = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(wars = snapshot.wars.len(), "Saved war data");
        Ok(snapshot.wars.len())
    }

    /// Replace the registry contents with what is on disk
    ///
    /// Never fails: an unreadable or unparsable file leaves the registry empty
    /// with the id counter reset.
    pub fn load(&self, registry: &WarRegistry, now: Timestamp) -> LoadReport {
        if !self.path.exists() {
            return LoadReport {
                missing: true,
                ..LoadReport::default()
            };
        }

        let parsed = fs::read_to_string(&self.path)
            .map_err(TribeWarError::from)
            .and_then(|content| parse_document(&content, now, registry.cooldown_seconds()));

        match parsed {
            Ok((snapshot, report)) => {
                registry.restore(snapshot, now);
                tracing::info!(
                    loaded = report.loaded,
                    invalid = report.invalid,
                    stale = report.stale,
                    "Loaded war data"
                );
                report
            }
            Err(e) => {
                tracing::warn!("Failed to load {}: {}; starting empty", self.path.display(), e);
                registry.clear();
                LoadReport::default()
            }
        }
    }
}

/// Parse a war data document, dropping what must not be restored
pub fn parse_document(
    content: &str,
    now: Timestamp,
    cooldown_seconds: i64,
) -> Result<(RegistrySnapshot, LoadReport)> {
    let document: Value = serde_json::from_str(content)?;

    let next_war_id = document
        .get("next_war_id")
        .and_then(Value::as_i64)
        .filter(|id| *id > 0)
        .map(|id| id as u64)
        .unwrap_or(1);

    let stale_horizon = cooldown_seconds
        .saturating_mul(2)
        .saturating_add(STALE_GRACE_SECONDS);

    let mut report = LoadReport::default();
    let mut wars = Vec::new();
    let items = document
        .get("wars")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for item in items {
        let record = serde_json::from_value::<RawWarRecord>(item.clone())
            .ok()
            .and_then(RawWarRecord::into_record);
        let Some(record) = record else {
            report.invalid += 1;
            continue;
        };

        if is_stale(&record, now, stale_horizon) {
            report.stale += 1;
            continue;
        }
        wars.push(record);
    }

    report.loaded = wars.len();
    Ok((RegistrySnapshot { next_war_id, wars }, report))
}

fn is_stale(record: &WarRecord, now: Timestamp, horizon: i64) -> bool {
    if !record.is_ended() {
        return false;
    }
    if record.cooldown_elapsed(now) {
        return true;
    }
    record.declared_at > 0 && now.saturating_sub(record.declared_at) > horizon
}

/// Rate limiter for saves triggered by the dirty flag
#[derive(Debug)]
pub struct SaveDebouncer {
    interval_seconds: i64,
    last_save: AtomicI64,
}

impl SaveDebouncer {
    pub fn new(interval_seconds: i64) -> Self {
        Self {
            interval_seconds: interval_seconds.max(0),
            last_save: AtomicI64::new(i64::MIN),
        }
    }

    /// Save if the registry is dirty and the interval has passed
    ///
    /// The dirty flag survives a skipped or failed save.
    pub fn flush_if_needed(&self, store: &WarStore, registry: &WarRegistry, now: Timestamp) -> Result<bool> {
        if !registry.is_dirty() {
            return Ok(false);
        }
        let last = self.last_save.load(Ordering::SeqCst);
        if last != i64::MIN && now.saturating_sub(last) < self.interval_seconds {
            return Ok(false);
        }

        registry.take_dirty();
        if let Err(e) = store.save(registry) {
            registry.mark_dirty();
            return Err(e);
        }
        self.last_save.store(now, Ordering::SeqCst);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: i64 = 1_000;

    #[test]
    fn test_invalid_records_dropped_individually() {
        let json = r#"{
            "next_war_id": 7,
            "wars": [
                { "war_id": 1, "tribe_a": 10, "tribe_b": 20, "declared_at": 5, "start_at": 50 },
                { "war_id": 0, "tribe_a": 10, "tribe_b": 20 },
                { "war_id": 2, "tribe_a": 0, "tribe_b": 20 },
                { "war_id": 3, "tribe_a": 30, "tribe_b": 30 },
                { "war_id": "x" },
                42
            ]
        }"#;
        let (snapshot, report) = parse_document(json, 10, COOLDOWN).unwrap();
        assert_eq!(snapshot.next_war_id, 7);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.invalid, 5);
        assert_eq!(snapshot.wars[0].faction_b, FactionId(20));
    }

    #[test]
    fn test_decided_wars_not_resurrected() {
        let json = r#"{
            "next_war_id": 4,
            "wars": [
                { "war_id": 1, "faction_a": 1, "faction_b": 2, "declared_at": 100,
                  "start_at": 200, "ended_at": 300, "cooldown_end_a": 1300, "cooldown_end_b": 1300 },
                { "war_id": 2, "faction_a": 3, "faction_b": 4, "declared_at": 100,
                  "start_at": 200, "ended_at": 300, "cooldown_end_a": 9000, "cooldown_end_b": 9000 },
                { "war_id": 3, "faction_a": 5, "faction_b": 6, "declared_at": 3000,
                  "start_at": 3100, "ended_at": 3200, "cooldown_end_a": 9200, "cooldown_end_b": 9200 }
            ]
        }"#;
        // now - 100 exceeds 2 * 1000 + 3600 for war 2, war 1 has fully cooled down
        let (snapshot, report) = parse_document(json, 5_800, COOLDOWN).unwrap();
        assert_eq!(report.stale, 2);
        assert_eq!(snapshot.wars.len(), 1);
        assert_eq!(snapshot.wars[0].war_id, WarId(3));
    }

    #[test]
    fn test_negative_ids_canonicalized() {
        let json = r#"{ "wars": [ { "war_id": 1, "tribe_a": -5, "tribe_b": 4294967297 } ] }"#;
        let (snapshot, _) = parse_document(json, 0, COOLDOWN).unwrap();
        assert_eq!(snapshot.next_war_id, 1);
        assert_eq!(snapshot.wars[0].faction_a, FactionId(u32::MAX - 4));
        assert_eq!(snapshot.wars[0].faction_b, FactionId(1));
    }

    #[test]
    fn test_garbage_leaves_registry_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = WarStore::in_dir(dir.path());
        fs::write(store.path(), "{ not json").unwrap();

        let registry = WarRegistry::new(10, COOLDOWN);
        registry.declare_war(FactionId(1), FactionId(2), 0).unwrap();
        let report = store.load(&registry, 0);

        assert_eq!(report, LoadReport::default());
        assert!(registry.is_empty());
        assert_eq!(registry.next_war_id(), 1);
    }

    #[test]
    fn test_missing_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = WarStore::in_dir(dir.path());
        let registry = WarRegistry::new(10, COOLDOWN);
        assert!(store.load(&registry, 0).missing);
    }

    #[test]
    fn test_debouncer_respects_interval() {
        let dir = tempfile::tempdir().unwrap();
        let store = WarStore::in_dir(dir.path());
        let registry = WarRegistry::new(10, COOLDOWN);
        let debouncer = SaveDebouncer::new(30);

        assert!(!debouncer.flush_if_needed(&store, &registry, 0).unwrap());

        registry.declare_war(FactionId(1), FactionId(2), 0).unwrap();
        assert!(debouncer.flush_if_needed(&store, &registry, 0).unwrap());
        assert!(store.exists());

        registry.request_cancel(FactionId(1), 5);
        assert!(!debouncer.flush_if_needed(&store, &registry, 10).unwrap());
        assert!(registry.is_dirty());
        assert!(debouncer.flush_if_needed(&store, &registry, 30).unwrap());
        assert!(!registry.is_dirty());
    }
}
