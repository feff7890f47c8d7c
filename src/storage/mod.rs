//! Event store: the deduplicated trade record cache and its sync metadata,
//! persisted as a single JSON file.
//!
//! Writes go to `<file>.tmp`, are fsynced, then renamed over the cache file,
//! so a crash leaves either the old or the new file intact.

use crate::types::record::TradeRecord;
use crate::utils::error::Result;
use serde_json::Value;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sync metadata stored next to the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Cursor for the next signature listing; absent means "start at the newest".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_signature: Option<String>,
    /// Milliseconds, time of the last successful cycle.
    pub last_update: i64,
    /// Every record ever merged, including evicted ones.
    pub total_events: u64,
    /// Milliseconds, set when the cache is first created.
    pub monitor_start_time: i64,
}

impl SyncState {
    #[must_use]
    pub fn fresh(now_ms: i64) -> Self {
        Self {
            last_signature: None,
            last_update: now_ms,
            total_events: 0,
            monitor_start_time: now_ms,
        }
    }
}

/// On-disk layout of the cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFile {
    #[serde(flatten)]
    pub state: SyncState,
    pub events: Vec<TradeRecord>,
}

impl CacheFile {
    /// Reads and parses a cache file without modifying it.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::StorageError` if the file cannot be read and
    /// `MonitorError::SerializationError` if it is not a valid cache.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Cache file with records left unparsed, so one bad record does not take
/// the whole file down with it.
#[derive(Deserialize)]
struct LenientCacheFile {
    #[serde(flatten)]
    state: SyncState,
    #[serde(default)]
    events: Vec<Value>,
}

/// Evicted signatures to keep remembering, at least one full listing page so
/// an overlapping page cannot bring them back.
const MIN_EVICTED_MEMORY: usize = 1000;

/// Immutable view of the store published after each persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub state: SyncState,
    /// Most recent first.
    pub events: Arc<Vec<TradeRecord>>,
}

impl StoreSnapshot {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            state: SyncState::fresh(0),
            events: Arc::new(Vec::new()),
        }
    }
}

impl From<CacheFile> for StoreSnapshot {
    fn from(file: CacheFile) -> Self {
        Self {
            state: file.state,
            events: Arc::new(file.events),
        }
    }
}

/// The live event cache.
///
/// Records are kept most recent first. Signatures are unique; merging a record
/// whose signature is already present is a no-op.
#[derive(Debug)]
pub struct EventStore {
    path: PathBuf,
    max_events: usize,
    state: SyncState,
    events: Vec<TradeRecord>,
    signatures: HashSet<String>,
    /// Recently evicted signatures, oldest eviction first.
    evicted: VecDeque<String>,
    evicted_set: HashSet<String>,
}

impl EventStore {
    /// Creates an empty store that will persist to `path`. Nothing is written.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_events: usize, now_ms: i64) -> Self {
        Self {
            path: path.into(),
            max_events,
            state: SyncState::fresh(now_ms),
            events: Vec::new(),
            signatures: HashSet::new(),
            evicted: VecDeque::new(),
            evicted_set: HashSet::new(),
        }
    }

    /// Loads the store from `path`, then persists the cleaned result.
    ///
    /// A missing file yields an empty store with `monitorStartTime = now_ms`.
    /// A file that is not a cache at all (unreadable bytes, broken JSON, bad
    /// sync metadata) is renamed to `<file>.corrupt-<now_ms>` and replaced by
    /// an empty store. Individual records that do not parse are dropped with
    /// a warning. Duplicate signatures keep their first occurrence and records
    /// beyond `max_events` are evicted.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::StorageError` if the cleaned store cannot be
    /// written.
    pub fn load(path: impl Into<PathBuf>, max_events: usize, now_ms: i64) -> Result<Self> {
        let mut store = Self::new(path, max_events, now_ms);

        if store.path.exists() {
            let parsed = fs::read(&store.path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| {
                    serde_json::from_slice::<LenientCacheFile>(&bytes).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(file) => store.restore(file),
                Err(error) => store.quarantine(now_ms, &error),
            }
        } else {
            tracing::info!(path = %store.path.display(), "No cache file, starting fresh");
        }

        store.persist()?;
        Ok(store)
    }

    fn restore(&mut self, file: LenientCacheFile) {
        self.state = file.state;
        let (mut invalid, mut duplicates) = (0usize, 0usize);
        for (index, value) in file.events.into_iter().enumerate() {
            let record = match serde_json::from_value::<TradeRecord>(value) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(index, error = %e, "Dropping unreadable cached record");
                    invalid += 1;
                    continue;
                }
            };
            if self.signatures.insert(record.signature.clone()) {
                self.events.push(record);
            } else {
                duplicates += 1;
            }
        }
        if invalid > 0 || duplicates > 0 {
            tracing::warn!(invalid, duplicates, kept = self.events.len(), "Cleaned cache records");
        }
        self.enforce_capacity();
    }

    fn quarantine(&mut self, now_ms: i64, error: &str) {
        let quarantine = quarantine_path(&self.path, now_ms);
        tracing::error!(
            path = %self.path.display(),
            quarantine = %quarantine.display(),
            error,
            "Cache file is corrupt, starting with an empty store"
        );
        if let Err(e) = fs::rename(&self.path, &quarantine) {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Could not move corrupt cache aside, it will be overwritten"
            );
        }
    }

    /// Adds candidates whose signature is neither stored nor recently
    /// evicted, keeping their relative order, in front of the existing
    /// records. Returns how many were added; `totalEvents` grows by the same
    /// amount.
    pub fn merge_insert(&mut self, candidates: Vec<TradeRecord>) -> usize {
        let mut fresh: Vec<TradeRecord> = Vec::new();
        for record in candidates {
            if self.evicted_set.contains(&record.signature) {
                continue;
            }
            if self.signatures.insert(record.signature.clone()) {
                fresh.push(record);
            }
        }

        let added = fresh.len();
        if added > 0 {
            fresh.append(&mut self.events);
            self.events = fresh;
            self.state.total_events += added as u64;
        }
        added
    }

    /// Drops the oldest records beyond `max_size`; returns how many were
    /// dropped. Their signatures are remembered so they are not merged again.
    pub fn evict_if_over_capacity(&mut self, max_size: usize) -> usize {
        if self.events.len() <= max_size {
            return 0;
        }
        let evicted: Vec<TradeRecord> = self.events.split_off(max_size);
        let memory = self.max_events.max(MIN_EVICTED_MEMORY);
        for record in &evicted {
            self.signatures.remove(&record.signature);
            if self.evicted_set.insert(record.signature.clone()) {
                self.evicted.push_back(record.signature.clone());
            }
        }
        while self.evicted.len() > memory {
            if let Some(oldest) = self.evicted.pop_front() {
                self.evicted_set.remove(&oldest);
            }
        }
        evicted.len()
    }

    /// Whether `signature` was evicted recently enough to still be refused.
    #[must_use]
    pub fn was_evicted(&self, signature: &str) -> bool {
        self.evicted_set.contains(signature)
    }

    /// Drops records over the store's own cap.
    pub fn enforce_capacity(&mut self) -> usize {
        self.evict_if_over_capacity(self.max_events)
    }

    /// Sets (or clears) the listing cursor.
    pub fn set_cursor(&mut self, signature: Option<String>) {
        self.state.last_signature = signature;
    }

    /// Records a successful cycle.
    pub fn touch(&mut self, now_ms: i64) {
        self.state.last_update = now_ms;
    }

    /// Writes the whole store atomically.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::StorageError` on any filesystem failure; the
    /// previous cache file is left untouched in that case.
    pub fn persist(&self) -> Result<()> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct CacheFileRef<'a> {
            #[serde(flatten)]
            state: &'a SyncState,
            events: &'a [TradeRecord],
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(&CacheFileRef {
            state: &self.state,
            events: &self.events,
        })?;

        let temp_path = temp_path(&self.path);
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            state: self.state.clone(),
            events: Arc::new(self.events.clone()),
        }
    }

    #[must_use]
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Records, most recent first.
    #[must_use]
    pub fn events(&self) -> &[TradeRecord] {
        &self.events
    }

    #[must_use]
    pub fn contains(&self, signature: &str) -> bool {
        self.signatures.contains(signature)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn max_events(&self) -> usize {
        self.max_events
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn quarantine_path(path: &Path, now_ms: i64) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{now_ms}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::TradeType;
    use tempfile::TempDir;

    fn record(signature: &str) -> TradeRecord {
        TradeRecord {
            signature: signature.to_string(),
            block_time: 1_700_000_000,
            slot: 1,
            id: "1".to_string(),
            user_id: "user".to_string(),
            fund_id: "fund".to_string(),
            trade_type: TradeType::Buy,
            amount: 1,
            price: 2,
            timestamp: 1_700_000_000,
            parsed_at: 0,
        }
    }

    fn signatures(store: &EventStore) -> Vec<&str> {
        store.events().iter().map(|r| r.signature.as_str()).collect()
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut store = EventStore::new("unused.json", 10, 0);
        assert_eq!(store.merge_insert(vec![record("a")]), 1);
        assert_eq!(store.merge_insert(vec![record("a")]), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.state().total_events, 1);
    }

    #[test]
    fn test_merge_prepends_and_dedupes_within_batch() {
        let mut store = EventStore::new("unused.json", 10, 0);
        store.merge_insert(vec![record("old")]);
        let added = store.merge_insert(vec![record("x"), record("y"), record("x")]);
        assert_eq!(added, 2);
        assert_eq!(signatures(&store), ["x", "y", "old"]);
        assert!(store.contains("y"));
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let mut store = EventStore::new("unused.json", 3, 0);
        for sig in ["1", "2", "3", "4"] {
            store.merge_insert(vec![record(sig)]);
        }
        assert_eq!(store.enforce_capacity(), 1);
        assert_eq!(signatures(&store), ["4", "3", "2"]);
        assert_eq!(store.state().total_events, 4);
        assert!(!store.contains("1"));
    }

    #[test]
    fn test_evicted_signatures_are_not_merged_again() {
        let mut store = EventStore::new("unused.json", 2, 0);
        store.merge_insert(vec![record("3"), record("2"), record("1")]);
        assert_eq!(store.enforce_capacity(), 1);
        assert!(store.was_evicted("1"));

        // An overlapping page brings "1" back alongside a new record.
        assert_eq!(store.merge_insert(vec![record("2"), record("1"), record("0")]), 1);
        assert_eq!(store.state().total_events, 4);
        assert!(!store.contains("1"));
    }

    #[test]
    fn test_load_missing_file_creates_fresh_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("events.json");
        let store = EventStore::load(&path, 10, 1_000).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.state().monitor_start_time, 1_000);
        assert!(path.exists());
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        let mut store = EventStore::load(&path, 10, 1_000).unwrap();
        store.merge_insert(vec![record("b"), record("a")]);
        store.set_cursor(Some("b".to_string()));
        store.touch(2_000);
        store.persist().unwrap();
        assert!(!temp_path(&path).exists());

        let reloaded = EventStore::load(&path, 10, 9_999).unwrap();
        assert_eq!(signatures(&reloaded), ["b", "a"]);
        assert_eq!(reloaded.state().last_signature.as_deref(), Some("b"));
        assert_eq!(reloaded.state().last_update, 2_000);
        assert_eq!(reloaded.state().monitor_start_time, 1_000);
        assert_eq!(reloaded.state().total_events, 2);
    }

    #[test]
    fn test_load_removes_duplicates_and_rewrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        let mut first = record("dup");
        first.id = "first".to_string();
        let mut second = record("dup");
        second.id = "second".to_string();
        let file = CacheFile {
            state: SyncState::fresh(5),
            events: vec![first, second, record("other")],
        };
        fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        let store = EventStore::load(&path, 10, 10).unwrap();
        assert_eq!(signatures(&store), ["dup", "other"]);
        assert_eq!(store.events()[0].id, "first");

        let on_disk = CacheFile::read(&path).unwrap();
        assert_eq!(on_disk.events.len(), 2);
    }

    #[test]
    fn test_load_quarantines_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        fs::write(&path, "{ not json").unwrap();

        let store = EventStore::load(&path, 10, 42).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.state().monitor_start_time, 42);
        let quarantined = quarantine_path(&path, 42);
        assert_eq!(fs::read_to_string(quarantined).unwrap(), "{ not json");
        assert!(CacheFile::read(&path).is_ok());
    }

    #[test]
    fn test_load_quarantines_non_utf8_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        let garbage = [0xff, 0xfe, b'{', 0x80];
        fs::write(&path, garbage).unwrap();

        let store = EventStore::load(&path, 10, 42).unwrap();
        assert!(store.is_empty());
        assert_eq!(fs::read(quarantine_path(&path, 42)).unwrap(), garbage);
        assert!(CacheFile::read(&path).is_ok());
    }

    #[test]
    fn test_load_drops_unreadable_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        let good = serde_json::to_value(record("good")).unwrap();
        let mut bad_type = serde_json::to_value(record("bad-type")).unwrap();
        bad_type["tradeType"] = serde_json::json!(2);
        let mut bad_amount = serde_json::to_value(record("bad-amount")).unwrap();
        bad_amount["amount"] = serde_json::json!("12x");
        let file = serde_json::json!({
            "lastUpdate": 5,
            "totalEvents": 3,
            "monitorStartTime": 1,
            "events": [bad_type, good, bad_amount],
        });
        fs::write(&path, file.to_string()).unwrap();

        let store = EventStore::load(&path, 10, 10).unwrap();
        assert_eq!(signatures(&store), ["good"]);
        assert_eq!(store.state().total_events, 3);
        assert!(!quarantine_path(&path, 10).exists());
        assert_eq!(CacheFile::read(&path).unwrap().events.len(), 1);
    }

    #[test]
    fn test_cache_file_field_names() {
        let mut store = EventStore::new("unused.json", 10, 7);
        store.merge_insert(vec![record("a")]);
        let value = serde_json::to_value(CacheFile {
            state: store.state().clone(),
            events: store.events().to_vec(),
        })
        .unwrap();
        assert_eq!(value["totalEvents"], 1);
        assert_eq!(value["monitorStartTime"], 7);
        assert_eq!(value["lastUpdate"], 7);
        assert!(value.get("lastSignature").is_none());
        assert_eq!(value["events"][0]["amount"], "1n");
    }
}
