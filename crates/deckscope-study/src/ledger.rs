//! Grade ledger: per-user card grades with an offline-first local cache.
//!
//! Exactly one store is authoritative at a time. While anonymous, grades go to
//! the device-local cache; once an identity is known they go to the remote
//! grade repository. The anonymous-to-authenticated transition drains the
//! local cache into the remote store, one upsert per entry.
//!
//! Local storage failures never surface as errors: a failed read behaves as an
//! empty cache and a failed write is logged and not retried.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use deckscope_core::defaults::LOCAL_GRADES_KEY;
use deckscope_core::logging::{CARD_ID, COMPONENT, ERROR_MSG, OPERATION, SUBSYSTEM, USER_ID};
use deckscope_core::{Grade, GradeRepository, Identity, Result};

// =============================================================================
// LOCAL STORAGE
// =============================================================================

/// Durable key/value storage on the learner's device.
///
/// Writes replace the whole value for a key.
pub trait LocalStore: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> io::Result<()>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl LocalStore for FileStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)
    }
}

/// In-process store, with switches to simulate a broken device store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail_reads: Mutex<bool>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_reads.lock() {
            *flag = fail;
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }

    /// Raw stored value, for assertions.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().ok().and_then(|v| v.get(key).cloned())
    }

    fn poisoned() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "memory store lock poisoned")
    }
}

impl LocalStore for MemoryStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        if self.fail_reads.lock().map(|f| *f).unwrap_or(false) {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated read failure"));
        }
        let values = self.values.lock().map_err(|_| Self::poisoned())?;
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        if self.fail_writes.lock().map(|f| *f).unwrap_or(false) {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated quota exceeded"));
        }
        let mut values = self.values.lock().map_err(|_| Self::poisoned())?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// =============================================================================
// LOCAL GRADE CACHE
// =============================================================================

/// Anonymous grades keyed by card id only (one learner per device).
pub struct LocalGradeCache {
    store: Arc<dyn LocalStore>,
    entries: BTreeMap<Uuid, Grade>,
}

impl LocalGradeCache {
    /// Load the cache from `store`. Unreadable or malformed data yields an empty cache.
    pub fn load(store: Arc<dyn LocalStore>) -> Self {
        let entries = match store.read(LOCAL_GRADES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(
                    { SUBSYSTEM } = "ledger",
                    { COMPONENT } = "local_cache",
                    { ERROR_MSG } = %e,
                    "Local grade cache is malformed, starting empty"
                );
                BTreeMap::new()
            }),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!(
                    { SUBSYSTEM } = "ledger",
                    { COMPONENT } = "local_cache",
                    { ERROR_MSG } = %e,
                    "Local grade cache unreadable, starting empty"
                );
                BTreeMap::new()
            }
        };
        debug!(entries = entries.len(), "Local grade cache loaded");
        Self { store, entries }
    }

    pub fn get(&self, card_id: Uuid) -> Option<Grade> {
        self.entries.get(&card_id).copied()
    }

    pub fn entries(&self) -> &BTreeMap<Uuid, Grade> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a grade and persist the whole cache. Returns whether the write reached storage.
    pub fn record(&mut self, card_id: Uuid, grade: Grade) -> bool {
        self.entries.insert(card_id, grade);
        self.persist()
    }

    /// Drop the given entries and persist.
    pub fn remove_all(&mut self, card_ids: &[Uuid]) -> bool {
        for id in card_ids {
            self.entries.remove(id);
        }
        self.persist()
    }

    /// Write the current entries to storage, overwriting the stored value.
    pub fn persist(&self) -> bool {
        let raw = match serde_json::to_string(&self.entries) {
            Ok(raw) => raw,
            Err(e) => {
                warn!({ ERROR_MSG } = %e, "Failed to encode local grade cache");
                return false;
            }
        };
        match self.store.write(LOCAL_GRADES_KEY, &raw) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    { SUBSYSTEM } = "ledger",
                    { COMPONENT } = "local_cache",
                    { ERROR_MSG } = %e,
                    "Failed to persist local grade cache"
                );
                false
            }
        }
    }
}

// =============================================================================
// LEDGER
// =============================================================================

/// Where a grade write ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GradeOutcome {
    /// Upserted to the remote store.
    Synced,
    /// Remote upsert failed; the in-memory grade stands, nothing is queued.
    RemoteFailed { error: String },
    /// Written to the local cache and persisted.
    CachedLocally,
    /// Kept in the local cache in memory, but persisting it failed.
    CacheWriteFailed,
}

impl GradeOutcome {
    pub fn is_durable(&self) -> bool {
        matches!(self, GradeOutcome::Synced | GradeOutcome::CachedLocally)
    }
}

/// Result of draining the local cache after login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub written: usize,
    /// Entries whose upsert failed; they stay in the local cache.
    pub failed: Vec<Uuid>,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct GradeLedger {
    remote: Arc<dyn GradeRepository>,
    cache: LocalGradeCache,
}

impl GradeLedger {
    pub fn new(remote: Arc<dyn GradeRepository>, store: Arc<dyn LocalStore>) -> Self {
        Self {
            remote,
            cache: LocalGradeCache::load(store),
        }
    }

    pub fn local_cache(&self) -> &LocalGradeCache {
        &self.cache
    }

    /// Persist a grade to whichever store is authoritative for `identity`.
    pub async fn record(
        &mut self,
        identity: Option<&Identity>,
        card_id: Uuid,
        grade: Grade,
    ) -> GradeOutcome {
        match identity {
            Some(who) => match self.remote.upsert_grade(who.user_id, card_id, grade).await {
                Ok(()) => {
                    debug!({ USER_ID } = %who.user_id, { CARD_ID } = %card_id, grade = %grade, "Grade synced");
                    GradeOutcome::Synced
                }
                Err(e) => {
                    warn!(
                        { SUBSYSTEM } = "ledger",
                        { OPERATION } = "upsert_grade",
                        { USER_ID } = %who.user_id,
                        { CARD_ID } = %card_id,
                        { ERROR_MSG } = %e,
                        "Remote grade upsert failed, keeping local value"
                    );
                    GradeOutcome::RemoteFailed {
                        error: e.to_string(),
                    }
                }
            },
            None => {
                if self.cache.record(card_id, grade) {
                    GradeOutcome::CachedLocally
                } else {
                    GradeOutcome::CacheWriteFailed
                }
            }
        }
    }

    /// Write every cached grade to the remote store for `user_id`.
    ///
    /// Entries that were written leave the cache; failed ones stay for the next login.
    pub async fn drain(&mut self, user_id: Uuid) -> DrainReport {
        let pending: Vec<(Uuid, Grade)> = self
            .cache
            .entries()
            .iter()
            .map(|(id, g)| (*id, *g))
            .collect();
        if pending.is_empty() {
            debug!({ USER_ID } = %user_id, "Nothing to drain");
            // Overwrites a stored value that failed to load.
            self.cache.persist();
            return DrainReport::default();
        }

        let mut report = DrainReport::default();
        let mut written = Vec::with_capacity(pending.len());
        for (card_id, grade) in pending {
            match self.remote.upsert_grade(user_id, card_id, grade).await {
                Ok(()) => written.push(card_id),
                Err(e) => {
                    warn!(
                        { SUBSYSTEM } = "ledger",
                        { OPERATION } = "drain",
                        { CARD_ID } = %card_id,
                        { ERROR_MSG } = %e,
                        "Failed to drain cached grade, keeping it locally"
                    );
                    report.failed.push(card_id);
                }
            }
        }
        report.written = written.len();
        self.cache.remove_all(&written);

        info!(
            { SUBSYSTEM } = "ledger",
            { OPERATION } = "drain",
            { USER_ID } = %user_id,
            written = report.written,
            failed = report.failed.len(),
            "Local grade cache drained"
        );
        report
    }

    /// Grades to show for `identity`: remote rows when authenticated, the local cache otherwise.
    pub async fn hydrate(&self, identity: Option<&Identity>) -> Result<HashMap<Uuid, Grade>> {
        match identity {
            Some(who) => self.remote.fetch_user_grades(who.user_id).await,
            None => Ok(self
                .cache
                .entries()
                .iter()
                .map(|(id, g)| (*id, *g))
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckscope_core::{Error, GradeRepository};
    use std::sync::Mutex as StdMutex;

    /// Grade store that records upserts and fails for chosen cards.
    #[derive(Default)]
    struct RecordingGrades {
        rows: StdMutex<HashMap<(Uuid, Uuid), Grade>>,
        failing: StdMutex<Vec<Uuid>>,
    }

    #[async_trait::async_trait]
    impl GradeRepository for RecordingGrades {
        async fn fetch_user_grades(&self, user_id: Uuid) -> Result<HashMap<Uuid, Grade>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|((u, _), _)| *u == user_id)
                .map(|((_, c), g)| (*c, *g))
                .collect())
        }

        async fn upsert_grade(&self, user_id: Uuid, card_id: Uuid, grade: Grade) -> Result<()> {
            if self.failing.lock().unwrap().contains(&card_id) {
                return Err(Error::Remote("offline".to_string()));
            }
            self.rows.lock().unwrap().insert((user_id, card_id), grade);
            Ok(())
        }

        async fn delete_for_card(&self, _card_id: Uuid) -> Result<u64> {
            Ok(0)
        }
    }

    fn who() -> Identity {
        Identity::new(Uuid::new_v4(), None)
    }

    #[test]
    fn test_file_store_roundtrip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("cache"));
        assert_eq!(store.read("absent").unwrap(), None);
        store.write("k", "{\"a\":1}").unwrap();
        store.write("k", "{}").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_cache_survives_reload() {
        let store = Arc::new(MemoryStore::new());
        let card = Uuid::new_v4();
        let mut cache = LocalGradeCache::load(store.clone());
        assert!(cache.record(card, Grade::Hard));

        let reloaded = LocalGradeCache::load(store);
        assert_eq!(reloaded.get(card), Some(Grade::Hard));
    }

    #[test]
    fn test_unreadable_or_malformed_cache_is_empty() {
        let store = Arc::new(MemoryStore::new());
        store.write(LOCAL_GRADES_KEY, "not json").unwrap();
        assert!(LocalGradeCache::load(store.clone()).is_empty());

        store.set_fail_reads(true);
        assert!(LocalGradeCache::load(store).is_empty());
    }

    #[test]
    fn test_failed_write_keeps_entry_in_memory() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_writes(true);
        let mut cache = LocalGradeCache::load(store.clone());
        let card = Uuid::new_v4();

        assert!(!cache.record(card, Grade::Good));
        assert_eq!(cache.get(card), Some(Grade::Good));
        assert_eq!(store.raw(LOCAL_GRADES_KEY), None);
    }

    #[tokio::test]
    async fn test_record_routes_by_identity() {
        let remote = Arc::new(RecordingGrades::default());
        let store = Arc::new(MemoryStore::new());
        let mut ledger = GradeLedger::new(remote.clone(), store);
        let card = Uuid::new_v4();
        let user = who();

        assert_eq!(
            ledger.record(None, card, Grade::Hard).await,
            GradeOutcome::CachedLocally
        );
        assert_eq!(ledger.local_cache().get(card), Some(Grade::Hard));
        assert!(remote.rows.lock().unwrap().is_empty());

        assert_eq!(
            ledger.record(Some(&user), card, Grade::Easy).await,
            GradeOutcome::Synced
        );
        assert_eq!(
            remote.rows.lock().unwrap().get(&(user.user_id, card)),
            Some(&Grade::Easy)
        );
        // Authenticated writes never touch the local cache.
        assert_eq!(ledger.local_cache().get(card), Some(Grade::Hard));
    }

    #[tokio::test]
    async fn test_remote_failure_is_reported_not_queued() {
        let remote = Arc::new(RecordingGrades::default());
        let card = Uuid::new_v4();
        remote.failing.lock().unwrap().push(card);
        let mut ledger = GradeLedger::new(remote, Arc::new(MemoryStore::new()));

        let outcome = ledger.record(Some(&who()), card, Grade::Again).await;
        assert!(matches!(outcome, GradeOutcome::RemoteFailed { .. }));
        assert!(!outcome.is_durable());
        assert!(ledger.local_cache().is_empty());
    }

    #[tokio::test]
    async fn test_drain_moves_everything_and_persists_empty() {
        let remote = Arc::new(RecordingGrades::default());
        let store = Arc::new(MemoryStore::new());
        let mut ledger = GradeLedger::new(remote.clone(), store.clone());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        ledger.record(None, a, Grade::Hard).await;
        ledger.record(None, b, Grade::Easy).await;

        let user = who();
        let report = ledger.drain(user.user_id).await;
        assert_eq!(report.written, 2);
        assert!(report.is_complete());
        assert!(ledger.local_cache().is_empty());
        assert_eq!(store.raw(LOCAL_GRADES_KEY).as_deref(), Some("{}"));

        let remote_grades = ledger.hydrate(Some(&user)).await.unwrap();
        assert_eq!(remote_grades.get(&a), Some(&Grade::Hard));
        assert_eq!(remote_grades.get(&b), Some(&Grade::Easy));
    }

    #[tokio::test]
    async fn test_drain_keeps_failed_entries() {
        let remote = Arc::new(RecordingGrades::default());
        let store = Arc::new(MemoryStore::new());
        let mut ledger = GradeLedger::new(remote.clone(), store.clone());
        let (ok, bad) = (Uuid::new_v4(), Uuid::new_v4());
        ledger.record(None, ok, Grade::Good).await;
        ledger.record(None, bad, Grade::Again).await;
        remote.failing.lock().unwrap().push(bad);

        let report = ledger.drain(Uuid::new_v4()).await;
        assert_eq!(report.written, 1);
        assert_eq!(report.failed, vec![bad]);
        assert_eq!(ledger.local_cache().len(), 1);
        assert_eq!(
            LocalGradeCache::load(store).get(bad),
            Some(Grade::Again)
        );
    }

    #[tokio::test]
    async fn test_hydrate_anonymous_reads_cache() {
        let store = Arc::new(MemoryStore::new());
        let card = Uuid::new_v4();
        LocalGradeCache::load(store.clone()).record(card, Grade::Good);

        let ledger = GradeLedger::new(Arc::new(RecordingGrades::default()), store);
        let grades = ledger.hydrate(None).await.unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades.get(&card), Some(&Grade::Good));
    }

    #[tokio::test]
    async fn test_empty_drain_overwrites_malformed_cache() {
        let store = Arc::new(MemoryStore::new());
        store.write(LOCAL_GRADES_KEY, "not json").unwrap();
        let remote = Arc::new(RecordingGrades::default());
        let mut ledger = GradeLedger::new(remote.clone(), store.clone());
        assert!(ledger.local_cache().is_empty());

        let report = ledger.drain(Uuid::new_v4()).await;
        assert_eq!(report, DrainReport::default());
        assert_eq!(store.raw(LOCAL_GRADES_KEY).as_deref(), Some("{}"));
        assert!(remote.rows.lock().unwrap().is_empty());
    }
}
