//! Migration checkpoint persistence.
//!
//! The checkpoint is a single record holding the highest version reached and a
//! dirty flag. Stores replace the whole record on every save; there is never
//! more than one record.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

use crate::errors::{MigrateError, MigrateResult};
use crate::keys::KeyContext;

/// Version reported for a database that has never been migrated.
///
/// Sorts before every non-empty version string made of digits or letters.
pub const INITIAL_VERSION: &str = "0";

/// In-memory view of the migration checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub version: String,
    pub dirty: bool,
}

impl Checkpoint {
    pub fn new(version: impl Into<String>, dirty: bool) -> Self {
        Self {
            version: version.into(),
            dirty,
        }
    }

    /// Checkpoint of a database with no stored record.
    pub fn initial() -> Self {
        Self::new(INITIAL_VERSION, false)
    }

    pub fn clean(version: impl Into<String>) -> Self {
        Self::new(version, false)
    }

    pub fn dirty(version: impl Into<String>) -> Self {
        Self::new(version, true)
    }

    pub fn is_initial(&self) -> bool {
        self.version == INITIAL_VERSION && !self.dirty
    }

    /// Whether a step registered at `version` still has to run.
    ///
    /// Plain string ordering; equal versions count as applied.
    pub fn is_pending(&self, version: &str) -> bool {
        version > self.version.as_str()
    }
}

/// Stored form of the checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub current_version: String,
    pub dirty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CheckpointRecord {
    pub fn new(checkpoint: &Checkpoint) -> Self {
        Self {
            id: nanoid::nanoid!(),
            current_version: checkpoint.version.clone(),
            dirty: checkpoint.dirty,
            updated_at: Some(Utc::now()),
        }
    }
}

impl From<CheckpointRecord> for Checkpoint {
    fn from(record: CheckpointRecord) -> Self {
        Checkpoint::new(record.current_version, record.dirty)
    }
}

/// Durable home of the migration checkpoint.
#[allow(async_fn_in_trait)]
pub trait CheckpointStore {
    /// Load the checkpoint, or [`Checkpoint::initial`] when nothing is stored.
    async fn fetch(&mut self) -> MigrateResult<Checkpoint>;

    /// Replace the stored record set with exactly one record.
    async fn save(&mut self, version: &str, dirty: bool) -> MigrateResult<()>;
}

/// Checkpoint stored as a RedisJSON document under `<prefix>:_migration`.
pub struct RedisCheckpointStore {
    conn: ConnectionManager,
    key: String,
}

impl RedisCheckpointStore {
    pub fn new(conn: ConnectionManager, prefix: &str) -> Self {
        Self {
            conn,
            key: KeyContext::new(prefix).checkpoint(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl CheckpointStore for RedisCheckpointStore {
    async fn fetch(&mut self) -> MigrateResult<Checkpoint> {
        let raw: Option<String> = redis::cmd("JSON.GET")
            .arg(&self.key)
            .arg("$")
            .query_async(&mut self.conn)
            .await?;

        decode_stored(raw.as_deref())
    }

    async fn save(&mut self, version: &str, dirty: bool) -> MigrateResult<()> {
        ensure_storable(version)?;
        let record = CheckpointRecord::new(&Checkpoint::new(version, dirty));
        let payload = serde_json::to_string(&record)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("DEL")
            .arg(&self.key)
            .ignore()
            .cmd("JSON.SET")
            .arg(&self.key)
            .arg("$")
            .arg(payload)
            .ignore();
        let _: () = pipe.query_async(&mut self.conn).await?;

        Ok(())
    }
}

/// Version check shared by every store.
fn ensure_storable(version: &str) -> MigrateResult<()> {
    if version.is_empty() {
        return Err(MigrateError::InvalidVersion {
            version: version.to_string(),
            reason: "checkpoint version must not be empty",
        });
    }
    Ok(())
}

/// Decode a `JSON.GET key $` reply into a checkpoint.
fn decode_stored(raw: Option<&str>) -> MigrateResult<Checkpoint> {
    let Some(raw) = raw else {
        return Ok(Checkpoint::initial());
    };

    // A `$` path returns an array of matches.
    let records: Vec<CheckpointRecord> = serde_json::from_str(raw)?;
    Ok(records
        .into_iter()
        .next()
        .map(Checkpoint::from)
        .unwrap_or_else(Checkpoint::initial))
}

/// Process-local checkpoint store.
///
/// Clones share state, so a caller can keep a handle while the engine owns
/// another one. Every save is also appended to a history for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    current: Option<Checkpoint>,
    history: Vec<Checkpoint>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a record, as if a previous run had saved it.
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        let store = Self::new();
        store.state().current = Some(checkpoint);
        store
    }

    /// The stored record, `None` when nothing was ever saved.
    pub fn current(&self) -> Option<Checkpoint> {
        self.state().current.clone()
    }

    /// Every checkpoint saved through this store, oldest first.
    pub fn history(&self) -> Vec<Checkpoint> {
        self.state().history.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn fetch(&mut self) -> MigrateResult<Checkpoint> {
        Ok(self.current().unwrap_or_else(Checkpoint::initial))
    }

    async fn save(&mut self, version: &str, dirty: bool) -> MigrateResult<()> {
        ensure_storable(version)?;
        let checkpoint = Checkpoint::new(version, dirty);
        let mut state = self.state();
        state.current = Some(checkpoint.clone());
        state.history.push(checkpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_checkpoint_sorts_before_real_versions() {
        let initial = Checkpoint::initial();
        assert!(initial.is_initial());
        assert!(initial.is_pending("1"));
        assert!(initial.is_pending("0001"));
        assert!(initial.is_pending("20240101_init"));
        assert!(!initial.is_pending("0"));
    }

    #[test]
    fn equal_versions_count_as_applied() {
        let checkpoint = Checkpoint::clean("0003");
        assert!(!checkpoint.is_pending("0003"));
        assert!(!checkpoint.is_pending("0002"));
        assert!(checkpoint.is_pending("0004"));
    }

    #[test]
    fn string_ordering_is_not_numeric() {
        let checkpoint = Checkpoint::clean("2");
        assert!(!checkpoint.is_pending("10"));
    }

    #[test]
    fn decodes_missing_record_as_initial() {
        assert_eq!(decode_stored(None).unwrap(), Checkpoint::initial());
        assert_eq!(decode_stored(Some("[]")).unwrap(), Checkpoint::initial());
    }

    #[test]
    fn decodes_stored_record() {
        let raw = r#"[{"_id":"abc","current_version":"0004","dirty":true,"updated_at":"2024-01-01T00:00:00Z"}]"#;
        assert_eq!(decode_stored(Some(raw)).unwrap(), Checkpoint::dirty("0004"));
    }

    #[test]
    fn decodes_record_without_timestamp() {
        let raw = r#"[{"_id":"abc","current_version":"7","dirty":false}]"#;
        assert_eq!(decode_stored(Some(raw)).unwrap(), Checkpoint::clean("7"));
    }

    #[test]
    fn rejects_malformed_record() {
        let err = decode_stored(Some(r#"[{"current_version":5}]"#)).unwrap_err();
        assert!(matches!(err, MigrateError::Codec(_)));
    }

    #[test]
    fn record_uses_underscore_id_field() {
        let record = CheckpointRecord::new(&Checkpoint::clean("0001"));
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("_id").and_then(|v| v.as_str()).is_some_and(|id| !id.is_empty()));
        assert_eq!(json["current_version"], "0001");
        assert_eq!(json["dirty"], false);
    }

    #[tokio::test]
    async fn memory_store_keeps_a_single_record() {
        let mut store = MemoryCheckpointStore::new();
        assert_eq!(store.fetch().await.unwrap(), Checkpoint::initial());
        assert!(store.current().is_none());

        store.save("0001", false).await.unwrap();
        store.save("0002", true).await.unwrap();

        assert_eq!(store.fetch().await.unwrap(), Checkpoint::dirty("0002"));
        assert_eq!(store.history(), vec![Checkpoint::clean("0001"), Checkpoint::dirty("0002")]);
    }

    #[test]
    fn empty_version_is_not_storable() {
        assert!(matches!(ensure_storable(""), Err(MigrateError::InvalidVersion { .. })));
        assert!(ensure_storable("0").is_ok());
        assert!(ensure_storable("0001").is_ok());
    }

    #[tokio::test]
    async fn memory_store_rejects_empty_version() {
        let mut store = MemoryCheckpointStore::with_checkpoint(Checkpoint::clean("0001"));
        let err = store.save("", false).await.unwrap_err();

        assert!(matches!(err, MigrateError::InvalidVersion { .. }));
        assert_eq!(store.current(), Some(Checkpoint::clean("0001")));
        assert!(store.history().is_empty());
    }

    #[tokio::test]
    async fn memory_store_clones_share_state() {
        let observer = MemoryCheckpointStore::with_checkpoint(Checkpoint::clean("0001"));
        let mut writer = observer.clone();
        writer.save("0002", false).await.unwrap();
        assert_eq!(observer.current(), Some(Checkpoint::clean("0002")));
    }
}
