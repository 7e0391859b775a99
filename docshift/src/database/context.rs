//! Step context providing Redis access during migration execution.

use redis::aio::ConnectionManager;
use redis::{Cmd, Pipeline};
use serde_json::Value;

use crate::errors::MigrateResult;
use crate::keys::{KeyContext, document_id_from_key};

const SCAN_COUNT: usize = 500;

/// Context handed to migration steps.
///
/// Reads always go straight to Redis. Writes go straight to Redis too, unless
/// the context belongs to a transaction: then they are queued and sent as one
/// `MULTI`/`EXEC` block on commit, so reads inside a transactional step do not
/// observe the step's own pending writes.
pub struct MigrationContext {
    conn: ConnectionManager,
    prefix: String,
    transaction: Option<Pipeline>,
    queued: usize,
}

impl MigrationContext {
    pub(super) fn new(conn: ConnectionManager, prefix: String) -> Self {
        Self {
            conn,
            prefix,
            transaction: None,
            queued: 0,
        }
    }

    pub(super) fn transactional(conn: ConnectionManager, prefix: String) -> Self {
        let mut pipe = redis::pipe();
        pipe.atomic();
        Self {
            transaction: Some(pipe),
            ..Self::new(conn, prefix)
        }
    }

    pub(super) fn take_transaction(&mut self) -> Option<Pipeline> {
        self.transaction.take()
    }

    /// Raw connection, for commands the helpers below do not cover.
    ///
    /// Commands issued here bypass the transaction.
    pub fn conn(&mut self) -> &mut ConnectionManager {
        &mut self.conn
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.prefix)
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Writes waiting for commit.
    pub fn queued_writes(&self) -> usize {
        self.queued
    }

    /// All document keys of a collection, sorted.
    pub async fn document_keys(&mut self, collection: &str) -> MigrateResult<Vec<String>> {
        let pattern = self.keys().collection_pattern(collection);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut self.conn)
                .await?;
            keys.extend(batch);

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    pub async fn count_documents(&mut self, collection: &str) -> MigrateResult<usize> {
        Ok(self.document_keys(collection).await?.len())
    }

    pub async fn get_document(&mut self, key: &str) -> MigrateResult<Option<Value>> {
        let raw: Option<String> = redis::cmd("JSON.GET")
            .arg(key)
            .arg("$")
            .query_async(&mut self.conn)
            .await?;

        match raw {
            Some(json_str) => {
                // `$` returns an array of matches
                let values: Vec<Value> = serde_json::from_str(&json_str)?;
                Ok(values.into_iter().next())
            }
            None => Ok(None),
        }
    }

    /// One page of a collection, in key order.
    ///
    /// The window is clamped to the documents that exist, so an oversized last
    /// batch window returns only the remainder.
    pub async fn scan_documents(
        &mut self,
        collection: &str,
        skip: usize,
        limit: usize,
    ) -> MigrateResult<Vec<DocumentInfo>> {
        let keys = self.document_keys(collection).await?;
        let start = skip.min(keys.len());
        let end = skip.saturating_add(limit).min(keys.len());

        let mut documents = Vec::with_capacity(end - start);
        for key in &keys[start..end] {
            if let Some(data) = self.get_document(key).await? {
                documents.push(DocumentInfo {
                    id: document_id_from_key(key).to_string(),
                    key: key.clone(),
                    data,
                });
            }
        }
        Ok(documents)
    }

    /// Replace a whole document.
    pub async fn set_document(&mut self, key: &str, data: &Value) -> MigrateResult<()> {
        let json_str = serde_json::to_string(data)?;
        let mut cmd = redis::cmd("JSON.SET");
        cmd.arg(key).arg("$").arg(json_str);
        self.write(cmd).await
    }

    /// Set one JSON path (for example `$.status`) inside an existing document.
    pub async fn set_field(&mut self, key: &str, path: &str, value: &Value) -> MigrateResult<()> {
        let json_str = serde_json::to_string(value)?;
        let mut cmd = redis::cmd("JSON.SET");
        cmd.arg(key).arg(path).arg(json_str);
        self.write(cmd).await
    }

    pub async fn delete_document(&mut self, key: &str) -> MigrateResult<()> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        self.write(cmd).await
    }

    async fn write(&mut self, cmd: Cmd) -> MigrateResult<()> {
        match self.transaction.as_mut() {
            Some(pipe) => {
                pipe.add_command(cmd).ignore();
                self.queued += 1;
            }
            None => {
                let _: () = cmd.query_async(&mut self.conn).await?;
            }
        }
        Ok(())
    }
}

/// A document read during migration.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    /// Full Redis key
    pub key: String,
    /// Document ID extracted from key
    pub id: String,
    pub data: Value,
}
