//! Example migration set run by `docshift demo`.
//!
//! Seeds a `users` collection, backfills a field in batches inside a
//! transaction and records the batch layout, exercising both step flavours.

use serde_json::json;

use crate::batch::{batch_windows, for_each_batch};
use crate::checkpoint::CheckpointStore;
use crate::database::{MigrationContext, RedisDatabase};
use crate::engine::Engine;
use crate::errors::MigrateResult;
use crate::registry::StepFuture;

pub const SETTINGS_COLLECTION: &str = "settings";
pub const USERS_COLLECTION: &str = "users";
pub const SEEDED_USERS: usize = 95;
pub const BATCH_SIZE: usize = 10;

/// Register the demo steps on `engine`.
pub fn register_demo<S>(engine: &mut Engine<RedisDatabase, S>) -> MigrateResult<()>
where
    S: CheckpointStore,
{
    engine
        .register("0001", true, create_settings)?
        .register("0002", false, seed_users)?
        .register("0003", true, backfill_status)?
        .register("0004", false, record_batches)?;
    Ok(())
}

fn create_settings<'a>(ctx: &'a mut MigrationContext, version: &'a str) -> StepFuture<'a> {
    Box::pin(async move {
        let key = ctx.keys().document(SETTINGS_COLLECTION, "app");
        ctx.set_document(&key, &json!({ "id": "app", "maintenance": false, "created_by": version }))
            .await?;
        Ok(())
    })
}

fn seed_users<'a>(ctx: &'a mut MigrationContext, _version: &'a str) -> StepFuture<'a> {
    Box::pin(async move {
        if ctx.count_documents(USERS_COLLECTION).await? > 0 {
            return Ok(());
        }
        for index in 0..SEEDED_USERS {
            let id = format!("user_{index:03}");
            let key = ctx.keys().document(USERS_COLLECTION, &id);
            ctx.set_document(&key, &json!({ "id": id, "name": format!("User {index}") }))
                .await?;
        }
        Ok(())
    })
}

fn backfill_status<'a>(ctx: &'a mut MigrationContext, _version: &'a str) -> StepFuture<'a> {
    Box::pin(async move {
        let total = ctx.count_documents(USERS_COLLECTION).await?;
        for window in batch_windows(total, BATCH_SIZE) {
            let documents = ctx
                .scan_documents(USERS_COLLECTION, window.skip, window.limit)
                .await?;
            for document in documents {
                if document.data.get("status").is_none() {
                    ctx.set_field(&document.key, "$.status", &json!("active")).await?;
                }
            }
        }
        Ok(())
    })
}

fn record_batches<'a>(ctx: &'a mut MigrationContext, _version: &'a str) -> StepFuture<'a> {
    Box::pin(async move {
        let total = ctx.count_documents(USERS_COLLECTION).await?;
        let mut windows = Vec::new();
        for_each_batch::<anyhow::Error, _>(total, BATCH_SIZE, |skip, limit| {
            windows.push(json!({ "skip": skip, "limit": limit }));
            Ok(())
        })?;

        let key = ctx.keys().document(SETTINGS_COLLECTION, "user_batches");
        ctx.set_document(&key, &json!({ "id": "user_batches", "total": total, "windows": windows }))
            .await?;
        Ok(())
    })
}
