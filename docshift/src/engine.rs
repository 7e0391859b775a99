//! Migration engine.
//!
//! A run sorts the registered steps, loads the checkpoint and then walks the
//! steps in version order:
//! - a dirty checkpoint blocks the run before any step executes
//! - steps at or below the checkpoint version are skipped
//! - every attempted step saves the checkpoint afterwards, clean on success
//!   and dirty on failure
//! - the first failure stops the run

use std::time::Instant;

use log::{error, info, warn};
use serde::Serialize;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::database::MigrationDatabase;
use crate::errors::{MigrateError, MigrateResult};
use crate::executor::execute_step;
use crate::registry::{Registry, StepFuture};

/// Result of [`Engine::run`].
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Every step was evaluated without failure.
    Completed(RunReport),
    /// The stored checkpoint is dirty; nothing was executed.
    Blocked(Checkpoint),
}

impl RunOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, RunOutcome::Blocked(_))
    }
}

/// Result of [`Engine::pending`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Versions a run would execute, in order.
    Pending(Vec<String>),
    Blocked(Checkpoint),
}

/// A step applied during a run.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedStep {
    pub version: String,
    pub transactional: bool,
    pub elapsed_ms: u64,
}

/// Statistics from a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Checkpoint version before the run
    pub starting_version: String,
    pub applied: Vec<AppliedStep>,
    /// Versions at or below the checkpoint
    pub skipped: Vec<String>,
    /// Checkpoint after the run
    pub checkpoint: Checkpoint,
    pub total_time_ms: u64,
}

impl RunReport {
    pub fn applied_versions(&self) -> Vec<&str> {
        self.applied.iter().map(|step| step.version.as_str()).collect()
    }
}

/// Runs registered steps against a database, tracking progress in a checkpoint store.
pub struct Engine<D, S>
where
    D: MigrationDatabase,
{
    db: D,
    store: S,
    registry: Registry<D::Context>,
}

impl<D, S> Engine<D, S>
where
    D: MigrationDatabase,
    S: CheckpointStore,
{
    pub fn new(db: D, store: S) -> Self {
        Self {
            db,
            store,
            registry: Registry::new(),
        }
    }

    /// Register a step. See [`Registry::register`] for the accepted versions.
    pub fn register<F>(&mut self, version: impl Into<String>, requires_transaction: bool, execute: F) -> MigrateResult<&mut Self>
    where
        F: for<'a> Fn(&'a mut D::Context, &'a str) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.registry.register(version, requires_transaction, execute)?;
        Ok(self)
    }

    pub fn registry(&self) -> &Registry<D::Context> {
        &self.registry
    }

    /// Versions a run would execute, without executing or writing anything.
    pub async fn pending(&mut self) -> MigrateResult<Plan> {
        let checkpoint = Self::load_checkpoint(&mut self.store).await?;
        if checkpoint.dirty {
            return Ok(Plan::Blocked(checkpoint));
        }

        let pending = self
            .registry
            .sorted()
            .into_iter()
            .filter(|step| checkpoint.is_pending(step.version()))
            .map(|step| step.version().to_string())
            .collect();
        Ok(Plan::Pending(pending))
    }

    /// Apply all pending steps.
    pub async fn run(&mut self) -> MigrateResult<RunOutcome> {
        let started = Instant::now();

        info!("sorting {} migration version(s)", self.registry.len());
        let steps = self.registry.sorted();

        let mut checkpoint = Self::load_checkpoint(&mut self.store).await?;

        if checkpoint.dirty {
            warn!(
                "dirty version {} found, resolve it and roll back to the previous version before migrating",
                checkpoint.version
            );
            return Ok(RunOutcome::Blocked(checkpoint));
        }

        if checkpoint.is_initial() {
            info!("no version found, running from the beginning");
        } else {
            info!("current version: {}", checkpoint.version);
        }

        let starting_version = checkpoint.version.clone();
        let mut applied = Vec::new();
        let mut skipped = Vec::new();

        for step in steps {
            let version = step.version();

            if !checkpoint.is_pending(version) {
                info!("version: {version} => skip");
                skipped.push(version.to_string());
                continue;
            }

            checkpoint.version = version.to_string();
            let step_started = Instant::now();

            if let Err(err) = execute_step(&self.db, step).await {
                error!("version: {version} => {}", err.report());

                if let Err(save_err) = self.store.save(version, true).await {
                    error!(
                        "error when updating current version to {version}, dirty: true, error: {}",
                        save_err.report()
                    );
                    return Err(MigrateError::DirtyMarkFailed {
                        step: Box::new(err),
                        store: Box::new(save_err),
                    });
                }
                return Err(err);
            }

            if let Err(save_err) = self.store.save(version, false).await {
                error!(
                    "error when updating current version to {version}, dirty: false, error: {}",
                    save_err.report()
                );
                return Err(MigrateError::CheckpointSave {
                    version: version.to_string(),
                    dirty: false,
                    source: Box::new(save_err),
                });
            }

            let elapsed_ms = step_started.elapsed().as_millis() as u64;
            info!("version: {version} => done ({elapsed_ms}ms)");
            applied.push(AppliedStep {
                version: version.to_string(),
                transactional: step.requires_transaction(),
                elapsed_ms,
            });
        }

        info!("done");
        Ok(RunOutcome::Completed(RunReport {
            starting_version,
            applied,
            skipped,
            checkpoint,
            total_time_ms: started.elapsed().as_millis() as u64,
        }))
    }

    async fn load_checkpoint(store: &mut S) -> MigrateResult<Checkpoint> {
        store.fetch().await.map_err(|err| {
            error!("error when getting current version: {}", err.report());
            MigrateError::CheckpointFetch { source: Box::new(err) }
        })
    }
}
