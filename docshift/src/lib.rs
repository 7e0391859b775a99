//! docshift core library.
//!
//! Versioned, checkpointed migrations for Redis document stores: register
//! steps on an [`Engine`], then [`Engine::run`] applies the pending ones in
//! version order exactly once.

pub mod batch;
pub mod checkpoint;
pub mod database;
pub mod demo;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod keys;
pub mod recovery;
pub mod registry;

pub use batch::{BatchWindow, batch_windows, for_each_batch};
pub use checkpoint::{Checkpoint, CheckpointStore, INITIAL_VERSION, MemoryCheckpointStore, RedisCheckpointStore};
pub use database::{MigrationContext, MigrationDatabase, MigrationTransaction, RedisDatabase, RedisTransaction};
pub use engine::{AppliedStep, Engine, Plan, RunOutcome, RunReport};
pub use errors::*;
pub use recovery::{Resolution, resolve};
pub use registry::{BoxFuture, MigrationStep, Registry, StepFuture};

// Re-export redis types so users don't need to depend on a specific redis version
pub use redis;
pub use redis::aio::ConnectionManager;

