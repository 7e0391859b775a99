//! Database collaborator used by the migration engine.
//!
//! The engine only needs two capabilities from a database:
//! - a plain context for steps that run without a transaction
//! - a transaction scoped to one step, committed explicitly and discarded when
//!   dropped uncommitted
//!
//! [`RedisDatabase`] provides both on top of a Redis connection manager, with
//! `MULTI`/`EXEC` blocks as transactions.

mod context;

pub use context::{DocumentInfo, MigrationContext};

use log::debug;
use redis::aio::ConnectionManager;

use crate::checkpoint::RedisCheckpointStore;
use crate::errors::MigrateResult;

/// Capability the engine needs from a database.
#[allow(async_fn_in_trait)]
pub trait MigrationDatabase {
    /// Handle passed to step bodies.
    type Context: Send;
    type Transaction: MigrationTransaction<Context = Self::Context>;

    /// Context for a step that runs outside a transaction.
    fn context(&self) -> Self::Context;

    /// Open a transaction for a single step.
    async fn begin(&self) -> MigrateResult<Self::Transaction>;
}

/// A transaction scoped to one step.
///
/// Work done through [`MigrationTransaction::context`] becomes visible only
/// after [`MigrationTransaction::commit`]. Dropping the value without
/// committing abandons the work and releases the transaction.
#[allow(async_fn_in_trait)]
pub trait MigrationTransaction {
    type Context: Send;

    fn context(&mut self) -> &mut Self::Context;

    async fn commit(self) -> MigrateResult<()>;
}

/// Redis-backed migration database.
#[derive(Clone)]
pub struct RedisDatabase {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisDatabase {
    /// Connect to Redis at `url`; keys are namespaced under `prefix`.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> MigrateResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, prefix))
    }

    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Checkpoint store living in the same Redis namespace.
    pub fn checkpoint_store(&self) -> RedisCheckpointStore {
        RedisCheckpointStore::new(self.conn.clone(), &self.prefix)
    }
}

impl MigrationDatabase for RedisDatabase {
    type Context = MigrationContext;
    type Transaction = RedisTransaction;

    fn context(&self) -> MigrationContext {
        MigrationContext::new(self.conn.clone(), self.prefix.clone())
    }

    async fn begin(&self) -> MigrateResult<RedisTransaction> {
        debug!("opening transaction");
        Ok(RedisTransaction {
            ctx: MigrationContext::transactional(self.conn.clone(), self.prefix.clone()),
            committed: false,
        })
    }
}

/// Writes queued in a `MULTI`/`EXEC` block, sent on commit.
pub struct RedisTransaction {
    ctx: MigrationContext,
    committed: bool,
}

impl MigrationTransaction for RedisTransaction {
    type Context = MigrationContext;

    fn context(&mut self) -> &mut MigrationContext {
        &mut self.ctx
    }

    async fn commit(mut self) -> MigrateResult<()> {
        let queued = self.ctx.queued_writes();
        if let Some(pipe) = self.ctx.take_transaction()
            && queued > 0
        {
            let _: () = pipe.query_async(self.ctx.conn()).await?;
        }
        self.committed = true;
        debug!("committed transaction ({queued} write(s))");
        Ok(())
    }
}

impl Drop for RedisTransaction {
    fn drop(&mut self) {
        if !self.committed {
            debug!(
                "discarding uncommitted transaction ({} queued write(s))",
                self.ctx.queued_writes()
            );
        }
    }
}
