#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use docshift::{
    Checkpoint, CheckpointStore, MemoryCheckpointStore, MigrateError, MigrateResult, MigrationDatabase,
    MigrationTransaction, StepFuture,
};

/// Everything the fake database observed, shared by all its handles.
#[derive(Debug, Default)]
pub struct Journal {
    /// Versions whose bodies ran, in order
    pub executed: Vec<String>,
    /// Writes that reached the database
    pub visible: Vec<String>,
    pub begun: usize,
    pub committed: usize,
    /// Transactions dropped without a commit
    pub released: usize,
    pub fail_begin: bool,
    pub fail_commit: bool,
}

/// In-process database that records what the engine asks of it.
#[derive(Debug, Clone, Default)]
pub struct FakeDatabase {
    journal: Arc<Mutex<Journal>>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }

    pub fn executed(&self) -> Vec<String> {
        self.journal().executed.clone()
    }

    pub fn visible(&self) -> Vec<String> {
        self.journal().visible.clone()
    }
}

/// Step handle. Writes made inside a transaction are staged until commit.
pub struct FakeContext {
    journal: Arc<Mutex<Journal>>,
    staged: Option<Vec<String>>,
}

impl FakeContext {
    pub fn record(&self, version: &str) {
        self.journal.lock().unwrap().executed.push(version.to_string());
    }

    pub fn write(&mut self, value: impl Into<String>) {
        match self.staged.as_mut() {
            Some(staged) => staged.push(value.into()),
            None => self.journal.lock().unwrap().visible.push(value.into()),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.staged.is_some()
    }
}

pub struct FakeTransaction {
    ctx: FakeContext,
    committed: bool,
}

impl MigrationDatabase for FakeDatabase {
    type Context = FakeContext;
    type Transaction = FakeTransaction;

    fn context(&self) -> FakeContext {
        FakeContext {
            journal: self.journal.clone(),
            staged: None,
        }
    }

    async fn begin(&self) -> MigrateResult<FakeTransaction> {
        let mut journal = self.journal();
        if journal.fail_begin {
            return Err(MigrateError::other("begin refused"));
        }
        journal.begun += 1;
        Ok(FakeTransaction {
            ctx: FakeContext {
                journal: self.journal.clone(),
                staged: Some(Vec::new()),
            },
            committed: false,
        })
    }
}

impl MigrationTransaction for FakeTransaction {
    type Context = FakeContext;

    fn context(&mut self) -> &mut FakeContext {
        &mut self.ctx
    }

    async fn commit(mut self) -> MigrateResult<()> {
        let mut journal = self.ctx.journal.lock().unwrap();
        if journal.fail_commit {
            return Err(MigrateError::other("commit refused"));
        }
        journal.visible.extend(self.ctx.staged.take().unwrap_or_default());
        journal.committed += 1;
        drop(journal);
        self.committed = true;
        Ok(())
    }
}

impl Drop for FakeTransaction {
    fn drop(&mut self) {
        if !self.committed {
            self.ctx.journal.lock().unwrap().released += 1;
        }
    }
}

/// Records its version and one write.
pub fn ok_step<'a>(ctx: &'a mut FakeContext, version: &'a str) -> StepFuture<'a> {
    Box::pin(async move {
        ctx.record(version);
        ctx.write(format!("write:{version}"));
        Ok(())
    })
}

/// Records its version and a partial write, then fails.
pub fn failing_step<'a>(ctx: &'a mut FakeContext, version: &'a str) -> StepFuture<'a> {
    Box::pin(async move {
        ctx.record(version);
        ctx.write(format!("partial:{version}"));
        Err(anyhow::anyhow!("step {version} exploded"))
    })
}

/// Memory store that can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryCheckpointStore,
    pub fail_fetch: bool,
    /// Fail saves that write this dirty flag
    pub fail_save_when_dirty: Option<bool>,
}

impl FlakyStore {
    pub fn new(inner: MemoryCheckpointStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }
}

impl CheckpointStore for FlakyStore {
    async fn fetch(&mut self) -> MigrateResult<Checkpoint> {
        if self.fail_fetch {
            return Err(MigrateError::other("checkpoint collection unreachable"));
        }
        self.inner.fetch().await
    }

    async fn save(&mut self, version: &str, dirty: bool) -> MigrateResult<()> {
        if self.fail_save_when_dirty == Some(dirty) {
            return Err(MigrateError::other("checkpoint write rejected"));
        }
        self.inner.save(version, dirty).await
    }
}
