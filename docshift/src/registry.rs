//! Registered migration steps.
//!
//! Steps are ordered by plain string comparison of their versions, so version
//! strings must sort the way they are meant to run. Zero-padded numbers
//! (`0001`, `0002`, ...) or timestamp prefixes (`20240101_120000_init`) both
//! work; bare numbers of different widths (`2` and `10`) do not.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use log::warn;

use crate::checkpoint::INITIAL_VERSION;
use crate::errors::{MigrateError, MigrateResult};

/// Owned, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Future returned by a migration step.
pub type StepFuture<'a> = BoxFuture<'a, anyhow::Result<()>>;

type StepFn<C> = Box<dyn for<'a> Fn(&'a mut C, &'a str) -> StepFuture<'a> + Send + Sync>;

/// One versioned unit of database change logic.
pub struct MigrationStep<C> {
    version: String,
    requires_transaction: bool,
    execute: StepFn<C>,
}

impl<C> MigrationStep<C> {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn requires_transaction(&self) -> bool {
        self.requires_transaction
    }

    /// Invoke the step body against `ctx`.
    pub fn run<'a>(&'a self, ctx: &'a mut C) -> StepFuture<'a> {
        (self.execute)(ctx, &self.version)
    }
}

impl<C> fmt::Debug for MigrationStep<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .field("requires_transaction", &self.requires_transaction)
            .finish_non_exhaustive()
    }
}

/// Steps registered for one engine, kept in registration order.
pub struct Registry<C> {
    steps: Vec<MigrationStep<C>>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<C> fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.steps).finish()
    }
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step.
    ///
    /// Rejects empty versions, versions that do not sort after the initial
    /// version `"0"` (they could never run), and versions already registered.
    pub fn register<F>(&mut self, version: impl Into<String>, requires_transaction: bool, execute: F) -> MigrateResult<()>
    where
        F: for<'a> Fn(&'a mut C, &'a str) -> StepFuture<'a> + Send + Sync + 'static,
    {
        let version = version.into();

        if version.is_empty() {
            return Err(MigrateError::InvalidVersion {
                version,
                reason: "version must not be empty",
            });
        }
        if version.as_str() <= INITIAL_VERSION {
            return Err(MigrateError::InvalidVersion {
                version,
                reason: "version must sort after the initial version \"0\"",
            });
        }
        if self.steps.iter().any(|step| step.version == version) {
            return Err(MigrateError::DuplicateVersion { version });
        }

        if is_numeric(&version)
            && let Some(other) = self
                .steps
                .iter()
                .find(|step| is_numeric(&step.version) && step.version.len() != version.len())
        {
            warn!(
                "migration versions {:?} and {:?} are numeric with different widths; \
                 they run in string order, not numeric order",
                other.version, version
            );
        }

        self.steps.push(MigrationStep {
            version,
            requires_transaction,
            execute: Box::new(execute),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Versions in registration order.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|step| step.version.as_str())
    }

    /// Steps in ascending version order.
    pub fn sorted(&self) -> Vec<&MigrationStep<C>> {
        let mut steps: Vec<_> = self.steps.iter().collect();
        steps.sort_by(|a, b| a.version.cmp(&b.version));
        steps
    }
}

fn is_numeric(version: &str) -> bool {
    !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit())
}
