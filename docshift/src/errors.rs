use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by docshift.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A stored checkpoint could not be encoded or decoded.
    #[error("checkpoint codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Two steps were registered under the same version.
    #[error("migration version {version:?} is already registered")]
    DuplicateVersion { version: String },

    /// A step was registered with an unusable version string.
    #[error("invalid migration version {version:?}: {reason}")]
    InvalidVersion { version: String, reason: &'static str },

    /// The checkpoint could not be loaded, so no step was attempted.
    #[error("failed to load migration checkpoint")]
    CheckpointFetch {
        #[source]
        source: Box<MigrateError>,
    },

    /// The checkpoint could not be written after a step finished.
    #[error("failed to save checkpoint (version {version:?}, dirty {dirty})")]
    CheckpointSave {
        version: String,
        dirty: bool,
        #[source]
        source: Box<MigrateError>,
    },

    /// A migration step returned an error.
    #[error("migration {version:?} failed")]
    Step {
        version: String,
        #[source]
        source: anyhow::Error,
    },

    /// A transaction could not be opened for a migration step.
    #[error("migration {version:?} could not start a transaction")]
    Begin {
        version: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// The transaction wrapping a migration step failed to commit.
    #[error("migration {version:?} failed to commit")]
    Commit {
        version: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// A step failed and the checkpoint could not be marked dirty afterwards.
    ///
    /// The step failure is the source; the store failure is kept alongside.
    #[error("checkpoint could not be marked dirty after a failed step ({store})")]
    DirtyMarkFailed {
        #[source]
        step: Box<MigrateError>,
        store: Box<MigrateError>,
    },

    /// A recovery action was requested for a clean checkpoint.
    #[error("checkpoint at version {version:?} is not dirty; nothing to resolve")]
    NotDirty { version: String },

    /// A rollback target that does not precede the dirty version.
    #[error("cannot roll back to {target:?}: it does not sort before dirty version {dirty_version:?}")]
    InvalidRollbackTarget { target: String, dirty_version: String },

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl MigrateError {
    pub fn other(message: impl Into<Cow<'static, str>>) -> Self {
        MigrateError::Other { message: message.into() }
    }

    /// Version of the step this error is attributed to, if any.
    pub fn version(&self) -> Option<&str> {
        match self {
            MigrateError::Step { version, .. }
            | MigrateError::Begin { version, .. }
            | MigrateError::Commit { version, .. }
            | MigrateError::CheckpointSave { version, .. } => Some(version),
            MigrateError::DirtyMarkFailed { step, .. } => step.version(),
            _ => None,
        }
    }

    /// This error and all of its causes, joined with `: `.
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = std::error::Error::source(err);
        }
        message
    }
}

pub type MigrateResult<T> = Result<T, MigrateError>;
