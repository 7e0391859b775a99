//! Operator actions for a dirty checkpoint.
//!
//! A failed step leaves the checkpoint at its version with `dirty = true`, and
//! the engine refuses to run until someone decides what happened to that
//! step's partial changes.

use log::info;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::errors::{MigrateError, MigrateResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The dirty step's changes were completed by hand; keep its version.
    Applied,
    /// The dirty step's changes were undone; move the checkpoint back to `to`.
    RolledBack { to: String },
}

/// Clear the dirty flag according to `resolution` and return the new checkpoint.
pub async fn resolve<S>(store: &mut S, resolution: Resolution) -> MigrateResult<Checkpoint>
where
    S: CheckpointStore,
{
    let current = store.fetch().await?;
    if !current.dirty {
        return Err(MigrateError::NotDirty {
            version: current.version,
        });
    }

    let resolved = match resolution {
        Resolution::Applied => Checkpoint::clean(current.version),
        Resolution::RolledBack { to } => {
            if to.is_empty() {
                return Err(MigrateError::InvalidVersion {
                    version: to,
                    reason: "rollback target must not be empty",
                });
            }
            if to >= current.version {
                return Err(MigrateError::InvalidRollbackTarget {
                    target: to,
                    dirty_version: current.version,
                });
            }
            Checkpoint::clean(to)
        }
    };

    store.save(&resolved.version, false).await?;
    info!("checkpoint resolved to version {}", resolved.version);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;

    #[tokio::test]
    async fn applied_keeps_version_and_clears_dirty() {
        let mut store = MemoryCheckpointStore::with_checkpoint(Checkpoint::dirty("0003"));
        let resolved = resolve(&mut store, Resolution::Applied).await.unwrap();

        assert_eq!(resolved, Checkpoint::clean("0003"));
        assert_eq!(store.current(), Some(Checkpoint::clean("0003")));
    }

    #[tokio::test]
    async fn rolled_back_moves_to_earlier_version() {
        let mut store = MemoryCheckpointStore::with_checkpoint(Checkpoint::dirty("0003"));
        let resolved = resolve(&mut store, Resolution::RolledBack { to: "0002".into() })
            .await
            .unwrap();

        assert_eq!(resolved, Checkpoint::clean("0002"));
        assert_eq!(store.current(), Some(Checkpoint::clean("0002")));
    }

    #[tokio::test]
    async fn rolled_back_to_initial_version_is_allowed() {
        let mut store = MemoryCheckpointStore::with_checkpoint(Checkpoint::dirty("0001"));
        let resolved = resolve(&mut store, Resolution::RolledBack { to: "0".into() })
            .await
            .unwrap();
        assert!(resolved.is_initial());
    }

    #[tokio::test]
    async fn refuses_to_roll_forward() {
        let mut store = MemoryCheckpointStore::with_checkpoint(Checkpoint::dirty("0003"));
        let err = resolve(&mut store, Resolution::RolledBack { to: "0003".into() })
            .await
            .unwrap_err();

        assert!(matches!(err, MigrateError::InvalidRollbackTarget { .. }));
        assert_eq!(store.current(), Some(Checkpoint::dirty("0003")));
        assert!(store.history().is_empty());
    }

    #[tokio::test]
    async fn refuses_clean_checkpoint() {
        let mut store = MemoryCheckpointStore::with_checkpoint(Checkpoint::clean("0003"));
        let err = resolve(&mut store, Resolution::Applied).await.unwrap_err();
        assert!(matches!(err, MigrateError::NotDirty { ref version } if version == "0003"));
    }

    #[tokio::test]
    async fn refuses_empty_store() {
        let mut store = MemoryCheckpointStore::new();
        let err = resolve(&mut store, Resolution::Applied).await.unwrap_err();
        assert!(matches!(err, MigrateError::NotDirty { .. }));
    }
}
