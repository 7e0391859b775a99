use log::debug;

use crate::database::{MigrationDatabase, MigrationTransaction};
use crate::errors::{MigrateError, MigrateResult};
use crate::registry::MigrationStep;

/// Run one step, inside a transaction when the step asks for one.
///
/// A transactional step is committed only when its body succeeds. On failure
/// the transaction is dropped uncommitted, which discards its work.
pub async fn execute_step<D>(db: &D, step: &MigrationStep<D::Context>) -> MigrateResult<()>
where
    D: MigrationDatabase,
{
    let version = step.version();

    if !step.requires_transaction() {
        let mut ctx = db.context();
        return step.run(&mut ctx).await.map_err(|source| MigrateError::Step {
            version: version.to_string(),
            source,
        });
    }

    let mut transaction = db.begin().await.map_err(|source| MigrateError::Begin {
        version: version.to_string(),
        source: Box::new(source),
    })?;

    step.run(transaction.context()).await.map_err(|source| MigrateError::Step {
        version: version.to_string(),
        source,
    })?;

    debug!("committing migration {version}");
    transaction.commit().await.map_err(|source| MigrateError::Commit {
        version: version.to_string(),
        source: Box::new(source),
    })
}
