//! Runs pending migrations inside one transaction, compensating on failure.

use super::registry::{Migration, MigrationRegistry};
use super::store::{DataStore, StoreTransaction};
use crate::error::{UpdateError, UpdateFailure};
use crate::status::Status;
use crate::version::Version;

/// Executes the migrations of a [`MigrationRegistry`] newer than a floor
/// version.
///
/// All SQL runs in a single transaction. When a migration fails, the
/// transaction is rolled back and the down callbacks of the migrations that
/// already succeeded run newest first.
#[derive(Debug, Clone, Copy)]
pub struct MigrationRunner<'r> {
    registry: &'r MigrationRegistry,
}

type StepError = (Status, UpdateError);

impl<'r> MigrationRunner<'r> {
    /// Create a runner over `registry`.
    pub fn new(registry: &'r MigrationRegistry) -> Self {
        Self { registry }
    }

    /// Run every migration newer than `current`.
    ///
    /// Without a `store`, SQL payloads are skipped and only callbacks run.
    /// Returns [`Status::Updated`] on success and [`Status::Unknown`] when
    /// nothing was eligible.
    ///
    /// # Errors
    ///
    /// - [`Status::Unknown`] when a SQL payload cannot be read,
    /// - [`Status::DatabaseError`] when begin, a statement or the commit fails,
    /// - [`Status::CallbackError`] when an up callback fails.
    ///
    /// If recovery itself fails the error is
    /// [`UpdateError::CompensationFailed`] and the data is in a dirty state.
    pub fn run(
        &self,
        current: &Version,
        store: Option<&mut dyn DataStore>,
    ) -> Result<Status, UpdateFailure> {
        let selected = self.registry.pending(current);
        if selected.is_empty() {
            tracing::info!(%current, "no migrations to run");
            return Ok(Status::Unknown);
        }

        let mut tx = match store {
            Some(store) => Some(
                store
                    .begin()
                    .map_err(|e| UpdateFailure::new(Status::DatabaseError, e))?,
            ),
            None => None,
        };

        let mut compensations: Vec<&Migration> = Vec::new();
        for migration in selected {
            tracing::info!(version = %migration.version(), stage = %migration.stage(), "running migration");
            if let Err((status, cause)) = apply(migration, tx.as_deref_mut()) {
                tracing::warn!(version = %migration.version(), error = %cause, "migration failed, rolling back");
                return Err(recover(status, cause, tx, &compensations));
            }
            if migration.has_callbacks() {
                compensations.push(migration);
            }
        }

        if let Some(tx) = tx {
            tx.commit()
                .map_err(|e| UpdateFailure::new(Status::DatabaseError, e))?;
        }
        tracing::info!(from = %current, "migrations committed");
        Ok(Status::Updated)
    }
}

fn apply<'t>(
    migration: &Migration,
    tx: Option<&mut (dyn StoreTransaction + 't)>,
) -> Result<(), StepError> {
    let sql = migration.sql().read().map_err(|e| {
        (
            Status::Unknown,
            UpdateError::MigrationRead {
                version: migration.raw_version().to_owned(),
                reason: e.to_string(),
            },
        )
    })?;

    if let Some(sql) = sql.filter(|s| !s.trim().is_empty()) {
        match tx {
            Some(tx) => tx
                .execute(&sql)
                .map_err(|e| (Status::DatabaseError, e))?,
            None => tracing::warn!(
                version = %migration.version(),
                "no data store configured, skipping SQL"
            ),
        }
    }

    if let Some(callbacks) = migration.callbacks() {
        (callbacks.up)().map_err(|e| {
            (
                Status::CallbackError,
                UpdateError::Callback {
                    version: migration.raw_version().to_owned(),
                    reason: format!("{e:#}"),
                },
            )
        })?;
    }
    Ok(())
}

/// Roll back the transaction, then run down callbacks newest first. The
/// first failing down callback stops compensation.
fn recover(
    status: Status,
    cause: UpdateError,
    tx: Option<Box<dyn StoreTransaction + '_>>,
    compensations: &[&Migration],
) -> UpdateFailure {
    let mut problems = Vec::new();

    if let Some(tx) = tx
        && let Err(e) = tx.rollback()
    {
        tracing::error!(error = %e, "transaction rollback failed");
        problems.push(format!("transaction rollback failed: {e}"));
    }

    for migration in compensations.iter().rev() {
        let Some(callbacks) = migration.callbacks() else {
            continue;
        };
        tracing::info!(version = %migration.version(), "running down callback");
        if let Err(e) = (callbacks.down)() {
            tracing::error!(version = %migration.version(), error = %e, "down callback failed");
            problems.push(format!(
                "down callback for migration {} failed: {e:#}",
                migration.raw_version()
            ));
            break;
        }
    }

    if problems.is_empty() {
        UpdateFailure::new(status, cause)
    } else {
        UpdateFailure::new(
            status,
            UpdateError::CompensationFailed {
                cause: cause.to_string(),
                reason: problems.join("; "),
            },
        )
    }
}
