//! Versioned data migrations.
//!
//! - `registry`: [`Migration`], its builder, and the [`MigrationRegistry`].
//! - `store`: the transactional [`DataStore`] seam (SQLite via `rusqlite`).
//! - `runner`: [`MigrationRunner`], which selects, executes and compensates.

pub mod registry;
pub mod runner;
pub mod store;

pub use registry::{
    Callback, Callbacks, Migration, MigrationBuilder, MigrationRegistry, SqlSource, Stage,
};
pub use runner::MigrationRunner;
pub use store::{DataStore, StoreTransaction};

use crate::error::UpdateFailure;
use crate::status::Status;
use crate::version::Version;

/// Run every migration in `registry` newer than `current`.
///
/// Shorthand for [`MigrationRunner::run`].
///
/// # Errors
///
/// See [`MigrationRunner::run`].
pub fn run_migrations(
    registry: &MigrationRegistry,
    current: &Version,
    store: Option<&mut dyn DataStore>,
) -> Result<Status, UpdateFailure> {
    MigrationRunner::new(registry).run(current, store)
}
