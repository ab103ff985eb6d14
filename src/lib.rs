//! Updater: self-update engine for a packaged executable and its assets.
//!
//! One [`Updater::update`] call is a single unit of work:
//!
//! 1. **Resolve**: compare the installed version with the newest release.
//! 2. **Acquire**: download the release archive, verify its checksum, and
//!    extract it into a scratch directory.
//! 3. **Patch**: move every destination aside to a sibling backup and write
//!    the staged files in place, restoring everything on failure.
//! 4. **Verify**: optionally run the new executable and check its version.
//! 5. **Migrate**: run the pending data migrations in one transaction,
//!    compensating with down callbacks on failure.
//!
//! Every attempt reports a coarse [`Status`] and, on failure, a detailed
//! [`UpdateError`] inside an [`UpdateFailure`].

pub mod archive;
pub mod checksum;
pub mod config;
pub mod error;
pub mod migration;
pub mod patch;
pub mod provider;
pub mod status;
pub mod update;
pub mod version;

pub use config::{FileMapping, HttpConfig, UpdaterConfig};
pub use error::{ErrorKind, Result, UpdateError, UpdateFailure};
pub use migration::{Migration, MigrationRegistry, Stage};
pub use status::Status;
pub use update::{UpdateState, Updater, UpdaterBuilder};
pub use version::{Version, can_update};
