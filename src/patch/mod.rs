//! Atomic substitution of a set of filesystem paths.
//!
//! Each [`PatchEntry`] moves its destination aside to a sibling backup
//! (`<destination>.bak` by default) with a rename and writes the staged
//! source in its place. The [`Mover`] applies [`PatchGroup`]s strictly in
//! order and, on the first failure, restores every group it touched.
//!
//! Backups are renamed, never copied: a backup always lives next to its
//! destination, so both are on the same volume and the rename is atomic.

pub mod entry;
pub(crate) mod fsops;
pub mod mover;

pub use entry::{EXECUTABLE_MODE, EntryKind, PatchEntry, PatchGroup};
pub use fsops::sibling_backup_path;
pub use mover::Mover;

use crate::error::UpdateFailure;
use crate::status::Status;

/// Apply `groups` in order and remove the backups on success.
///
/// # Errors
///
/// Returns [`Status::ExecutableError`] with the cause when any entry fails.
/// By then every group that had started is restored, unless the rollback
/// itself failed (see [`crate::UpdateError::is_dirty`]).
pub fn apply_patches(groups: Vec<PatchGroup>) -> Result<Status, UpdateFailure> {
    let mut mover = Mover::new();
    for group in groups {
        mover.add_group(group);
    }
    mover
        .apply()
        .and_then(|()| mover.cleanup())
        .map(|()| Status::Updated)
        .map_err(|e| UpdateFailure::new(Status::ExecutableError, e))
}
