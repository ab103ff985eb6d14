//! Sequential, all-or-nothing application of patch groups.

use super::entry::PatchGroup;
use crate::error::{Result, UpdateError};

/// Applies [`PatchGroup`]s in order and can undo them.
///
/// `completed` is always a prefix of the original pending order. A group that
/// failed half-way is kept separately so that its applied entries can be
/// restored along with the completed groups.
#[derive(Debug, Default)]
pub struct Mover {
    pending: Vec<PatchGroup>,
    completed: Vec<PatchGroup>,
    partial: Option<PatchGroup>,
}

impl Mover {
    /// Create an empty mover.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a group behind the ones already added.
    pub fn add_group(&mut self, group: PatchGroup) {
        self.pending.push(group);
    }

    /// Groups not yet applied.
    pub fn pending(&self) -> &[PatchGroup] {
        &self.pending
    }

    /// Groups applied successfully, in apply order.
    pub fn completed(&self) -> &[PatchGroup] {
        &self.completed
    }

    /// Apply every pending group. On the first failure, stop and restore
    /// everything applied so far.
    ///
    /// Backups are kept until [`cleanup`](Self::cleanup) so that the caller
    /// can still [`rollback`](Self::rollback) after its own checks.
    ///
    /// # Errors
    ///
    /// Returns the failure that stopped the apply, or
    /// [`UpdateError::RollbackFailed`] if restoring the previous state failed
    /// as well.
    pub fn apply(&mut self) -> Result<()> {
        let mut queue = std::mem::take(&mut self.pending).into_iter();

        while let Some(mut group) = queue.next() {
            tracing::info!(group = group.name(), entries = group.entries().len(), "applying patch group");

            let result = group
                .entries_mut()
                .iter_mut()
                .try_for_each(|entry| entry.apply());

            match result {
                Ok(()) => self.completed.push(group),
                Err(e) => {
                    tracing::warn!(group = group.name(), error = %e, "patch failed, rolling back");
                    self.partial = Some(group);
                    self.pending = queue.collect();
                    return Err(match self.restore(&e.to_string()) {
                        Ok(()) => e,
                        Err(rollback) => rollback,
                    });
                }
            }
        }
        Ok(())
    }

    /// Restore the pre-apply state of every completed group.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::RollbackFailed`] listing every entry that could
    /// not be restored.
    pub fn rollback(&mut self, cause: &UpdateError) -> Result<()> {
        self.restore(&cause.to_string())
    }

    /// Remove the backups of completed groups after a successful apply.
    ///
    /// # Errors
    ///
    /// Returns the first [`UpdateError::Cleanup`] encountered; remaining
    /// backups are still attempted.
    pub fn cleanup(&mut self) -> Result<()> {
        let mut first_error = None;
        for group in &mut self.completed {
            for entry in group.entries_mut() {
                if let Err(e) = entry.discard_backup() {
                    tracing::warn!(error = %e, "cannot remove backup");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::debug!(groups = self.completed.len(), "backups removed");
                Ok(())
            }
        }
    }

    /// Restore completed groups in completion order, then the partial group.
    /// Every entry is attempted even if an earlier one fails.
    fn restore(&mut self, cause: &str) -> Result<()> {
        let mut failures = Vec::new();
        let groups = self
            .completed
            .drain(..)
            .chain(self.partial.take())
            .collect::<Vec<_>>();

        for mut group in groups {
            let name = group.name().to_owned();
            for entry in group.entries_mut() {
                if let Err(message) = entry.restore() {
                    tracing::error!(group = %name, %message, "rollback step failed");
                    failures.push(message);
                }
            }
            tracing::info!(group = %name, "patch group rolled back");
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(UpdateError::RollbackFailed {
                cause: cause.to_owned(),
                failures,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::patch::PatchEntry;
    use std::fs;
    use std::path::Path;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn empty_mover_applies_cleanly() {
        let mut mover = Mover::new();
        mover.apply().unwrap();
        mover.cleanup().unwrap();
        assert!(mover.completed().is_empty());
    }

    #[test]
    fn completed_groups_follow_pending_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("stage/a"), "A");
        write(&root.join("stage/b"), "B");

        let mut mover = Mover::new();
        mover.add_group(
            PatchGroup::new("first").with_entry(PatchEntry::new(
                root.join("stage/a"),
                root.join("install/a"),
                ".bak",
                0o644,
            )),
        );
        mover.add_group(
            PatchGroup::new("second").with_entry(PatchEntry::new(
                root.join("stage/b"),
                root.join("install/b"),
                ".bak",
                0o644,
            )),
        );
        assert_eq!(mover.pending().len(), 2);

        mover.apply().unwrap();
        let names: Vec<_> = mover.completed().iter().map(PatchGroup::name).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(mover.pending().is_empty());
    }

    #[test]
    fn failure_in_later_group_restores_earlier_groups() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("stage/a"), "new-a");
        write(&root.join("install/a"), "old-a");
        write(&root.join("install/b"), "old-b");

        let mut mover = Mover::new();
        mover.add_group(
            PatchGroup::new("ok").with_entry(PatchEntry::new(
                root.join("stage/a"),
                root.join("install/a"),
                ".bak",
                0o644,
            )),
        );
        mover.add_group(
            PatchGroup::new("broken").with_entry(PatchEntry::new(
                root.join("stage/missing"),
                root.join("install/b"),
                ".bak",
                0o644,
            )),
        );

        let err = mover.apply().unwrap_err();
        assert!(matches!(err, UpdateError::Patch { .. }));
        assert_eq!(fs::read_to_string(root.join("install/a")).unwrap(), "old-a");
        assert_eq!(fs::read_to_string(root.join("install/b")).unwrap(), "old-b");
        assert!(!root.join("install/a.bak").exists());
        assert!(mover.completed().is_empty());
    }

    #[test]
    fn failure_mid_group_restores_earlier_entries_of_that_group() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("stage/one"), "new-1");
        write(&root.join("stage/two"), "new-2");
        write(&root.join("install/two.bak"), "stale");

        let mut mover = Mover::new();
        mover.add_group(
            PatchGroup::new("pair")
                .with_entry(PatchEntry::new(
                    root.join("stage/one"),
                    root.join("install/one"),
                    ".bak",
                    0o644,
                ))
                .with_entry(PatchEntry::new(
                    root.join("stage/two"),
                    root.join("install/two"),
                    ".bak",
                    0o644,
                )),
        );

        let err = mover.apply().unwrap_err();
        assert!(matches!(err, UpdateError::BackupExists { .. }));
        // "one" did not exist before, so it must be absent again.
        assert!(!root.join("install/one").exists());
        // The stale backup is left for the operator.
        assert_eq!(fs::read_to_string(root.join("install/two.bak")).unwrap(), "stale");
    }

    #[test]
    fn explicit_rollback_after_apply_restores_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("stage/app"), "v2");
        write(&root.join("install/app"), "v1");

        let mut mover = Mover::new();
        mover.add_group(PatchGroup::new("exe").with_entry(PatchEntry::executable(
            root.join("stage/app"),
            root.join("install/app"),
            ".bak",
        )));
        mover.apply().unwrap();
        assert_eq!(fs::read_to_string(root.join("install/app")).unwrap(), "v2");

        let cause = UpdateError::VersionMismatch {
            expected: "2.0.0".to_owned(),
            output: "1.0.0".to_owned(),
        };
        mover.rollback(&cause).unwrap();
        assert_eq!(fs::read_to_string(root.join("install/app")).unwrap(), "v1");
        assert!(!root.join("install/app.bak").exists());
    }

    #[test]
    fn lost_backup_makes_rollback_a_dirty_failure() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("stage/app"), "v2");
        write(&root.join("stage/data"), "new-data");
        write(&root.join("install/app"), "v1");
        write(&root.join("install/data"), "old-data");

        let mut mover = Mover::new();
        mover.add_group(PatchGroup::new("exe").with_entry(PatchEntry::executable(
            root.join("stage/app"),
            root.join("install/app"),
            ".bak",
        )));
        mover.add_group(PatchGroup::new("data").with_entry(PatchEntry::new(
            root.join("stage/data"),
            root.join("install/data"),
            ".bak",
            0o644,
        )));
        mover.apply().unwrap();
        fs::remove_file(root.join("install/app.bak")).unwrap();

        let cause = UpdateError::VersionMismatch {
            expected: "2.0.0".to_owned(),
            output: "1.0.0".to_owned(),
        };
        let err = mover.rollback(&cause).unwrap_err();
        assert!(err.is_dirty());
        match err {
            UpdateError::RollbackFailed { cause, failures } => {
                assert!(cause.contains("2.0.0"));
                assert_eq!(failures.len(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The later group is still restored.
        assert_eq!(fs::read_to_string(root.join("install/data")).unwrap(), "old-data");
        assert!(!root.join("install/data.bak").exists());
    }

    #[test]
    fn cleanup_removes_backups() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("stage/app"), "v2");
        write(&root.join("install/app"), "v1");

        let mut mover = Mover::new();
        mover.add_group(PatchGroup::new("exe").with_entry(PatchEntry::executable(
            root.join("stage/app"),
            root.join("install/app"),
            ".bak",
        )));
        mover.apply().unwrap();
        assert!(root.join("install/app.bak").exists());

        mover.cleanup().unwrap();
        assert!(!root.join("install/app.bak").exists());
        assert_eq!(fs::read_to_string(root.join("install/app")).unwrap(), "v2");
    }
}
