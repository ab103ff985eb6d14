//! Patch entries and groups: the units of file substitution.

use super::fsops::{self, sibling_backup_path};
use crate::error::{Result, UpdateError};
use std::path::{Path, PathBuf};

/// Permission bits used for replaced executables.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// What an entry replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// The installation's executable.
    Executable,
    /// Any other file or directory.
    Asset,
}

/// One source → destination substitution with a backup path for undo.
#[derive(Debug, Clone)]
pub struct PatchEntry {
    source: PathBuf,
    destination: PathBuf,
    backup: PathBuf,
    mode: u32,
    kind: EntryKind,
    backup_possible: bool,
    backed_up: bool,
    touched: bool,
    written: bool,
}

impl PatchEntry {
    /// Substitute `destination` with `source`, backing up to
    /// `<destination><backup_suffix>`.
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        backup_suffix: &str,
        mode: u32,
    ) -> Self {
        let destination = fsops::normalize(&destination.into());
        let backup = sibling_backup_path(&destination, backup_suffix);
        Self {
            source: source.into(),
            destination,
            backup,
            mode,
            kind: EntryKind::Asset,
            backup_possible: false,
            backed_up: false,
            touched: false,
            written: false,
        }
    }

    /// Replace the executable at `destination`.
    pub fn executable(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        backup_suffix: &str,
    ) -> Self {
        Self {
            kind: EntryKind::Executable,
            ..Self::new(source, destination, backup_suffix, EXECUTABLE_MODE)
        }
    }

    /// Override the backup path. It must stay in the destination's directory.
    pub fn with_backup_path(mut self, backup: impl Into<PathBuf>) -> Self {
        self.backup = backup.into();
        self
    }

    /// Staged new content.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Final install location.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Where the previous content is moved.
    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Permission bits for the written destination.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// What this entry replaces.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// `true` once apply has found an existing destination to back up.
    ///
    /// Set for executable entries as well as asset entries.
    pub fn backup_possible(&self) -> bool {
        self.backup_possible
    }

    /// `true` once the new content is fully written.
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Back up the destination and write the source in its place.
    pub(crate) fn apply(&mut self) -> Result<()> {
        // Backups are renamed, never copied, so they must share a directory
        // (and therefore a volume) with the destination.
        if self.backup.parent() != self.destination.parent() {
            return Err(self.error(
                &self.backup,
                "backup path must be a sibling of the destination",
            ));
        }
        if !fsops::exists(&self.source) {
            return Err(self.error(&self.source, "source does not exist"));
        }

        self.backup_possible = fsops::exists(&self.destination);

        if fsops::exists(&self.backup) {
            return Err(UpdateError::BackupExists {
                path: self.backup.clone(),
            });
        }

        if self.backup_possible {
            std::fs::rename(&self.destination, &self.backup)
                .map_err(|e| self.error(&self.destination, &format!("backup failed: {e}")))?;
            self.backed_up = true;
            tracing::debug!(
                destination = %self.destination.display(),
                backup = %self.backup.display(),
                "moved previous content to backup"
            );
        }

        self.touched = true;
        fsops::copy_into_place(&self.source, &self.destination, self.mode)
            .map_err(|e| self.error(&self.destination, &format!("write failed: {e}")))?;
        self.written = true;

        tracing::debug!(
            source = %self.source.display(),
            destination = %self.destination.display(),
            mode = format_args!("{:o}", self.mode),
            "patched"
        );
        Ok(())
    }

    /// Undo whatever [`apply`](Self::apply) did. Returns a message on failure.
    pub(crate) fn restore(&mut self) -> std::result::Result<(), String> {
        if self.touched {
            fsops::remove_tree(&self.destination).map_err(|e| {
                format!("cannot remove {}: {e}", self.destination.display())
            })?;
            self.touched = false;
            self.written = false;
        }
        if self.backed_up {
            std::fs::rename(&self.backup, &self.destination).map_err(|e| {
                format!(
                    "cannot restore {} from {}: {e}",
                    self.destination.display(),
                    self.backup.display()
                )
            })?;
            self.backed_up = false;
        }
        Ok(())
    }

    /// Remove the backup of a successfully applied entry.
    pub(crate) fn discard_backup(&mut self) -> Result<()> {
        if !self.backed_up && self.kind != EntryKind::Executable {
            return Ok(());
        }
        fsops::remove_tree(&self.backup).map_err(|e| UpdateError::Cleanup {
            path: self.backup.clone(),
            reason: e.to_string(),
        })?;
        self.backed_up = false;
        Ok(())
    }

    fn error(&self, path: &Path, reason: &str) -> UpdateError {
        UpdateError::Patch {
            path: path.to_path_buf(),
            reason: reason.to_owned(),
        }
    }
}

/// An ordered batch of entries under one logical destination root.
#[derive(Debug, Clone)]
pub struct PatchGroup {
    name: String,
    entries: Vec<PatchEntry>,
}

impl PatchGroup {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Append an entry, builder style.
    pub fn with_entry(mut self, entry: PatchEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Append an entry.
    pub fn push(&mut self, entry: PatchEntry) {
        self.entries.push(entry);
    }

    /// Group label used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entries in apply order.
    pub fn entries(&self) -> &[PatchEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [PatchEntry] {
        &mut self.entries
    }
}
