//! Error types for the update engine.

use crate::status::Status;
use std::path::PathBuf;

/// Coarse classification of an [`UpdateError`], suitable for exhaustive
/// matching by callers and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// "Nothing to do": the installation is already at the latest version.
    Eligibility,
    /// Invalid operator-supplied configuration.
    Configuration,
    /// Invalid migration registration by the integrator.
    Registration,
    /// Release lookup, download, checksum or extraction failure.
    Acquisition,
    /// Filesystem failure while substituting files. Rolled back.
    Patch,
    /// SQL, callback or commit failure while migrating. Compensated.
    Migration,
    /// The freshly installed executable did not report the expected version.
    Verification,
    /// Rollback or compensation itself failed; manual repair is required.
    DirtyState,
    /// Uncategorised I/O failure.
    Io,
}

/// Top-level error type for the update engine.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The installation already runs the latest available version.
    #[error("already at the latest version ({version})")]
    AtLatestVersion {
        /// The version both sides agree on.
        version: String,
    },

    /// A version string could not be parsed as a semantic version.
    #[error("invalid version `{input}`: {reason}")]
    InvalidVersion {
        /// The raw input.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// A migration declared only one half of its callback pair.
    #[error("migration {version}: both up and down callbacks must be set")]
    CallbackMismatch {
        /// Version of the offending migration.
        version: String,
    },

    /// A migration with the same version is already registered.
    #[error("migration {version} is already registered")]
    DuplicateMigration {
        /// The duplicated version.
        version: String,
    },

    /// Release provider failure (tag lookup or download).
    #[error("release provider error: {0}")]
    Provider(String),

    /// The checksum file has no entry for the downloaded asset.
    #[error("no checksum found for {file}")]
    ChecksumNotFound {
        /// File name looked up in the checksum listing.
        file: String,
    },

    /// The downloaded asset does not match its published checksum.
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// File name that was verified.
        file: String,
        /// Published digest.
        expected: String,
        /// Digest of the local file.
        actual: String,
    },

    /// Archive could not be opened or decoded.
    #[error("archive error: {0}")]
    Archive(String),

    /// An archive entry would be written outside the extraction directory.
    #[error("archive entry `{entry}` escapes the extraction directory")]
    PathTraversal {
        /// Raw entry name from the archive.
        entry: String,
    },

    /// A stale backup from an earlier aborted run is in the way.
    #[error("backup path already exists: {}", path.display())]
    BackupExists {
        /// The stale backup path.
        path: PathBuf,
    },

    /// Filesystem failure while applying a patch entry.
    #[error("patch error at {}: {reason}", path.display())]
    Patch {
        /// Path being backed up or written.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Patch rollback failed; the installation needs manual repair.
    #[error("rollback after `{cause}` failed: {}", failures.join("; "))]
    RollbackFailed {
        /// The error that triggered the rollback.
        cause: String,
        /// One message per entry that could not be restored.
        failures: Vec<String>,
    },

    /// Backups could not be removed after a successful apply.
    #[error("cannot remove backup {}: {reason}", path.display())]
    Cleanup {
        /// Backup path that is left behind.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A migration's SQL payload could not be read.
    #[error("cannot read SQL for migration {version}: {reason}")]
    MigrationRead {
        /// Migration version.
        version: String,
        /// What went wrong.
        reason: String,
    },

    /// Data store failure (begin, exec, commit, rollback).
    #[error("database error: {0}")]
    Database(String),

    /// A migration's up callback failed.
    #[error("callback for migration {version} failed: {reason}")]
    Callback {
        /// Migration version.
        version: String,
        /// Callback error message.
        reason: String,
    },

    /// Transaction rollback or a down callback failed while recovering from
    /// `cause`; data is in a partially migrated state.
    #[error("recovery from `{cause}` failed: {reason}")]
    CompensationFailed {
        /// The error that triggered recovery.
        cause: String,
        /// The recovery failure.
        reason: String,
    },

    /// The installed executable could not be run for verification.
    #[error("cannot verify {}: {reason}", path.display())]
    VersionCheck {
        /// Executable that was probed.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The installed executable reports a different version.
    #[error("version mismatch in updated executable: expected {expected}, got `{output}`")]
    VersionMismatch {
        /// Version that should have been reported.
        expected: String,
        /// What the executable printed.
        output: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AtLatestVersion { .. } => ErrorKind::Eligibility,
            Self::InvalidVersion { .. } | Self::Config(_) => ErrorKind::Configuration,
            Self::CallbackMismatch { .. } | Self::DuplicateMigration { .. } => {
                ErrorKind::Registration
            }
            Self::Provider(_)
            | Self::ChecksumNotFound { .. }
            | Self::ChecksumMismatch { .. }
            | Self::Archive(_)
            | Self::PathTraversal { .. } => ErrorKind::Acquisition,
            Self::BackupExists { .. } | Self::Patch { .. } | Self::Cleanup { .. } => {
                ErrorKind::Patch
            }
            Self::MigrationRead { .. } | Self::Database(_) | Self::Callback { .. } => {
                ErrorKind::Migration
            }
            Self::VersionCheck { .. } | Self::VersionMismatch { .. } => ErrorKind::Verification,
            Self::RollbackFailed { .. } | Self::CompensationFailed { .. } => {
                ErrorKind::DirtyState
            }
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns `true` when automatic recovery failed and an operator must
    /// inspect the installation.
    pub fn is_dirty(&self) -> bool {
        self.kind() == ErrorKind::DirtyState
    }
}

/// A failed status-returning operation: the coarse [`Status`] plus the
/// detailed cause.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {source}")]
pub struct UpdateFailure {
    /// Outcome reported to the caller.
    pub status: Status,
    /// Detailed cause for logs and diagnostics.
    #[source]
    pub source: UpdateError,
}

impl UpdateFailure {
    /// Pair an error with the status it maps to.
    pub fn new(status: Status, source: UpdateError) -> Self {
        Self { status, source }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
