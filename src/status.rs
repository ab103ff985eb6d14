//! Coarse outcome of an update attempt.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result code returned by every update, patch and migration run.
///
/// The numeric codes are stable and may be used as process exit codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Nothing conclusive happened (also: no migrations were eligible).
    #[default]
    Unknown,
    /// The data store rejected a statement, commit or rollback.
    DatabaseError,
    /// Acquiring or installing the new executable and files failed.
    ExecutableError,
    /// A migration callback failed.
    CallbackError,
    /// The installation is already at the latest version.
    UpToDate,
    /// Files were replaced and migrations applied.
    Updated,
}

impl Status {
    /// Stable numeric code.
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::DatabaseError => 1,
            Self::ExecutableError => 2,
            Self::CallbackError => 3,
            Self::UpToDate => 5,
            Self::Updated => 6,
        }
    }

    /// Returns `true` for the two outcomes that need no operator attention.
    pub fn is_success(self) -> bool {
        matches!(self, Self::UpToDate | Self::Updated)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::ExecutableError => write!(f, "executable_error"),
            Self::CallbackError => write!(f, "callback_error"),
            Self::UpToDate => write!(f, "up_to_date"),
            Self::Updated => write!(f, "updated"),
        }
    }
}
