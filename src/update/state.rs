//! Update state persistence.
//!
//! Tracks the installed version, the last check time and the outcome of the
//! last update attempt. Persisted as pretty JSON at the configured
//! `state_file`.

use crate::error::{Result, UpdateError};
use crate::status::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persistent record of update attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateState {
    /// Version installed by the last successful update.
    pub installed_version: Option<String>,
    /// RFC 3339 timestamp of the last check against the release provider.
    pub last_check: Option<String>,
    /// Outcome of the last update attempt.
    pub last_status: Option<Status>,
    /// Error message of the last failed attempt.
    pub last_error: Option<String>,
}

impl UpdateState {
    /// Load state from `path`. Returns the default state if the file is
    /// missing or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(_) => return Self::default(),
        };

        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    /// Persist the current state to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| UpdateError::Config(format!("cannot serialize update state: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Record that an update check was performed now.
    pub fn mark_checked(&mut self) {
        self.mark_checked_at(Utc::now());
    }

    fn mark_checked_at(&mut self, at: DateTime<Utc>) {
        self.last_check = Some(at.to_rfc3339());
    }

    /// Record the outcome of an attempt.
    pub fn record(&mut self, status: Status, error: Option<String>) {
        self.last_status = Some(status);
        self.last_error = error;
    }

    /// Returns `true` if the last check was more than `hours` hours ago
    /// (or if no valid check has been recorded yet).
    pub fn check_is_stale(&self, hours: u64) -> bool {
        let Some(last) = self
            .last_check
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        else {
            return true;
        };

        let elapsed = Utc::now().signed_duration_since(last.with_timezone(&Utc));
        elapsed.num_hours() >= i64::try_from(hours).unwrap_or(i64::MAX)
    }
}
