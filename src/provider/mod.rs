//! Release providers: where new versions come from.

pub mod github;

pub use github::{GithubProvider, Tag};

use crate::config::HttpConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Looks up and downloads releases.
pub trait ReleaseProvider {
    /// Identifier of the newest release (usually a tag such as `v1.2.0`).
    ///
    /// Implementations decide whether pre-releases count. [`GithubProvider`]
    /// skips them while a stable tag exists, unless built
    /// [`with_prereleases`](GithubProvider::with_prereleases).
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or there are no releases.
    fn latest_version(&self) -> Result<String>;

    /// URL of a named asset attached to release `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be formed.
    fn asset_url(&self, version: &str, asset: &str) -> Result<String>;

    /// Download an asset of release `version` into `dest_dir` and return the
    /// local path.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the write fails.
    fn download(&self, version: &str, asset: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Build a blocking HTTP agent with the configured timeouts.
pub(crate) fn http_agent(http: &HttpConfig) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(http.connect_timeout_secs))
        .timeout_read(Duration::from_secs(http.read_timeout_secs))
        .build()
}
