//! Configuration for an update run.

use crate::error::{Result, UpdateError};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default suffix appended to a destination to form its backup path.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

/// Top-level configuration for the update engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Repository hosting the releases, e.g. `https://github.com/acme/tool`.
    pub repository_url: String,
    /// Release asset holding the packaged executable and files.
    pub archive_name: String,
    /// Release asset listing SHA-256 sums (`<hex>  <file>` per line).
    /// Verification is skipped when unset.
    pub checksum_name: Option<String>,
    /// Version of the running installation.
    pub version: String,
    /// Executable to replace (None = the running executable).
    pub executable_path: Option<PathBuf>,
    /// Path of the executable inside the extracted archive.
    pub remote_executable_path: String,
    /// Suffix for sibling backup paths.
    pub backup_suffix: String,
    /// Run the installed executable afterwards and check its version.
    pub verify: bool,
    /// Flag that makes the executable print its version.
    pub version_flag: String,
    /// Restore the previous files when verification fails.
    pub rollback_on_verify_failure: bool,
    /// Auxiliary files and folders shipped in the archive.
    pub files: Vec<FileMapping>,
    /// Where to persist [`crate::update::UpdateState`] (None = not persisted).
    pub state_file: Option<PathBuf>,
    /// HTTP client settings.
    pub http: HttpConfig,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            repository_url: String::new(),
            archive_name: String::new(),
            checksum_name: None,
            version: String::new(),
            executable_path: None,
            remote_executable_path: String::new(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_owned(),
            verify: false,
            version_flag: "--version".to_owned(),
            rollback_on_verify_failure: true,
            files: Vec::new(),
            state_file: None,
            http: HttpConfig::default(),
        }
    }
}

/// Maps a path inside the release archive to a local install location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMapping {
    /// File or directory relative to the archive root.
    pub remote_path: String,
    /// Destination on the local filesystem.
    pub local_path: PathBuf,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds (covers large archive downloads).
    pub read_timeout_secs: u64,
    /// User-Agent header.
    pub user_agent: String,
    /// Base URL of the releases API.
    pub api_base: String,
    /// Base URL for release asset downloads.
    pub download_base: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            read_timeout_secs: 300,
            user_agent: concat!("updater/", env!("CARGO_PKG_VERSION")).to_owned(),
            api_base: "https://api.github.com".to_owned(),
            download_base: "https://github.com".to_owned(),
        }
    }
}

impl UpdaterConfig {
    /// Check that every required field is present and well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] naming the first problem found, or
    /// [`UpdateError::InvalidVersion`] if `version` does not parse.
    pub fn validate(&self) -> Result<()> {
        if self.repository_url.trim().is_empty() {
            return Err(UpdateError::Config("no repository url provided".to_owned()));
        }
        if self.archive_name.trim().is_empty() {
            return Err(UpdateError::Config("no archive name provided".to_owned()));
        }
        if self.version.trim().is_empty() {
            return Err(UpdateError::Config("no version provided".to_owned()));
        }
        if self.remote_executable_path.trim().is_empty() {
            return Err(UpdateError::Config(
                "no remote executable path provided".to_owned(),
            ));
        }
        if self.backup_suffix.is_empty() {
            return Err(UpdateError::Config("backup suffix must not be empty".to_owned()));
        }
        if self.verify && self.version_flag.trim().is_empty() {
            return Err(UpdateError::Config(
                "verification requires a version flag".to_owned(),
            ));
        }
        for mapping in &self.files {
            if mapping.remote_path.trim().is_empty() || mapping.local_path.as_os_str().is_empty() {
                return Err(UpdateError::Config(format!(
                    "file mapping `{}` -> `{}` has an empty path",
                    mapping.remote_path,
                    mapping.local_path.display()
                )));
            }
        }
        Version::parse(&self.version)?;
        Ok(())
    }

    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| UpdateError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| UpdateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/updater/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("updater").join("config.toml")
        } else if let Some(config) = dirs::config_dir() {
            config.join("updater").join("config.toml")
        } else {
            PathBuf::from("/tmp/updater-config/config.toml")
        }
    }
}
