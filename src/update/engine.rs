//! The update engine: eligibility, acquisition, patching, verification and
//! migrations as one unit of work.

use super::state::UpdateState;
use super::verify::verify_installation;
use crate::archive::{ArchiveDecoder, ZipDecoder};
use crate::checksum::{ChecksumVerifier, Sha256Checksums};
use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError, UpdateFailure};
use crate::migration::{DataStore, MigrationRegistry, MigrationRunner};
use crate::patch::fsops::mode_of;
use crate::patch::{Mover, PatchEntry, PatchGroup};
use crate::provider::{GithubProvider, ReleaseProvider};
use crate::status::Status;
use crate::version::{Version, can_update};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Permission bits for auxiliary files when the staged copy has none.
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Updates one local installation.
pub struct Updater {
    config: UpdaterConfig,
    current: Version,
    provider: Box<dyn ReleaseProvider>,
    checksums: Box<dyn ChecksumVerifier>,
    decoder: Box<dyn ArchiveDecoder>,
    registry: MigrationRegistry,
    store: Option<Box<dyn DataStore>>,
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("current", &self.current)
            .field("repository_url", &self.config.repository_url)
            .field("migrations", &self.registry.len())
            .field("store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

/// Wires an [`Updater`] together. Collaborators default to GitHub releases,
/// SHA-256 checksum listings and zip archives.
pub struct UpdaterBuilder {
    config: UpdaterConfig,
    provider: Option<Box<dyn ReleaseProvider>>,
    checksums: Option<Box<dyn ChecksumVerifier>>,
    decoder: Option<Box<dyn ArchiveDecoder>>,
    registry: MigrationRegistry,
    store: Option<Box<dyn DataStore>>,
}

impl UpdaterBuilder {
    /// Use a custom release provider.
    pub fn provider(mut self, provider: impl ReleaseProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Use a custom checksum verifier.
    pub fn checksum_verifier(mut self, verifier: impl ChecksumVerifier + 'static) -> Self {
        self.checksums = Some(Box::new(verifier));
        self
    }

    /// Use a custom archive decoder.
    pub fn archive_decoder(mut self, decoder: impl ArchiveDecoder + 'static) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    /// Migrations to run after the files are replaced.
    pub fn registry(mut self, registry: MigrationRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Transactional store the migrations run against.
    pub fn store(mut self, store: impl DataStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Validate the configuration and build the updater.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] or [`UpdateError::InvalidVersion`] for
    /// an invalid configuration, or [`UpdateError::Provider`] if the default
    /// provider cannot parse the repository URL.
    pub fn build(self) -> Result<Updater> {
        self.config.validate()?;
        let current = Version::parse(&self.config.version)?;

        let provider = match self.provider {
            Some(p) => p,
            None => Box::new(
                GithubProvider::new(&self.config.repository_url, &self.config.http)?
                    .with_prereleases(current.is_prerelease()),
            ),
        };
        let checksums = self
            .checksums
            .unwrap_or_else(|| Box::new(Sha256Checksums::new(&self.config.http)));
        let decoder = self.decoder.unwrap_or_else(|| Box::new(ZipDecoder));

        Ok(Updater {
            config: self.config,
            current,
            provider,
            checksums,
            decoder,
            registry: self.registry,
            store: self.store,
        })
    }
}

impl Updater {
    /// Start building an updater for `config`.
    pub fn builder(config: UpdaterConfig) -> UpdaterBuilder {
        UpdaterBuilder {
            config,
            provider: None,
            checksums: None,
            decoder: None,
            registry: MigrationRegistry::new(),
            store: None,
        }
    }

    /// Version of the installation. Advances after a successful update.
    pub fn current_version(&self) -> &Version {
        &self.current
    }

    /// The active configuration.
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Registered migrations.
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Latest version published by the release provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, or [`UpdateError::InvalidVersion`] if
    /// the newest release is not a semantic version.
    pub fn latest_version(&self) -> Result<Version> {
        let tag = self.provider.latest_version()?;
        Version::parse(&tag)
    }

    /// Returns `true` if the provider publishes a version other than the
    /// installed one.
    ///
    /// # Errors
    ///
    /// See [`latest_version`](Self::latest_version).
    pub fn has_update(&self) -> Result<bool> {
        let latest = self.latest_version()?;
        match can_update(&self.current, &latest) {
            Err(UpdateError::AtLatestVersion { .. }) => Ok(false),
            other => other,
        }
    }

    /// Run a full update.
    ///
    /// Returns [`Status::UpToDate`] when there is nothing to do and
    /// [`Status::Updated`] when the files were replaced and every pending
    /// migration committed. When a state file is configured the outcome is
    /// recorded there.
    ///
    /// # Errors
    ///
    /// - [`Status::ExecutableError`] if acquiring, patching or verifying the
    ///   new release fails. Patches are rolled back.
    /// - [`Status::DatabaseError`], [`Status::CallbackError`] or
    ///   [`Status::Unknown`] from the migration run. Patches stay applied.
    ///
    /// [`UpdateError::is_dirty`] on the returned error means automatic
    /// recovery failed.
    pub fn update(&mut self) -> std::result::Result<Status, UpdateFailure> {
        let outcome = self.run();
        self.record(&outcome);
        outcome
    }

    fn run(&mut self) -> std::result::Result<Status, UpdateFailure> {
        let executable_error = |e: UpdateError| UpdateFailure::new(Status::ExecutableError, e);

        let tag = self.provider.latest_version().map_err(executable_error)?;
        let latest = Version::parse(&tag).map_err(executable_error)?;
        match can_update(&self.current, &latest) {
            Ok(_) => info!(current = %self.current, latest = %latest, "update available"),
            Err(UpdateError::AtLatestVersion { .. }) => {
                info!(version = %self.current, "already at the latest version");
                return Ok(Status::UpToDate);
            }
            Err(e) => return Err(executable_error(e)),
        }

        // Removed on every return path.
        let scratch = tempfile::Builder::new()
            .prefix("updater-")
            .tempdir()
            .map_err(|e| executable_error(e.into()))?;
        let extracted = self.acquire(&tag, scratch.path()).map_err(executable_error)?;

        let executable = self.executable_path().map_err(executable_error)?;
        let mut mover = Mover::new();
        for group in self.plan(&extracted, &executable) {
            mover.add_group(group);
        }
        mover.apply().map_err(executable_error)?;

        if self.config.verify {
            self.verify(&mut mover, &executable, &latest)
                .map_err(executable_error)?;
        }
        if let Err(e) = mover.cleanup() {
            warn!(error = %e, "update applied but a backup was left behind");
        }
        drop(scratch);

        let store: Option<&mut dyn DataStore> = match self.store.as_deref_mut() {
            Some(store) => Some(store),
            None => None,
        };
        MigrationRunner::new(&self.registry).run(&self.current, store)?;

        info!(from = %self.current, to = %latest, "update complete");
        self.current = latest;
        Ok(Status::Updated)
    }

    /// Download, verify and unpack release `tag`. Returns the extraction root.
    fn acquire(&self, tag: &str, scratch: &Path) -> Result<PathBuf> {
        let download_dir = scratch.join("download");
        let extract_dir = scratch.join("extract");
        std::fs::create_dir_all(&download_dir)?;

        let archive = self
            .provider
            .download(tag, &self.config.archive_name, &download_dir)?;

        match &self.config.checksum_name {
            Some(name) => {
                let url = self.provider.asset_url(tag, name)?;
                self.checksums.compare(&url, &archive)?;
            }
            None => warn!(archive = %archive.display(), "no checksum asset configured, skipping verification"),
        }

        self.decoder.extract(&archive, &extract_dir)?;
        Ok(extract_dir)
    }

    fn executable_path(&self) -> Result<PathBuf> {
        match &self.config.executable_path {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_exe()?),
        }
    }

    /// One group for the executable, then one per file mapping.
    fn plan(&self, extracted: &Path, executable: &Path) -> Vec<PatchGroup> {
        let suffix = &self.config.backup_suffix;
        let mut groups = vec![PatchGroup::new("executable").with_entry(PatchEntry::executable(
            extracted.join(&self.config.remote_executable_path),
            executable,
            suffix,
        ))];

        for mapping in &self.config.files {
            let source = extracted.join(&mapping.remote_path);
            let mode = mode_of(&source, DEFAULT_FILE_MODE);
            groups.push(
                PatchGroup::new(mapping.remote_path.clone())
                    .with_entry(PatchEntry::new(source, &mapping.local_path, suffix, mode)),
            );
        }
        groups
    }

    fn verify(&self, mover: &mut Mover, executable: &Path, latest: &Version) -> Result<()> {
        let Err(e) = verify_installation(executable, &self.config.version_flag, latest) else {
            return Ok(());
        };

        if !self.config.rollback_on_verify_failure {
            warn!(error = %e, "verification failed, keeping the new files");
            if let Err(cleanup) = mover.cleanup() {
                warn!(error = %cleanup, "cannot remove backups");
            }
            return Err(e);
        }

        warn!(error = %e, "verification failed, restoring previous installation");
        match mover.rollback(&e) {
            Ok(()) => Err(e),
            Err(rollback) => Err(rollback),
        }
    }

    fn record(&self, outcome: &std::result::Result<Status, UpdateFailure>) {
        let Some(path) = &self.config.state_file else {
            return;
        };

        let mut state = UpdateState::load(path);
        state.mark_checked();
        match outcome {
            Ok(status) => {
                state.record(*status, None);
                state.installed_version = Some(self.current.to_string());
            }
            Err(failure) => state.record(failure.status, Some(failure.source.to_string())),
        }

        if let Err(e) = state.save(path) {
            warn!(path = %path.display(), error = %e, "cannot save update state");
        }
    }
}
