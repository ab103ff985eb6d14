//! Versioned migrations and the registry that holds them.

use crate::error::{Result, UpdateError};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A migration callback. Up callbacks apply side effects outside the data
/// store; down callbacks compensate for them.
pub type Callback = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Release significance of a migration. Informational only; it does not
/// affect execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Breaking release.
    Major,
    /// Feature release.
    Minor,
    /// Fix release.
    Patch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// Where a migration's SQL comes from.
#[derive(Debug, Clone, Default)]
pub enum SqlSource {
    /// No SQL; the migration only runs its callbacks.
    #[default]
    None,
    /// SQL embedded in the program.
    Inline(Cow<'static, str>),
    /// SQL read from a file when the migration runs.
    File(PathBuf),
}

impl SqlSource {
    /// Read the full payload.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if a file payload cannot be read.
    pub fn read(&self) -> std::io::Result<Option<String>> {
        match self {
            Self::None => Ok(None),
            Self::Inline(sql) => Ok(Some(sql.to_string())),
            Self::File(path) => std::fs::read_to_string(path).map(Some),
        }
    }
}

/// The up/down callback pair of a migration.
#[derive(Clone)]
pub struct Callbacks {
    /// Applies the migration's side effects.
    pub up: Callback,
    /// Undoes them; invoked only when a later step fails.
    pub down: Callback,
}

/// A single versioned unit of change.
#[derive(Clone)]
pub struct Migration {
    version: Version,
    raw_version: String,
    sql: SqlSource,
    stage: Stage,
    callbacks: Option<Callbacks>,
}

impl Migration {
    /// Start building a migration for `version`.
    pub fn builder(version: impl Into<String>, stage: Stage) -> MigrationBuilder {
        MigrationBuilder {
            version: version.into(),
            stage,
            sql: SqlSource::None,
            up: None,
            down: None,
        }
    }

    /// Parsed version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Version as registered (e.g. `v1.2.0`).
    pub fn raw_version(&self) -> &str {
        &self.raw_version
    }

    /// Major component of the version.
    pub fn major_version(&self) -> u64 {
        self.version.major()
    }

    /// Release stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// SQL payload.
    pub fn sql(&self) -> &SqlSource {
        &self.sql
    }

    /// Callback pair, if declared.
    pub fn callbacks(&self) -> Option<&Callbacks> {
        self.callbacks.as_ref()
    }

    /// Returns `true` if up and down callbacks are declared.
    pub fn has_callbacks(&self) -> bool {
        self.callbacks.is_some()
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.raw_version)
            .field("stage", &self.stage)
            .field("sql", &self.sql)
            .field("callbacks", &self.has_callbacks())
            .finish()
    }
}

/// Builder for [`Migration`]; validation happens in [`build`](Self::build).
pub struct MigrationBuilder {
    version: String,
    stage: Stage,
    sql: SqlSource,
    up: Option<Callback>,
    down: Option<Callback>,
}

impl MigrationBuilder {
    /// Embed SQL text.
    pub fn sql(mut self, sql: impl Into<Cow<'static, str>>) -> Self {
        self.sql = SqlSource::Inline(sql.into());
        self
    }

    /// Read SQL from a file at run time.
    pub fn sql_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sql = SqlSource::File(path.into());
        self
    }

    /// Set the up callback.
    pub fn up<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.up = Some(Arc::new(f));
        self
    }

    /// Set the down (compensation) callback.
    pub fn down<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.down = Some(Arc::new(f));
        self
    }

    /// Validate and produce the migration.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidVersion`] if the version does not parse
    /// and [`UpdateError::CallbackMismatch`] if only one callback is set.
    pub fn build(self) -> Result<Migration> {
        let version = Version::parse(&self.version)?;
        let callbacks = match (self.up, self.down) {
            (Some(up), Some(down)) => Some(Callbacks { up, down }),
            (None, None) => None,
            _ => {
                return Err(UpdateError::CallbackMismatch {
                    version: self.version,
                });
            }
        };
        Ok(Migration {
            version,
            raw_version: self.version,
            sql: self.sql,
            stage: self.stage,
            callbacks,
        })
    }
}

/// Every migration known to the integrator.
///
/// Populated during start-up and then only read. Versions are unique.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    migrations: Vec<Migration>,
}

impl MigrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a migration.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::DuplicateMigration`] if a migration with an
    /// equal version is already registered.
    pub fn register(&mut self, migration: Migration) -> Result<()> {
        if self.migrations.iter().any(|m| m.version == migration.version) {
            return Err(UpdateError::DuplicateMigration {
                version: migration.raw_version,
            });
        }
        tracing::debug!(version = %migration.version, stage = %migration.stage, "migration registered");
        self.migrations.push(migration);
        Ok(())
    }

    /// Find a migration by version string (`v1.0.0` and `1.0.0` are equal).
    pub fn get(&self, version: &str) -> Option<&Migration> {
        let wanted = Version::parse(version).ok()?;
        self.migrations.iter().find(|m| m.version == wanted)
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Migrations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter()
    }

    /// Migrations in ascending version order.
    pub fn sorted(&self) -> Vec<&Migration> {
        let mut sorted: Vec<&Migration> = self.migrations.iter().collect();
        sorted.sort_by(|a, b| a.version.cmp(&b.version));
        sorted
    }

    /// Migrations newer than `current`, in ascending version order.
    /// A migration at exactly `current` counts as applied.
    pub fn pending(&self, current: &Version) -> Vec<&Migration> {
        self.sorted()
            .into_iter()
            .filter(|m| current < &m.version)
            .collect()
    }
}
