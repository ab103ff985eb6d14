#![allow(clippy::unwrap_used, clippy::expect_used)]

use rusqlite::Connection;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use updater::archive::ZipDecoder;
use updater::provider::ReleaseProvider;
use updater::{
    FileMapping, Migration, MigrationRegistry, Stage, Status, UpdateError, UpdateState, Updater,
    UpdaterConfig,
};
use zip::write::SimpleFileOptions;

/// Serves one prebuilt release archive and records every request.
struct LocalReleases {
    tag: String,
    archive: PathBuf,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ReleaseProvider for LocalReleases {
    fn latest_version(&self) -> updater::Result<String> {
        self.requests.lock().unwrap().push("latest".to_owned());
        Ok(self.tag.clone())
    }

    fn asset_url(&self, version: &str, asset: &str) -> updater::Result<String> {
        Ok(format!("file://{version}/{asset}"))
    }

    fn download(&self, version: &str, asset: &str, dest_dir: &Path) -> updater::Result<PathBuf> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("download {version}/{asset}"));
        let dest = dest_dir.join(asset);
        fs::copy(&self.archive, &dest)?;
        Ok(dest)
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let install = dir.path().join("install");
        fs::create_dir_all(install.join("admin")).unwrap();
        fs::write(install.join("tool"), "tool 1.0.0").unwrap();
        fs::write(install.join("admin/index.html"), "<h1>1.0.0</h1>").unwrap();

        let archive = dir.path().join("release.zip");
        let mut zip = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
        let exec = SimpleFileOptions::default().unix_permissions(0o755);
        let file = SimpleFileOptions::default().unix_permissions(0o644);
        zip.start_file("bin/tool", exec).unwrap();
        zip.write_all(b"tool 1.1.0").unwrap();
        zip.add_directory("admin/", file).unwrap();
        zip.start_file("admin/index.html", file).unwrap();
        zip.write_all(b"<h1>1.1.0</h1>").unwrap();
        zip.finish().unwrap();

        let conn = Connection::open(dir.path().join("data.db")).unwrap();
        conn.execute_batch(
            "CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT);
             INSERT INTO settings (key, value) VALUES ('theme', 'light');
             CREATE TABLE counter (n INTEGER NOT NULL);
             INSERT INTO counter (n) VALUES (0);",
        )
        .unwrap();

        Self {
            dir,
            requests: Arc::default(),
        }
    }

    fn install(&self) -> PathBuf {
        self.dir.path().join("install")
    }

    fn config(&self) -> UpdaterConfig {
        UpdaterConfig {
            repository_url: "https://github.com/acme/tool".to_owned(),
            archive_name: "tool_linux.zip".to_owned(),
            version: "v1.0.0".to_owned(),
            executable_path: Some(self.install().join("tool")),
            remote_executable_path: "bin/tool".to_owned(),
            files: vec![FileMapping {
                remote_path: "admin".to_owned(),
                local_path: self.install().join("admin"),
            }],
            state_file: Some(self.dir.path().join("state.json")),
            ..UpdaterConfig::default()
        }
    }

    fn provider(&self) -> LocalReleases {
        LocalReleases {
            tag: "v1.1.0".to_owned(),
            archive: self.dir.path().join("release.zip"),
            requests: Arc::clone(&self.requests),
        }
    }

    fn store(&self) -> Connection {
        Connection::open(self.dir.path().join("data.db")).unwrap()
    }

    fn query(&self, sql: &str) -> String {
        self.store()
            .query_row(sql, [], |row| row.get::<_, rusqlite::types::Value>(0))
            .map(|v| match v {
                rusqlite::types::Value::Text(s) => s,
                rusqlite::types::Value::Integer(n) => n.to_string(),
                other => format!("{other:?}"),
            })
            .unwrap()
    }
}

fn registry_with(sql: &'static str) -> MigrationRegistry {
    let mut registry = MigrationRegistry::new();
    registry
        .register(
            Migration::builder("v1.1.0", Stage::Minor)
                .sql(sql)
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
}

#[test]
fn update_replaces_files_and_migrates_once() {
    let fx = Fixture::new();
    let mut updater = Updater::builder(fx.config())
        .provider(fx.provider())
        .archive_decoder(ZipDecoder)
        .registry(registry_with(
            "UPDATE settings SET value = 'dark' WHERE key = 'theme';
             UPDATE counter SET n = n + 1;",
        ))
        .store(fx.store())
        .build()
        .unwrap();

    assert_eq!(updater.update().unwrap(), Status::Updated);

    assert_eq!(
        fs::read_to_string(fx.install().join("tool")).unwrap(),
        "tool 1.1.0"
    );
    assert_eq!(
        fs::read_to_string(fx.install().join("admin/index.html")).unwrap(),
        "<h1>1.1.0</h1>"
    );
    assert!(!fx.install().join("tool.bak").exists());
    assert!(!fx.install().join("admin.bak").exists());
    assert_eq!(fx.query("SELECT value FROM settings WHERE key = 'theme'"), "dark");
    assert_eq!(fx.query("SELECT n FROM counter"), "1");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(fx.install().join("tool"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    // The installation now reports 1.1.0, so a second run is a no-op.
    assert_eq!(updater.update().unwrap(), Status::UpToDate);
    assert_eq!(fx.query("SELECT n FROM counter"), "1");
    let downloads = fx
        .requests
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.starts_with("download"))
        .count();
    assert_eq!(downloads, 1);

    let state = UpdateState::load(&fx.dir.path().join("state.json"));
    assert_eq!(state.installed_version.as_deref(), Some("1.1.0"));
    assert_eq!(state.last_status, Some(Status::UpToDate));
}

#[test]
fn failed_migration_rolls_back_data_but_keeps_patches() {
    let fx = Fixture::new();
    let mut updater = Updater::builder(fx.config())
        .provider(fx.provider())
        .archive_decoder(ZipDecoder)
        .registry(registry_with(
            "UPDATE counter SET n = n + 1;
             UPDATE no_such_table SET value = 'x';",
        ))
        .store(fx.store())
        .build()
        .unwrap();

    let failure = updater.update().unwrap_err();
    assert_eq!(failure.status, Status::DatabaseError);
    assert!(matches!(failure.source, UpdateError::Database(_)));
    assert!(!failure.source.is_dirty());

    assert_eq!(fx.query("SELECT n FROM counter"), "0");
    assert_eq!(
        fs::read_to_string(fx.install().join("tool")).unwrap(),
        "tool 1.1.0"
    );
    assert_eq!(
        fs::read_to_string(fx.install().join("admin/index.html")).unwrap(),
        "<h1>1.1.0</h1>"
    );
    assert_eq!(updater.current_version().to_string(), "1.0.0");

    let state = UpdateState::load(&fx.dir.path().join("state.json"));
    assert_eq!(state.last_status, Some(Status::DatabaseError));
    assert!(state.last_error.unwrap().contains("no_such_table"));
}

#[test]
fn same_version_is_up_to_date_without_download() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.version = "1.1.0".to_owned();
    let mut updater = Updater::builder(config)
        .provider(fx.provider())
        .build()
        .unwrap();

    assert!(!updater.has_update().unwrap());
    assert_eq!(updater.update().unwrap(), Status::UpToDate);
    assert_eq!(
        fs::read_to_string(fx.install().join("tool")).unwrap(),
        "tool 1.0.0"
    );
    assert!(
        fx.requests
            .lock()
            .unwrap()
            .iter()
            .all(|r| r == "latest")
    );
}

#[test]
fn missing_remote_file_restores_installation() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.files.push(FileMapping {
        remote_path: "docs/manual.pdf".to_owned(),
        local_path: fx.install().join("manual.pdf"),
    });
    let mut updater = Updater::builder(config)
        .provider(fx.provider())
        .store(fx.store())
        .registry(registry_with("UPDATE counter SET n = n + 1;"))
        .build()
        .unwrap();

    let failure = updater.update().unwrap_err();
    assert_eq!(failure.status, Status::ExecutableError);
    assert_eq!(
        fs::read_to_string(fx.install().join("tool")).unwrap(),
        "tool 1.0.0"
    );
    assert_eq!(
        fs::read_to_string(fx.install().join("admin/index.html")).unwrap(),
        "<h1>1.0.0</h1>"
    );
    assert!(!fx.install().join("manual.pdf").exists());
    assert_eq!(fx.query("SELECT n FROM counter"), "0");
}
