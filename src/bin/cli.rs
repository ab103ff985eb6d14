//! Check for and apply updates from the command line.
//!
//! ```text
//! updater-cli [--config <path>] [--database <sqlite path>] <check|latest|update>
//! ```

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use updater::{Status, UpdateError, Updater, UpdaterConfig};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    database: Option<PathBuf>,
    command: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("updater=info")),
        )
        .init();

    let code = match run() {
        Ok(()) => 0,
        Err((status, e)) => {
            eprintln!("updater-cli failed ({status}): {e}");
            if e.is_dirty() {
                eprintln!("automatic recovery failed; inspect the installation before retrying");
            }
            i32::from(status.code()).max(1)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<(), (Status, UpdateError)> {
    let args = parse_args(std::env::args().skip(1)).map_err(|e| (Status::Unknown, e))?;
    let Some(command) = args.command.as_deref() else {
        print_usage();
        return Ok(());
    };
    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(UpdaterConfig::default_config_path);
    let config = UpdaterConfig::from_file(&config_path).map_err(|e| (Status::Unknown, e))?;

    let mut builder = Updater::builder(config);
    if let Some(db) = &args.database {
        let conn = rusqlite::Connection::open(db).map_err(|e| {
            (
                Status::DatabaseError,
                UpdateError::Database(format!("cannot open {}: {e}", db.display())),
            )
        })?;
        builder = builder.store(conn);
    }
    let mut updater = builder.build().map_err(|e| (Status::Unknown, e))?;

    match command {
        "check" => {
            let available = updater
                .has_update()
                .map_err(|e| (Status::ExecutableError, e))?;
            if available {
                println!("update available");
            } else {
                println!("{}", Status::UpToDate);
            }
            Ok(())
        }
        "latest" => {
            let latest = updater
                .latest_version()
                .map_err(|e| (Status::ExecutableError, e))?;
            println!("{latest}");
            Ok(())
        }
        "update" => {
            let status = updater.update().map_err(|f| (f.status, f.source))?;
            println!("{status}");
            Ok(())
        }
        other => Err((
            Status::Unknown,
            UpdateError::Config(format!("unknown subcommand `{other}` (use check|latest|update)")),
        )),
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, UpdateError> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = args
                    .next()
                    .ok_or_else(|| UpdateError::Config("--config requires a path".to_owned()))?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--database" | "-d" => {
                let value = args
                    .next()
                    .ok_or_else(|| UpdateError::Config("--database requires a path".to_owned()))?;
                parsed.database = Some(PathBuf::from(value));
            }
            _ if parsed.command.is_none() => parsed.command = Some(arg),
            _ => {
                return Err(UpdateError::Config(format!("unexpected argument `{arg}`")));
            }
        }
    }
    Ok(parsed)
}

fn print_usage() {
    println!("usage: updater-cli [--config <path>] [--database <sqlite path>] <check|latest|update>");
}
