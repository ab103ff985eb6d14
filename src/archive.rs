//! Release archive extraction.

use crate::error::{Result, UpdateError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Unpacks a downloaded release archive.
pub trait ArchiveDecoder {
    /// Extract every entry of `archive` under `dest_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::PathTraversal`] if an entry would land outside
    /// `dest_dir`, or [`UpdateError::Archive`] if the archive is unreadable.
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<()>;
}

/// Zip archive decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipDecoder;

fn archive_error(archive: &Path, e: impl std::fmt::Display) -> UpdateError {
    UpdateError::Archive(format!("{}: {e}", archive.display()))
}

impl ArchiveDecoder for ZipDecoder {
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<()> {
        let file = fs::File::open(archive).map_err(|e| archive_error(archive, e))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| archive_error(archive, e))?;

        // Resolve every name up front so a hostile entry aborts before any write.
        let mut targets: Vec<PathBuf> = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let entry = zip.by_index(i).map_err(|e| archive_error(archive, e))?;
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| UpdateError::PathTraversal {
                    entry: entry.name().to_owned(),
                })?;
            targets.push(dest_dir.join(relative));
        }

        fs::create_dir_all(dest_dir)?;
        for (i, target) in targets.iter().enumerate() {
            let mut entry = zip.by_index(i).map_err(|e| archive_error(archive, e))?;
            if entry.is_dir() {
                fs::create_dir_all(target)?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(target)?;
            io::copy(&mut entry, &mut out).map_err(|e| archive_error(archive, e))?;
            debug!(entry = entry.name(), size = entry.size(), "extracted");

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }

        info!(
            archive = %archive.display(),
            dest = %dest_dir.display(),
            entries = targets.len(),
            "archive extracted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    enum Item<'a> {
        Dir(&'a str),
        File(&'a str, &'a [u8], u32),
    }

    fn build_zip(path: &Path, items: &[Item<'_>]) {
        let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
        for item in items {
            match item {
                Item::Dir(name) => writer
                    .add_directory(*name, SimpleFileOptions::default())
                    .unwrap(),
                Item::File(name, content, mode) => {
                    writer
                        .start_file(
                            *name,
                            SimpleFileOptions::default().unix_permissions(*mode),
                        )
                        .unwrap();
                    writer.write_all(content).unwrap();
                }
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extracts_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("release.zip");
        build_zip(
            &archive,
            &[
                Item::Dir("assets/"),
                Item::File("tool", b"#!/bin/sh\n", 0o755),
                Item::File("assets/readme.txt", b"hello", 0o644),
                Item::File("nested/deeper/data.bin", b"\x00\x01", 0o644),
            ],
        );

        let out = dir.path().join("out");
        ZipDecoder.extract(&archive, &out).unwrap();

        assert_eq!(fs::read(out.join("tool")).unwrap(), b"#!/bin/sh\n");
        assert_eq!(fs::read(out.join("assets/readme.txt")).unwrap(), b"hello");
        assert_eq!(fs::read(out.join("nested/deeper/data.bin")).unwrap(), b"\x00\x01");
    }

    #[cfg(unix)]
    #[test]
    fn restores_unix_modes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("release.zip");
        build_zip(&archive, &[Item::File("tool", b"bin", 0o755)]);

        let out = dir.path().join("out");
        ZipDecoder.extract(&archive, &out).unwrap();
        let mode = fs::metadata(out.join("tool")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn traversal_entry_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        build_zip(
            &archive,
            &[
                Item::File("ok.txt", b"fine", 0o644),
                Item::File("../evil.txt", b"pwned", 0o644),
            ],
        );

        let out = dir.path().join("out");
        let err = ZipDecoder.extract(&archive, &out).unwrap_err();
        assert!(matches!(err, UpdateError::PathTraversal { ref entry } if entry == "../evil.txt"));
        assert!(!dir.path().join("evil.txt").exists());
        assert!(!out.join("ok.txt").exists());
    }

    #[test]
    fn non_zip_input_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bogus.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = ZipDecoder.extract(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, UpdateError::Archive(_)));
    }
}
