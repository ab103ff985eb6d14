//! Filesystem primitives used by the patch set.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Returns `true` if anything (file, directory or dangling symlink) exists at `path`.
pub(crate) fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Remove a file, symlink or directory tree. Missing paths are not an error.
pub(crate) fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Returns `<path><suffix>`, a sibling of `path`.
///
/// Trailing separators are ignored, so `admin/` backs up to `admin.bak`
/// rather than to a file inside the directory being replaced.
pub fn sibling_backup_path(path: &Path, suffix: &str) -> PathBuf {
    let Some(name) = path.file_name() else {
        let mut raw = path.as_os_str().to_owned();
        raw.push(suffix);
        return PathBuf::from(raw);
    };

    let mut backup = name.to_owned();
    backup.push(suffix);
    match path.parent() {
        Some(parent) => parent.join(backup),
        None => PathBuf::from(backup),
    }
}

/// Drops trailing separators and interior `.` components from `path`.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

/// Copy `source` (a file or a directory tree) to `destination`.
///
/// A file source is written with `mode`. A directory source keeps the
/// permissions of the files inside it and `mode` is applied to the
/// destination directory itself.
pub(crate) fn copy_into_place(source: &Path, destination: &Path, mode: u32) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    if fs::metadata(source)?.is_dir() {
        copy_tree(source, destination)?;
    } else {
        fs::copy(source, destination)?;
    }
    set_mode(destination, mode)
}

fn copy_tree(source: &Path, destination: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = destination.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    let link = fs::read_link(source)?;
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    fs::copy(source, target).map(|_| ())
}

/// Set permission bits on Unix platforms.
pub(crate) fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    let _ = (path, mode); // Permission bits are not applied on Windows.
    Ok(())
}

/// Permission bits of an existing path, or `default` where they are not available.
pub(crate) fn mode_of(path: &Path, default: u32) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(path) {
            return meta.permissions().mode() & 0o7777;
        }
    }
    let _ = path;
    default
}
