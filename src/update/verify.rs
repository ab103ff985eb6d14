//! Post-install check that the new executable runs and reports the right version.

use crate::error::{Result, UpdateError};
use crate::version::Version;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run `executable <flag>` and require its stdout to contain `expected`.
///
/// The version is matched without a `v` prefix, so a tag of `v1.2.0` accepts
/// output such as `tool 1.2.0 (linux/amd64)`.
///
/// # Errors
///
/// Returns [`UpdateError::VersionCheck`] if the executable cannot be run or
/// exits unsuccessfully, and [`UpdateError::VersionMismatch`] if its output
/// does not mention `expected`.
pub fn verify_installation(executable: &Path, flag: &str, expected: &Version) -> Result<()> {
    let output = Command::new(executable)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| UpdateError::VersionCheck {
            path: executable.to_owned(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(UpdateError::VersionCheck {
            path: executable.to_owned(),
            reason: format!(
                "`{flag}` exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let wanted = expected.to_string();
    if !stdout.contains(&wanted) {
        tracing::warn!(path = %executable.display(), expected = %wanted, "version mismatch");
        return Err(UpdateError::VersionMismatch {
            expected: wanted,
            output: stdout.trim().to_owned(),
        });
    }

    tracing::info!(path = %executable.display(), version = %wanted, "installed executable verified");
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("tool");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn matching_version_passes() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(
            dir.path(),
            r#"[ "$1" = "--version" ] && echo "tool version 1.2.0" && exit 0; exit 2"#,
        );
        verify_installation(&exe, "--version", &v("v1.2.0")).unwrap();
    }

    #[test]
    fn other_version_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo 'tool version 1.1.0'");
        let err = verify_installation(&exe, "--version", &v("1.2.0")).unwrap_err();
        match err {
            UpdateError::VersionMismatch { expected, output } => {
                assert_eq!(expected, "1.2.0");
                assert_eq!(output, "tool version 1.1.0");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn nonzero_exit_is_a_version_check_error() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo 1.2.0; exit 3");
        let err = verify_installation(&exe, "--version", &v("1.2.0")).unwrap_err();
        assert!(matches!(err, UpdateError::VersionCheck { .. }));
    }

    #[test]
    fn missing_executable_is_a_version_check_error() {
        let err = verify_installation(Path::new("/nonexistent/tool"), "--version", &v("1.0.0"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::VersionCheck { .. }));
    }
}
