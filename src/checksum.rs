//! Release asset integrity verification.
//!
//! Releases publish a `checksums.txt` listing with one `<sha256>  <file>`
//! line per asset. The downloaded archive is hashed locally and compared
//! against its line before anything is extracted.

use crate::config::HttpConfig;
use crate::error::{Result, UpdateError};
use crate::provider::http_agent;
use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::path::Path;
use tracing::{info, warn};

/// Verifies a local file against a remote checksum listing.
pub trait ChecksumVerifier {
    /// Fetch the listing at `checksum_url` and compare it with `local`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ChecksumNotFound`] if the listing has no line
    /// for `local`, [`UpdateError::ChecksumMismatch`] if the digests differ,
    /// or [`UpdateError::Provider`] if the listing cannot be fetched.
    fn compare(&self, checksum_url: &str, local: &Path) -> Result<()>;
}

/// SHA-256 verifier for `sha256sum`-style listings fetched over HTTP.
#[derive(Debug, Clone)]
pub struct Sha256Checksums {
    agent: ureq::Agent,
    user_agent: String,
}

impl Sha256Checksums {
    /// Create a verifier using the given HTTP settings.
    pub fn new(http: &HttpConfig) -> Self {
        Self {
            agent: http_agent(http),
            user_agent: http.user_agent.clone(),
        }
    }

    fn fetch(&self, url: &str) -> Result<String> {
        self.agent
            .get(url)
            .set("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| UpdateError::Provider(format!("GET {url} failed: {e}")))?
            .into_string()
            .map_err(|e| UpdateError::Provider(format!("cannot read checksum listing: {e}")))
    }
}

impl Default for Sha256Checksums {
    fn default() -> Self {
        Self::new(&HttpConfig::default())
    }
}

impl ChecksumVerifier for Sha256Checksums {
    fn compare(&self, checksum_url: &str, local: &Path) -> Result<()> {
        info!(url = checksum_url, file = %local.display(), "verifying checksum");
        let listing = self.fetch(checksum_url)?;
        verify_listing(&listing, local)
    }
}

/// Compare `local` with its line in an already fetched listing.
///
/// # Errors
///
/// See [`ChecksumVerifier::compare`].
pub fn verify_listing(listing: &str, local: &Path) -> Result<()> {
    let name = local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let expected = parse_checksums(listing, &name)
        .ok_or_else(|| UpdateError::ChecksumNotFound { file: name.clone() })?;
    let actual = sha256_hex(local)?;

    if actual.eq_ignore_ascii_case(expected) {
        info!(file = %name, "checksum ok");
        Ok(())
    } else {
        warn!(file = %name, expected, actual = %actual, "checksum mismatch");
        Err(UpdateError::ChecksumMismatch {
            file: name,
            expected: expected.to_owned(),
            actual,
        })
    }
}

/// Find the digest for `name` in a listing of `<hex>  <file>` lines.
///
/// The separator is two spaces (text mode) or a space and `*` (binary mode).
pub fn parse_checksums<'a>(listing: &'a str, name: &str) -> Option<&'a str> {
    listing.lines().find_map(|line| {
        let (digest, file) = line.trim().split_once(' ')?;
        let file = file.trim_start_matches(' ');
        let file = file.strip_prefix('*').unwrap_or(file);
        (file == name && !digest.is_empty()).then_some(digest)
    })
}

/// SHA-256 hex digest of a file, read in 64 KiB chunks.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn sha256_hex(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65_536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
