//! GitHub release provider.
//!
//! Resolves the newest release from the repository's tags and downloads
//! assets from `releases/download/<tag>/<asset>`.

use super::{ReleaseProvider, http_agent};
use crate::config::HttpConfig;
use crate::error::{Result, UpdateError};
use crate::version::Version;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// A tag as returned by the GitHub tags API. Only the name is needed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    /// Tag name, e.g. `v0.52.9`.
    pub name: String,
}

/// Fetches releases of one GitHub repository.
#[derive(Debug, Clone)]
pub struct GithubProvider {
    owner: String,
    name: String,
    http: HttpConfig,
    agent: ureq::Agent,
    prereleases: bool,
}

impl GithubProvider {
    /// Create a provider for `repository_url` (`https://github.com/<owner>/<name>`).
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Provider`] if the URL does not name a repository.
    pub fn new(repository_url: &str, http: &HttpConfig) -> Result<Self> {
        let (owner, name) = parse_repository(repository_url)?;
        Ok(Self {
            owner,
            name,
            http: http.clone(),
            agent: http_agent(http),
            prereleases: false,
        })
    }

    /// Let pre-release tags (`v2.0.0-rc.1`) win over stable ones.
    pub fn with_prereleases(mut self, prereleases: bool) -> Self {
        self.prereleases = prereleases;
        self
    }

    /// Repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn tags_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/tags?per_page=100",
            self.http.api_base.trim_end_matches('/'),
            self.owner,
            self.name
        )
    }

    fn get(&self, url: &str) -> Result<ureq::Response> {
        self.agent
            .get(url)
            .set("User-Agent", &self.http.user_agent)
            .call()
            .map_err(|e| UpdateError::Provider(format!("GET {url} failed: {e}")))
    }
}

impl ReleaseProvider for GithubProvider {
    fn latest_version(&self) -> Result<String> {
        let url = self.tags_url();
        let body = self
            .get(&url)?
            .into_string()
            .map_err(|e| UpdateError::Provider(format!("cannot read tags response: {e}")))?;
        let tags: Vec<Tag> = serde_json::from_str(&body)
            .map_err(|e| UpdateError::Provider(format!("malformed tags response: {e}")))?;

        let latest = latest_tag(&tags, self.prereleases).ok_or_else(|| {
            UpdateError::Provider(format!(
                "repository {}/{} has no release tags",
                self.owner, self.name
            ))
        })?;
        tracing::debug!(tag = latest, candidates = tags.len(), "resolved latest release");
        Ok(latest.to_owned())
    }

    fn asset_url(&self, version: &str, asset: &str) -> Result<String> {
        Ok(format!(
            "{}/{}/{}/releases/download/{version}/{asset}",
            self.http.download_base.trim_end_matches('/'),
            self.owner,
            self.name
        ))
    }

    fn download(&self, version: &str, asset: &str, dest_dir: &Path) -> Result<PathBuf> {
        let url = self.asset_url(version, asset)?;
        let file_name = Path::new(asset)
            .file_name()
            .ok_or_else(|| UpdateError::Provider(format!("invalid asset name `{asset}`")))?;
        let dest = dest_dir.join(file_name);

        tracing::info!(%url, dest = %dest.display(), "downloading release asset");
        let resp = self.get(&url)?;
        let mut reader = resp.into_reader();
        let mut file = std::fs::File::create(&dest).map_err(|e| {
            UpdateError::Provider(format!("cannot create {}: {e}", dest.display()))
        })?;
        std::io::copy(&mut reader, &mut file)
            .map_err(|e| UpdateError::Provider(format!("download write failed: {e}")))?;

        Ok(dest)
    }
}

/// Extract `(owner, name)` from a GitHub repository URL.
///
/// # Errors
///
/// Returns [`UpdateError::Provider`] for anything that is not
/// `https://github.com/<owner>/<name>[.git]`.
pub fn parse_repository(repository_url: &str) -> Result<(String, String)> {
    let invalid = || UpdateError::Provider(format!("invalid github URL: {repository_url}"));

    let url = Url::parse(repository_url).map_err(|_| invalid())?;
    let host = url.host_str().ok_or_else(invalid)?;
    if host != "github.com" && host != "www.github.com" {
        return Err(invalid());
    }

    let segments: Vec<&str> = url
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|s| !s.is_empty())
        .collect();
    match segments.as_slice() {
        [owner, name] => {
            let name = name.strip_suffix(".git").unwrap_or(name);
            if name.is_empty() {
                return Err(invalid());
            }
            Ok(((*owner).to_owned(), name.to_owned()))
        }
        _ => Err(invalid()),
    }
}

/// The tag with the highest semantic version. Tags that are not versions
/// (`nightly`, `docs-2021`) are ignored.
///
/// Unless `prereleases` is set, stable tags win and a pre-release is only
/// returned when the repository has no stable tag at all.
pub fn latest_tag(tags: &[Tag], prereleases: bool) -> Option<&str> {
    let versions: Vec<(Version, &str)> = tags
        .iter()
        .filter_map(|t| Version::parse(&t.name).ok().map(|v| (v, t.name.as_str())))
        .collect();

    let highest = |stable_only: bool| {
        versions
            .iter()
            .filter(|(v, _)| !stable_only || !v.is_prerelease())
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, name)| *name)
    };

    if prereleases {
        highest(false)
    } else {
        highest(true).or_else(|| highest(false))
    }
}
