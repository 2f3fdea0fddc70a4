use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::manifest::{PACKAGE_EXTENSION, has_suffix_ignore_case};

pub const DEFAULT_FEED_BASE_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// One entry of a release feed.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseCandidate {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallableAsset {
    pub name: String,
    pub download_url: String,
    pub size: u64,
    pub tag_name: String,
}

impl ReleaseCandidate {
    /// First asset that is a package file and can actually be downloaded.
    #[must_use]
    pub fn installable_asset(&self) -> Option<InstallableAsset> {
        self.assets
            .iter()
            .find(|asset| {
                has_suffix_ignore_case(&asset.name, PACKAGE_EXTENSION)
                    && !asset.browser_download_url.trim().is_empty()
            })
            .map(|asset| InstallableAsset {
                name: asset.name.clone(),
                download_url: asset.browser_download_url.trim().to_string(),
                size: asset.size,
                tag_name: self.tag_name.clone(),
            })
    }

    #[must_use]
    pub fn is_eligible(&self) -> bool {
        !self.draft && self.installable_asset().is_some()
    }
}

#[derive(Debug, Error)]
pub enum ReleaseResolutionError {
    #[error("failed to request release feed {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("release feed {url} answered HTTP {status}{body_snippet}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to parse release feed {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("no release of {owner}/{repo} carries an installable .apk asset")]
    NoEligibleRelease { owner: String, repo: String },
}

/// Pick the asset to install from a feed listing, newest first.
///
/// Stable eligible releases win over prereleases; a prerelease is only used
/// when no stable release qualifies.
#[must_use]
pub fn select_installable(candidates: &[ReleaseCandidate]) -> Option<InstallableAsset> {
    let mut eligible = candidates.iter().filter(|release| release.is_eligible());
    let first_eligible = eligible.clone().next()?;
    eligible
        .find(|release| !release.prerelease)
        .unwrap_or(first_eligible)
        .installable_asset()
}

#[derive(Debug, Clone)]
pub struct ReleaseResolver {
    client: reqwest::Client,
    base_url: String,
}

impl ReleaseResolver {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Find the newest installable asset of `owner/repo`.
    ///
    /// The `latest` pointer is tried first; when it fails or points at a
    /// release without a usable asset, the full listing decides.
    ///
    /// # Errors
    /// Returns an error when the full listing cannot be fetched or no release
    /// in it is eligible.
    pub async fn resolve_installable(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<InstallableAsset, ReleaseResolutionError> {
        match self.fetch_latest(owner, repo).await {
            Ok(latest) => match latest.installable_asset().filter(|_| !latest.draft) {
                Some(asset) => {
                    info!("Using latest release {} asset {}", latest.tag_name, asset.name);
                    return Ok(asset);
                }
                None => info!(
                    "Latest release {} of {owner}/{repo} is not installable, checking all releases",
                    latest.tag_name
                ),
            },
            Err(error) => warn!("Latest release lookup failed, checking all releases: {error}"),
        }

        let releases = self.fetch_all(owner, repo).await?;
        debug!("Release feed for {owner}/{repo} lists {} entries", releases.len());

        select_installable(&releases).ok_or_else(|| ReleaseResolutionError::NoEligibleRelease {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    async fn fetch_latest(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<ReleaseCandidate, ReleaseResolutionError> {
        let url = format!("{}/repos/{owner}/{repo}/releases/latest", self.base_url);
        self.get_json(&url).await
    }

    async fn fetch_all(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<ReleaseCandidate>, ReleaseResolutionError> {
        let url = format!("{}/repos/{owner}/{repo}/releases", self.base_url);
        self.get_json(&url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ReleaseResolutionError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", "sideport")
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|source| ReleaseResolutionError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(ReleaseResolutionError::HttpStatus {
                url: url.to_string(),
                status,
                body_snippet,
            });
        }

        response
            .json()
            .await
            .map_err(|source| ReleaseResolutionError::Parse {
                url: url.to_string(),
                source,
            })
    }
}

/// Split an `owner/repo` reference.
#[must_use]
pub fn parse_repo_ref(reference: &str) -> Option<(&str, &str)> {
    let (owner, repo) = reference.trim().split_once('/')?;
    let repo = repo.trim_end_matches('/');
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner, repo))
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
