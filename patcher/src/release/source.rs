//! Remote release metadata.
//!
//! [`ReleaseSource`] answers "what is the latest release of this project";
//! [`GitHubReleaseSource`] answers it from the GitHub REST API.

use log::debug;

use super::download::USER_AGENT;
use super::model::{Release, ReleaseProject, parse_release};

/// Base URL of the public GitHub REST API.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Errors from release metadata lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReleaseError {
    /// The API refused the request because of rate limiting (403/429).
    #[error("rate limited while querying {project}; set GITHUB_TOKEN to raise the limit")]
    RateLimited {
        /// Project being queried.
        project: String,
    },

    /// The project or its latest release does not exist (HTTP 404).
    #[error("no release found for {project}")]
    NotFound {
        /// Project being queried.
        project: String,
    },

    /// The request failed for another reason.
    #[error("release lookup for {project} failed: {reason}")]
    HttpError {
        /// Project being queried.
        project: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The response body was not a release.
    #[error("invalid release payload for {project}: {reason}")]
    InvalidPayload {
        /// Project being queried.
        project: String,
        /// Parse error.
        reason: String,
    },
}

/// Source of release metadata.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseSource {
    /// Fetch the latest published release of `project`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReleaseError`] when the lookup fails.
    fn latest_release(&self, project: &ReleaseProject) -> Result<Release, ReleaseError>;
}

/// Release metadata from the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubReleaseSource {
    agent: ureq::Agent,
    api_base: String,
    token: Option<String>,
}

impl GitHubReleaseSource {
    /// Create a source that queries `api.github.com`, authenticating with
    /// `token` when one is given.
    #[must_use]
    pub fn new(agent: ureq::Agent, token: Option<String>) -> Self {
        Self {
            agent,
            api_base: GITHUB_API_BASE.to_owned(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Point the source at a different API root, e.g. a GitHub Enterprise
    /// host.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    /// URL of the latest-release endpoint for `project`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use revanced_assist::release::download::http_agent;
    /// use revanced_assist::release::model::ReleaseProject;
    /// use revanced_assist::release::source::GitHubReleaseSource;
    ///
    /// let source = GitHubReleaseSource::new(http_agent(Duration::from_secs(5)), None);
    /// let project = ReleaseProject { owner: "ReVanced".into(), repo: "revanced-cli".into() };
    /// assert_eq!(
    ///     source.latest_release_url(&project),
    ///     "https://api.github.com/repos/ReVanced/revanced-cli/releases/latest"
    /// );
    /// ```
    #[must_use]
    pub fn latest_release_url(&self, project: &ReleaseProject) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, project.owner, project.repo
        )
    }

    /// Returns true if requests carry an authorisation header.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl ReleaseSource for GitHubReleaseSource {
    fn latest_release(&self, project: &ReleaseProject) -> Result<Release, ReleaseError> {
        let url = self.latest_release_url(project);
        debug!(
            "querying {url} ({})",
            if self.is_authenticated() {
                "authenticated"
            } else {
                "anonymous"
            }
        );

        let mut request = self
            .agent
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("Authorization", &format!("token {token}"));
        }

        let response = request.call().map_err(|e| map_ureq_error(project, &e))?;
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| ReleaseError::HttpError {
                project: project.to_string(),
                reason: e.to_string(),
            })?;
        parse_release(&body).map_err(|e| ReleaseError::InvalidPayload {
            project: project.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Map a ureq error to a [`ReleaseError`].
fn map_ureq_error(project: &ReleaseProject, err: &ureq::Error) -> ReleaseError {
    let project = project.to_string();
    match err {
        ureq::Error::StatusCode(403 | 429) => ReleaseError::RateLimited { project },
        ureq::Error::StatusCode(404) => ReleaseError::NotFound { project },
        other => ReleaseError::HttpError {
            project,
            reason: other.to_string(),
        },
    }
}
