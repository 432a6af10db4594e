//! Raw asset downloads.
//!
//! Provides a trait-based abstraction for fetching release assets so the
//! acquirer can be exercised without network access.

use std::path::Path;
use std::time::Duration;

/// User agent sent with every request; GitHub rejects anonymous clients.
pub const USER_AGENT: &str = concat!("revanced-assist/", env!("CARGO_PKG_VERSION"));

/// Trait for downloading release assets.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use revanced_assist::release::download::{HttpDownloader, http_agent};
///
/// let downloader = HttpDownloader::new(http_agent(Duration::from_secs(30)));
/// // Use downloader.download(url, dest) in production
/// # let _ = downloader;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Download `url` into the file at `dest`, creating or truncating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the file cannot be written.
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Errors arising from asset downloads.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested asset was not found (HTTP 404).
    #[error("asset not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The downloaded file did not match its published digest.
    #[error("digest mismatch for {name}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Asset file name.
        name: String,
        /// Digest published with the release.
        expected: String,
        /// Digest of the bytes received.
        actual: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the HTTP agent shared by the release source and the downloader.
#[must_use]
pub fn http_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(config)
}

/// HTTP-based downloader using `ureq`.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// Wrap an existing agent.
    #[must_use]
    pub const fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl ArtefactDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file)
            .map_err(DownloadError::Io)?;
        Ok(())
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
