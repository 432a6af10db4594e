//! Ensures each tool category has a usable artifact in the local store.
//!
//! When the store already resolves a category nothing touches the network.
//! Otherwise the latest upstream release is fetched, its installable assets
//! and signatures are downloaded into the store, and the payloads are
//! verified. Every failure past the release lookup is per-asset: it is
//! logged and the remaining assets are still processed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::catalog;
use crate::digest::compute_sha256;
use crate::release::{
    ArtefactDownloader, AssetKind, DownloadError, ReleaseAsset, ReleaseFetcher, ReleaseProjects,
};
use crate::selection::ToolSelection;
use crate::signature::SignatureVerifier;
use crate::tool::ToolCategory;

/// Signature outcome for one downloaded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// The backend accepted the signature.
    Verified,
    /// The backend rejected the signature, or it could not be checked.
    Failed,
    /// No signature accompanied the payload.
    Unsigned,
    /// Verification is disabled.
    Disabled,
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Verified => "Verified",
            Self::Failed => "Verification failed",
            Self::Unsigned => "Unsigned",
            Self::Disabled => "Not checked",
        })
    }
}

/// A payload written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    /// Where the payload now lives.
    pub path: Utf8PathBuf,
    /// How its signature check went.
    pub verification: Verification,
}

/// An asset that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAsset {
    /// Asset name as published.
    pub name: String,
    /// Why the download was discarded.
    pub reason: String,
}

/// What happened to each asset during one acquisition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AcquisitionLog {
    /// Payloads written to the store.
    pub stored: Vec<StoredArtifact>,
    /// Assets that could not be stored.
    pub failed: Vec<FailedAsset>,
}

impl AcquisitionLog {
    /// Verification outcome recorded for the payload at `path`, if it was
    /// downloaded.
    #[must_use]
    pub fn verification_of(&self, path: &Utf8Path) -> Option<Verification> {
        self.stored
            .iter()
            .find(|artifact| artifact.path == path)
            .map(|artifact| artifact.verification)
    }
}

/// Acquisition logs keyed by the category that was fetched. Categories
/// found locally have no entry.
pub type Acquisitions = BTreeMap<ToolCategory, AcquisitionLog>;

/// Fetches missing tool artifacts into the store.
pub struct ArtifactAcquirer<'a> {
    store_root: &'a Utf8Path,
    projects: &'a ReleaseProjects,
    fetcher: &'a mut ReleaseFetcher,
    downloader: &'a dyn ArtefactDownloader,
    verifier: &'a SignatureVerifier,
    last: AcquisitionLog,
}

impl<'a> ArtifactAcquirer<'a> {
    /// Create an acquirer writing into `store_root`.
    #[must_use]
    pub fn new(
        store_root: &'a Utf8Path,
        projects: &'a ReleaseProjects,
        fetcher: &'a mut ReleaseFetcher,
        downloader: &'a dyn ArtefactDownloader,
        verifier: &'a SignatureVerifier,
    ) -> Self {
        Self {
            store_root,
            projects,
            fetcher,
            downloader,
            verifier,
            last: AcquisitionLog::default(),
        }
    }

    /// Resolve `category`, downloading its latest release if the store has
    /// no artifact for it.
    ///
    /// Returns `None` when the category is still unresolved afterwards.
    /// Repeated calls for a resolved category perform no network access.
    pub fn ensure_present(&mut self, category: ToolCategory) -> Option<ToolSelection> {
        self.last = AcquisitionLog::default();

        if let Some(selection) = self.scan(category) {
            debug!("{category} already present at {}", selection.path);
            return Some(selection);
        }

        let projects = self.projects;
        let project = projects.get(category);
        let release = match self.fetcher.latest(project) {
            Ok(release) => release,
            Err(e) => {
                warn!("could not fetch the latest {category} release: {e}");
                return None;
            }
        };
        info!(
            "downloading {} {} from {project}",
            category.display_name(),
            release.display_name()
        );

        if let Err(e) = fs::create_dir_all(self.store_root) {
            warn!("cannot create artifact store {}: {e}", self.store_root);
            return None;
        }

        let mut payloads = Vec::new();
        let mut signatures = BTreeSet::new();
        for asset in &release.assets {
            let Some(kind) = asset.kind() else {
                debug!("skipping asset {} ({})", asset.name, asset.content_type);
                continue;
            };
            match self.store_asset(asset) {
                Ok(path) => match kind {
                    AssetKind::Installable => payloads.push(path),
                    AssetKind::Signature => {
                        signatures.insert(path);
                    }
                },
                Err(e) => {
                    warn!("failed to download {}: {e}", asset.name);
                    self.last.failed.push(FailedAsset {
                        name: asset.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        for payload in payloads {
            let verification = self.verify(&payload, &signatures);
            self.last.stored.push(StoredArtifact {
                path: payload,
                verification,
            });
        }

        self.scan(category)
    }

    /// Per-asset outcomes of the most recent [`Self::ensure_present`] call.
    #[must_use]
    pub const fn last_acquisition(&self) -> &AcquisitionLog {
        &self.last
    }

    fn scan(&self, category: ToolCategory) -> Option<ToolSelection> {
        match catalog::scan_category(self.store_root, category) {
            Ok(artifacts) => catalog::select_latest(&artifacts),
            Err(e) => {
                warn!("cannot scan artifact store {}: {e}", self.store_root);
                None
            }
        }
    }

    /// Download `asset` into the store through a temporary file, checking
    /// its published digest before moving it into place.
    fn store_asset(&self, asset: &ReleaseAsset) -> Result<Utf8PathBuf, DownloadError> {
        let name = store_file_name(&asset.name).ok_or_else(|| DownloadError::HttpError {
            url: asset.download_url.clone(),
            reason: format!("refusing unsafe asset name {:?}", asset.name),
        })?;
        let dest = self.store_root.join(name);

        let staged = NamedTempFile::new_in(self.store_root)?;
        self.downloader.download(&asset.download_url, staged.path())?;

        if let Some(expected) = asset.sha256() {
            let actual = compute_sha256(staged.path())?;
            if actual != expected {
                return Err(DownloadError::DigestMismatch {
                    name: asset.name.clone(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        staged.persist(&dest).map_err(|e| DownloadError::Io(e.error))?;
        debug!("stored {dest}");
        Ok(dest)
    }

    fn verify(&self, payload: &Utf8Path, signatures: &BTreeSet<Utf8PathBuf>) -> Verification {
        if !self.verifier.is_enabled() {
            debug!("signature verification disabled; not checking {payload}");
            return Verification::Disabled;
        }
        if !signatures.contains(&SignatureVerifier::signature_path(payload)) {
            warn!("verification skipped for {payload}: no signature was published");
            return Verification::Unsigned;
        }
        if self.verifier.verify(payload) {
            info!("signature verified for {payload}");
            Verification::Verified
        } else {
            warn!("signature verification failed for {payload}; continuing");
            Verification::Failed
        }
    }
}

impl std::fmt::Debug for ArtifactAcquirer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactAcquirer")
            .field("store_root", &self.store_root)
            .field("fetcher", &self.fetcher)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

/// The bare file name to store `name` under, or `None` if it could escape
/// the store.
fn store_file_name(name: &str) -> Option<&str> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.starts_with('.');
    (!unsafe_name).then_some(name)
}

#[cfg(test)]
#[path = "acquire_tests.rs"]
mod tests;
