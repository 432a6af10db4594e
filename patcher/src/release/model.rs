//! Release metadata as published by the upstream projects.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::digest::Sha256Digest;
use crate::tool::ToolCategory;

/// Default GitHub organisation publishing the toolchain.
pub const DEFAULT_OWNER: &str = "ReVanced";

const INSTALLABLE_CONTENT_TYPES: &[&str] = &[
    "application/java-archive",
    "application/vnd.android.package-archive",
];
const SIGNATURE_CONTENT_TYPES: &[&str] = &["application/pgp-keys", "application/pgp-signature"];
const SIGNATURE_EXTENSION: &str = ".asc";

/// An upstream repository publishing one tool category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseProject {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

impl ReleaseProject {
    /// The default upstream for `category`.
    #[must_use]
    pub fn default_for(category: ToolCategory) -> Self {
        Self {
            owner: DEFAULT_OWNER.to_owned(),
            repo: category.default_repository().to_owned(),
        }
    }
}

impl fmt::Display for ReleaseProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// The upstream project for every category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseProjects {
    /// Upstream of the patcher CLI.
    pub cli: ReleaseProject,
    /// Upstream of the patch bundle.
    pub patches: ReleaseProject,
    /// Upstream of the integrations package.
    pub integrations: ReleaseProject,
}

impl ReleaseProjects {
    /// Project for `category`.
    #[must_use]
    pub const fn get(&self, category: ToolCategory) -> &ReleaseProject {
        match category {
            ToolCategory::Cli => &self.cli,
            ToolCategory::Patches => &self.patches,
            ToolCategory::Integrations => &self.integrations,
        }
    }
}

impl Default for ReleaseProjects {
    fn default() -> Self {
        Self {
            cli: ReleaseProject::default_for(ToolCategory::Cli),
            patches: ReleaseProject::default_for(ToolCategory::Patches),
            integrations: ReleaseProject::default_for(ToolCategory::Integrations),
        }
    }
}

/// The latest release of a project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Human-readable release name; GitHub allows it to be null.
    #[serde(default)]
    pub name: Option<String>,
    /// Git tag of the release.
    pub tag_name: String,
    /// Downloadable assets.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Name for progress messages, falling back to the tag.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.tag_name)
    }
}

/// Parse the body of a "latest release" response.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or lacks required fields.
/// Rate-limit responses (`{"message": ...}`) fail here too.
///
/// # Examples
///
/// ```
/// use revanced_assist::release::model::parse_release;
///
/// let json = r#"{"name":"v4.6.0","tag_name":"v4.6.0","assets":[
///     {"name":"revanced-cli-4.6.0-all.jar","content_type":"application/java-archive",
///      "browser_download_url":"https://example.invalid/cli.jar"}]}"#;
/// let release = parse_release(json).expect("valid release");
/// assert_eq!(release.assets.len(), 1);
/// assert!(!release.assets[0].is_signature());
/// ```
pub fn parse_release(json: &str) -> Result<Release, serde_json::Error> {
    serde_json::from_str(json)
}

/// What an asset is to the acquirer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// An artifact to be stored and used.
    Installable,
    /// A detached signature for another asset.
    Signature,
}

/// A downloadable release asset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// File name of the asset.
    pub name: String,
    /// Public download URL.
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    /// MIME type reported by the host.
    pub content_type: String,
    /// Published digest, e.g. `sha256:<hex>`, when the host provides one.
    #[serde(default)]
    pub digest: Option<String>,
}

impl ReleaseAsset {
    /// Classify the asset, or `None` if it should not be downloaded.
    ///
    /// Experimental `.rvp` bundles are published as generic binaries, so
    /// they are recognised by extension as well as by content type.
    #[must_use]
    pub fn kind(&self) -> Option<AssetKind> {
        let content_type = self.content_type.as_str();
        if SIGNATURE_CONTENT_TYPES.contains(&content_type)
            || self.name.ends_with(SIGNATURE_EXTENSION)
        {
            Some(AssetKind::Signature)
        } else if INSTALLABLE_CONTENT_TYPES.contains(&content_type)
            || self.name.ends_with(".rvp")
        {
            Some(AssetKind::Installable)
        } else {
            None
        }
    }

    /// Returns true if the asset is a detached signature.
    #[must_use]
    pub fn is_signature(&self) -> bool {
        self.kind() == Some(AssetKind::Signature)
    }

    /// The published SHA-256 digest, if any.
    #[must_use]
    pub fn sha256(&self) -> Option<Sha256Digest> {
        self.digest.as_deref().and_then(Sha256Digest::from_github)
    }
}
