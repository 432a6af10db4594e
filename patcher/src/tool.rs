//! The three tool categories required to run a patch job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// File extension of the experimental patch bundle format.
pub const EXPERIMENTAL_BUNDLE_EXTENSION: &str = "rvp";

/// A tool category. The set is closed; every lookup is keyed by it.
///
/// # Examples
///
/// ```
/// use revanced_assist::tool::ToolCategory;
///
/// assert_eq!(ToolCategory::Patches.file_stem(), "revanced-patches");
/// assert_eq!(ToolCategory::Integrations.extensions(), &["apk"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// The patcher command-line tool.
    Cli,
    /// The patch bundle.
    Patches,
    /// The integrations package merged into every patched app.
    Integrations,
}

impl ToolCategory {
    /// Every category, in resolution order.
    pub const ALL: [Self; 3] = [Self::Cli, Self::Patches, Self::Integrations];

    /// Lowercase identifier used in filenames and configuration keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Patches => "patches",
            Self::Integrations => "integrations",
        }
    }

    /// Capitalised name for reports.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Cli => "Cli",
            Self::Patches => "Patches",
            Self::Integrations => "Integrations",
        }
    }

    /// Filename prefix of artifacts in this category, without the trailing
    /// dash that separates it from the version.
    #[must_use]
    pub const fn file_stem(self) -> &'static str {
        match self {
            Self::Cli => "revanced-cli",
            Self::Patches => "revanced-patches",
            Self::Integrations => "revanced-integrations",
        }
    }

    /// Extensions accepted for this category. CLI and patches accept the
    /// experimental bundle format alongside the Java archive.
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Cli | Self::Patches => &["jar", EXPERIMENTAL_BUNDLE_EXTENSION],
            Self::Integrations => &["apk"],
        }
    }

    /// Default upstream repository name.
    #[must_use]
    pub const fn default_repository(self) -> &'static str {
        self.file_stem()
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
