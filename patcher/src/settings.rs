//! Run settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! command-line flags (which include `GITHUB_TOKEN` from the environment).
//! The file is `revanced-assist.toml` in the working directory unless
//! `--config` names another one.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;

use crate::cli::GlobalArgs;
use crate::error::{PatcherError, Result};
use crate::inspect::{DEFAULT_AAPT, DEFAULT_APKSIGNER, InspectionTools};
use crate::patch::DEFAULT_JAVA;
use crate::release::source::GITHUB_API_BASE;
use crate::release::{CacheBound, ReleaseProject, ReleaseProjects};
use crate::tool::ToolCategory;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "revanced-assist.toml";

const DEFAULT_TOOLS_DIR: &str = "tools";
const DEFAULT_APK_DIR: &str = "apk";
const DEFAULT_OUTPUT_DIR: &str = "patched";
const DEFAULT_TEMP_DIR: &str = "revanced-cache";
const DEFAULT_GPG: &str = "gpg";
const DEFAULT_PATCH_TIMEOUT_SECS: u64 = 1800;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const DEFAULT_RELEASE_CACHE_MAX_AGE_SECS: u64 = 600;

/// Contents of the configuration file. Every key is optional.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Directory holding the tool artifacts.
    pub tools_dir: Option<Utf8PathBuf>,
    /// Directory holding the APKs to patch.
    pub apk_dir: Option<Utf8PathBuf>,
    /// Directory for patched APKs.
    pub output_dir: Option<Utf8PathBuf>,
    /// Scratch directory handed to the patcher.
    pub temp_dir: Option<Utf8PathBuf>,
    /// GitHub token for release lookups.
    pub github_token: Option<String>,
    /// Root of the GitHub REST API, for Enterprise hosts.
    pub github_api_base: Option<String>,
    /// Whether downloaded tools are signature-checked.
    pub verify_signatures: Option<bool>,
    /// Java launcher.
    pub java: Option<String>,
    /// Packaging tool used by the probes.
    pub aapt: Option<String>,
    /// Signing tool used by the probes.
    pub apksigner: Option<String>,
    /// GnuPG executable used for signature checks.
    pub gpg: Option<String>,
    /// Limit for one patch run, in seconds.
    pub patch_timeout_secs: Option<u64>,
    /// Limit for one probe or signature check, in seconds.
    pub probe_timeout_secs: Option<u64>,
    /// Limit for one HTTP request, in seconds.
    pub download_timeout_secs: Option<u64>,
    /// How long release metadata is reused, in seconds.
    pub release_cache_max_age_secs: Option<u64>,
    /// Upstream overrides per tool category.
    pub sources: SourceOverrides,
}

/// `[sources.<category>]` tables.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SourceOverrides {
    /// Upstream of the patcher CLI.
    pub cli: Option<ReleaseProject>,
    /// Upstream of the patch bundle.
    pub patches: Option<ReleaseProject>,
    /// Upstream of the integrations package.
    pub integrations: Option<ReleaseProject>,
}

impl SourceOverrides {
    fn resolve(self) -> ReleaseProjects {
        let pick = |project: Option<ReleaseProject>, category| {
            project.unwrap_or_else(|| ReleaseProject::default_for(category))
        };
        ReleaseProjects {
            cli: pick(self.cli, ToolCategory::Cli),
            patches: pick(self.patches, ToolCategory::Patches),
            integrations: pick(self.integrations, ToolCategory::Integrations),
        }
    }
}

impl ConfigFile {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`PatcherError::InvalidConfig`] for malformed TOML or unknown
    /// keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use revanced_assist::settings::ConfigFile;
    ///
    /// let config = ConfigFile::parse("apk_dir = \"inbox\"\n", Utf8Path::new("x.toml"))
    ///     .expect("valid configuration");
    /// assert_eq!(config.apk_dir.as_deref().map(|p| p.as_str()), Some("inbox"));
    /// ```
    pub fn parse(source: &str, path: &Utf8Path) -> Result<Self> {
        toml::from_str(source).map_err(|e| PatcherError::InvalidConfig {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Load the configuration file.
    ///
    /// With `explicit` set the file must exist. Otherwise
    /// [`CONFIG_FILE_NAME`] in `working_dir` is read when present and an
    /// empty configuration is used when it is not.
    ///
    /// # Errors
    ///
    /// Returns [`PatcherError::ConfigNotFound`] for a missing explicit file,
    /// [`PatcherError::InvalidConfig`] for a file that does not parse, or an
    /// I/O error when the file cannot be read.
    pub fn load(explicit: Option<&Utf8Path>, working_dir: &Utf8Path) -> Result<Self> {
        let path = match explicit {
            Some(path) if path.is_file() => path.to_owned(),
            Some(path) => {
                return Err(PatcherError::ConfigNotFound {
                    path: path.to_owned(),
                });
            }
            None => {
                let implicit = working_dir.join(CONFIG_FILE_NAME);
                if !implicit.is_file() {
                    debug!("no {CONFIG_FILE_NAME} in {working_dir}; using defaults");
                    return Ok(Self::default());
                }
                implicit
            }
        };

        debug!("loading configuration from {path}");
        let source = std::fs::read_to_string(&path)?;
        Self::parse(&source, &path)
    }
}

/// Fully resolved settings for one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding the tool artifacts.
    pub tools_dir: Utf8PathBuf,
    /// Directory holding the APKs to patch.
    pub apk_dir: Utf8PathBuf,
    /// Directory for patched APKs.
    pub output_dir: Utf8PathBuf,
    /// Scratch directory handed to the patcher.
    pub temp_dir: Utf8PathBuf,
    /// GitHub token for release lookups.
    pub github_token: Option<String>,
    /// Root of the GitHub REST API.
    pub github_api_base: String,
    /// Whether downloaded tools are signature-checked.
    pub verify_signatures: bool,
    /// Whether downloads are disabled.
    pub offline: bool,
    /// Java launcher.
    pub java: String,
    /// Programs used by the probes.
    pub inspection: InspectionTools,
    /// GnuPG executable.
    pub gpg: String,
    /// Limit for one patch run.
    pub patch_timeout: Duration,
    /// Limit for one probe or signature check.
    pub probe_timeout: Duration,
    /// Limit for one HTTP request.
    pub download_timeout: Duration,
    /// Bound on reuse of release metadata.
    pub cache_bound: CacheBound,
    /// Upstream project per category.
    pub projects: ReleaseProjects,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(ConfigFile::default(), &GlobalArgs::default())
    }
}

impl Settings {
    /// Layer `args` over `file` over the built-in defaults.
    #[must_use]
    pub fn resolve(file: ConfigFile, args: &GlobalArgs) -> Self {
        let dir = |flag: &Option<Utf8PathBuf>, file: Option<Utf8PathBuf>, default: &str| {
            flag.clone()
                .or(file)
                .unwrap_or_else(|| Utf8PathBuf::from(default))
        };
        let secs = |value: Option<u64>, default| Duration::from_secs(value.unwrap_or(default));

        Self {
            tools_dir: dir(&args.tools_dir, file.tools_dir, DEFAULT_TOOLS_DIR),
            apk_dir: dir(&args.apk_dir, file.apk_dir, DEFAULT_APK_DIR),
            output_dir: dir(&args.output_dir, file.output_dir, DEFAULT_OUTPUT_DIR),
            temp_dir: file
                .temp_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_TEMP_DIR)),
            github_token: args
                .token
                .clone()
                .or(file.github_token)
                .filter(|token| !token.trim().is_empty()),
            github_api_base: file
                .github_api_base
                .filter(|base| !base.trim().is_empty())
                .unwrap_or_else(|| GITHUB_API_BASE.to_owned()),
            verify_signatures: !args.no_verify && file.verify_signatures.unwrap_or(true),
            offline: args.offline,
            java: file.java.unwrap_or_else(|| DEFAULT_JAVA.to_owned()),
            inspection: InspectionTools {
                aapt: file.aapt.unwrap_or_else(|| DEFAULT_AAPT.to_owned()),
                apksigner: file
                    .apksigner
                    .unwrap_or_else(|| DEFAULT_APKSIGNER.to_owned()),
            },
            gpg: file.gpg.unwrap_or_else(|| DEFAULT_GPG.to_owned()),
            patch_timeout: secs(file.patch_timeout_secs, DEFAULT_PATCH_TIMEOUT_SECS),
            probe_timeout: secs(file.probe_timeout_secs, DEFAULT_PROBE_TIMEOUT_SECS),
            download_timeout: secs(file.download_timeout_secs, DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            cache_bound: CacheBound::MaxAge(secs(
                file.release_cache_max_age_secs,
                DEFAULT_RELEASE_CACHE_MAX_AGE_SECS,
            )),
            projects: file.sources.resolve(),
        }
    }

    /// Load the configuration file named by `args` (or the implicit one in
    /// `working_dir`) and layer `args` over it.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ConfigFile::load`].
    pub fn load(args: &GlobalArgs, working_dir: &Utf8Path) -> Result<Self> {
        let file = ConfigFile::load(args.config.as_deref(), working_dir)?;
        Ok(Self::resolve(file, args))
    }
}
