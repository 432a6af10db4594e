//! Package inspection probes.
//!
//! Seven independent external invocations describe a target package. Each
//! probe either yields a value or records [`UNKNOWN_SENTINEL`]; one failing
//! probe never affects the others, and all seven always run.

use std::collections::BTreeMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use serde::{Serialize, Serializer};

use crate::command::{CommandExecutor, describe_failure};
use crate::selection::ToolSet;
use crate::version::Version;

/// Value recorded for a probe that produced nothing usable.
pub const UNKNOWN_SENTINEL: &str = "Unknown (Error)";

/// Default packaging tool.
pub const DEFAULT_AAPT: &str = "aapt";

/// Default signing tool.
pub const DEFAULT_APKSIGNER: &str = "apksigner";

/// The fixed battery of probes, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    /// Application label.
    AppName,
    /// Version name.
    VersionName,
    /// Minimum SDK level.
    MinSdk,
    /// Target SDK level.
    TargetSdk,
    /// Version of the packaging tool.
    PackagingToolVersion,
    /// Version of the signing tool.
    SignerToolVersion,
    /// Signer certificate identity.
    SignerIdentity,
}

impl Probe {
    /// All probes, in execution order.
    pub const ALL: [Self; 7] = [
        Self::AppName,
        Self::VersionName,
        Self::MinSdk,
        Self::TargetSdk,
        Self::PackagingToolVersion,
        Self::SignerToolVersion,
        Self::SignerIdentity,
    ];

    /// Human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AppName => "app name",
            Self::VersionName => "version name",
            Self::MinSdk => "min SDK",
            Self::TargetSdk => "target SDK",
            Self::PackagingToolVersion => "packaging tool version",
            Self::SignerToolVersion => "signer tool version",
            Self::SignerIdentity => "signer identity",
        }
    }

    /// `aapt dump badging` field prefixes holding this probe's value.
    const fn badging_fields(self) -> &'static [&'static str] {
        match self {
            Self::AppName => &["application-label:'"],
            Self::VersionName => &["versionName='"],
            Self::MinSdk => &["sdkVersion:'", "minSdkVersion:'"],
            Self::TargetSdk => &["targetSdkVersion:'"],
            Self::PackagingToolVersion | Self::SignerToolVersion | Self::SignerIdentity => &[],
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A probe value, or the fact that the probe failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeValue {
    /// The probe produced this value.
    Known(String),
    /// The probe failed; rendered as [`UNKNOWN_SENTINEL`].
    Unknown,
}

impl ProbeValue {
    /// The value, or the sentinel.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(value) => value,
            Self::Unknown => UNKNOWN_SENTINEL,
        }
    }

    /// Returns true if the probe produced a value.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl fmt::Display for ProbeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProbeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// How a single probe went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The probe produced a value.
    Ok,
    /// The probe failed for the given reason.
    Failed(String),
}

/// Versions of the patch toolchain used for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolVersions {
    /// Patcher CLI version.
    pub cli: Version,
    /// Patch bundle version.
    pub patches: Version,
    /// Integrations version.
    pub integrations: Version,
    /// True when the patch bundle is in the experimental format.
    pub experimental_bundle: bool,
}

impl From<&ToolSet> for ToolVersions {
    fn from(tools: &ToolSet) -> Self {
        Self {
            cli: tools.cli.version.clone(),
            patches: tools.patches.version.clone(),
            integrations: tools.integrations.version.clone(),
            experimental_bundle: tools.patches.is_experimental_bundle(),
        }
    }
}

/// Everything the probes learnt about one target package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectionReport {
    /// Package inspected.
    pub target: Utf8PathBuf,
    /// Application label.
    pub app_name: ProbeValue,
    /// Version name.
    pub version_name: ProbeValue,
    /// Minimum SDK level.
    pub min_sdk: ProbeValue,
    /// Upper end of the SDK range: the package's target SDK level.
    pub max_sdk: ProbeValue,
    /// Packaging tool version.
    pub packaging_tool_version: ProbeValue,
    /// Signing tool version.
    pub signer_tool_version: ProbeValue,
    /// Signer certificate identity.
    pub signer_identity: ProbeValue,
    /// Toolchain versions used for the run.
    pub tool_versions: ToolVersions,
    /// Outcome of each probe.
    pub statuses: BTreeMap<Probe, ProbeStatus>,
}

impl InspectionReport {
    /// The value recorded for `probe`.
    #[must_use]
    pub const fn field(&self, probe: Probe) -> &ProbeValue {
        match probe {
            Probe::AppName => &self.app_name,
            Probe::VersionName => &self.version_name,
            Probe::MinSdk => &self.min_sdk,
            Probe::TargetSdk => &self.max_sdk,
            Probe::PackagingToolVersion => &self.packaging_tool_version,
            Probe::SignerToolVersion => &self.signer_tool_version,
            Probe::SignerIdentity => &self.signer_identity,
        }
    }

    /// Returns true if every probe produced a value.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        Probe::ALL.iter().all(|probe| self.field(*probe).is_known())
    }

    /// SDK range as `min - max`.
    #[must_use]
    pub fn sdk_range(&self) -> String {
        format!("{} - {}", self.min_sdk, self.max_sdk)
    }
}

/// Programs used by the probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionTools {
    /// Packaging tool, queried for badging and its own version.
    pub aapt: String,
    /// Signing tool, queried for its version and the signer certificates.
    pub apksigner: String,
}

impl Default for InspectionTools {
    fn default() -> Self {
        Self {
            aapt: DEFAULT_AAPT.to_owned(),
            apksigner: DEFAULT_APKSIGNER.to_owned(),
        }
    }
}

/// Runs the probe battery through a [`CommandExecutor`].
pub struct InspectionRunner<'a> {
    executor: &'a dyn CommandExecutor,
    tools: InspectionTools,
}

impl<'a> InspectionRunner<'a> {
    /// Create a runner using `tools`.
    #[must_use]
    pub const fn new(executor: &'a dyn CommandExecutor, tools: InspectionTools) -> Self {
        Self { executor, tools }
    }

    /// Run all seven probes against `target`.
    #[must_use]
    pub fn inspect(&self, target: &Utf8Path, tool_versions: ToolVersions) -> InspectionReport {
        let mut values = BTreeMap::new();
        let mut statuses = BTreeMap::new();
        for probe in Probe::ALL {
            let (value, status) = match self.probe(probe, target) {
                Ok(value) => (ProbeValue::Known(value), ProbeStatus::Ok),
                Err(reason) => {
                    warn!("{probe} probe failed for {target}: {reason}");
                    (ProbeValue::Unknown, ProbeStatus::Failed(reason))
                }
            };
            values.insert(probe, value);
            statuses.insert(probe, status);
        }

        let mut take = |probe: Probe| values.remove(&probe).unwrap_or(ProbeValue::Unknown);
        InspectionReport {
            target: target.to_owned(),
            app_name: take(Probe::AppName),
            version_name: take(Probe::VersionName),
            min_sdk: take(Probe::MinSdk),
            max_sdk: take(Probe::TargetSdk),
            packaging_tool_version: take(Probe::PackagingToolVersion),
            signer_tool_version: take(Probe::SignerToolVersion),
            signer_identity: take(Probe::SignerIdentity),
            tool_versions,
            statuses,
        }
    }

    /// Run one probe, returning its value or why it failed.
    fn probe(&self, probe: Probe, target: &Utf8Path) -> Result<String, String> {
        let (program, args): (&str, Vec<&str>) = match probe {
            Probe::AppName | Probe::VersionName | Probe::MinSdk | Probe::TargetSdk => {
                (self.tools.aapt.as_str(), vec!["dump", "badging", target.as_str()])
            }
            Probe::PackagingToolVersion => (self.tools.aapt.as_str(), vec!["v"]),
            Probe::SignerToolVersion => (self.tools.apksigner.as_str(), vec!["version"]),
            Probe::SignerIdentity => (
                self.tools.apksigner.as_str(),
                vec!["verify", "--print-certs", target.as_str()],
            ),
        };
        debug!("probe {probe}: {program} {}", args.join(" "));

        let output = self
            .executor
            .run(program, &args)
            .map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(describe_failure(&output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let value = match probe {
            Probe::PackagingToolVersion | Probe::SignerToolVersion => first_line(&stdout),
            Probe::SignerIdentity => signer_identity(&stdout),
            _ => badging_field(&stdout, probe.badging_fields()),
        };
        value.ok_or_else(|| format!("no {probe} in {program} output"))
    }
}

impl fmt::Debug for InspectionRunner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InspectionRunner")
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

/// Extract the quoted value following the first matching field marker.
///
/// Markers are tried in order. A marker matches at the start of a line or
/// after a space, so `sdkVersion:'` does not match inside
/// `targetSdkVersion:'`.
fn badging_field(output: &str, markers: &[&str]) -> Option<String> {
    markers.iter().find_map(|marker| {
        output.lines().find_map(|line| {
            let start = line
                .match_indices(marker)
                .find(|(idx, _)| *idx == 0 || line[..*idx].ends_with(' '))
                .map(|(idx, _)| idx + marker.len())?;
            let rest = &line[start..];
            let value = &rest[..rest.find('\'')?];
            (!value.is_empty()).then(|| value.to_owned())
        })
    })
}

fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_owned)
}

/// Signer DNs joined with `; `, or the whole trimmed output when no DN
/// line is present.
fn signer_identity(output: &str) -> Option<String> {
    let dns: Vec<&str> = output
        .lines()
        .filter_map(|line| line.split_once("certificate DN: ").map(|(_, dn)| dn.trim()))
        .filter(|dn| !dn.is_empty())
        .collect();
    if dns.is_empty() {
        let trimmed = output.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
    } else {
        Some(dns.join("; "))
    }
}

#[cfg(test)]
#[path = "inspect_tests.rs"]
mod tests;
