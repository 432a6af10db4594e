//! Running the patcher against one target package.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use serde::Serialize;

use crate::command::{CommandExecutor, describe_failure};
use crate::selection::ToolSet;

/// Default Java launcher.
pub const DEFAULT_JAVA: &str = "java";

/// One target package to patch with a resolved tool triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchJob {
    /// Package being patched.
    pub target: Utf8PathBuf,
    /// Tools used for this job.
    pub tools: ToolSet,
    /// Where the patched package is expected to land.
    pub output: Utf8PathBuf,
    /// Scratch directory handed to the patcher.
    pub temp_dir: Utf8PathBuf,
}

impl PatchJob {
    /// Build the job for `target`; the output keeps the target's file name
    /// inside `output_dir`.
    #[must_use]
    pub fn new(
        target: &Utf8Path,
        tools: ToolSet,
        output_dir: &Utf8Path,
        temp_dir: &Utf8Path,
    ) -> Self {
        let output = target
            .file_name()
            .map_or_else(|| output_dir.to_owned(), |name| output_dir.join(name));
        Self {
            target: target.to_owned(),
            tools,
            output,
            temp_dir: temp_dir.to_owned(),
        }
    }

    /// Arguments passed to the Java launcher.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::{Utf8Path, Utf8PathBuf};
    /// use revanced_assist::patch::PatchJob;
    /// use revanced_assist::selection::{ToolSelection, ToolSet};
    /// use revanced_assist::tool::ToolCategory;
    /// use revanced_assist::version::Version;
    ///
    /// let pick = |category, path: &str| ToolSelection {
    ///     category,
    ///     version: Version::find_in(path).expect("version"),
    ///     path: Utf8PathBuf::from(path),
    /// };
    /// let tools = ToolSet {
    ///     cli: pick(ToolCategory::Cli, "tools/revanced-cli-4.6.0.jar"),
    ///     patches: pick(ToolCategory::Patches, "tools/revanced-patches-4.10.0.jar"),
    ///     integrations: pick(ToolCategory::Integrations, "tools/revanced-integrations-1.12.0.apk"),
    /// };
    /// let job = PatchJob::new(
    ///     Utf8Path::new("apk/app.apk"),
    ///     tools,
    ///     Utf8Path::new("patched"),
    ///     Utf8Path::new("revanced-cache"),
    /// );
    /// let args = job.arguments();
    /// assert_eq!(args[..2], ["-jar", "tools/revanced-cli-4.6.0.jar"]);
    /// assert_eq!(args.last().map(String::as_str), Some("apk/app.apk"));
    /// ```
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        vec![
            "-jar".to_owned(),
            self.tools.cli.path.to_string(),
            "patch".to_owned(),
            "--purge".to_owned(),
            "--temporary-files-path".to_owned(),
            self.temp_dir.to_string(),
            "--force".to_owned(),
            "--patch-bundle".to_owned(),
            self.tools.patches.path.to_string(),
            "--merge".to_owned(),
            self.tools.integrations.path.to_string(),
            self.target.to_string(),
        ]
    }
}

/// Outcome of one patch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchResult {
    /// The job that ran.
    pub job: PatchJob,
    /// True if the patcher exited with status zero.
    pub succeeded: bool,
    /// Captured stdout followed by stderr.
    pub raw_output: String,
    /// Why the job failed; always present and non-empty on failure.
    pub error_detail: Option<String>,
}

/// Runs patch jobs through a [`CommandExecutor`].
pub struct PatchExecutor<'a> {
    executor: &'a dyn CommandExecutor,
    java: String,
}

impl<'a> PatchExecutor<'a> {
    /// Create an executor launching the patcher with `java`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, java: impl Into<String>) -> Self {
        Self {
            executor,
            java: java.into(),
        }
    }

    /// Run `job` once. Never fails: launch errors and timeouts become a
    /// failed result.
    #[must_use]
    pub fn run(&self, job: PatchJob) -> PatchResult {
        let args = job.arguments();
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        debug!("running {} {}", self.java, args.join(" "));

        match self.executor.run(&self.java, &arg_refs) {
            Ok(output) => {
                let mut raw_output = String::from_utf8_lossy(&output.stdout).into_owned();
                raw_output.push_str(&String::from_utf8_lossy(&output.stderr));
                let error_detail = (!output.status.success()).then(|| describe_failure(&output));
                if let Some(detail) = &error_detail {
                    warn!("patching {} failed: {detail}", job.target);
                }
                PatchResult {
                    succeeded: error_detail.is_none(),
                    job,
                    raw_output,
                    error_detail,
                }
            }
            Err(e) => {
                warn!("could not run the patcher for {}: {e}", job.target);
                PatchResult {
                    job,
                    succeeded: false,
                    raw_output: String::new(),
                    error_detail: Some(e.to_string()),
                }
            }
        }
    }
}

impl std::fmt::Debug for PatchExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchExecutor")
            .field("java", &self.java)
            .finish_non_exhaustive()
    }
}
