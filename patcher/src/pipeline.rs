//! Run orchestration.
//!
//! The controller resolves the tool triple (scanning the store and, unless
//! offline, acquiring what is missing), then patches and inspects every
//! target package in order. Per-target failures are recorded, never raised;
//! only missing tools or an empty input directory end a run early.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use log::{debug, info, trace};
use serde::Serialize;

use crate::acquire::{Acquisitions, ArtifactAcquirer};
use crate::catalog::{self, Catalog};
use crate::error::{PatcherError, Result};
use crate::inspect::{InspectionReport, InspectionRunner, ToolVersions};
use crate::output::Progress;
use crate::patch::{PatchExecutor, PatchJob, PatchResult};
use crate::selection::ToolSet;
use crate::tool::ToolCategory;

/// Extension of target packages.
pub const TARGET_EXTENSION: &str = "apk";

/// Where a run is up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Not started.
    Idle,
    /// Scanning the store and acquiring missing tools.
    ToolsResolving,
    /// All three tools resolved.
    ToolsReady,
    /// At least one tool could not be resolved. Terminal.
    ToolsMissing,
    /// The input directory holds no target packages. Terminal.
    NoTargets,
    /// Patching and inspecting targets.
    ProcessingTargets,
    /// Every target processed. Terminal.
    Reporting,
}

impl PipelineState {
    /// Returns true for states that end a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ToolsMissing | Self::NoTargets | Self::Reporting)
    }
}

/// Directories a run works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    /// Artifact store.
    pub tools_dir: Utf8PathBuf,
    /// Target packages.
    pub apk_dir: Utf8PathBuf,
    /// Patched packages.
    pub output_dir: Utf8PathBuf,
    /// Patcher scratch space.
    pub temp_dir: Utf8PathBuf,
}

/// Result of tool resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Store contents after any acquisition.
    pub inventory: Catalog,
    /// The tool triple, or the categories that could not be resolved.
    pub tools: std::result::Result<ToolSet, Vec<ToolCategory>>,
    /// Per-asset outcomes for every category that was fetched.
    pub acquisitions: Acquisitions,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Store contents used for the run.
    pub inventory: Catalog,
    /// Tools used for every target.
    pub tools: ToolSet,
    /// Per-asset outcomes for every category that was fetched.
    pub acquisitions: Acquisitions,
    /// One result per target, in processing order.
    pub patch_results: Vec<PatchResult>,
    /// One report per target, in processing order.
    pub inspections: Vec<InspectionReport>,
}

impl RunReport {
    /// Number of targets that failed to patch.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.patch_results.iter().filter(|r| !r.succeeded).count()
    }
}

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Tools could not be resolved; no target was touched.
    ToolsMissing {
        /// Unresolved categories.
        missing: Vec<ToolCategory>,
        /// Store contents.
        inventory: Catalog,
        /// Per-asset outcomes for every category that was fetched.
        acquisitions: Acquisitions,
    },
    /// Tools resolved but there was nothing to patch.
    NoTargets {
        /// Directory that was searched.
        input_dir: Utf8PathBuf,
        /// Store contents.
        inventory: Catalog,
        /// The resolved tools.
        tools: ToolSet,
        /// Per-asset outcomes for every category that was fetched.
        acquisitions: Acquisitions,
    },
    /// Every target was processed.
    Completed(RunReport),
}

impl RunOutcome {
    /// Store contents at the end of the run.
    #[must_use]
    pub const fn inventory(&self) -> &Catalog {
        match self {
            Self::ToolsMissing { inventory, .. } | Self::NoTargets { inventory, .. } => inventory,
            Self::Completed(report) => &report.inventory,
        }
    }

    /// Per-asset outcomes for every category that was fetched.
    #[must_use]
    pub const fn acquisitions(&self) -> &Acquisitions {
        match self {
            Self::ToolsMissing { acquisitions, .. } | Self::NoTargets { acquisitions, .. } => {
                acquisitions
            }
            Self::Completed(report) => &report.acquisitions,
        }
    }

    /// Process exit status for this outcome.
    ///
    /// `0` when every target patched, `1` when any patch failed, `2` for
    /// missing tools and `3` when there were no targets.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed(report) if report.failures() == 0 => 0,
            Self::Completed(_) => 1,
            Self::ToolsMissing { .. } => 2,
            Self::NoTargets { .. } => 3,
        }
    }
}

/// Drives one run through [`PipelineState`].
pub struct PipelineController<'a> {
    paths: PipelinePaths,
    acquirer: Option<ArtifactAcquirer<'a>>,
    patcher: PatchExecutor<'a>,
    inspector: InspectionRunner<'a>,
    state: PipelineState,
}

impl<'a> PipelineController<'a> {
    /// Create a controller. Without an acquirer the run is offline and
    /// only the local store is consulted.
    #[must_use]
    pub const fn new(
        paths: PipelinePaths,
        acquirer: Option<ArtifactAcquirer<'a>>,
        patcher: PatchExecutor<'a>,
        inspector: InspectionRunner<'a>,
    ) -> Self {
        Self {
            paths,
            acquirer,
            patcher,
            inspector,
            state: PipelineState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Scan the store and try to acquire each unresolved category once.
    ///
    /// # Errors
    ///
    /// Returns [`PatcherError::ScanFailed`] if the store exists but cannot
    /// be read.
    pub fn resolve_tools(&mut self, progress: &mut Progress<'_>) -> Result<Resolution> {
        self.transition(PipelineState::ToolsResolving);
        progress.line(format!("Scanning {} for tools...", self.paths.tools_dir));
        let mut inventory = self.scan_store()?;

        let mut selections = BTreeMap::new();
        let mut acquisitions = Acquisitions::new();
        let mut acquired = false;
        for category in ToolCategory::ALL {
            if let Some(selection) = inventory.select_latest(category) {
                selections.insert(category, selection);
                continue;
            }
            let Some(acquirer) = self.acquirer.as_mut() else {
                debug!("offline: not acquiring {category}");
                continue;
            };
            progress.line(format!(
                "Fetching the latest {} release...",
                category.display_name()
            ));
            acquired = true;
            if let Some(selection) = acquirer.ensure_present(category) {
                selections.insert(category, selection);
            }
            acquisitions.insert(category, acquirer.last_acquisition().clone());
        }
        if acquired {
            inventory = self.scan_store()?;
        }

        let tools = ToolSet::from_selections(selections);
        match &tools {
            Ok(tools) => {
                self.transition(PipelineState::ToolsReady);
                for category in ToolCategory::ALL {
                    let selection = tools.get(category);
                    info!(
                        "using {} {} ({})",
                        category.display_name(),
                        selection.version,
                        selection.path
                    );
                }
            }
            Err(missing) => {
                self.transition(PipelineState::ToolsMissing);
                for category in missing {
                    progress.always(format!(
                        "Requirements for {} not met.",
                        category.display_name()
                    ));
                }
            }
        }
        Ok(Resolution {
            inventory,
            tools,
            acquisitions,
        })
    }

    /// Run the whole pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store cannot be scanned or the output
    /// directory cannot be created. Patch and probe failures are recorded in
    /// the report.
    pub fn run(&mut self, progress: &mut Progress<'_>) -> Result<RunOutcome> {
        let Resolution {
            inventory,
            tools,
            acquisitions,
        } = self.resolve_tools(progress)?;
        let tools = match tools {
            Ok(tools) => tools,
            Err(missing) => {
                return Ok(RunOutcome::ToolsMissing {
                    missing,
                    inventory,
                    acquisitions,
                });
            }
        };

        let targets = self.targets()?;
        if targets.is_empty() {
            self.transition(PipelineState::NoTargets);
            progress.always(format!("No APK files found in {}.", self.paths.apk_dir));
            return Ok(RunOutcome::NoTargets {
                input_dir: self.paths.apk_dir.clone(),
                inventory,
                tools,
                acquisitions,
            });
        }

        fs::create_dir_all(&self.paths.output_dir)?;
        self.transition(PipelineState::ProcessingTargets);

        let tool_versions = ToolVersions::from(&tools);
        let mut patch_results = Vec::with_capacity(targets.len());
        let mut inspections = Vec::with_capacity(targets.len());
        for target in &targets {
            progress.line(format!("Patching {target}..."));
            let job = PatchJob::new(
                target,
                tools.clone(),
                &self.paths.output_dir,
                &self.paths.temp_dir,
            );
            let result = self.patcher.run(job);
            if let Some(detail) = &result.error_detail {
                progress.always(format!("Unable to process {target}: {detail}"));
            }
            patch_results.push(result);

            progress.line(format!("Inspecting {target}..."));
            inspections.push(self.inspector.inspect(target, tool_versions.clone()));
        }

        self.transition(PipelineState::Reporting);
        Ok(RunOutcome::Completed(RunReport {
            inventory,
            tools,
            acquisitions,
            patch_results,
            inspections,
        }))
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("pipeline: {:?} -> {next:?}", self.state);
        self.state = next;
    }

    fn scan_store(&self) -> Result<Catalog> {
        catalog::scan(&self.paths.tools_dir).map_err(|source| PatcherError::ScanFailed {
            path: self.paths.tools_dir.clone(),
            source,
        })
    }

    fn targets(&self) -> Result<Vec<Utf8PathBuf>> {
        find_targets(&self.paths.apk_dir)
    }
}

impl std::fmt::Debug for PipelineController<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("paths", &self.paths)
            .field("offline", &self.acquirer.is_none())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Target packages in `input_dir`, sorted by path.
///
/// A missing directory yields no targets.
///
/// # Errors
///
/// Returns an error if a directory entry cannot be read.
pub fn find_targets(input_dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let pattern = format!(
        "{}/*.{TARGET_EXTENSION}",
        Pattern::escape(input_dir.as_str())
    );
    let entries = glob::glob(&pattern).map_err(|e| {
        PatcherError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            e.to_string(),
        ))
    })?;

    let mut targets = Vec::new();
    for entry in entries {
        let path = entry.map_err(std::io::Error::from)?;
        if !path.is_file() {
            continue;
        }
        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) => targets.push(path),
            Err(path) => {
                return Err(PatcherError::NonUtf8Path {
                    path: path.to_string_lossy().into_owned(),
                });
            }
        }
    }
    targets.sort();
    trace!("found {} target(s) in {input_dir}", targets.len());
    Ok(targets)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
