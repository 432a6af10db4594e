//! Output formatting for run outcomes and the tool inventory.
//!
//! Human output is a series of GitHub-flavoured Markdown tables; JSON output
//! serialises the outcome as-is.

use serde::Serialize;

use crate::acquire::Acquisitions;
use crate::catalog::Catalog;
use crate::error::{PatcherError, Result};
use crate::inspect::{InspectionReport, ToolVersions};
use crate::patch::PatchResult;
use crate::pipeline::{Resolution, RunOutcome, RunReport};
use crate::selection::ToolSet;
use crate::tool::ToolCategory;

/// Shown in place of the integrations version for experimental bundles,
/// which embed their integrations.
pub const NOT_APPLICABLE: &str = "N/A";

/// Signature status of a tool that was already in the store.
pub const LOCAL_COPY: &str = "Local copy";

/// A table rendered in GitHub Markdown style.
///
/// # Examples
///
/// ```
/// use revanced_assist::report::Table;
///
/// let mut table = Table::new(["Tool Type", "Version"]);
/// table.push(["Cli", "4.6.0"]);
/// assert_eq!(
///     table.render(),
///     "| Tool Type | Version |\n|-----------|---------|\n| Cli       | 4.6.0   |\n",
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create an empty table with `headers`.
    #[must_use]
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with empty cells.
    pub fn push<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cells: Vec<String> = row.into_iter().map(Into::into).collect();
        cells.resize(self.headers.len().max(cells.len()), String::new());
        self.rows.push(cells);
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the table, one line per row plus the header separator.
    #[must_use]
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (index, cell) in row.iter().enumerate() {
                let width = cell.chars().count();
                match widths.get_mut(index) {
                    Some(current) => *current = (*current).max(width),
                    None => widths.push(width),
                }
            }
        }

        let mut output = render_row(&self.headers, &widths);
        output.push('|');
        for width in &widths {
            output.push_str(&"-".repeat(width + 2));
            output.push('|');
        }
        output.push('\n');
        for row in &self.rows {
            output.push_str(&render_row(row, &widths));
        }
        output
    }
}

fn render_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (index, width) in widths.iter().copied().enumerate() {
        let cell = cells.get(index).map_or("", String::as_str);
        line.push_str(&format!(" {cell:<width$} |"));
    }
    line.push('\n');
    line
}

fn file_name(path: &camino::Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

/// Table of every artifact in the store.
#[must_use]
pub fn inventory_table(inventory: &Catalog) -> Table {
    let mut table = Table::new(["Tool Type", "File", "Version"]);
    for (category, artifacts) in inventory.iter() {
        for artifact in artifacts {
            table.push([
                category.display_name().to_owned(),
                file_name(&artifact.path).to_owned(),
                artifact.version.to_string(),
            ]);
        }
    }
    table
}

/// Table of categories that could not be resolved.
#[must_use]
pub fn missing_table(missing: &[ToolCategory]) -> Table {
    let mut table = Table::new(["Missing Tool"]);
    for category in missing {
        table.push([category.display_name()]);
    }
    table
}

/// One row per target: app details and patch outcome.
#[must_use]
pub fn summary_table(report: &RunReport) -> Table {
    let mut table = Table::new([
        "APK File",
        "App Name",
        "App Version",
        "SDK Range",
        "Patch Status",
    ]);
    for (result, inspection) in report.patch_results.iter().zip(&report.inspections) {
        table.push([
            file_name(&inspection.target).to_owned(),
            inspection.app_name.to_string(),
            inspection.version_name.to_string(),
            inspection.sdk_range(),
            patch_status(result).to_owned(),
        ]);
    }
    table
}

/// One row per target: the toolchain that processed it.
#[must_use]
pub fn tool_table(report: &RunReport) -> Table {
    let mut table = Table::new([
        "APK File",
        "ReVanced CLI",
        "ReVanced Patches",
        "ReVanced Integrations",
        "Packaging Tool",
        "Signing Tool",
        "Signature Status",
    ]);
    let status = signature_status(&report.tools, &report.acquisitions);
    for inspection in &report.inspections {
        table.push([
            file_name(&inspection.target).to_owned(),
            inspection.tool_versions.cli.to_string(),
            inspection.tool_versions.patches.to_string(),
            integrations_version(&inspection.tool_versions),
            inspection.packaging_tool_version.to_string(),
            inspection.signer_tool_version.to_string(),
            status.clone(),
        ]);
    }
    table
}

/// Signature status of the tool triple.
///
/// A single label when every tool shares it, otherwise one label per tool.
/// Tools that were not downloaded in this run report [`LOCAL_COPY`].
#[must_use]
pub fn signature_status(tools: &ToolSet, acquisitions: &Acquisitions) -> String {
    let labels: Vec<(ToolCategory, String)> = ToolCategory::ALL
        .into_iter()
        .map(|category| {
            let label = acquisitions
                .get(&category)
                .and_then(|log| log.verification_of(tools.path(category)))
                .map_or_else(|| LOCAL_COPY.to_owned(), |v| v.to_string());
            (category, label)
        })
        .collect();

    match labels.split_first() {
        Some(((_, first), rest)) if rest.iter().all(|(_, label)| label == first) => first.clone(),
        _ => labels
            .iter()
            .map(|(category, label)| format!("{}: {label}", category.display_name()))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// One row per payload downloaded during the run.
#[must_use]
pub fn downloads_table(acquisitions: &Acquisitions) -> Table {
    let mut table = Table::new(["Tool Type", "File", "Signature Status"]);
    for (category, log) in acquisitions {
        for artifact in &log.stored {
            table.push([
                category.display_name().to_owned(),
                file_name(&artifact.path).to_owned(),
                artifact.verification.to_string(),
            ]);
        }
    }
    table
}

/// One row per asset that could not be downloaded.
#[must_use]
pub fn failed_downloads_table(acquisitions: &Acquisitions) -> Table {
    let mut table = Table::new(["Tool Type", "Asset", "Reason"]);
    for (category, log) in acquisitions {
        for asset in &log.failed {
            table.push([
                category.display_name().to_owned(),
                asset.name.clone(),
                asset.reason.clone(),
            ]);
        }
    }
    table
}

/// One row per target: the signer certificate identity.
#[must_use]
pub fn signer_table(inspections: &[InspectionReport]) -> Table {
    let mut table = Table::new(["APK File", "Signature"]);
    for inspection in inspections {
        table.push([
            file_name(&inspection.target).to_owned(),
            inspection.signer_identity.to_string(),
        ]);
    }
    table
}

const fn patch_status(result: &PatchResult) -> &'static str {
    if result.succeeded {
        "Processed successfully"
    } else {
        "Unable to process"
    }
}

fn integrations_version(versions: &ToolVersions) -> String {
    if versions.experimental_bundle {
        NOT_APPLICABLE.to_owned()
    } else {
        versions.integrations.to_string()
    }
}

fn section(output: &mut String, title: &str, table: &Table) {
    if !output.is_empty() {
        output.push('\n');
    }
    output.push_str(title);
    output.push_str(":\n\n");
    output.push_str(&table.render());
}

fn acquisition_sections(output: &mut String, acquisitions: &Acquisitions) {
    let downloads = downloads_table(acquisitions);
    if !downloads.is_empty() {
        section(output, "Downloads", &downloads);
    }
    let failed = failed_downloads_table(acquisitions);
    if !failed.is_empty() {
        section(output, "Failed downloads", &failed);
    }
}

/// Format the store inventory for human-readable output.
///
/// # Examples
///
/// ```
/// use revanced_assist::catalog::Catalog;
/// use revanced_assist::report::format_inventory;
///
/// let output = format_inventory(&Catalog::default());
/// assert!(output.contains("No tools found"));
/// ```
#[must_use]
pub fn format_inventory(inventory: &Catalog) -> String {
    if inventory.is_empty() {
        return String::from(
            "No tools found.\n\nRun `revanced-assist fetch` to download the latest releases.\n",
        );
    }
    let mut output = String::new();
    section(&mut output, "Tool inventory", &inventory_table(inventory));
    output
}

/// Format a run outcome for human-readable output.
#[must_use]
pub fn format_human(outcome: &RunOutcome) -> String {
    let mut output = format_inventory(outcome.inventory());
    acquisition_sections(&mut output, outcome.acquisitions());
    match outcome {
        RunOutcome::ToolsMissing { missing, .. } => {
            section(&mut output, "Missing tools", &missing_table(missing));
        }
        RunOutcome::NoTargets { input_dir, .. } => {
            output.push_str(&format!("\nNo APK files found in {input_dir}.\n"));
        }
        RunOutcome::Completed(report) => {
            section(&mut output, "Summary", &summary_table(report));
            section(&mut output, "Tools", &tool_table(report));
            section(&mut output, "Signatures", &signer_table(&report.inspections));
            let failures = report.failures();
            if failures > 0 {
                output.push_str(&format!(
                    "\n{failures} of {} target(s) could not be patched.\n",
                    report.patch_results.len()
                ));
            }
        }
    }
    output
}

/// Format a run outcome as JSON.
///
/// # Examples
///
/// ```
/// use revanced_assist::catalog::Catalog;
/// use revanced_assist::pipeline::RunOutcome;
/// use revanced_assist::report::format_json;
/// use revanced_assist::tool::ToolCategory;
///
/// let outcome = RunOutcome::ToolsMissing {
///     missing: vec![ToolCategory::Cli],
///     inventory: Catalog::default(),
///     acquisitions: Default::default(),
/// };
/// let json = format_json(&outcome).expect("serialisable outcome");
/// assert!(json.contains("\"outcome\": \"tools_missing\""));
/// ```
///
/// # Errors
///
/// Returns [`PatcherError::SerializeFailed`] if the outcome cannot be
/// serialised.
pub fn format_json(outcome: &RunOutcome) -> Result<String> {
    to_json(outcome)
}

/// Format the store inventory as JSON.
///
/// # Errors
///
/// Returns [`PatcherError::SerializeFailed`] if the inventory cannot be
/// serialised.
pub fn format_inventory_json(inventory: &Catalog) -> Result<String> {
    to_json(inventory)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|source| PatcherError::SerializeFailed { source })
}

/// Format the result of `fetch` for human-readable output.
#[must_use]
pub fn format_resolution(resolution: &Resolution) -> String {
    let mut output = format_inventory(&resolution.inventory);
    acquisition_sections(&mut output, &resolution.acquisitions);
    if let Err(missing) = &resolution.tools {
        section(&mut output, "Missing tools", &missing_table(missing));
    }
    output
}

/// Format the result of `fetch` as JSON.
///
/// # Errors
///
/// Returns [`PatcherError::SerializeFailed`] if the resolution cannot be
/// serialised.
pub fn format_resolution_json(resolution: &Resolution) -> Result<String> {
    let missing: &[ToolCategory] = match &resolution.tools {
        Ok(_) => &[],
        Err(missing) => missing,
    };
    let json = ResolutionJson {
        inventory: &resolution.inventory,
        missing,
        acquisitions: &resolution.acquisitions,
    };
    to_json(&json)
}

/// JSON representation of a tool resolution.
#[derive(Debug, Serialize)]
struct ResolutionJson<'a> {
    inventory: &'a Catalog,
    missing: &'a [ToolCategory],
    acquisitions: &'a Acquisitions,
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
