//! Resolved tool choices for a pipeline run.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::tool::{EXPERIMENTAL_BUNDLE_EXTENSION, ToolCategory};
use crate::version::Version;

/// The artifact chosen for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSelection {
    /// Category the artifact belongs to.
    pub category: ToolCategory,
    /// Version that won selection.
    pub version: Version,
    /// Location of the artifact in the store.
    pub path: Utf8PathBuf,
}

impl ToolSelection {
    /// Returns true when the artifact uses the experimental bundle format.
    #[must_use]
    pub fn is_experimental_bundle(&self) -> bool {
        self.path.extension() == Some(EXPERIMENTAL_BUNDLE_EXTENSION)
    }
}

/// One selection per category, as required to run a patch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSet {
    /// The patcher CLI.
    pub cli: ToolSelection,
    /// The patch bundle.
    pub patches: ToolSelection,
    /// The integrations package.
    pub integrations: ToolSelection,
}

impl ToolSet {
    /// Assemble a tool set from per-category selections.
    ///
    /// # Errors
    ///
    /// Returns the categories that have no selection, in
    /// [`ToolCategory::ALL`] order.
    pub fn from_selections(
        mut selections: BTreeMap<ToolCategory, ToolSelection>,
    ) -> Result<Self, Vec<ToolCategory>> {
        let missing: Vec<ToolCategory> = ToolCategory::ALL
            .into_iter()
            .filter(|category| !selections.contains_key(category))
            .collect();

        match (
            selections.remove(&ToolCategory::Cli),
            selections.remove(&ToolCategory::Patches),
            selections.remove(&ToolCategory::Integrations),
        ) {
            (Some(cli), Some(patches), Some(integrations)) => Ok(Self {
                cli,
                patches,
                integrations,
            }),
            _ => Err(missing),
        }
    }

    /// Look up the selection for `category`.
    #[must_use]
    pub const fn get(&self, category: ToolCategory) -> &ToolSelection {
        match category {
            ToolCategory::Cli => &self.cli,
            ToolCategory::Patches => &self.patches,
            ToolCategory::Integrations => &self.integrations,
        }
    }

    /// Path of the artifact chosen for `category`.
    #[must_use]
    pub fn path(&self, category: ToolCategory) -> &Utf8Path {
        &self.get(category).path
    }
}
