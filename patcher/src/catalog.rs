//! Local artifact store scanning and version selection.
//!
//! The store is a flat directory of downloaded tool artifacts:
//! ```text
//! {store_root}/revanced-{category}-{version}[...].{ext}
//! ```
//! Files that match a category pattern but carry no parseable version are
//! skipped silently.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use log::trace;
use serde::Serialize;

use crate::selection::ToolSelection;
use crate::tool::ToolCategory;
use crate::version::Version;

/// A tool artifact found in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionedArtifact {
    /// Category matched by the filename.
    pub category: ToolCategory,
    /// Full path to the file.
    pub path: Utf8PathBuf,
    /// Version extracted from the filename.
    pub version: Version,
    /// File extension without the leading dot.
    pub extension: String,
}

/// Artifacts in the store grouped by category.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    by_category: BTreeMap<ToolCategory, Vec<VersionedArtifact>>,
}

impl Catalog {
    /// Artifacts found for `category`, sorted by path.
    #[must_use]
    pub fn artifacts(&self, category: ToolCategory) -> &[VersionedArtifact] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Latest artifact for `category`; see [`select_latest`].
    #[must_use]
    pub fn select_latest(&self, category: ToolCategory) -> Option<ToolSelection> {
        select_latest(self.artifacts(category))
    }

    /// Categories with no artifact at all.
    #[must_use]
    pub fn missing(&self) -> Vec<ToolCategory> {
        ToolCategory::ALL
            .into_iter()
            .filter(|category| self.artifacts(*category).is_empty())
            .collect()
    }

    /// Returns true if the store holds no recognised artifact.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_category.values().all(Vec::is_empty)
    }

    /// Iterate over every category, including empty ones.
    pub fn iter(&self) -> impl Iterator<Item = (ToolCategory, &[VersionedArtifact])> {
        ToolCategory::ALL
            .into_iter()
            .map(|category| (category, self.artifacts(category)))
    }
}

/// Scan the store for all categories.
///
/// A store directory that does not exist scans as empty.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn scan(store_root: &Utf8Path) -> io::Result<Catalog> {
    let files = store_files(store_root)?;
    let by_category = ToolCategory::ALL
        .into_iter()
        .map(|category| (category, classify_all(&files, category)))
        .collect();
    Ok(Catalog { by_category })
}

/// Scan the store for a single category.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn scan_category(
    store_root: &Utf8Path,
    category: ToolCategory,
) -> io::Result<Vec<VersionedArtifact>> {
    let files = store_files(store_root)?;
    Ok(classify_all(&files, category))
}

/// Choose the latest artifact from `artifacts`.
///
/// Versions compare numerically by `MAJOR.MINOR.PATCH`; metadata is
/// ignored. Among equal versions the lexicographically smallest path wins,
/// so the result never depends on directory enumeration order.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use revanced_assist::catalog::{VersionedArtifact, select_latest};
/// use revanced_assist::tool::ToolCategory;
/// use revanced_assist::version::Version;
///
/// let artifact = |v: &str| VersionedArtifact {
///     category: ToolCategory::Cli,
///     path: Utf8PathBuf::from(format!("tools/revanced-cli-{v}.jar")),
///     version: Version::parse(v).expect("valid"),
///     extension: "jar".to_owned(),
/// };
/// let chosen = select_latest(&[artifact("2.9.9"), artifact("2.10.0")]).expect("non-empty");
/// assert_eq!(chosen.version.to_string(), "2.10.0");
/// assert!(select_latest(&[]).is_none());
/// ```
#[must_use]
pub fn select_latest(artifacts: &[VersionedArtifact]) -> Option<ToolSelection> {
    artifacts
        .iter()
        .min_by(|a, b| rank(a, b))
        .map(|best| ToolSelection {
            category: best.category,
            version: best.version.clone(),
            path: best.path.clone(),
        })
}

/// Orders the preferred artifact first.
fn rank(a: &VersionedArtifact, b: &VersionedArtifact) -> Ordering {
    b.version
        .cmp_precedence(&a.version)
        .then_with(|| a.path.cmp(&b.path))
}

/// List regular files in the store, sorted by path.
fn store_files(store_root: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    if !store_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in store_root.read_dir_utf8()? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                trace!("store_files: skipping non-UTF-8 entry in {store_root}: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        if entry.file_type()?.is_file() {
            files.push(entry.path().to_owned());
        }
    }
    files.sort();
    Ok(files)
}

fn classify_all(files: &[Utf8PathBuf], category: ToolCategory) -> Vec<VersionedArtifact> {
    let patterns = category_patterns(category);
    files
        .iter()
        .filter_map(|path| classify(path, category, &patterns))
        .collect()
}

fn classify(
    path: &Utf8Path,
    category: ToolCategory,
    patterns: &[(Pattern, &'static str)],
) -> Option<VersionedArtifact> {
    let file_name = path.file_name()?;
    let (_, extension) = patterns
        .iter()
        .find(|(pattern, _)| pattern.matches(file_name))?;
    let Some(version) = Version::find_in(file_name) else {
        trace!("classify: no version in {file_name}, skipping");
        return None;
    };

    Some(VersionedArtifact {
        category,
        path: path.to_owned(),
        version,
        extension: (*extension).to_owned(),
    })
}

/// Filename patterns for `category`, paired with the extension they match.
fn category_patterns(category: ToolCategory) -> Vec<(Pattern, &'static str)> {
    category
        .extensions()
        .iter()
        .filter_map(|ext| {
            Pattern::new(&format!("{}-*.{ext}", category.file_stem()))
                .ok()
                .map(|pattern| (pattern, *ext))
        })
        .collect()
}
