//! Test doubles shared by the behavioural tests.
//!
//! Mock types generated by `mockall` are only visible to unit tests, so the
//! behavioural suites use these hand-written fakes for the release, download
//! and verification seams.

#![allow(dead_code)]

use camino::Utf8PathBuf;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

use revanced_assist::pipeline::PipelinePaths;
use revanced_assist::release::{
    ArtefactDownloader, DownloadError, Release, ReleaseAsset, ReleaseError, ReleaseProject,
    ReleaseSource,
};
use revanced_assist::signature::VerificationBackend;

/// Store, input, output and scratch directories under one temporary root.
pub struct TempWorkspace {
    _dir: TempDir,
    /// Directory layout handed to the pipeline.
    pub paths: PipelinePaths,
}

impl TempWorkspace {
    /// Create an empty workspace. No directory except the root exists yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("temp dir not UTF-8");
        let paths = PipelinePaths {
            tools_dir: root.join("tools"),
            apk_dir: root.join("apk"),
            output_dir: root.join("patched"),
            temp_dir: root.join("revanced-cache"),
        };
        Self { _dir: dir, paths }
    }

    /// Write placeholder tool artifacts into the store.
    pub fn seed_tools(&self, names: &[&str]) {
        std::fs::create_dir_all(&self.paths.tools_dir).expect("failed to create tools dir");
        for name in names {
            std::fs::write(self.paths.tools_dir.join(name), b"tool").expect("failed to seed tool");
        }
    }

    /// Write placeholder target packages into the input directory.
    pub fn seed_targets(&self, names: &[&str]) {
        std::fs::create_dir_all(&self.paths.apk_dir).expect("failed to create apk dir");
        for name in names {
            std::fs::write(self.paths.apk_dir.join(name), b"apk").expect("failed to seed target");
        }
    }
}

/// The three artifacts of a complete local toolchain.
pub const FULL_TOOLCHAIN: [&str; 3] = [
    "revanced-cli-4.6.0-all.jar",
    "revanced-patches-4.10.0.jar",
    "revanced-integrations-1.12.0.apk",
];

/// Build an asset whose download URL ends with its name.
pub fn asset(name: &str, content_type: &str) -> ReleaseAsset {
    ReleaseAsset {
        name: name.to_owned(),
        download_url: format!("https://example.invalid/download/{name}"),
        content_type: content_type.to_owned(),
        digest: None,
    }
}

/// Build a release tagged `tag` carrying `assets`.
pub fn release(tag: &str, assets: Vec<ReleaseAsset>) -> Release {
    Release {
        name: Some(tag.to_owned()),
        tag_name: tag.to_owned(),
        assets,
    }
}

/// Releases keyed by repository name; unknown repositories are not found.
#[derive(Default)]
pub struct FakeReleaseSource {
    releases: HashMap<String, Result<Release, ReleaseError>>,
    fallback: Option<ReleaseError>,
    calls: Rc<Cell<usize>>,
}

impl FakeReleaseSource {
    /// Serve `release` for `repo`.
    pub fn with_release(mut self, repo: &str, release: Release) -> Self {
        self.releases.insert(repo.to_owned(), Ok(release));
        self
    }

    /// Fail every lookup of `repo` with `error`.
    pub fn failing(mut self, repo: &str, error: ReleaseError) -> Self {
        self.releases.insert(repo.to_owned(), Err(error));
        self
    }

    /// Answer every lookup without a specific entry as rate limited.
    pub fn rate_limited(mut self) -> Self {
        self.fallback = Some(ReleaseError::RateLimited {
            project: "any".to_owned(),
        });
        self
    }

    /// Shared counter of lookups performed.
    pub fn call_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.calls)
    }
}

impl ReleaseSource for FakeReleaseSource {
    fn latest_release(&self, project: &ReleaseProject) -> Result<Release, ReleaseError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(result) = self.releases.get(&project.repo) {
            return result.clone();
        }
        Err(self
            .fallback
            .clone()
            .unwrap_or_else(|| ReleaseError::NotFound {
                project: project.to_string(),
            }))
    }
}

/// Writes the last URL segment as the file body and records each URL.
#[derive(Default)]
pub struct FakeDownloader {
    urls: RefCell<Vec<String>>,
}

impl FakeDownloader {
    /// URLs requested so far.
    pub fn urls(&self) -> Vec<String> {
        self.urls.borrow().clone()
    }
}

impl ArtefactDownloader for FakeDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        self.urls.borrow_mut().push(url.to_owned());
        let body = url.rsplit('/').next().unwrap_or_default();
        std::fs::write(dest, body.as_bytes())?;
        Ok(())
    }
}

/// A backend with a fixed verdict.
pub struct FixedVerdict(pub bool);

impl VerificationBackend for FixedVerdict {
    fn verify(&self, _payload: &[u8], _signature: &[u8]) -> bool {
        self.0
    }
}
