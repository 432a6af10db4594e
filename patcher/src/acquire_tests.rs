//! Unit tests for artifact acquisition.

use super::*;
use crate::release::download::MockArtefactDownloader;
use crate::release::source::{MockReleaseSource, ReleaseError};
use crate::release::{CacheBound, Release};
use crate::signature::MockVerificationBackend;
use rstest::{fixture, rstest};
use tempfile::TempDir;

const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

struct Store {
    _dir: TempDir,
    root: Utf8PathBuf,
}

#[fixture]
fn store() -> Store {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 path");
    Store { _dir: dir, root }
}

fn asset(name: &str, content_type: &str) -> ReleaseAsset {
    ReleaseAsset {
        name: name.to_owned(),
        download_url: format!("https://example.invalid/{name}"),
        content_type: content_type.to_owned(),
        digest: None,
    }
}

fn jar(name: &str) -> ReleaseAsset {
    asset(name, "application/java-archive")
}

fn signature(name: &str) -> ReleaseAsset {
    asset(name, "application/pgp-signature")
}

fn release(assets: Vec<ReleaseAsset>) -> Release {
    Release {
        name: Some("v4.6.0".to_owned()),
        tag_name: "v4.6.0".to_owned(),
        assets,
    }
}

fn fetcher_returning(assets: Vec<ReleaseAsset>) -> ReleaseFetcher {
    let mut source = MockReleaseSource::new();
    source
        .expect_latest_release()
        .times(1)
        .returning(move |_| Ok(release(assets.clone())));
    ReleaseFetcher::new(Box::new(source), CacheBound::default())
}

/// A downloader that writes the URL's last segment as the file contents.
fn echo_downloader() -> MockArtefactDownloader {
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().returning(|url, dest| {
        let body = url.rsplit('/').next().unwrap_or_default();
        std::fs::write(dest, body.as_bytes())?;
        Ok(())
    });
    downloader
}

fn verifier(accepts: bool) -> SignatureVerifier {
    let mut backend = MockVerificationBackend::new();
    backend.expect_is_noop().return_const(false);
    backend.expect_verify().returning(move |_, _| accepts);
    SignatureVerifier::new(Box::new(backend))
}

#[rstest]
fn resolved_category_performs_no_network_access(store: Store) {
    std::fs::write(store.root.join("revanced-cli-4.6.0.jar"), b"jar").expect("seed");
    let mut source = MockReleaseSource::new();
    source.expect_latest_release().never();
    let mut fetcher = ReleaseFetcher::new(Box::new(source), CacheBound::default());
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let projects = ReleaseProjects::default();
    let verifier = SignatureVerifier::disabled();

    let mut acquirer =
        ArtifactAcquirer::new(&store.root, &projects, &mut fetcher, &downloader, &verifier);
    let first = acquirer.ensure_present(ToolCategory::Cli).expect("resolved");
    let second = acquirer.ensure_present(ToolCategory::Cli).expect("resolved");
    assert_eq!(first, second);
    assert_eq!(first.version.to_string(), "4.6.0");
}

#[rstest]
fn downloads_and_verifies_latest_release(store: Store) {
    let mut fetcher = fetcher_returning(vec![
        jar("revanced-cli-4.6.0-all.jar"),
        signature("revanced-cli-4.6.0-all.jar.asc"),
    ]);
    let downloader = echo_downloader();
    let projects = ReleaseProjects::default();
    let verifier = verifier(true);

    let mut acquirer =
        ArtifactAcquirer::new(&store.root, &projects, &mut fetcher, &downloader, &verifier);
    let selection = acquirer.ensure_present(ToolCategory::Cli).expect("acquired");

    assert_eq!(selection.path, store.root.join("revanced-cli-4.6.0-all.jar"));
    assert_eq!(
        acquirer.last_acquisition().stored,
        vec![StoredArtifact {
            path: selection.path.clone(),
            verification: Verification::Verified,
        }]
    );
    assert_eq!(
        acquirer.last_acquisition().verification_of(&selection.path),
        Some(Verification::Verified)
    );
    assert!(store.root.join("revanced-cli-4.6.0-all.jar.asc").is_file());
}

#[rstest]
fn failed_verification_does_not_block_use(store: Store) {
    let mut fetcher = fetcher_returning(vec![
        jar("revanced-patches-4.10.0.jar"),
        signature("revanced-patches-4.10.0.jar.asc"),
    ]);
    let downloader = echo_downloader();
    let projects = ReleaseProjects::default();
    let verifier = verifier(false);

    let mut acquirer =
        ArtifactAcquirer::new(&store.root, &projects, &mut fetcher, &downloader, &verifier);
    let selection = acquirer
        .ensure_present(ToolCategory::Patches)
        .expect("artifact usable despite failed verification");

    assert_eq!(selection.version.to_string(), "4.10.0");
    assert_eq!(
        acquirer.last_acquisition().stored[0].verification,
        Verification::Failed
    );
}

#[rstest]
fn unsigned_payload_is_flagged(store: Store) {
    let mut fetcher = fetcher_returning(vec![asset(
        "revanced-integrations-1.12.0.apk",
        "application/vnd.android.package-archive",
    )]);
    let downloader = echo_downloader();
    let projects = ReleaseProjects::default();
    let verifier = verifier(true);

    let mut acquirer =
        ArtifactAcquirer::new(&store.root, &projects, &mut fetcher, &downloader, &verifier);
    acquirer
        .ensure_present(ToolCategory::Integrations)
        .expect("acquired");
    assert_eq!(
        acquirer.last_acquisition().stored[0].verification,
        Verification::Unsigned
    );
}

#[rstest]
fn one_failed_asset_does_not_stop_the_others(store: Store) {
    let mut fetcher = fetcher_returning(vec![
        jar("revanced-patches-4.10.0.jar"),
        asset("revanced-patches-5.0.0.rvp", "application/octet-stream"),
    ]);
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().returning(|url, dest| {
        if url.ends_with(".jar") {
            Err(DownloadError::HttpError {
                url: url.to_owned(),
                reason: "connection reset".to_owned(),
            })
        } else {
            std::fs::write(dest, b"bundle")?;
            Ok(())
        }
    });
    let projects = ReleaseProjects::default();
    let verifier = SignatureVerifier::disabled();

    let mut acquirer =
        ArtifactAcquirer::new(&store.root, &projects, &mut fetcher, &downloader, &verifier);
    let selection = acquirer
        .ensure_present(ToolCategory::Patches)
        .expect("bundle acquired");

    assert!(selection.is_experimental_bundle());
    let log = acquirer.last_acquisition();
    assert_eq!(log.failed.len(), 1);
    assert_eq!(log.failed[0].name, "revanced-patches-4.10.0.jar");
    assert_eq!(log.stored[0].verification, Verification::Disabled);
}

#[rstest]
fn digest_mismatch_discards_the_file(store: Store) {
    let mut tampered = jar("revanced-cli-4.6.0.jar");
    tampered.digest = Some(format!("sha256:{EMPTY_SHA256}"));
    let mut fetcher = fetcher_returning(vec![tampered]);
    let downloader = echo_downloader();
    let projects = ReleaseProjects::default();
    let verifier = SignatureVerifier::disabled();

    let mut acquirer =
        ArtifactAcquirer::new(&store.root, &projects, &mut fetcher, &downloader, &verifier);
    assert!(acquirer.ensure_present(ToolCategory::Cli).is_none());
    assert!(!store.root.join("revanced-cli-4.6.0.jar").exists());
    assert!(acquirer.last_acquisition().failed[0].reason.contains("digest mismatch"));
}

#[rstest]
fn matching_digest_is_accepted(store: Store) {
    let mut published = jar("revanced-cli-4.6.0.jar");
    published.digest = Some(format!("sha256:{EMPTY_SHA256}"));
    let mut fetcher = fetcher_returning(vec![published]);
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().returning(|_, dest| {
        std::fs::write(dest, b"")?;
        Ok(())
    });
    let projects = ReleaseProjects::default();
    let verifier = SignatureVerifier::disabled();

    let mut acquirer =
        ArtifactAcquirer::new(&store.root, &projects, &mut fetcher, &downloader, &verifier);
    assert!(acquirer.ensure_present(ToolCategory::Cli).is_some());
}

#[rstest]
fn failed_release_lookup_leaves_category_unresolved(store: Store) {
    let mut source = MockReleaseSource::new();
    source.expect_latest_release().times(1).returning(|p| {
        Err(ReleaseError::RateLimited {
            project: p.to_string(),
        })
    });
    let mut fetcher = ReleaseFetcher::new(Box::new(source), CacheBound::default());
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let projects = ReleaseProjects::default();
    let verifier = SignatureVerifier::disabled();

    let mut acquirer =
        ArtifactAcquirer::new(&store.root, &projects, &mut fetcher, &downloader, &verifier);
    assert!(acquirer.ensure_present(ToolCategory::Integrations).is_none());
}

#[rstest]
fn unrelated_assets_are_not_downloaded(store: Store) {
    let mut fetcher = fetcher_returning(vec![
        asset("patches.json", "application/json"),
        jar("revanced-cli-4.6.0.jar"),
    ]);
    let mut downloader = MockArtefactDownloader::new();
    downloader
        .expect_download()
        .withf(|url, _| url.ends_with(".jar"))
        .times(1)
        .returning(|_, dest| {
            std::fs::write(dest, b"jar")?;
            Ok(())
        });
    let projects = ReleaseProjects::default();
    let verifier = SignatureVerifier::disabled();

    let mut acquirer =
        ArtifactAcquirer::new(&store.root, &projects, &mut fetcher, &downloader, &verifier);
    assert!(acquirer.ensure_present(ToolCategory::Cli).is_some());
}

#[rstest]
#[case::traversal("../revanced-cli-4.6.0.jar")]
#[case::absolute("/tmp/revanced-cli-4.6.0.jar")]
#[case::backslash("..\\revanced-cli-4.6.0.jar")]
#[case::hidden(".revanced-cli-4.6.0.jar")]
#[case::empty("")]
fn unsafe_asset_names_are_refused(#[case] name: &str) {
    assert!(store_file_name(name).is_none());
}

#[test]
fn plain_asset_names_are_kept() {
    assert_eq!(
        store_file_name("revanced-cli-4.6.0-all.jar"),
        Some("revanced-cli-4.6.0-all.jar")
    );
}
