//! Unit tests for pipeline orchestration.
//!
//! These tests drive `PipelineController` against a temporary workspace,
//! a scripted toolchain and mocked release lookups.

use super::*;
use crate::inspect::{InspectionTools, ProbeValue};
use crate::release::source::{MockReleaseSource, ReleaseError};
use crate::release::download::MockArtefactDownloader;
use crate::release::{CacheBound, ReleaseFetcher, ReleaseProjects};
use crate::signature::SignatureVerifier;
use crate::test_utils::{ScriptedExecutor, failure_output, healthy_toolchain};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    paths: PipelinePaths,
}

impl Workspace {
    fn seed_tools(&self, names: &[&str]) {
        fs::create_dir_all(&self.paths.tools_dir).expect("tools dir");
        for name in names {
            fs::write(self.paths.tools_dir.join(name), b"tool").expect("seed tool");
        }
    }

    fn seed_targets(&self, names: &[&str]) {
        fs::create_dir_all(&self.paths.apk_dir).expect("apk dir");
        for name in names {
            fs::write(self.paths.apk_dir.join(name), b"apk").expect("seed target");
        }
    }
}

const FULL_TOOLCHAIN: [&str; 3] = [
    "revanced-cli-4.6.0-all.jar",
    "revanced-patches-4.10.0.jar",
    "revanced-integrations-1.12.0.apk",
];

#[fixture]
fn workspace() -> Workspace {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 path");
    let paths = PipelinePaths {
        tools_dir: root.join("tools"),
        apk_dir: root.join("apk"),
        output_dir: root.join("patched"),
        temp_dir: root.join("revanced-cache"),
    };
    Workspace { _dir: dir, paths }
}

fn run_offline(
    workspace: &Workspace,
    executor: &dyn crate::command::CommandExecutor,
) -> (RunOutcome, PipelineState, String) {
    let mut controller = PipelineController::new(
        workspace.paths.clone(),
        None,
        PatchExecutor::new(executor, "java"),
        InspectionRunner::new(executor, InspectionTools::default()),
    );
    let mut stderr = Vec::new();
    let outcome = {
        let mut progress = Progress::new(&mut stderr, false);
        controller.run(&mut progress).expect("run")
    };
    (
        outcome,
        controller.state(),
        String::from_utf8_lossy(&stderr).into_owned(),
    )
}

#[rstest]
fn completed_run_patches_every_target_in_order(workspace: Workspace) {
    workspace.seed_tools(&FULL_TOOLCHAIN);
    workspace.seed_targets(&["b.apk", "a.apk", "notes.txt"]);
    let executor = ScriptedExecutor::new(healthy_toolchain);

    let (outcome, state, _) = run_offline(&workspace, &executor);

    assert_eq!(state, PipelineState::Reporting);
    assert_eq!(outcome.exit_code(), 0);
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    let targets: Vec<&str> = report
        .patch_results
        .iter()
        .filter_map(|r| r.job.target.file_name())
        .collect();
    assert_eq!(targets, ["a.apk", "b.apk"]);
    assert_eq!(report.inspections.len(), 2);
    assert!(report.inspections.iter().all(InspectionReport::is_complete));
    assert_eq!(executor.count("java"), 2);
    assert_eq!(
        report.patch_results[0].job.output,
        workspace.paths.output_dir.join("a.apk")
    );
    assert!(workspace.paths.output_dir.is_dir());
}

#[rstest]
fn single_target_run_selects_the_stored_tool_versions(workspace: Workspace) {
    workspace.seed_tools(&[
        "revanced-cli-4.6.0.jar",
        "revanced-patches-4.10.0.jar",
        "revanced-integrations-1.12.0.apk",
    ]);
    workspace.seed_targets(&["app.apk"]);
    let executor = ScriptedExecutor::new(healthy_toolchain);

    let (outcome, _, _) = run_offline(&workspace, &executor);

    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.tools.cli.version.to_string(), "4.6.0");
    assert_eq!(report.tools.patches.version.to_string(), "4.10.0");
    assert_eq!(report.tools.integrations.version.to_string(), "1.12.0");
    assert_eq!(
        report.tools.cli.path,
        workspace.paths.tools_dir.join("revanced-cli-4.6.0.jar")
    );
    assert_eq!(report.patch_results.len(), 1);
    assert!(report.patch_results[0].succeeded);
    assert_eq!(report.inspections.len(), 1);
    assert!(report.inspections[0].is_complete());
    assert!(report.acquisitions.is_empty());
}

#[rstest]
fn patch_failure_is_isolated_to_its_target(workspace: Workspace) {
    workspace.seed_tools(&FULL_TOOLCHAIN);
    workspace.seed_targets(&["a.apk", "b.apk", "c.apk"]);
    let executor = ScriptedExecutor::new(|cmd, args| {
        if cmd == "java" && args.last().is_some_and(|t| t.ends_with("b.apk")) {
            return Ok(failure_output("SEVERE: patch failed"));
        }
        healthy_toolchain(cmd, args)
    });

    let (outcome, _, stderr) = run_offline(&workspace, &executor);

    assert_eq!(outcome.exit_code(), 1);
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    let statuses: Vec<bool> = report.patch_results.iter().map(|r| r.succeeded).collect();
    assert_eq!(statuses, [true, false, true]);
    assert_eq!(report.failures(), 1);
    assert_eq!(report.inspections.len(), 3);
    assert!(stderr.contains("Unable to process"));
}

#[rstest]
fn probe_failure_yields_unknown_fields(workspace: Workspace) {
    workspace.seed_tools(&FULL_TOOLCHAIN);
    workspace.seed_targets(&["a.apk"]);
    let executor = ScriptedExecutor::new(|cmd, args| {
        if cmd == "aapt" && args.first() == Some(&"dump") {
            return Ok(failure_output("ERROR: dump failed"));
        }
        healthy_toolchain(cmd, args)
    });

    let (outcome, _, _) = run_offline(&workspace, &executor);

    assert_eq!(outcome.exit_code(), 0);
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    let inspection = &report.inspections[0];
    assert_eq!(inspection.app_name, ProbeValue::Unknown);
    assert_eq!(inspection.sdk_range(), "Unknown (Error) - Unknown (Error)");
    assert!(inspection.signer_identity.is_known());
}

#[rstest]
fn offline_run_with_empty_store_reports_every_category(workspace: Workspace) {
    workspace.seed_targets(&["a.apk"]);
    let executor = ScriptedExecutor::new(healthy_toolchain);

    let (outcome, state, stderr) = run_offline(&workspace, &executor);

    assert_eq!(state, PipelineState::ToolsMissing);
    assert_eq!(outcome.exit_code(), 2);
    let RunOutcome::ToolsMissing { missing, .. } = outcome else {
        panic!("expected missing tools");
    };
    assert_eq!(missing, ToolCategory::ALL);
    assert!(executor.calls().is_empty());
    assert!(stderr.contains("Requirements for Integrations not met."));
}

#[rstest]
fn no_targets_ends_the_run_before_patching(workspace: Workspace) {
    workspace.seed_tools(&FULL_TOOLCHAIN);
    let executor = ScriptedExecutor::new(healthy_toolchain);

    let (outcome, state, _) = run_offline(&workspace, &executor);

    assert_eq!(state, PipelineState::NoTargets);
    assert_eq!(outcome.exit_code(), 3);
    assert!(matches!(outcome, RunOutcome::NoTargets { .. }));
    assert!(executor.calls().is_empty());
    assert!(!workspace.paths.output_dir.exists());
}

fn rate_limited_fetcher(expected_calls: usize) -> ReleaseFetcher {
    let mut source = MockReleaseSource::new();
    source
        .expect_latest_release()
        .times(expected_calls)
        .returning(|project| {
            Err(ReleaseError::RateLimited {
                project: project.to_string(),
            })
        });
    ReleaseFetcher::new(Box::new(source), CacheBound::default())
}

#[rstest]
fn rate_limited_lookups_leave_all_categories_missing(workspace: Workspace) {
    workspace.seed_targets(&["a.apk"]);
    let executor = ScriptedExecutor::new(healthy_toolchain);
    let projects = ReleaseProjects::default();
    let mut fetcher = rate_limited_fetcher(3);
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let verifier = SignatureVerifier::disabled();
    let acquirer = ArtifactAcquirer::new(
        &workspace.paths.tools_dir,
        &projects,
        &mut fetcher,
        &downloader,
        &verifier,
    );

    let mut controller = PipelineController::new(
        workspace.paths.clone(),
        Some(acquirer),
        PatchExecutor::new(&executor, "java"),
        InspectionRunner::new(&executor, InspectionTools::default()),
    );
    let mut stderr = Vec::new();
    let mut progress = Progress::new(&mut stderr, true);
    let outcome = controller.run(&mut progress).expect("run");

    let RunOutcome::ToolsMissing { missing, .. } = outcome else {
        panic!("expected missing tools");
    };
    assert_eq!(missing, ToolCategory::ALL);
    assert_eq!(executor.count("java"), 0);
}

#[rstest]
fn only_the_unresolvable_category_is_reported(workspace: Workspace) {
    workspace.seed_tools(&["revanced-cli-4.6.0-all.jar", "revanced-patches-4.10.0.jar"]);
    workspace.seed_targets(&["a.apk"]);
    let executor = ScriptedExecutor::new(healthy_toolchain);
    let projects = ReleaseProjects::default();
    let mut fetcher = rate_limited_fetcher(1);
    let downloader = MockArtefactDownloader::new();
    let verifier = SignatureVerifier::disabled();
    let acquirer = ArtifactAcquirer::new(
        &workspace.paths.tools_dir,
        &projects,
        &mut fetcher,
        &downloader,
        &verifier,
    );

    let mut controller = PipelineController::new(
        workspace.paths.clone(),
        Some(acquirer),
        PatchExecutor::new(&executor, "java"),
        InspectionRunner::new(&executor, InspectionTools::default()),
    );
    let mut stderr = Vec::new();
    let mut progress = Progress::new(&mut stderr, false);
    let resolution = controller.resolve_tools(&mut progress).expect("resolve");

    assert_eq!(resolution.tools.err(), Some(vec![ToolCategory::Integrations]));
    assert_eq!(resolution.inventory.artifacts(ToolCategory::Cli).len(), 1);
    assert_eq!(controller.state(), PipelineState::ToolsMissing);
}

#[rstest]
fn find_targets_ignores_other_files_and_missing_directories(workspace: Workspace) {
    assert!(find_targets(&workspace.paths.apk_dir).expect("missing dir").is_empty());

    workspace.seed_targets(&["z.apk", "readme.md", "a.APK.bak", "m.apk"]);
    fs::create_dir_all(workspace.paths.apk_dir.join("dir.apk")).expect("dir");
    let names: Vec<String> = find_targets(&workspace.paths.apk_dir)
        .expect("targets")
        .iter()
        .filter_map(|p| p.file_name().map(str::to_owned))
        .collect();
    assert_eq!(names, ["m.apk", "z.apk"]);
}

#[rstest]
#[case::idle(PipelineState::Idle, false)]
#[case::resolving(PipelineState::ToolsResolving, false)]
#[case::missing(PipelineState::ToolsMissing, true)]
#[case::no_targets(PipelineState::NoTargets, true)]
#[case::reporting(PipelineState::Reporting, true)]
fn terminal_states(#[case] state: PipelineState, #[case] terminal: bool) {
    assert_eq!(state.is_terminal(), terminal);
}
