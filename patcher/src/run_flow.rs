//! Subcommand flows for the CLI binary.
//!
//! This module wires the system backends (subprocesses, GitHub, GnuPG) into
//! the library types and keeps that wiring out of `main.rs`.

use std::io::Write;

use log::{debug, info};
use revanced_assist::acquire::ArtifactAcquirer;
use revanced_assist::catalog;
use revanced_assist::command::SystemCommandExecutor;
use revanced_assist::error::{PatcherError, Result};
use revanced_assist::inspect::InspectionRunner;
use revanced_assist::output::Progress;
use revanced_assist::patch::PatchExecutor;
use revanced_assist::pipeline::{PipelineController, PipelinePaths};
use revanced_assist::release::{GitHubReleaseSource, HttpDownloader, ReleaseFetcher, http_agent};
use revanced_assist::report;
use revanced_assist::settings::Settings;
use revanced_assist::signature::{GpgBackend, SignatureVerifier};

/// What every flow needs from the command line.
pub(crate) struct FlowContext<'a> {
    /// Resolved settings.
    pub(crate) settings: &'a Settings,
    /// Emit JSON instead of tables.
    pub(crate) json: bool,
    /// Suppress progress lines.
    pub(crate) quiet: bool,
}

/// Network-backed services, built only when downloads are allowed.
struct RemoteTools {
    fetcher: ReleaseFetcher,
    downloader: HttpDownloader,
    verifier: SignatureVerifier,
}

impl RemoteTools {
    fn new(settings: &Settings) -> Self {
        let agent = http_agent(settings.download_timeout);
        let source = GitHubReleaseSource::new(agent.clone(), settings.github_token.clone())
            .with_api_base(settings.github_api_base.clone());
        if !source.is_authenticated() {
            debug!("querying GitHub without a token");
        }

        let verifier = if settings.verify_signatures {
            SignatureVerifier::new(Box::new(GpgBackend::new(
                settings.gpg.clone(),
                settings.probe_timeout,
            )))
        } else {
            info!("signature verification disabled");
            SignatureVerifier::disabled()
        };

        Self {
            fetcher: ReleaseFetcher::new(Box::new(source), settings.cache_bound),
            downloader: HttpDownloader::new(agent),
            verifier,
        }
    }

    fn acquirer<'a>(&'a mut self, settings: &'a Settings) -> ArtifactAcquirer<'a> {
        ArtifactAcquirer::new(
            &settings.tools_dir,
            &settings.projects,
            &mut self.fetcher,
            &self.downloader,
            &self.verifier,
        )
    }
}

fn pipeline_paths(settings: &Settings) -> PipelinePaths {
    PipelinePaths {
        tools_dir: settings.tools_dir.clone(),
        apk_dir: settings.apk_dir.clone(),
        output_dir: settings.output_dir.clone(),
        temp_dir: settings.temp_dir.clone(),
    }
}

/// Write a rendered report to stdout.
fn write_report(stdout: &mut dyn Write, text: &str) -> Result<()> {
    let mut text = text.to_owned();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|source| PatcherError::WriteFailed { source })
}

/// `list`: print the local inventory without touching the network.
pub(crate) fn list(context: &FlowContext<'_>, stdout: &mut dyn Write) -> Result<i32> {
    let tools_dir = &context.settings.tools_dir;
    let inventory = catalog::scan(tools_dir).map_err(|source| PatcherError::ScanFailed {
        path: tools_dir.clone(),
        source,
    })?;
    let text = if context.json {
        report::format_inventory_json(&inventory)?
    } else {
        report::format_inventory(&inventory)
    };
    write_report(stdout, &text)?;
    Ok(0)
}

/// `fetch`: make sure every category is present, then print the inventory.
pub(crate) fn fetch(
    context: &FlowContext<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let settings = context.settings;
    let executor = SystemCommandExecutor::with_timeout(settings.probe_timeout);
    let mut remote = (!settings.offline).then(|| RemoteTools::new(settings));
    let mut controller = PipelineController::new(
        pipeline_paths(settings),
        remote.as_mut().map(|remote| remote.acquirer(settings)),
        PatchExecutor::new(&executor, settings.java.clone()),
        InspectionRunner::new(&executor, settings.inspection.clone()),
    );

    let resolution = {
        let mut progress = Progress::new(stderr, context.quiet);
        controller.resolve_tools(&mut progress)?
    };
    let text = if context.json {
        report::format_resolution_json(&resolution)?
    } else {
        report::format_resolution(&resolution)
    };
    write_report(stdout, &text)?;
    Ok(if resolution.tools.is_ok() { 0 } else { 2 })
}

/// `run`: resolve tools, patch and inspect every target, print the report.
pub(crate) fn run(
    context: &FlowContext<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let settings = context.settings;
    let patch_executor = SystemCommandExecutor::with_timeout(settings.patch_timeout);
    let probe_executor = SystemCommandExecutor::with_timeout(settings.probe_timeout);
    let mut remote = (!settings.offline).then(|| RemoteTools::new(settings));
    let mut controller = PipelineController::new(
        pipeline_paths(settings),
        remote.as_mut().map(|remote| remote.acquirer(settings)),
        PatchExecutor::new(&patch_executor, settings.java.clone()),
        InspectionRunner::new(&probe_executor, settings.inspection.clone()),
    );

    let outcome = {
        let mut progress = Progress::new(stderr, context.quiet);
        controller.run(&mut progress)?
    };
    let text = if context.json {
        report::format_json(&outcome)?
    } else {
        report::format_human(&outcome)
    };
    write_report(stdout, &text)?;
    Ok(outcome.exit_code())
}
