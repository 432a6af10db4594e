//! `revanced-assist` CLI entrypoint.
//!
//! This binary resolves the ReVanced toolchain, patches every APK in the
//! input directory and prints a report. Reports go to stdout; progress and
//! diagnostics go to stderr.

mod run_flow;

use camino::Utf8PathBuf;
use clap::Parser;
use revanced_assist::cli::{Cli, Command};
use revanced_assist::error::{PatcherError, Result};
use revanced_assist::logging::init_logging;
use revanced_assist::output::write_stderr_line;
use revanced_assist::settings::Settings;
use run_flow::FlowContext;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbosity, cli.global.quiet);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<i32> {
    let working_dir = current_working_dir()?;
    let settings = Settings::load(&cli.global, &working_dir)?;
    run_command(cli.selected_command(), &cli_context(cli, &settings), stdout, stderr)
}

fn cli_context<'a>(cli: &Cli, settings: &'a Settings) -> FlowContext<'a> {
    FlowContext {
        settings,
        json: cli.global.json,
        quiet: cli.global.quiet,
    }
}

fn run_command(
    command: Command,
    context: &FlowContext<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    match command {
        Command::List => run_flow::list(context, stdout),
        Command::Fetch => run_flow::fetch(context, stdout, stderr),
        Command::Run => run_flow::run(context, stdout, stderr),
    }
}

fn current_working_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|e| PatcherError::NonUtf8Path {
        path: e.into_path_buf().to_string_lossy().into_owned(),
    })
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
