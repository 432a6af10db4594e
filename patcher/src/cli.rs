//! CLI argument definitions for `revanced-assist`.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Fetch, verify and apply the ReVanced patch toolchain.
#[derive(Parser, Debug, Default)]
#[command(name = "revanced-assist")]
#[command(version, about)]
#[command(long_about = concat!(
    "Fetch, verify and apply the ReVanced patch toolchain.\n\n",
    "The patcher CLI, the patch bundle and the integrations package are looked ",
    "up in the tools directory. Missing tools are downloaded from their latest ",
    "GitHub release and their signatures are checked. Every APK in the input ",
    "directory is then patched and inspected, and a summary is printed.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Patch every APK in ./apk:\n",
    "    $ revanced-assist\n\n",
    "  Download missing tools without patching:\n",
    "    $ revanced-assist fetch\n\n",
    "  Show the local tool inventory as JSON:\n",
    "    $ revanced-assist list --json\n\n",
    "  Use only tools already on disk:\n",
    "    $ revanced-assist run --offline\n\n",
    "EXIT STATUS:\n",
    "  0  all targets patched\n",
    "  1  error, or at least one patch failed\n",
    "  2  required tools are missing\n",
    "  3  no target APKs found",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options shared by every command.
    #[command(flatten)]
    pub global: GlobalArgs,
}

impl Cli {
    /// The requested command; `run` when none was given.
    #[must_use]
    pub fn selected_command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Resolve tools and patch every target (default when no subcommand given).
    Run,

    /// Ensure all tools are present, then print the inventory.
    Fetch,

    /// Print the local tool inventory without touching the network.
    List,
}

/// Options accepted before or after any subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file [default: ./revanced-assist.toml when present].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding the tool artifacts [default: tools].
    #[arg(long, global = true, value_name = "DIR")]
    pub tools_dir: Option<Utf8PathBuf>,

    /// Directory holding the APKs to patch [default: apk].
    #[arg(long, global = true, value_name = "DIR")]
    pub apk_dir: Option<Utf8PathBuf>,

    /// Directory for patched APKs [default: patched].
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// GitHub token used for release lookups.
    #[arg(
        long,
        global = true,
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN"
    )]
    pub token: Option<String>,

    /// Skip signature verification of downloaded tools.
    #[arg(long, global = true)]
    pub no_verify: bool,

    /// Never download; use only tools already on disk.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors and reports still shown).
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Print the report as JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
