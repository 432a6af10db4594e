//! ReVanced assisted patching library.
//!
//! This crate locates, downloads and verifies the ReVanced patch toolchain,
//! applies it to every Android package in an input directory and inspects
//! the results. It is used by the `revanced-assist` CLI binary and can be
//! driven programmatically with substituted command, release and download
//! backends.
//!
//! # Modules
//!
//! - [`acquire`] - Downloads missing tools into the local store
//! - [`catalog`] - Local store scanning and version selection
//! - [`cli`] - Command-line argument definitions
//! - [`command`] - External command execution with time limits
//! - [`digest`] - SHA-256 digests of downloaded files
//! - [`error`] - Errors that abort a command
//! - [`inspect`] - Metadata and signer probes for target packages
//! - [`logging`] - Diagnostic logging setup
//! - [`output`] - Progress output
//! - [`patch`] - Patch job construction and execution
//! - [`pipeline`] - Run orchestration
//! - [`release`] - Upstream release lookup, caching and download
//! - [`report`] - Table and JSON rendering of run outcomes
//! - [`selection`] - Resolved tool choices
//! - [`settings`] - Configuration file and flag layering
//! - [`signature`] - Detached signature verification
//! - [`tool`] - The three tool categories
//! - [`version`] - Version tokens found in artifact names

pub mod acquire;
pub mod catalog;
pub mod cli;
pub mod command;
pub mod digest;
pub mod error;
pub mod inspect;
pub mod logging;
pub mod output;
pub mod patch;
pub mod pipeline;
pub mod release;
pub mod report;
pub mod selection;
pub mod settings;
pub mod signature;
pub mod tool;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
