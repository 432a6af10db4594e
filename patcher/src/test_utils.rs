//! Shared test utilities for the patcher crate.

use crate::command::CommandExecutor;
use crate::error::{PatcherError, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn stdout_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Sample `aapt dump badging` output for a fully described package.
pub const SAMPLE_BADGING: &str = "\
package: name='com.google.android.youtube' versionCode='1541152192' versionName='19.16.39' platformBuildVersionName='14'
sdkVersion:'26'
targetSdkVersion:'34'
application-label:'YouTube'
application-label-en:'YouTube'
";

/// Sample `apksigner verify --print-certs` output.
pub const SAMPLE_CERTS: &str = "\
Signer #1 certificate DN: CN=Unknown, OU=Unknown, O=Unknown
Signer #1 certificate SHA-256 digest: 0f1e2d3c4b5a
";

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "java").
    pub cmd: String,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Build an expectation from borrowed parts.
    #[must_use]
    pub fn new(cmd: &str, args: &[&str], result: Result<Output>) -> Self {
        Self {
            cmd: cmd.to_owned(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            result,
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(PatcherError::StubMismatch {
                message: format!("unexpected invocation of {cmd} {args:?}"),
            });
        };

        if call.cmd != cmd || call.args != args {
            return Err(PatcherError::StubMismatch {
                message: format!(
                    "expected {} {:?}, got {cmd} {args:?}",
                    call.cmd, call.args
                ),
            });
        }

        call.result
    }
}

/// A `CommandExecutor` that answers every invocation through a closure and
/// records what it was asked to run.
///
/// Useful when a test cares about routing (which program, which probe)
/// rather than exact ordering.
pub struct ScriptedExecutor<F>
where
    F: Fn(&str, &[&str]) -> Result<Output>,
{
    respond: F,
    calls: RefCell<Vec<Vec<String>>>,
}

impl<F> ScriptedExecutor<F>
where
    F: Fn(&str, &[&str]) -> Result<Output>,
{
    /// Wrap `respond`.
    pub const fn new(respond: F) -> Self {
        Self {
            respond,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Every invocation so far, program first.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    /// Number of invocations of `program`.
    #[must_use]
    pub fn count(&self, program: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.first().is_some_and(|cmd| cmd == program))
            .count()
    }
}

impl<F> CommandExecutor for ScriptedExecutor<F>
where
    F: Fn(&str, &[&str]) -> Result<Output>,
{
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let mut call = vec![cmd.to_owned()];
        call.extend(args.iter().map(|arg| (*arg).to_owned()));
        self.calls.borrow_mut().push(call);
        (self.respond)(cmd, args)
    }
}

/// Answers the standard toolchain commands with healthy output: the patcher
/// exits zero, `aapt` and `apksigner` return the sample payloads above.
///
/// # Errors
///
/// Returns [`PatcherError::StubMismatch`] for any other program.
pub fn healthy_toolchain(cmd: &str, args: &[&str]) -> Result<Output> {
    match (cmd, args.first().copied()) {
        ("java", _) => Ok(stdout_output("INFO: Saved to app-patched.apk")),
        ("aapt", Some("dump")) => Ok(stdout_output(SAMPLE_BADGING)),
        ("aapt", Some("v")) => Ok(stdout_output("Android Asset Packaging Tool, v0.2-eng")),
        ("apksigner", Some("version")) => Ok(stdout_output("0.9")),
        ("apksigner", Some("verify")) => Ok(stdout_output(SAMPLE_CERTS)),
        _ => Err(PatcherError::StubMismatch {
            message: format!("no scripted response for {cmd} {args:?}"),
        }),
    }
}
