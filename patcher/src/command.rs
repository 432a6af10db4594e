//! External command execution.
//!
//! Every external tool (the patcher, `aapt`, `apksigner`) is launched as an
//! argument vector through [`CommandExecutor`]; nothing goes through a shell.

use crate::error::{PatcherError, Result};
use std::io::{self, Read, Write};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command, or [`PatcherError::CommandTimedOut`] when a limit applies.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use revanced_assist::command::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("java", &["-version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), revanced_assist::error::PatcherError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Executes commands on the host system.
///
/// Output pipes are drained on helper threads while the child runs, so a
/// child that writes more than a pipe buffer never stalls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor {
    timeout: Option<Duration>,
}

impl SystemCommandExecutor {
    /// Create an executor that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        run_with_input(cmd, args, None, self.timeout)
    }
}

/// Run `cmd` with optional bytes fed to its standard input.
///
/// Standard input is closed once `input` has been written (or immediately
/// when there is none). When `timeout` elapses the child is killed.
///
/// # Errors
///
/// Returns an I/O error if the command cannot be spawned or awaited, or
/// [`PatcherError::CommandTimedOut`] when the limit is exceeded.
pub fn run_with_input(
    cmd: &str,
    args: &[&str],
    input: Option<Vec<u8>>,
    timeout: Option<Duration>,
) -> Result<Output> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let feeder = match (child.stdin.take(), input) {
        (Some(mut stdin), Some(bytes)) => Some(thread::spawn(move || {
            // A child that exits early closes the pipe; that is not our error.
            let _ = stdin.write_all(&bytes);
        })),
        _ => None,
    };
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match timeout {
        Some(limit) => {
            if let Some(status) = child.wait_timeout(limit)? {
                status
            } else {
                // Readers finish on their own once the pipes close.
                let _ = child.kill();
                let _ = child.wait();
                return Err(PatcherError::CommandTimedOut {
                    program: cmd.to_owned(),
                    limit,
                });
            }
        }
        None => child.wait()?,
    };

    if let Some(feeder) = feeder {
        let _ = feeder.join();
    }
    Ok(Output {
        status,
        stdout: collect(stdout)?,
        stderr: collect(stderr)?,
    })
}

/// Summarise a failed command for error reporting.
///
/// Always returns a non-empty string: the exit code (or signal) followed by
/// the trimmed standard error when there is any.
#[must_use]
pub fn describe_failure(output: &Output) -> String {
    let status = output.status.code().map_or_else(
        || "terminated by signal".to_owned(),
        |code| format!("exit status {code}"),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}

type PipeReader = JoinHandle<io::Result<Vec<u8>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<PipeReader> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer)?;
            Ok(buffer)
        })
    })
}

fn collect(reader: Option<PipeReader>) -> io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("output reader thread panicked"))?,
        None => Ok(Vec::new()),
    }
}
