//! Progress output for the CLI.
//!
//! Progress lines go to an injected writer so commands can be exercised
//! against an in-memory buffer.

use std::io::Write;

/// Write one line of progress output, ignoring write failures.
///
/// # Examples
///
/// ```
/// use revanced_assist::output::write_stderr_line;
///
/// let mut buffer = Vec::new();
/// write_stderr_line(&mut buffer, "Scanning tools...");
/// assert_eq!(buffer, b"Scanning tools...\n");
/// ```
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Progress writer that honours `--quiet`.
pub struct Progress<'a> {
    stderr: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> Progress<'a> {
    /// Wrap `stderr`; nothing is written when `quiet` is set.
    pub fn new(stderr: &'a mut dyn Write, quiet: bool) -> Self {
        Self { stderr, quiet }
    }

    /// Write `message` unless quiet.
    pub fn line(&mut self, message: impl std::fmt::Display) {
        if !self.quiet {
            write_stderr_line(self.stderr, message);
        }
    }

    /// Write `message` even when quiet; used for warnings the user must see.
    pub fn always(&mut self, message: impl std::fmt::Display) {
        write_stderr_line(self.stderr, message);
    }
}

impl std::fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failures_are_ignored() {
        write_stderr_line(&mut BrokenPipe, "lost");
    }

    #[test]
    fn quiet_progress_suppresses_lines_but_not_warnings() {
        let mut buffer = Vec::new();
        {
            let mut progress = Progress::new(&mut buffer, true);
            progress.line("Scanning tools...");
            progress.always("Warning: 1 patch failed");
        }
        assert_eq!(String::from_utf8_lossy(&buffer), "Warning: 1 patch failed\n");
    }
}
