//! Diagnostic logging setup.
//!
//! Library code logs through the `log` facade. The binary installs a
//! `tracing-subscriber` formatter on stderr that also captures `log`
//! records. `RUST_LOG` takes precedence over the level derived from
//! `-v`/`-q`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Level used when `RUST_LOG` is unset.
///
/// # Examples
///
/// ```
/// use revanced_assist::logging::default_level;
/// use tracing_subscriber::filter::LevelFilter;
///
/// assert_eq!(default_level(0, false), LevelFilter::WARN);
/// assert_eq!(default_level(2, false), LevelFilter::DEBUG);
/// assert_eq!(default_level(0, true), LevelFilter::ERROR);
/// ```
#[must_use]
pub const fn default_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. Only the first call takes effect.
pub fn init_logging(verbosity: u8, quiet: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(verbosity, quiet).into())
        .from_env_lossy();

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 3),
        )
        .try_init();
    if installed.is_err() {
        // Already initialised.
    }
}
