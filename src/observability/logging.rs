//! Logging setup for the `riposte` binary.
//!
//! Verbosity flags raise the level of the engine's own targets first and
//! only let dependencies through at higher settings. `RIPOSTE_LOG_LEVEL`
//! replaces the computed filter entirely.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides the verbosity flags.
pub const LOG_LEVEL_ENV: &str = "RIPOSTE_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// One JSON object per event, fields flattened to the top level.
    Json,
}

/// Filter directive for a `-v` count.
///
/// Dependencies stay at `warn` until `-vv`, where window lifecycle debug
/// lines and dependency info lines both show.
#[must_use]
pub const fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,riposte=info",
        2 => "info,riposte=debug",
        _ => "debug,riposte=trace",
    }
}

/// Whether to emit ANSI escapes on stderr.
#[must_use]
pub const fn use_ansi(color: ColorChoice, stderr_is_terminal: bool, no_color: bool) -> bool {
    match color {
        ColorChoice::Auto => stderr_is_terminal && !no_color,
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

/// Installs the global subscriber on stderr.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let show_target = verbosity >= 2;

    match format {
        LogFormat::Human => {
            let ansi = use_ansi(
                color,
                std::io::stderr().is_terminal(),
                std::env::var_os("NO_COLOR").is_some(),
            );
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_directive_parses() {
        for verbosity in 0..=4 {
            let directive = default_directive(verbosity);
            assert!(
                EnvFilter::try_new(directive).is_ok(),
                "bad directive for -v x{verbosity}: {directive}"
            );
        }
    }

    #[test]
    fn single_v_only_raises_engine_targets() {
        assert_eq!(default_directive(0), "warn");
        assert!(default_directive(1).starts_with("warn,"));
        assert!(default_directive(1).contains("riposte=info"));
        assert_eq!(default_directive(u8::MAX), default_directive(3));
    }

    #[test]
    fn ansi_follows_terminal_and_no_color() {
        assert!(use_ansi(ColorChoice::Auto, true, false));
        assert!(!use_ansi(ColorChoice::Auto, true, true));
        assert!(!use_ansi(ColorChoice::Auto, false, false));
        assert!(use_ansi(ColorChoice::Always, false, true));
        assert!(!use_ansi(ColorChoice::Never, true, false));
    }

    #[test]
    fn init_logging_is_repeatable() {
        init_logging(LogFormat::Json, 1, ColorChoice::Never);
        init_logging(LogFormat::Human, 0, ColorChoice::Auto);
    }
}
