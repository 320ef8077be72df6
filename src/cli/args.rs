//! CLI argument definitions
//!
//! All Clap derive structs for `riposte` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Timed defense window arbitration engine.
#[derive(Parser, Debug)]
#[command(name = "riposte", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "RIPOSTE_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "RIPOSTE_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Expose Prometheus metrics on `127.0.0.1:<port>`.
    #[arg(long, global = true, env = "RIPOSTE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate an engine configuration file.
    Validate(ValidateArgs),

    /// Run windows against an in-process engine and report the outcomes.
    Simulate(SimulateArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "RIPOSTE_CONFIG")]
    pub config: PathBuf,

    /// Output format.
    #[arg(long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to the YAML configuration file (defaults apply when omitted).
    #[arg(short, long, env = "RIPOSTE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Defender rank used for every window.
    #[arg(short, long)]
    pub rank: String,

    /// Answer each window after this delay (e.g. `9s`); omit to let them expire.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub respond_after: Option<std::time::Duration>,

    /// Counter description submitted when answering.
    #[arg(long, default_value = "parry")]
    pub counter: String,

    /// Number of windows to open.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Write the notice stream as JSONL to this file instead of the log.
    #[arg(long)]
    pub events_file: Option<PathBuf>,

    /// Output format for the summary.
    #[arg(long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `version`.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Value Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_simulate() {
        let cli = Cli::try_parse_from([
            "riposte",
            "-vv",
            "simulate",
            "--rank",
            "A",
            "--respond-after",
            "9s",
            "-n",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.rank, "A");
        assert_eq!(args.respond_after, Some(Duration::from_secs(9)));
        assert_eq!(args.count, 3);
        assert!(args.config.is_none());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["riposte", "version", "--log-format", "json", "-q"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.quiet);
    }

    #[test]
    fn validate_requires_config() {
        // Guard against RIPOSTE_CONFIG leaking in from the environment.
        if std::env::var_os("RIPOSTE_CONFIG").is_none() {
            assert!(Cli::try_parse_from(["riposte", "validate"]).is_err());
        }
    }
}
