//! `riposte validate`
//!
//! Loads a configuration file, reports warnings, and prints the effective
//! rank table and timings.

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::config::schema::EngineConfig;
use crate::error::RiposteError;

/// Validate a configuration file.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be loaded or fails
/// validation.
pub fn run(args: &ValidateArgs) -> Result<(), RiposteError> {
    tracing::info!(file = %args.config.display(), "validating configuration");
    let loaded = ConfigLoader::with_defaults().load(&args.config)?;

    for warning in &loaded.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    match args.format {
        OutputFormat::Human => print!("{}", render_human(&loaded.config)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*loaded.config)?),
    }

    tracing::info!(file = %args.config.display(), "configuration valid");
    Ok(())
}

fn render_human(config: &EngineConfig) -> String {
    let thresholds = config
        .sorted_thresholds()
        .iter()
        .map(|t| humantime::format_duration(*t).to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = format!(
        "tick interval: {}\nreminders:     {}\n",
        humantime::format_duration(config.tick_interval),
        if thresholds.is_empty() { "none" } else { thresholds.as_str() },
    );
    if let Some(seed) = config.seed {
        out.push_str(&format!("seed:          {seed}\n"));
    }
    out.push_str("ranks:\n");
    for entry in &config.ranks {
        out.push_str(&format!(
            "  {:<10} {}\n",
            entry.rank.as_str(),
            humantime::format_duration(entry.window)
        ));
    }
    out
}
