//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod simulate;
pub mod validate;
pub mod version;

use crate::cli::args::{Cli, Commands};
use crate::error::RiposteError;
use crate::observability::init_metrics;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the metrics exporter cannot start or the dispatched
/// command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), RiposteError> {
    if cli.metrics_port.is_some() {
        init_metrics(cli.metrics_port)?;
    }

    match cli.command {
        Commands::Validate(args) => validate::run(&args),
        Commands::Simulate(args) => simulate::run(&args).await,
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
