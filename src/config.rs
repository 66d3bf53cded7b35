//! Translates a validated [`Cli`] into a [`PipelineConfig`] plus the
//! ordered stage list the driver needs.

use crate::cli::Cli;
use crate::error::Result;
use crate::pipeline::PipelineConfig;

pub struct RunRequest {
    pub config: PipelineConfig,
    pub stages: Vec<String>,
}

/// Validates `cli`, then translates it into a [`RunRequest`]. Callers
/// do not need to run [`Cli::validate`] themselves first.
pub fn build_run_request(cli: &Cli) -> Result<RunRequest> {
    cli.validate()?;
    let queue_size = cli.queue_size.expect("validate() requires queue_size");

    Ok(RunRequest {
        config: PipelineConfig {
            queue_capacity: queue_size,
            ..PipelineConfig::default()
        },
        stages: cli.stages.clone(),
    })
}
