//! Command-line parsing: a queue capacity, one or more ordered stage
//! names, and an optional `--list-stages` flag.

use clap::Parser;

use crate::error::{PipelineError, Result};
use crate::transforms;

#[derive(Parser, Debug, Default)]
#[command(
    name = "strpipe",
    about = "Runs a chain of string-processing stages over stdin",
    long_about = None,
)]
pub struct Cli {
    /// Maximum number of in-flight items each stage's queue may hold.
    pub queue_size: Option<usize>,

    /// Stage names to run, in order, e.g. `uppercaser rotator logger`.
    pub stages: Vec<String>,

    /// Print the available stage names and exit.
    #[arg(long)]
    pub list_stages: bool,
}

impl Cli {
    /// Validates the parsed arguments: `queue_size` must be a positive
    /// integer, and at least one stage name must be given (unless
    /// `--list-stages` was requested).
    pub fn validate(&self) -> Result<()> {
        if self.list_stages {
            return Ok(());
        }

        let queue_size = self
            .queue_size
            .ok_or_else(|| PipelineError::argument("missing required argument: queue_size"))?;
        if queue_size == 0 {
            return Err(PipelineError::argument("queue_size must be a positive integer"));
        }

        if self.stages.is_empty() {
            return Err(PipelineError::argument(
                "at least one stage name is required",
            ));
        }

        for name in &self.stages {
            transforms::resolve(name)?;
        }

        Ok(())
    }

    pub fn usage() -> String {
        let mut out = String::new();
        out.push_str("Usage: strpipe <queue_size> <stage> [stage...]\n");
        out.push_str("       strpipe --list-stages\n\n");
        out.push_str(&transforms::describe_catalogue());
        out
    }
}
