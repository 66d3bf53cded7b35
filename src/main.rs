use std::process::ExitCode;

use clap::Parser;

use strpipe::cli::Cli;
use strpipe::config::build_run_request;
use strpipe::logging;
use strpipe::pipeline;
use strpipe::PipelineError;

/// Exit codes: 0 on success, 1 for argument/loading errors caught
/// during CLI validation, 2 for a failure that occurs once stage
/// construction begins.
fn run() -> Result<(), (u8, PipelineError)> {
    let cli = Cli::parse();

    if cli.list_stages {
        print!("{}", Cli::usage());
        return Ok(());
    }

    logging::init_tracing();

    let request = build_run_request(&cli).map_err(|e| (1, e))?;

    let errors = pipeline::run_stdio(&request.stages, &request.config).map_err(|e| (2, e))?;

    if let Some(first) = errors.into_iter().next() {
        return Err((2, first));
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err((code, err)) => {
            if code == 1 {
                eprintln!("{}", Cli::usage());
            }
            eprintln!("strpipe: {err}");
            ExitCode::from(code)
        }
    }
}
