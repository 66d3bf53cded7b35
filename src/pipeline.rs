//! Builds a chain of [`Stage`]s from an ordered stage list, feeds
//! standard input into the first, and drives orderly shutdown.
//!
//! If any stage's `init` fails partway through construction, every
//! stage that did succeed is torn down, in reverse order, before the
//! error is returned.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{PipelineError, Result};
use crate::stage::{LineSink, Stage, WorkSink, SENTINEL};
use crate::transforms;
use crate::{stage_error, stage_info};

/// Collects every line the terminal stage emits, in order, so `run`
/// can hand the complete output to its caller's writer once every
/// stage has shut down instead of writing straight to stdout itself.
struct CapturingLineSink {
    buffer: Mutex<Vec<u8>>,
}

impl CapturingLineSink {
    fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
        }
    }

    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut self.buffer.lock())
    }
}

impl LineSink for CapturingLineSink {
    fn emit(&self, line: &str) {
        let mut buffer = self.buffer.lock();
        buffer.extend_from_slice(line.as_bytes());
        buffer.push(b'\n');
    }
}

pub struct PipelineConfig {
    pub queue_capacity: usize,
    /// Input lines are capped at 1023 bytes plus the newline. Lines
    /// longer than this are truncated rather than rejected.
    pub max_line_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 20,
            max_line_bytes: 1023,
        }
    }
}

pub struct Pipeline {
    stages: Vec<Arc<Stage>>,
    max_line_bytes: usize,
    output: Arc<CapturingLineSink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("max_line_bytes", &self.max_line_bytes)
            .finish()
    }
}

impl Pipeline {
    /// Builds and wires every stage. On any stage's `init` failure,
    /// tears down the stages that did succeed, in reverse order, and
    /// returns the error.
    pub fn build(stage_names: &[String], config: &PipelineConfig) -> Result<Self> {
        if stage_names.is_empty() {
            return Err(PipelineError::argument("at least one stage is required"));
        }

        let mut stages: Vec<Arc<Stage>> = Vec::with_capacity(stage_names.len());
        for name in stage_names {
            let transform = transforms::resolve(name)?;
            let stage = Arc::new(Stage::new(name.clone(), transform));
            if let Err(err) = stage.init(config.queue_capacity) {
                for already_built in stages.iter().rev() {
                    if let Err(fini_err) = already_built.fini() {
                        stage_error!(
                            already_built.name(),
                            "cleanup after failed startup also failed: {fini_err}"
                        );
                    }
                }
                return Err(err);
            }
            stages.push(stage);
        }

        for i in 0..stages.len() {
            let downstream: Option<Arc<dyn WorkSink>> = stages
                .get(i + 1)
                .map(|next| Arc::clone(next) as Arc<dyn WorkSink>);
            stages[i].attach(downstream)?;
        }

        let output = Arc::new(CapturingLineSink::new());
        let sink: Arc<dyn LineSink> = Arc::clone(&output) as Arc<dyn LineSink>;
        stages
            .last()
            .expect("stage_names is non-empty")
            .set_output_sink(sink)?;

        Ok(Self {
            stages,
            max_line_bytes: config.max_line_bytes,
            output,
        })
    }

    /// Reads lines from `input` and feeds them to the first stage
    /// until an `<END>` line is seen or the reader reaches EOF, in
    /// which case a sentinel is synthesized.
    pub fn feed<R: BufRead>(&self, input: R) -> Result<()> {
        let first = self.stages.first().expect("build() rejects empty pipelines");
        let mut reader = input;
        let mut raw = Vec::new();

        loop {
            raw.clear();
            let bytes_read = reader
                .read_until(b'\n', &mut raw)
                .map_err(|e| PipelineError::resource(format!("failed reading stdin: {e}")))?;
            if bytes_read == 0 {
                // EOF without an explicit <END>: synthesize one.
                first.place_work(SENTINEL.to_string())?;
                return Ok(());
            }

            while raw.last() == Some(&b'\n') || raw.last() == Some(&b'\r') {
                raw.pop();
            }
            raw.truncate(raw.len().min(self.max_line_bytes));

            let line = String::from_utf8_lossy(&raw).into_owned();
            let is_end = line == SENTINEL;
            first.place_work(line)?;
            if is_end {
                return Ok(());
            }
        }
    }

    /// Waits for every stage to finish draining, then tears every
    /// stage down, in ascending order, collecting (not short-circuiting
    /// on) errors from either phase.
    pub fn shutdown(self) -> Vec<PipelineError> {
        let mut errors = Vec::new();

        for stage in &self.stages {
            if let Err(err) = stage.wait_finished() {
                stage_error!(stage.name(), "wait_finished failed: {err}");
                errors.push(err);
            }
        }

        for stage in &self.stages {
            if let Err(err) = stage.fini() {
                stage_error!(stage.name(), "fini failed: {err}");
                errors.push(err);
            } else {
                stage_info!(stage.name(), "stage shut down");
            }
        }

        errors
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

/// Runs a full pipeline against `input`, writing every line the
/// terminal stage produces to `out`, followed by the completion
/// notice. Returns the errors collected during shutdown, if any —
/// these are reported but do not change the process exit code.
pub fn run<R: BufRead, W: Write>(
    stage_names: &[String],
    config: &PipelineConfig,
    input: R,
    mut out: W,
) -> Result<Vec<PipelineError>> {
    let pipeline = Pipeline::build(stage_names, config)?;
    pipeline.feed(input)?;
    let output = Arc::clone(&pipeline.output);
    let errors = pipeline.shutdown();
    out.write_all(&output.take())
        .map_err(|e| PipelineError::resource(format!("failed writing to stdout: {e}")))?;
    writeln!(out, "Pipeline shutdown complete")
        .map_err(|e| PipelineError::resource(format!("failed writing to stdout: {e}")))?;
    Ok(errors)
}

/// Convenience wrapper used by `main` that reads real stdin.
pub fn run_stdio(stage_names: &[String], config: &PipelineConfig) -> Result<Vec<PipelineError>> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    run(stage_names, config, stdin.lock(), stdout.lock())
}
