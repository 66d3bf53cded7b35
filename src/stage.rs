//! Per-stage runtime: one queue, one worker thread, one transform.
//!
//! The single stage-level lock guards only which fields exist
//! (initialized vs. not); it is never held while calling into the
//! queue or the downstream sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::error::{PipelineError, Result};
use crate::sync::{BoundedQueue, Latch};
use crate::transforms::TransformFn;
use crate::{stage_error, stage_info};

pub const SENTINEL: &str = "<END>";

/// The capability a stage calls to hand an item to its successor.
/// Absent for the terminal stage.
pub trait WorkSink: Send + Sync {
    fn place_work(&self, item: String) -> Result<()>;
}

/// Where the terminal stage's output goes when it has no downstream.
/// Defaults to [`StdoutLineSink`]; `Pipeline` substitutes one that
/// captures lines instead of writing straight to the process.
pub trait LineSink: Send + Sync {
    fn emit(&self, line: &str);
}

pub struct StdoutLineSink;

impl LineSink for StdoutLineSink {
    fn emit(&self, line: &str) {
        println!("{line}");
    }
}

struct Active {
    queue: Arc<BoundedQueue>,
    downstream: Arc<Mutex<Option<Arc<dyn WorkSink>>>>,
    output: Arc<Mutex<Arc<dyn LineSink>>>,
    worker_done: Arc<Latch>,
    worker: Option<JoinHandle<()>>,
    finished: Arc<AtomicBool>,
}

pub struct Stage {
    name: String,
    transform: TransformFn,
    state: Mutex<Option<Active>>,
}

impl Stage {
    pub fn new(name: impl Into<String>, transform: TransformFn) -> Self {
        Self {
            name: name.into(),
            transform,
            state: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds a fresh queue and spawns the worker thread. Fails with
    /// [`PipelineError::AlreadyInitialized`] if called twice without
    /// an intervening [`Stage::fini`].
    pub fn init(&self, capacity: usize) -> Result<()> {
        let mut guard = self.state.lock();
        if guard.is_some() {
            return Err(PipelineError::AlreadyInitialized);
        }

        let queue = Arc::new(BoundedQueue::new(capacity)?);
        let downstream: Arc<Mutex<Option<Arc<dyn WorkSink>>>> = Arc::new(Mutex::new(None));
        let output: Arc<Mutex<Arc<dyn LineSink>>> = Arc::new(Mutex::new(Arc::new(StdoutLineSink)));
        let worker_done = Arc::new(Latch::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let worker = spawn_worker(
            self.name.clone(),
            self.transform,
            Arc::clone(&queue),
            Arc::clone(&downstream),
            Arc::clone(&output),
            Arc::clone(&worker_done),
            Arc::clone(&finished),
        );

        *guard = Some(Active {
            queue,
            downstream,
            output,
            worker_done,
            worker: Some(worker),
            finished,
        });
        Ok(())
    }

    /// Sets (or clears) the downstream sink. May be called any time
    /// before the pipeline starts feeding input; the driver is
    /// responsible for calling it on every stage before touching
    /// stdin.
    pub fn attach(&self, downstream: Option<Arc<dyn WorkSink>>) -> Result<()> {
        let guard = self.state.lock();
        match guard.as_ref() {
            Some(active) => {
                let handle = Arc::clone(&active.downstream);
                drop(guard);
                *handle.lock() = downstream;
                Ok(())
            }
            None => Err(PipelineError::NotInitialized),
        }
    }

    /// Replaces the sink the terminal stage writes to when it has no
    /// downstream. Only observable for a stage with no `attach`ed
    /// successor; call before feeding input.
    pub fn set_output_sink(&self, sink: Arc<dyn LineSink>) -> Result<()> {
        let guard = self.state.lock();
        match guard.as_ref() {
            Some(active) => {
                *active.output.lock() = sink;
                Ok(())
            }
            None => Err(PipelineError::NotInitialized),
        }
    }

    pub fn place_work(&self, item: String) -> Result<()> {
        let guard = self.state.lock();
        let active = guard.as_ref().ok_or(PipelineError::NotInitialized)?;
        if active.finished.load(Ordering::Acquire) {
            return Err(PipelineError::Finished);
        }
        let queue = Arc::clone(&active.queue);
        drop(guard);

        let is_sentinel = item == SENTINEL;
        queue.put(item)?;
        if is_sentinel {
            queue.signal_finished();
        }
        Ok(())
    }

    /// Blocks until the queue has drained and the worker thread has
    /// exited. Uses the worker's own exit latch rather than polling a
    /// flag.
    pub fn wait_finished(&self) -> Result<()> {
        let guard = self.state.lock();
        let active = guard.as_ref().ok_or(PipelineError::NotInitialized)?;
        let queue = Arc::clone(&active.queue);
        let worker_done = Arc::clone(&active.worker_done);
        drop(guard);

        queue.wait_finished()?;
        worker_done.wait();
        Ok(())
    }

    /// Signals shutdown, joins the worker, and returns the stage to
    /// its dormant, re-initializable state.
    pub fn fini(&self) -> Result<()> {
        let mut guard = self.state.lock();
        let mut active = guard.take().ok_or(PipelineError::NotInitialized)?;
        drop(guard);

        active.queue.signal_finished();
        if let Some(handle) = active.worker.take() {
            if handle.join().is_err() {
                stage_error!(self.name, "worker thread panicked during shutdown");
            }
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().is_some()
    }
}

impl WorkSink for Stage {
    fn place_work(&self, item: String) -> Result<()> {
        Stage::place_work(self, item)
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_worker(
    name: String,
    transform: TransformFn,
    queue: Arc<BoundedQueue>,
    downstream: Arc<Mutex<Option<Arc<dyn WorkSink>>>>,
    output: Arc<Mutex<Arc<dyn LineSink>>>,
    worker_done: Arc<Latch>,
    finished: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("stage-{name}"))
        .spawn(move || {
            stage_info!(name, "worker started");
            while let Some(item) = queue.get() {
                if item == SENTINEL {
                    forward_sentinel(&name, &downstream);
                    break;
                }

                match transform(&item) {
                    None => {
                        stage_error!(name, "transform returned no output for {item:?}");
                    }
                    Some(text) => forward(&name, &downstream, &output, text),
                }
            }
            finished.store(true, Ordering::Release);
            stage_info!(name, "worker exiting");
            worker_done.signal();
        })
        .expect("spawning a stage worker thread should not fail")
}

fn forward_sentinel(name: &str, downstream: &Mutex<Option<Arc<dyn WorkSink>>>) {
    let sink = downstream.lock().clone();
    if let Some(sink) = sink {
        if let Err(err) = sink.place_work(SENTINEL.to_string()) {
            stage_error!(name, "failed to forward sentinel downstream: {err}");
        }
    }
}

fn forward(
    name: &str,
    downstream: &Mutex<Option<Arc<dyn WorkSink>>>,
    output: &Mutex<Arc<dyn LineSink>>,
    text: String,
) {
    let sink = downstream.lock().clone();
    match sink {
        Some(sink) => {
            if let Err(err) = sink.place_work(text) {
                stage_error!(name, "downstream place_work failed: {err}");
            }
        }
        None => output.lock().emit(&text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms;

    #[test]
    fn test_uninitialized_stage_rejects_place_work() {
        let stage = Stage::new("s", transforms::uppercase);
        let err = stage.place_work("x".into()).unwrap_err();
        assert_eq!(err, PipelineError::NotInitialized);
    }

    #[test]
    fn test_double_init_is_rejected() {
        let stage = Stage::new("s", transforms::uppercase);
        stage.init(4).unwrap();
        let err = stage.init(4).unwrap_err();
        assert_eq!(err, PipelineError::AlreadyInitialized);
        stage.fini().unwrap();
    }

    #[test]
    fn test_terminal_stage_prints_to_stdout_and_shuts_down() {
        let stage = Stage::new("term", transforms::uppercase);
        stage.init(4).unwrap();
        stage.attach(None).unwrap();

        stage.place_work("ab".into()).unwrap();
        stage.place_work(SENTINEL.to_string()).unwrap();

        stage.wait_finished().unwrap();
        stage.fini().unwrap();
    }

    struct RecordingLineSink {
        seen: Mutex<Vec<String>>,
    }

    impl LineSink for RecordingLineSink {
        fn emit(&self, line: &str) {
            self.seen.lock().push(line.to_string());
        }
    }

    #[test]
    fn test_terminal_stage_writes_to_its_configured_output_sink() {
        let sink = Arc::new(RecordingLineSink {
            seen: Mutex::new(Vec::new()),
        });
        let stage = Stage::new("term", transforms::uppercase);
        stage.init(4).unwrap();
        stage.attach(None).unwrap();
        let dyn_sink: Arc<dyn LineSink> = sink.clone();
        stage.set_output_sink(dyn_sink).unwrap();

        stage.place_work("ab".into()).unwrap();
        stage.place_work(SENTINEL.to_string()).unwrap();
        stage.wait_finished().unwrap();
        stage.fini().unwrap();

        assert_eq!(sink.seen.lock().as_slice(), ["AB".to_string()]);
    }

    #[test]
    fn test_place_work_after_sentinel_is_rejected() {
        let stage = Stage::new("s", transforms::uppercase);
        stage.init(4).unwrap();
        stage.attach(None).unwrap();
        stage.place_work(SENTINEL.to_string()).unwrap();
        stage.wait_finished().unwrap();

        let err = stage.place_work("late".into()).unwrap_err();
        assert_eq!(err, PipelineError::Finished);
        stage.fini().unwrap();
    }

    #[test]
    fn test_fini_allows_reinitialization() {
        let stage = Stage::new("s", transforms::uppercase);
        stage.init(4).unwrap();
        stage.attach(None).unwrap();
        stage.place_work(SENTINEL.to_string()).unwrap();
        stage.wait_finished().unwrap();
        stage.fini().unwrap();

        assert!(!stage.is_initialized());
        stage.init(4).unwrap();
        stage.attach(None).unwrap();
        stage.place_work(SENTINEL.to_string()).unwrap();
        stage.wait_finished().unwrap();
        stage.fini().unwrap();
    }

    struct RecordingSink {
        seen: Mutex<Vec<String>>,
    }

    impl WorkSink for RecordingSink {
        fn place_work(&self, item: String) -> Result<()> {
            self.seen.lock().push(item);
            Ok(())
        }
    }

    #[test]
    fn test_sentinel_forwards_to_downstream_verbatim() {
        let downstream = Arc::new(RecordingSink {
            seen: Mutex::new(Vec::new()),
        });
        let stage = Stage::new("s", transforms::uppercase);
        stage.init(4).unwrap();
        let sink: Arc<dyn WorkSink> = downstream.clone();
        stage.attach(Some(sink)).unwrap();

        stage.place_work("hi".into()).unwrap();
        stage.place_work(SENTINEL.to_string()).unwrap();
        stage.wait_finished().unwrap();
        stage.fini().unwrap();

        let seen = downstream.seen.lock();
        assert_eq!(seen.as_slice(), ["HI".to_string(), SENTINEL.to_string()]);
    }
}
