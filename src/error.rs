//! Error kinds shared by every layer of the pipeline runtime.
//!
//! One flat enum rather than per-module error types: the state machine
//! in `stage` and `sync::queue` passes errors up through several
//! layers unchanged, and a single `thiserror::Error` keeps `?`
//! conversions trivial end to end.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("resource allocation failed: {0}")]
    Resource(String),

    #[error("not initialized")]
    NotInitialized,

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("stage has already finished")]
    Finished,

    #[error("failed to load stage '{0}': {1}")]
    Load(String, String),
}

impl PipelineError {
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn load(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Load(stage.into(), msg.into())
    }
}
