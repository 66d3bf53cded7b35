//! Synchronization primitives underpinning the pipeline: a manual-reset
//! [`Latch`] and a [`BoundedQueue`] built on top of it.

mod latch;
mod queue;

pub use latch::Latch;
pub use queue::BoundedQueue;
