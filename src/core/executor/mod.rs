//! Concurrent transformation execution
//!
//! - [`WorkerPool`] - bounded pool with a named [`OverflowPolicy`]
//! - [`TransformationExecutor`] - index-aligned batch transformation with a deadline
//!
//! The forward and reverse directions use separate pools so a backlog in one
//! cannot starve the other.

pub mod batch;
pub mod pool;

pub use batch::{BatchOutcome, TransformationExecutor, TransformationResult};
pub use pool::{OverflowPolicy, TaskHandle, WorkerPool};
