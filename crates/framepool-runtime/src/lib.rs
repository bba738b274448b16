//! Frame-parallel worker pool.
//!
//! A [`Coordinator`] owns one shared pixel buffer plus its control block and a
//! fixed set of worker threads. Each frame the workers claim chunks of the
//! buffer, fill them with the pool's [`FillKernel`], and the last one out hands
//! the complete frame back to the coordinator.
//!
//! [`FillKernel`]: framepool_kernels::FillKernel

pub mod config;
pub mod coordinator;
pub mod counter;
pub mod error;
pub mod worker;

pub use config::{ConfigError, PoolConfig};
pub use coordinator::{Coordinator, Frame, PoolReport, Present, WorkerReport};
pub use counter::FrameCounter;
pub use error::PoolError;
pub use worker::{WorkerContext, WorkerStats};
