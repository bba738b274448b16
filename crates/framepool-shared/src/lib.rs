//! Shared-memory contract between the frame coordinator and its worker pool.
//!
//! Everything the two sides exchange lives in this crate:
//! - [`layout`]: byte offsets of the pixel and control segments.
//! - [`control`]: the atomic state word + counters driving each frame.
//! - [`region`]: the single allocation holding both segments.
//! - [`chunk`]: the chunk index → pixel rectangle mapping.
//! - [`message`]: startup/exit handoff messages.

pub mod chunk;
pub mod control;
pub mod error;
pub mod layout;
pub mod message;
pub mod region;

pub use chunk::{ChunkDescriptor, ChunkGeometry};
pub use control::{ControlBlock, WorkSignal, WorkerState};
pub use error::SetupError;
pub use layout::SharedLayout;
pub use message::{CoordinatorMessage, WorkerMessage};
pub use region::SharedRegion;
