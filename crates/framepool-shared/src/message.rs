//! Thread handoff messages.
//!
//! Only pool startup and shutdown travel as messages. Steady-state frames are
//! driven entirely by the [`ControlBlock`](crate::ControlBlock): "run" is the
//! `RUN` state plus a wake, and "frame drained" is `remaining_workers == 0`
//! with the state back in `WAIT`.

use std::sync::Arc;

use crate::region::SharedRegion;

/// Coordinator → worker.
#[derive(Clone)]
pub enum WorkerMessage {
    /// Sent once per worker at pool startup.
    Init {
        worker_id: u32,
        region: Arc<SharedRegion>,
    },
}

impl core::fmt::Debug for WorkerMessage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WorkerMessage::Init { worker_id, region } => f
                .debug_struct("Init")
                .field("worker_id", worker_id)
                .field("layout", &region.layout())
                .finish(),
        }
    }
}

/// Worker → coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorMessage {
    /// Kernel state initialized; the worker is parked waiting for `RUN`.
    Ready { worker_id: u32 },

    /// The worker observed `STOP` and left its loop.
    Exited {
        worker_id: u32,
        chunks_filled: u64,
        frames_joined: u64,
    },
}

impl CoordinatorMessage {
    pub fn worker_id(&self) -> u32 {
        match self {
            CoordinatorMessage::Ready { worker_id } => *worker_id,
            CoordinatorMessage::Exited { worker_id, .. } => *worker_id,
        }
    }
}
