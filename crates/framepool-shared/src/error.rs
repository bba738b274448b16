use thiserror::Error;

/// Fatal configuration problems, surfaced before any worker thread starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("unable to allocate {bytes} bytes of shared frame memory")]
    SharedMemoryUnavailable { bytes: usize },

    #[error("canvas must be non-empty (got {width}x{height})")]
    EmptyCanvas { width: u32, height: u32 },

    #[error("chunk count must be at least 1")]
    ZeroChunks,

    #[error("worker pool size must be at least 1")]
    ZeroWorkers,

    #[error("chunk count {chunk_count} does not evenly divide canvas height {height}")]
    ChunkCountMismatch { height: u32, chunk_count: u32 },

    #[error("{what} {value} exceeds the control block limit of {limit}")]
    TooLarge {
        what: &'static str,
        value: u64,
        limit: u64,
    },
}
