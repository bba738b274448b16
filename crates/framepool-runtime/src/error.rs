use framepool_shared::SetupError;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("failed to spawn worker {worker_id}")]
    Spawn {
        worker_id: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("worker pool handshake failed: {ready} of {expected} workers reported ready")]
    Handshake { ready: u32, expected: u32 },

    #[error("worker {worker_id} panicked")]
    WorkerPanicked { worker_id: u32 },

    #[error("kernel renders a {kernel_width}x{kernel_height} canvas but the pool is {width}x{height}")]
    KernelCanvasMismatch {
        kernel_width: u32,
        kernel_height: u32,
        width: u32,
        height: u32,
    },

    #[error("worker pool has been stopped")]
    Stopped,
}
