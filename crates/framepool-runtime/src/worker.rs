//! Worker thread: claim chunks, fill them, report the pool drained.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use framepool_kernels::FillKernel;
use framepool_shared::{
    ChunkDescriptor, ChunkGeometry, CoordinatorMessage, SharedRegion, WorkSignal, WorkerMessage,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub chunks_filled: u64,
    pub frames_joined: u64,
}

/// Everything one worker owns. Lives on the worker thread only.
pub struct WorkerContext<K: FillKernel> {
    worker_id: u32,
    region: Arc<SharedRegion>,
    geometry: ChunkGeometry,
    kernel: Arc<K>,
    state: K::State,
    // Rewritten in place for every claim.
    chunk: ChunkDescriptor,
    last_epoch: u32,
    stats: WorkerStats,
}

impl<K: FillKernel> WorkerContext<K> {
    pub fn new(
        worker_id: u32,
        region: Arc<SharedRegion>,
        geometry: ChunkGeometry,
        kernel: Arc<K>,
    ) -> Self {
        let state = kernel.init(worker_id);
        let last_epoch = region.control().epoch();
        Self {
            worker_id,
            region,
            chunk: geometry.scratch(),
            geometry,
            kernel,
            state,
            last_epoch,
            stats: WorkerStats::default(),
        }
    }

    pub fn worker_id(&self) -> u32 {
        self.worker_id
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn kernel_state(&self) -> &K::State {
        &self.state
    }

    /// Claim and fill chunks of frame `epoch` until none are left, then check
    /// out of the frame. Returns `true` if this worker was the last one out.
    pub fn drain(&mut self, epoch: u32) -> bool {
        let control = self.region.control();
        while let Some(index) = control.claim_chunk() {
            let chunk = self.geometry.update(&mut self.chunk, index);
            tracing::trace!(worker_id = self.worker_id, epoch, index, "claimed chunk");
            // SAFETY: `claim_chunk` handed out `index` to this worker alone for
            // this frame, and the coordinator does not read pixels until the
            // frame has drained.
            let pixels = unsafe { self.region.chunk_mut(chunk) };
            self.kernel
                .fill(&mut self.state, pixels, chunk, self.worker_id);
            self.stats.chunks_filled += 1;
        }

        self.stats.frames_joined += 1;
        self.last_epoch = epoch;
        let last = control.finish_worker(epoch);
        if last {
            tracing::trace!(worker_id = self.worker_id, epoch, "last worker out");
        }
        last
    }

    /// Serve frames until `STOP`.
    pub fn run(mut self) -> WorkerStats {
        loop {
            match self.region.control().wait_for_work(self.last_epoch) {
                WorkSignal::Stop => break,
                WorkSignal::Run { epoch } => {
                    self.drain(epoch);
                }
            }
        }
        self.stats
    }
}

/// Spawn worker `worker_id`. The thread stays idle until it receives
/// [`WorkerMessage::Init`] on the returned sender; dropping the sender before
/// that makes it exit quietly.
pub fn spawn<K: FillKernel>(
    worker_id: u32,
    geometry: ChunkGeometry,
    kernel: Arc<K>,
    events: Sender<CoordinatorMessage>,
) -> io::Result<(JoinHandle<()>, Sender<WorkerMessage>)> {
    let (inbox_tx, inbox_rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name(format!("framepool-worker-{worker_id}"))
        .spawn(move || worker_main(geometry, kernel, inbox_rx, events))?;
    Ok((handle, inbox_tx))
}

fn worker_main<K: FillKernel>(
    geometry: ChunkGeometry,
    kernel: Arc<K>,
    inbox: Receiver<WorkerMessage>,
    events: Sender<CoordinatorMessage>,
) {
    let (worker_id, region) = match inbox.recv() {
        Ok(WorkerMessage::Init { worker_id, region }) => (worker_id, region),
        Err(_) => {
            tracing::debug!("worker dismissed before init");
            return;
        }
    };

    let context = WorkerContext::new(worker_id, region, geometry, kernel);
    tracing::debug!(worker_id, "worker ready");
    if events.send(CoordinatorMessage::Ready { worker_id }).is_err() {
        return;
    }

    let stats = context.run();
    tracing::debug!(
        worker_id,
        chunks_filled = stats.chunks_filled,
        frames_joined = stats.frames_joined,
        "worker stopped"
    );
    let _ = events.send(CoordinatorMessage::Exited {
        worker_id,
        chunks_filled: stats.chunks_filled,
        frames_joined: stats.frames_joined,
    });
}
