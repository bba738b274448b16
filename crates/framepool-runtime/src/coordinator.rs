//! Orchestrating side of the pool.
//!
//! The coordinator owns the shared region, spawns the workers, runs the
//! startup handshake and then drives frames through the [`ControlBlock`]. A
//! [`Frame`] borrows the coordinator, so the next frame cannot start while a
//! presenter is still reading the previous one.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use framepool_kernels::FillKernel;
use framepool_shared::{
    ChunkGeometry, ControlBlock, CoordinatorMessage, SharedRegion, WorkerMessage, WorkerState,
};

use crate::config::PoolConfig;
use crate::counter::FrameCounter;
use crate::error::PoolError;
use crate::worker;

const HANDSHAKE_POLL: Duration = Duration::from_millis(50);

/// A fully drained frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// 1-based count of frames rendered by this pool.
    pub index: u64,
    pub epoch: u32,
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major.
    pub pixels: &'a [u8],
    /// From publishing `RUN` to observing the drain.
    pub elapsed: Duration,
}

pub trait Present {
    fn present(&mut self, frame: &Frame<'_>);
}

impl<F> Present for F
where
    F: FnMut(&Frame<'_>),
{
    fn present(&mut self, frame: &Frame<'_>) {
        self(frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: u32,
    pub chunks_filled: u64,
    pub frames_joined: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
    pub frames_rendered: u64,
    /// Sorted by worker id. Workers that died without reporting are missing.
    pub workers: Vec<WorkerReport>,
}

impl PoolReport {
    pub fn total_chunks_filled(&self) -> u64 {
        self.workers.iter().map(|w| w.chunks_filled).sum()
    }
}

struct WorkerHandle {
    worker_id: u32,
    thread: JoinHandle<()>,
}

pub struct Coordinator<K: FillKernel> {
    geometry: ChunkGeometry,
    pool_size: u32,
    region: Arc<SharedRegion>,
    kernel: Arc<K>,
    workers: Vec<WorkerHandle>,
    events: Receiver<CoordinatorMessage>,
    frames_rendered: u64,
    counter: FrameCounter,
}

impl<K: FillKernel> Coordinator<K> {
    /// Allocate the shared region, spawn `config.pool_size` workers and wait
    /// until every one of them has initialized its kernel state.
    pub fn start(config: &PoolConfig, kernel: K) -> Result<Self, PoolError> {
        let geometry = config.validate()?;
        if let Some((kernel_width, kernel_height)) = kernel.canvas() {
            if (kernel_width, kernel_height) != (geometry.width(), geometry.height()) {
                return Err(PoolError::KernelCanvasMismatch {
                    kernel_width,
                    kernel_height,
                    width: geometry.width(),
                    height: geometry.height(),
                });
            }
        }
        let pool_size = config.pool_size;
        let region = Arc::new(SharedRegion::new(geometry.layout())?);
        let kernel = Arc::new(kernel);

        let (events_tx, events_rx) = mpsc::channel();
        let mut workers = Vec::with_capacity(pool_size as usize);
        let mut inboxes = Vec::with_capacity(pool_size as usize);
        for worker_id in 0..pool_size {
            match worker::spawn(worker_id, geometry, kernel.clone(), events_tx.clone()) {
                Ok((thread, inbox)) => {
                    workers.push(WorkerHandle { worker_id, thread });
                    inboxes.push(inbox);
                }
                Err(source) => {
                    // Idle workers exit once their inbox is gone.
                    drop(inboxes);
                    join_quietly(workers);
                    return Err(PoolError::Spawn { worker_id, source });
                }
            }
        }
        // Only workers hold senders from here on, so `recv` fails once they
        // are all gone.
        drop(events_tx);

        for (worker_id, inbox) in (0..pool_size).zip(&inboxes) {
            // A failed send means the thread is already gone; the handshake
            // below notices.
            let _ = inbox.send(WorkerMessage::Init {
                worker_id,
                region: region.clone(),
            });
        }
        drop(inboxes);

        let mut coordinator = Self {
            geometry,
            pool_size,
            region,
            kernel,
            workers,
            events: events_rx,
            frames_rendered: 0,
            counter: FrameCounter::new(),
        };
        coordinator.handshake()?;

        tracing::info!(
            width = geometry.width(),
            height = geometry.height(),
            chunks = geometry.chunk_count(),
            workers = pool_size,
            "worker pool started"
        );
        Ok(coordinator)
    }

    fn handshake(&mut self) -> Result<(), PoolError> {
        let mut ready = 0u32;
        while ready < self.pool_size {
            match self.events.recv_timeout(HANDSHAKE_POLL) {
                Ok(CoordinatorMessage::Ready { worker_id }) => {
                    ready += 1;
                    tracing::debug!(worker_id, ready, expected = self.pool_size, "worker ready");
                }
                Ok(CoordinatorMessage::Exited { worker_id, .. }) => {
                    tracing::debug!(worker_id, "worker exited during handshake");
                    return self.abort_handshake(ready);
                }
                Err(RecvTimeoutError::Timeout) => {
                    // A worker that panicked in kernel init never reports.
                    if self.workers.iter().any(|w| w.thread.is_finished()) {
                        return self.abort_handshake(ready);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return self.abort_handshake(ready),
            }
        }
        Ok(())
    }

    fn abort_handshake(&mut self, ready: u32) -> Result<(), PoolError> {
        self.region.control().stop();
        join_quietly(std::mem::take(&mut self.workers));
        Err(PoolError::Handshake {
            ready,
            expected: self.pool_size,
        })
    }

    /// Run one frame through the pool and return the drained buffer.
    ///
    /// Blocks until every worker has checked out of the frame. There is no
    /// timeout: a worker that panics mid-frame stalls this call forever.
    /// Once the control block has been stopped this returns
    /// [`PoolError::Stopped`] without waiting.
    pub fn render_frame(&mut self) -> Result<Frame<'_>, PoolError> {
        let control = self.region.control();
        let started = Instant::now();
        let epoch = control
            .begin_frame(self.geometry.chunk_count() as i32, self.pool_size as i32)
            .ok_or(PoolError::Stopped)?;
        match control.wait_for_drain(epoch) {
            WorkerState::Wait => {}
            // Workers may still be writing; the buffer is not handed out.
            WorkerState::Stop => return Err(PoolError::Stopped),
            WorkerState::Run => unreachable!("drain wait returned while frame {epoch} was running"),
        }

        let now = Instant::now();
        let elapsed = now.duration_since(started);
        self.frames_rendered += 1;
        tracing::trace!(frame = self.frames_rendered, epoch, ?elapsed, "frame drained");
        if let Some(fps) = self.counter.tick(now) {
            tracing::debug!(fps, last_frame = ?self.counter.last_delta(), "frame rate");
        }

        Ok(Frame {
            index: self.frames_rendered,
            epoch,
            width: self.geometry.width(),
            height: self.geometry.height(),
            // SAFETY: every worker has finished frame `epoch` and is parked
            // until the next `begin_frame`, which needs `&mut self` and so
            // cannot happen while this borrow lives.
            pixels: unsafe { self.region.pixels() },
            elapsed,
        })
    }

    /// Render `frames` frames, handing each one to `presenter`.
    pub fn run(&mut self, frames: u64, presenter: &mut impl Present) -> Result<(), PoolError> {
        for _ in 0..frames {
            let frame = self.render_frame()?;
            presenter.present(&frame);
        }
        Ok(())
    }

    pub fn control(&self) -> &ControlBlock {
        self.region.control()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn geometry(&self) -> ChunkGeometry {
        self.geometry
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn frame_counter(&self) -> &FrameCounter {
        &self.counter
    }

    /// Stop the pool, join every worker and collect their exit reports.
    pub fn shutdown(mut self) -> Result<PoolReport, PoolError> {
        self.region.control().stop();

        let mut panicked = None;
        for handle in std::mem::take(&mut self.workers) {
            if handle.thread.join().is_err() {
                tracing::warn!(worker_id = handle.worker_id, "worker panicked");
                panicked.get_or_insert(handle.worker_id);
            }
        }

        // Every worker thread has ended, so every report is already queued.
        let mut workers: Vec<WorkerReport> = self
            .events
            .try_iter()
            .filter_map(|message| match message {
                CoordinatorMessage::Exited {
                    worker_id,
                    chunks_filled,
                    frames_joined,
                } => Some(WorkerReport {
                    worker_id,
                    chunks_filled,
                    frames_joined,
                }),
                CoordinatorMessage::Ready { .. } => None,
            })
            .collect();
        workers.sort_by_key(|w| w.worker_id);

        for w in &workers {
            tracing::debug!(
                worker_id = w.worker_id,
                chunks_filled = w.chunks_filled,
                frames_joined = w.frames_joined,
                "worker report"
            );
        }
        tracing::info!(frames = self.frames_rendered, "worker pool stopped");

        if let Some(worker_id) = panicked {
            return Err(PoolError::WorkerPanicked { worker_id });
        }
        Ok(PoolReport {
            frames_rendered: self.frames_rendered,
            workers,
        })
    }
}

impl<K: FillKernel> Drop for Coordinator<K> {
    fn drop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.region.control().stop();
        join_quietly(std::mem::take(&mut self.workers));
    }
}

fn join_quietly(workers: Vec<WorkerHandle>) {
    for handle in workers {
        let _ = handle.thread.join();
    }
}
