//! Lock-free frame control block shared between the coordinator and its workers.
//!
//! Three 32-bit words, accessed with atomic operations only (see
//! [`crate::layout::control_index`]):
//!
//! - `state`: [`WorkerState`] in the low two bits, frame epoch above them.
//! - `remaining_chunks`: chunks not yet claimed in the current frame.
//! - `remaining_workers`: workers that have not yet finished draining.
//!
//! Protocol for one frame:
//! 1) Coordinator stores both counters, then publishes `RUN` with a fresh epoch
//!    (release compare-exchange from `WAIT`, so a `STOP` is never overwritten)
//!    and wakes every waiter on the state word.
//! 2) Each worker claims chunks with `fetch_sub(1)` on `remaining_chunks` until
//!    the pre-subtract value is `<= 0`.
//! 3) Each worker then decrements `remaining_workers`; the one that observes the
//!    pre-subtract value `1` flips the state back to `WAIT` (same epoch) and
//!    wakes the coordinator.
//!
//! The epoch stops a worker that finished early from joining the same frame a
//! second time while slower workers are still draining it.

#[cfg(all(feature = "loom", test))]
use loom::sync::atomic::{AtomicI32, AtomicU32};
#[cfg(not(all(feature = "loom", test)))]
use std::sync::atomic::{AtomicI32, AtomicU32};

use std::sync::atomic::Ordering;

pub const STATE_MASK: u32 = 0b11;
pub const EPOCH_SHIFT: u32 = 2;
pub const EPOCH_MASK: u32 = u32::MAX >> EPOCH_SHIFT;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Terminal. Workers exit their loop.
    Stop = 0,
    /// No chunks available; workers block.
    Wait = 1,
    /// Chunks available to claim.
    Run = 2,
}

impl WorkerState {
    pub fn from_word(word: u32) -> Self {
        match word & STATE_MASK {
            1 => WorkerState::Wait,
            2 => WorkerState::Run,
            // 3 is never stored.
            _ => WorkerState::Stop,
        }
    }
}

/// What a worker should do after [`ControlBlock::wait_for_work`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkSignal {
    Stop,
    Run { epoch: u32 },
}

pub fn state_word(state: WorkerState, epoch: u32) -> u32 {
    ((epoch & EPOCH_MASK) << EPOCH_SHIFT) | state as u32
}

pub fn epoch_of(word: u32) -> u32 {
    word >> EPOCH_SHIFT
}

fn next_epoch(epoch: u32) -> u32 {
    epoch.wrapping_add(1) & EPOCH_MASK
}

#[repr(C)]
pub struct ControlBlock {
    state: AtomicU32,
    remaining_chunks: AtomicI32,
    remaining_workers: AtomicI32,
}

impl ControlBlock {
    pub fn new() -> Self {
        Self {
            state: AtomicU32::new(state_word(WorkerState::Wait, 0)),
            remaining_chunks: AtomicI32::new(0),
            remaining_workers: AtomicI32::new(0),
        }
    }

    /// Reset to `WAIT` at epoch 0 with both counters cleared.
    ///
    /// Only valid before any worker has been handed this block.
    pub fn init(&self) {
        self.remaining_chunks.store(0, Ordering::Relaxed);
        self.remaining_workers.store(0, Ordering::Relaxed);
        self.state
            .store(state_word(WorkerState::Wait, 0), Ordering::Release);
    }

    /// Start a new frame and wake every waiting worker. Returns the frame epoch,
    /// or `None` if the pool has been stopped; `STOP` is never left.
    ///
    /// Must only be called by the coordinator while the pool is not running.
    pub fn begin_frame(&self, total_chunks: i32, pool_size: i32) -> Option<u32> {
        let word = self.state.load(Ordering::Acquire);
        let state = WorkerState::from_word(word);
        debug_assert_ne!(
            state,
            WorkerState::Run,
            "frame started while the pool was running"
        );
        if state == WorkerState::Stop {
            return None;
        }
        let epoch = next_epoch(epoch_of(word));

        self.remaining_chunks.store(total_chunks, Ordering::Relaxed);
        test_yield();
        self.remaining_workers.store(pool_size, Ordering::Relaxed);
        test_yield();

        // Publish: the counters above happen-before any worker that acquires RUN.
        // Fails only if STOP landed since the load above.
        self.state
            .compare_exchange(
                word,
                state_word(WorkerState::Run, epoch),
                Ordering::Release,
                Ordering::Acquire,
            )
            .ok()?;
        wake_all(&self.state);
        Some(epoch)
    }

    /// Claim the next chunk index, or `None` once the frame has no chunks left.
    pub fn claim_chunk(&self) -> Option<u32> {
        let n = self.remaining_chunks.fetch_sub(1, Ordering::AcqRel);
        if n > 0 {
            Some((n - 1) as u32)
        } else {
            None
        }
    }

    /// Record that the calling worker has finished draining frame `epoch`.
    ///
    /// Returns `true` for the last worker out, which has flipped the state back
    /// to `WAIT` and woken the coordinator.
    pub fn finish_worker(&self, epoch: u32) -> bool {
        let prev = self.remaining_workers.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "remaining_workers underflow ({prev})");
        if prev != 1 {
            return false;
        }

        test_yield();

        // Only leave RUN if nobody requested STOP in the meantime.
        let _ = self.state.compare_exchange(
            state_word(WorkerState::Run, epoch),
            state_word(WorkerState::Wait, epoch),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        wake_all(&self.state);
        true
    }

    /// Block until a frame other than `last_epoch` is running, or until `STOP`.
    pub fn wait_for_work(&self, last_epoch: u32) -> WorkSignal {
        loop {
            let word = self.state.load(Ordering::Acquire);
            match WorkerState::from_word(word) {
                WorkerState::Stop => return WorkSignal::Stop,
                WorkerState::Run if epoch_of(word) != last_epoch => {
                    return WorkSignal::Run {
                        epoch: epoch_of(word),
                    }
                }
                _ => wait_while(&self.state, word),
            }
        }
    }

    /// Block until frame `epoch` has drained. Returns the state observed on exit
    /// (`WAIT` normally, `STOP` if shutdown raced the frame).
    ///
    /// There is no timeout: a worker that never finishes stalls this call.
    pub fn wait_for_drain(&self, epoch: u32) -> WorkerState {
        let running = state_word(WorkerState::Run, epoch);
        loop {
            let word = self.state.load(Ordering::Acquire);
            if word != running {
                return WorkerState::from_word(word);
            }
            wait_while(&self.state, word);
        }
    }

    /// Request shutdown and wake everyone. There is no way out of `STOP`.
    pub fn stop(&self) {
        let epoch = epoch_of(self.state.load(Ordering::Relaxed));
        self.state
            .store(state_word(WorkerState::Stop, epoch), Ordering::Release);
        wake_all(&self.state);
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_word(self.state.load(Ordering::Acquire))
    }

    pub fn epoch(&self) -> u32 {
        epoch_of(self.state.load(Ordering::Acquire))
    }

    pub fn remaining_chunks(&self) -> i32 {
        self.remaining_chunks.load(Ordering::Acquire)
    }

    pub fn remaining_workers(&self) -> i32 {
        self.remaining_workers.load(Ordering::Acquire)
    }
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(all(feature = "loom", test)))]
#[inline]
fn wait_while(word: &AtomicU32, value: u32) {
    atomic_wait::wait(word, value);
}

#[cfg(not(all(feature = "loom", test)))]
#[inline]
fn wake_all(word: &AtomicU32) {
    atomic_wait::wake_all(word);
}

// Loom has no futex model; waiters spin and yield instead.
#[cfg(all(feature = "loom", test))]
#[inline]
fn wait_while(_word: &AtomicU32, _value: u32) {
    loom::thread::yield_now();
}

#[cfg(all(feature = "loom", test))]
#[inline]
fn wake_all(_word: &AtomicU32) {}

#[cfg(all(test, feature = "loom"))]
#[inline]
fn test_yield() {
    loom::thread::yield_now();
}

#[cfg(all(test, not(feature = "loom")))]
#[inline]
fn test_yield() {
    std::thread::yield_now();
}

#[cfg(not(test))]
#[inline]
fn test_yield() {}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::layout::control_index;

    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn control_block_struct_matches_declared_word_count() {
        assert_eq!(
            core::mem::size_of::<ControlBlock>(),
            control_index::BYTES
        );
        assert_eq!(core::mem::align_of::<ControlBlock>(), 4);
    }

    #[test]
    fn state_word_round_trips_state_and_epoch() {
        let word = state_word(WorkerState::Run, 17);
        assert_eq!(WorkerState::from_word(word), WorkerState::Run);
        assert_eq!(epoch_of(word), 17);
        assert_eq!(state_word(WorkerState::Stop, 0), 0);
        assert_eq!(state_word(WorkerState::Wait, 0), 1);
        assert_eq!(epoch_of(state_word(WorkerState::Wait, EPOCH_MASK + 1)), 0);
    }

    #[test]
    fn begin_frame_publishes_counters_and_run() {
        let control = ControlBlock::new();
        assert_eq!(control.state(), WorkerState::Wait);

        let epoch = control.begin_frame(12, 3).unwrap();
        assert_eq!(epoch, 1);
        assert_eq!(control.state(), WorkerState::Run);
        assert_eq!(control.epoch(), 1);
        assert_eq!(control.remaining_chunks(), 12);
        assert_eq!(control.remaining_workers(), 3);
    }

    #[test]
    fn claims_count_down_then_exhaust() {
        let control = ControlBlock::new();
        control.begin_frame(3, 1).unwrap();

        assert_eq!(control.claim_chunk(), Some(2));
        assert_eq!(control.claim_chunk(), Some(1));
        assert_eq!(control.claim_chunk(), Some(0));
        assert_eq!(control.claim_chunk(), None);
        assert_eq!(control.claim_chunk(), None);
        assert!(control.remaining_chunks() <= 0);
    }

    #[test]
    fn only_last_worker_flips_back_to_wait() {
        let control = ControlBlock::new();
        let epoch = control.begin_frame(0, 3).unwrap();

        assert!(!control.finish_worker(epoch));
        assert_eq!(control.state(), WorkerState::Run);
        assert!(!control.finish_worker(epoch));
        assert_eq!(control.state(), WorkerState::Run);
        assert!(control.finish_worker(epoch));
        assert_eq!(control.state(), WorkerState::Wait);
        assert_eq!(control.epoch(), epoch);
        assert_eq!(control.remaining_workers(), 0);
        assert_eq!(control.wait_for_drain(epoch), WorkerState::Wait);
    }

    #[test]
    fn finish_does_not_override_stop() {
        let control = ControlBlock::new();
        let epoch = control.begin_frame(0, 1).unwrap();
        control.stop();
        assert!(control.finish_worker(epoch));
        assert_eq!(control.state(), WorkerState::Stop);
        assert_eq!(control.wait_for_work(epoch), WorkSignal::Stop);
    }

    #[test]
    fn finished_worker_waits_for_the_next_epoch() {
        let control = Arc::new(ControlBlock::new());
        let first = control.begin_frame(1, 2).unwrap();
        assert_eq!(control.claim_chunk(), Some(0));
        assert!(!control.finish_worker(first));

        // This worker already drained `first`; it must not rejoin it.
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let control = control.clone();
            thread::spawn(move || {
                tx.send(control.wait_for_work(first)).unwrap();
            })
        };
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        assert!(control.finish_worker(first));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        let second = control.begin_frame(1, 2).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(10)).unwrap(),
            WorkSignal::Run { epoch: second }
        );
        waiter.join().unwrap();
    }

    #[test]
    fn begin_frame_after_stop_stays_stopped() {
        let control = ControlBlock::new();
        let epoch = control.begin_frame(4, 2).unwrap();
        assert!(!control.finish_worker(epoch));
        assert!(control.finish_worker(epoch));

        control.stop();
        assert_eq!(control.begin_frame(4, 2), None);
        assert_eq!(control.state(), WorkerState::Stop);
        assert_eq!(control.epoch(), epoch);
        assert_eq!(control.wait_for_work(epoch), WorkSignal::Stop);

        // Stopping a pool that never ran is just as final.
        let fresh = ControlBlock::new();
        fresh.stop();
        assert_eq!(fresh.begin_frame(1, 1), None);
        assert_eq!(fresh.state(), WorkerState::Stop);
    }

    #[test]
    fn stop_wakes_blocked_workers() {
        let control = Arc::new(ControlBlock::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let control = control.clone();
            handles.push(thread::spawn(move || control.wait_for_work(0)));
        }
        thread::sleep(Duration::from_millis(20));
        control.stop();
        for h in handles {
            assert_eq!(h.join().unwrap(), WorkSignal::Stop);
        }
        assert_eq!(control.state(), WorkerState::Stop);
    }
}
