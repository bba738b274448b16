//! The single shared allocation holding the pixel segment and the control block.
//!
//! Pixels are written without per-byte synchronization. That is sound only
//! because chunks tile the canvas without overlap and [`ControlBlock`] hands
//! every chunk index to exactly one worker per frame; the unsafe accessors below
//! spell out what callers must uphold.

use crate::chunk::ChunkDescriptor;
use crate::control::ControlBlock;
use crate::error::SetupError;
use crate::layout::{SharedLayout, CONTROL_ALIGN};

pub struct SharedRegion {
    layout: SharedLayout,
    base: *mut u8,
    // Backing words; only ever accessed through `base`.
    _storage: Vec<u32>,
}

// SAFETY: the control segment is only touched through atomics, and pixel access
// goes through the unsafe accessors whose contracts rule out overlapping writes.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    pub fn new(layout: SharedLayout) -> Result<Self, SetupError> {
        let total = layout.total_bytes();
        let words = total / CONTROL_ALIGN;

        let mut storage: Vec<u32> = Vec::new();
        storage
            .try_reserve_exact(words)
            .map_err(|_| SetupError::SharedMemoryUnavailable { bytes: total })?;
        storage.resize(words, 0);
        let base = storage.as_mut_ptr().cast::<u8>();

        let region = Self {
            layout,
            base,
            _storage: storage,
        };
        region.control().init();
        tracing::debug!(
            width = layout.width,
            height = layout.height,
            bytes = total,
            "allocated shared frame region"
        );
        Ok(region)
    }

    pub fn layout(&self) -> SharedLayout {
        self.layout
    }

    pub fn control(&self) -> &ControlBlock {
        // SAFETY: the control offset is word aligned and inside the allocation,
        // and `ControlBlock` is `repr(C)` over three 32-bit atomics.
        unsafe {
            &*self
                .base
                .add(self.layout.control_offset_bytes())
                .cast::<ControlBlock>()
        }
    }

    /// Mutable view of one chunk's bytes.
    ///
    /// # Safety
    /// The caller must hold the exclusive claim on `chunk` for the current frame,
    /// and nobody may read the pixel segment until the frame has drained.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn chunk_mut(&self, chunk: &ChunkDescriptor) -> &mut [u8] {
        let end = chunk.buffer_offset + chunk.byte_len();
        assert!(
            end <= self.layout.pixel_bytes(),
            "chunk [{}, {end}) outside pixel segment",
            chunk.buffer_offset
        );
        core::slice::from_raw_parts_mut(self.base.add(chunk.buffer_offset), chunk.byte_len())
    }

    /// Read view of the whole pixel segment.
    ///
    /// # Safety
    /// No worker may be writing, i.e. the pool must be in `WAIT` (or `STOP`) with
    /// the most recent frame fully drained.
    pub unsafe fn pixels(&self) -> &[u8] {
        core::slice::from_raw_parts(self.base, self.layout.pixel_bytes())
    }

    /// Exclusive access to the pixel segment; no worker can hold a handle.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        // SAFETY: `&mut self` proves there are no other handles to the region.
        unsafe { core::slice::from_raw_parts_mut(self.base, self.layout.pixel_bytes()) }
    }
}
