//! Shared memory layout contract for a frame pool.
//!
//! The coordinator allocates one contiguous region and splits it into:
//!
//! - the pixel segment: `width * height * 4` bytes of RGBA8, row-major, at
//!   offset 0.
//! - the control segment: [`control_index::WORDS`] 32-bit words placed
//!   immediately after the pixel segment (rounded up to word alignment).
//!
//! Word indices are stable, so a foreign host can view the region as a plain
//! `i32` array.

use crate::error::SetupError;

/// RGBA8.
pub const BYTES_PER_PIXEL: usize = 4;

/// Alignment of the control segment, in bytes.
pub const CONTROL_ALIGN: usize = 4;

/// Control word indices when the control segment is viewed as a `u32[]` /
/// `Int32Array`.
pub mod control_index {
    pub const STATE: usize = 0;
    pub const REMAINING_CHUNKS: usize = 1;
    pub const REMAINING_WORKERS: usize = 2;
    pub const WORDS: usize = 3;
    pub const BYTES: usize = WORDS * 4;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedLayout {
    pub width: u32,
    pub height: u32,
}

impl SharedLayout {
    pub fn new(width: u32, height: u32) -> Result<Self, SetupError> {
        if width == 0 || height == 0 {
            return Err(SetupError::EmptyCanvas { width, height });
        }
        let layout = Self { width, height };
        layout
            .checked_total_bytes()
            .ok_or(SetupError::SharedMemoryUnavailable { bytes: usize::MAX })?;
        Ok(layout)
    }

    /// Bytes in one pixel row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn pixel_bytes(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    /// Byte offset of the control segment from the start of the region.
    pub fn control_offset_bytes(&self) -> usize {
        align_up(self.pixel_bytes(), CONTROL_ALIGN)
    }

    /// Total size of the shared region (pixel segment + control segment).
    pub fn total_bytes(&self) -> usize {
        self.control_offset_bytes() + control_index::BYTES
    }

    fn checked_total_bytes(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(BYTES_PER_PIXEL)?
            .checked_mul(self.height as usize)?
            .checked_add(CONTROL_ALIGN - 1 + control_index::BYTES)
    }
}

pub(crate) const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}
