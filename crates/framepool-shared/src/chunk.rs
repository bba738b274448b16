//! Chunk geometry: the canvas is divided into equal horizontal slices.

use crate::error::SetupError;
use crate::layout::{SharedLayout, BYTES_PER_PIXEL};

/// Pixel rectangle covered by one chunk, plus its byte offset in the pixel
/// segment. `x_end` and `y_end` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkDescriptor {
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
    pub buffer_offset: usize,
}

impl ChunkDescriptor {
    pub fn width(&self) -> u32 {
        self.x_end - self.x_start
    }

    pub fn height(&self) -> u32 {
        self.y_end - self.y_start
    }

    /// Number of bytes this chunk occupies in the pixel segment.
    pub fn byte_len(&self) -> usize {
        self.width() as usize * self.height() as usize * BYTES_PER_PIXEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    width: u32,
    height: u32,
    chunk_count: u32,
    chunk_height: u32,
}

impl ChunkGeometry {
    pub fn new(width: u32, height: u32, chunk_count: u32) -> Result<Self, SetupError> {
        SharedLayout::new(width, height)?;
        if chunk_count == 0 {
            return Err(SetupError::ZeroChunks);
        }
        if chunk_count > i32::MAX as u32 {
            return Err(SetupError::TooLarge {
                what: "chunk count",
                value: chunk_count.into(),
                limit: i32::MAX as u64,
            });
        }
        if height % chunk_count != 0 {
            return Err(SetupError::ChunkCountMismatch {
                height,
                chunk_count,
            });
        }
        Ok(Self {
            width,
            height,
            chunk_count,
            chunk_height: height / chunk_count,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    pub fn chunk_height(&self) -> u32 {
        self.chunk_height
    }

    pub fn layout(&self) -> SharedLayout {
        SharedLayout {
            width: self.width,
            height: self.height,
        }
    }

    /// Reusable descriptor for chunk 0; workers keep one and [`update`](Self::update)
    /// it on every claim.
    pub fn scratch(&self) -> ChunkDescriptor {
        self.descriptor(0)
    }

    pub fn descriptor(&self, index: u32) -> ChunkDescriptor {
        let mut chunk = ChunkDescriptor {
            x_start: 0,
            x_end: self.width,
            ..ChunkDescriptor::default()
        };
        self.update(&mut chunk, index);
        chunk
    }

    pub fn update<'a>(&self, chunk: &'a mut ChunkDescriptor, index: u32) -> &'a ChunkDescriptor {
        debug_assert!(index < self.chunk_count, "chunk index {index} out of range");
        chunk.y_start = index * self.chunk_height;
        chunk.y_end = chunk.y_start + self.chunk_height;
        chunk.buffer_offset = chunk.y_start as usize * self.width as usize * BYTES_PER_PIXEL;
        chunk
    }

    pub fn iter(&self) -> impl Iterator<Item = ChunkDescriptor> + '_ {
        (0..self.chunk_count).map(|index| self.descriptor(index))
    }
}
