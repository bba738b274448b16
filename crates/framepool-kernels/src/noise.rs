//! Colour noise. The first row and column of every chunk carry the filling
//! worker's debug colour, which makes the chunk-to-worker assignment visible.

use rand::Rng;

use framepool_shared::layout::BYTES_PER_PIXEL;
use framepool_shared::ChunkDescriptor;

use crate::{FillKernel, Rgb, ALPHA};

pub const WORKER_COLOURS: [Rgb; 8] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [0, 255, 255],
    [255, 0, 255],
    [255, 255, 255],
    [0, 0, 0],
];

pub fn worker_colour(worker_id: u32) -> Rgb {
    WORKER_COLOURS[worker_id as usize % WORKER_COLOURS.len()]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseKernel;

impl FillKernel for NoiseKernel {
    /// The worker's debug colour.
    type State = Rgb;

    fn init(&self, worker_id: u32) -> Rgb {
        worker_colour(worker_id)
    }

    fn fill(&self, colour: &mut Rgb, pixels: &mut [u8], chunk: &ChunkDescriptor, _worker_id: u32) {
        let mut rng = rand::thread_rng();
        let row_bytes = chunk.width() as usize * BYTES_PER_PIXEL;
        for (row, line) in pixels.chunks_exact_mut(row_bytes).enumerate() {
            for (col, px) in line.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let rgb: Rgb = if row > 0 && col > 0 {
                    rng.gen()
                } else {
                    *colour
                };
                px[..3].copy_from_slice(&rgb);
                px[3] = ALPHA;
            }
        }
    }
}
