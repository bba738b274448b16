//! Escape-time fractal with a slowly zooming view.
//!
//! Each worker carries its own zoom factor that decays every time that worker
//! completes a chunk. Chunk assignment is dynamic, so neighbouring chunks of the
//! same frame may be rendered at slightly different zoom levels depending on
//! which worker claimed them and how many chunks it has finished before. This is
//! accepted behaviour, not a bug.

use framepool_shared::layout::BYTES_PER_PIXEL;
use framepool_shared::ChunkDescriptor;

use crate::{FillKernel, Rgb, ALPHA};

pub const MAX_ITERATIONS: u32 = 100;

/// Squared escape radius (|z| > 2).
pub const ESCAPE_RADIUS_SQ: f64 = 4.0;

pub const ZOOM_DECAY: f64 = 0.99925;

pub const PAN_X: f64 = -0.77568377;
pub const PAN_Y: f64 = 0.13646737;

/// Colour of the centre row and column.
const CROSSHAIR: [f64; 3] = [0.25, 0.05, 0.05];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalParams {
    pub max_iterations: u32,
    pub zoom_decay: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for FractalParams {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            zoom_decay: ZOOM_DECAY,
            pan_x: PAN_X,
            pan_y: PAN_Y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalState {
    pub zoom: f64,
    pub chunks_completed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalKernel {
    params: FractalParams,
    width: u32,
    height: u32,
    half_width: f64,
    half_height: f64,
    x_extent: f64,
    y_extent: f64,
    norm_width: f64,
    norm_height: f64,
}

impl FractalKernel {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_params(width, height, FractalParams::default())
    }

    pub fn with_params(width: u32, height: u32, params: FractalParams) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        let aspect = w / h;
        let (x_extent, y_extent) = if aspect >= 1.0 {
            let y = 2.3 / 2.0;
            (y * aspect, y)
        } else {
            let x = 2.5 / 2.0;
            (x, x / aspect)
        };
        Self {
            params,
            width,
            height,
            half_width: w / 2.0,
            half_height: h / 2.0,
            x_extent,
            y_extent,
            norm_width: 2.0 / w,
            norm_height: 2.0 / h,
        }
    }

    pub fn params(&self) -> &FractalParams {
        &self.params
    }

    /// Complex-plane point for a pixel, given in coordinates centred on the
    /// canvas.
    pub fn point(&self, x: f64, y: f64, zoom: f64) -> (f64, f64) {
        let x_unit = self.x_extent * zoom * self.norm_width;
        let y_unit = self.y_extent * zoom * self.norm_height;
        (x * x_unit + self.params.pan_x, y * y_unit + self.params.pan_y)
    }
}

/// Iterations of `z ← z² + c` from `z = 0` until `|z|² > 4` or the cap is hit.
pub fn escape_time(cx: f64, cy: f64, max_iterations: u32) -> u32 {
    let (mut x, mut y) = (0.0f64, 0.0f64);
    let mut iter = 0;
    while x * x + y * y <= ESCAPE_RADIUS_SQ && iter < max_iterations {
        let tmp = x * x - y * y + cx;
        y = 2.0 * x * y + cy;
        x = tmp;
        iter += 1;
    }
    iter
}

/// Maps an iteration count onto the red-to-yellow gradient. Points that never
/// escaped are black.
pub fn gradient(iterations: u32, max_iterations: u32) -> Rgb {
    let mut c = f64::from(iterations) * (1.0 / f64::from(max_iterations));
    if c == 1.0 {
        c = 0.0;
    }
    let red = c * c;
    let green = red * c;
    let blue = green * 0.75 * c;
    [to_byte(red), to_byte(green), to_byte(blue)]
}

fn to_byte(v: f64) -> u8 {
    (v * 255.999) as u8
}

impl FillKernel for FractalKernel {
    type State = FractalState;

    fn init(&self, _worker_id: u32) -> FractalState {
        FractalState {
            zoom: 1.0,
            chunks_completed: 0,
        }
    }

    fn canvas(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn fill(
        &self,
        state: &mut FractalState,
        pixels: &mut [u8],
        chunk: &ChunkDescriptor,
        worker_id: u32,
    ) {
        let crosshair = CROSSHAIR.map(to_byte);
        let row_bytes = chunk.width() as usize * BYTES_PER_PIXEL;
        for (row, line) in pixels.chunks_exact_mut(row_bytes).enumerate() {
            let y = f64::from(chunk.y_start) + row as f64 - self.half_height;
            for (col, px) in line.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let x = f64::from(chunk.x_start) + col as f64 - self.half_width;
                let rgb = if x == 0.0 || y == 0.0 {
                    crosshair
                } else {
                    let (cx, cy) = self.point(x, y, state.zoom);
                    let max = self.params.max_iterations;
                    gradient(escape_time(cx, cy, max), max)
                };
                px[..3].copy_from_slice(&rgb);
                px[3] = ALPHA;
            }
        }

        if state.zoom > 0.0 {
            state.zoom *= self.params.zoom_decay;
        }
        state.chunks_completed += 1;
        tracing::trace!(
            worker_id,
            y_start = chunk.y_start,
            zoom = state.zoom,
            "fractal chunk rendered"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framepool_shared::ChunkGeometry;

    /// Straight transcription of the escape-time definition, kept independent
    /// of the kernel's helpers.
    fn reference_escape(cx: f64, cy: f64, cap: u32) -> u32 {
        let (mut zr, mut zi) = (0.0f64, 0.0f64);
        for n in 0..cap {
            if zr * zr + zi * zi > 4.0 {
                return n;
            }
            let next_r = zr * zr - zi * zi + cx;
            zi = 2.0 * zr * zi + cy;
            zr = next_r;
        }
        cap
    }

    fn pixel_at(pixels: &[u8], width: u32, col: u32, row: u32) -> [u8; 4] {
        let i = (row as usize * width as usize + col as usize) * BYTES_PER_PIXEL;
        pixels[i..i + 4].try_into().unwrap()
    }

    #[test]
    fn escape_time_edge_cases() {
        assert_eq!(escape_time(0.0, 0.0, MAX_ITERATIONS), MAX_ITERATIONS);
        assert_eq!(escape_time(2.0, 2.0, MAX_ITERATIONS), 1);
        assert_eq!(escape_time(0.5, 0.0, MAX_ITERATIONS), 5);
        assert_eq!(escape_time(PAN_X, PAN_Y, MAX_ITERATIONS), MAX_ITERATIONS);
    }

    #[test]
    fn pan_relative_points_match_reference() {
        let kernel = FractalKernel::new(1024, 768);
        for (x, y, expected) in [
            (1.0, 1.0, 22),
            (100.0, -50.0, 100),
            (-300.0, 200.0, 3),
            (37.0, 12.0, 100),
            (511.0, 383.0, 2),
            (-512.0, -384.0, 1),
        ] {
            let (cx, cy) = kernel.point(x, y, 1.0);
            assert_eq!(escape_time(cx, cy, MAX_ITERATIONS), expected, "({x}, {y})");
            assert_eq!(reference_escape(cx, cy, MAX_ITERATIONS), expected, "({x}, {y})");
        }
    }

    #[test]
    fn gradient_maps_iterations() {
        assert_eq!(gradient(22, 100), [12, 2, 0]);
        assert_eq!(gradient(100, 100), [0, 0, 0]);
        assert_eq!(gradient(0, 100), [0, 0, 0]);
        assert_eq!(gradient(99, 100)[0], 250);
    }

    #[test]
    fn fill_renders_crosshair_and_escape_colours() {
        let geometry = ChunkGeometry::new(1024, 768, 8).unwrap();
        let kernel = FractalKernel::new(1024, 768);
        let mut state = kernel.init(0);

        // Chunk 4 starts at row 384, the vertical centre.
        let chunk = geometry.descriptor(4);
        let mut pixels = vec![0u8; chunk.byte_len()];
        kernel.fill(&mut state, &mut pixels, &chunk, 0);

        assert_eq!(pixel_at(&pixels, 1024, 0, 0), [63, 12, 12, 255]);
        assert_eq!(pixel_at(&pixels, 1024, 512, 10), [63, 12, 12, 255]);
        // Centred (1, 1) → 22 iterations.
        assert_eq!(pixel_at(&pixels, 1024, 513, 1), [12, 2, 0, 255]);
        // Centred (37, 12) never escapes.
        assert_eq!(pixel_at(&pixels, 1024, 549, 12), [0, 0, 0, 255]);
    }

    #[test]
    fn zoom_decays_once_per_completed_chunk() {
        let geometry = ChunkGeometry::new(32, 32, 4).unwrap();
        let kernel = FractalKernel::new(32, 32);
        let mut state = kernel.init(3);
        assert_eq!(state.zoom, 1.0);

        let mut pixels = vec![0u8; geometry.descriptor(0).byte_len()];
        for index in 0..3 {
            kernel.fill(&mut state, &mut pixels, &geometry.descriptor(index), 3);
        }
        assert_eq!(state.chunks_completed, 3);
        assert_eq!(state.zoom, ZOOM_DECAY * ZOOM_DECAY * ZOOM_DECAY);

        // Another worker's state is untouched by this worker's progress.
        assert_eq!(kernel.init(4).zoom, 1.0);
    }

    #[test]
    fn kernel_reports_its_canvas_and_params() {
        let kernel = FractalKernel::new(320, 200);
        assert_eq!(kernel.canvas(), Some((320, 200)));
        assert_eq!(kernel.params(), &FractalParams::default());
        assert_eq!(kernel.params().max_iterations, MAX_ITERATIONS);

        let custom = FractalParams {
            max_iterations: 20,
            ..FractalParams::default()
        };
        let kernel = FractalKernel::with_params(64, 64, custom);
        assert_eq!(kernel.params().max_iterations, 20);
        assert_eq!(kernel.canvas(), Some((64, 64)));
    }

    #[test]
    fn zoom_changes_rendered_output() {
        let geometry = ChunkGeometry::new(64, 64, 2).unwrap();
        let kernel = FractalKernel::new(64, 64);
        let chunk = geometry.descriptor(0);

        let mut fresh = kernel.init(0);
        let mut drifted = FractalState {
            zoom: 0.25,
            chunks_completed: 500,
        };
        let mut a = vec![0u8; chunk.byte_len()];
        let mut b = vec![0u8; chunk.byte_len()];
        kernel.fill(&mut fresh, &mut a, &chunk, 0);
        kernel.fill(&mut drifted, &mut b, &chunk, 1);
        assert_ne!(a, b);
    }
}
