//! Pixel fill kernels run by pool workers.
//!
//! A kernel is chosen once per pool and shared by every worker. Anything a
//! kernel needs to remember between chunks lives in its per-worker
//! [`FillKernel::State`], owned by the worker and passed into every
//! [`FillKernel::fill`] call.

use core::fmt;
use core::str::FromStr;

use framepool_shared::ChunkDescriptor;

pub mod fractal;
pub mod noise;

pub use fractal::{FractalKernel, FractalParams, FractalState};
pub use noise::NoiseKernel;

/// RGBA8 alpha written by every kernel.
pub const ALPHA: u8 = 255;

pub type Rgb = [u8; 3];

pub trait FillKernel: Send + Sync + 'static {
    /// Private per-worker state. Created on the worker thread by
    /// [`init`](Self::init) and never shared with other workers.
    type State;

    /// Called once per worker before its first `fill`.
    fn init(&self, worker_id: u32) -> Self::State;

    /// Canvas size the kernel was built for, if its output depends on one.
    /// A pool refuses to start when this disagrees with its own canvas.
    fn canvas(&self) -> Option<(u32, u32)> {
        None
    }

    /// Fill one claimed chunk.
    ///
    /// `pixels` holds exactly `chunk.byte_len()` bytes; byte 0 is the chunk's
    /// top-left pixel.
    fn fill(
        &self,
        state: &mut Self::State,
        pixels: &mut [u8],
        chunk: &ChunkDescriptor,
        worker_id: u32,
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelKind {
    /// Random colour noise with per-worker debug edges.
    Noise,
    /// Escape-time fractal with per-worker zoom drift.
    #[default]
    Fractal,
}

impl KernelKind {
    pub const ALL: [KernelKind; 2] = [KernelKind::Noise, KernelKind::Fractal];

    pub fn as_str(self) -> &'static str {
        match self {
            KernelKind::Noise => "noise",
            KernelKind::Fractal => "fractal",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown kernel {0:?} (expected \"noise\" or \"fractal\")")]
pub struct UnknownKernel(pub String);

impl FromStr for KernelKind {
    type Err = UnknownKernel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "noise" | "static" => Ok(KernelKind::Noise),
            "fractal" | "mandelbrot" => Ok(KernelKind::Fractal),
            _ => Err(UnknownKernel(s.to_string())),
        }
    }
}
