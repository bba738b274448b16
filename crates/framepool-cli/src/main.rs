#![forbid(unsafe_code)]

// Native-only tool; the wasm32 stub keeps `--workspace` builds for wasm targets
// compiling.
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::time::Duration;

    use anyhow::{bail, Context, Result};
    use clap::Parser;
    use framepool_kernels::{FillKernel, FractalKernel, KernelKind, NoiseKernel};
    use framepool_runtime::{Coordinator, Frame, PoolConfig, PoolReport, Present};

    #[derive(Debug, Parser)]
    #[command(
        name = "framepool",
        about = "Render frames with a fixed pool of worker threads (headless)"
    )]
    pub struct Args {
        /// Canvas width in pixels [env: FRAMEPOOL_WIDTH, default: 1024].
        #[arg(long)]
        width: Option<u32>,

        /// Canvas height in pixels [env: FRAMEPOOL_HEIGHT, default: 768].
        #[arg(long)]
        height: Option<u32>,

        /// Horizontal chunks per frame; must divide the height evenly
        /// [env: FRAMEPOOL_CHUNKS, default: 8].
        #[arg(long)]
        chunks: Option<u32>,

        /// Worker threads [env: FRAMEPOOL_WORKERS, default: 3].
        #[arg(long)]
        workers: Option<u32>,

        /// `noise` or `fractal` [env: FRAMEPOOL_KERNEL, default: fractal].
        #[arg(long)]
        kernel: Option<KernelKind>,

        /// Frames to render before shutting down.
        #[arg(long, default_value_t = 60)]
        frames: u64,
    }

    impl Args {
        fn apply(&self, config: &mut PoolConfig) {
            if let Some(width) = self.width {
                config.width = width;
            }
            if let Some(height) = self.height {
                config.height = height;
            }
            if let Some(chunks) = self.chunks {
                config.chunk_count = chunks;
            }
            if let Some(workers) = self.workers {
                config.pool_size = workers;
            }
            if let Some(kernel) = self.kernel {
                config.kernel = kernel;
            }
        }
    }

    /// Stands in for a display: keeps a checksum of the latest frame and the
    /// total render time.
    #[derive(Debug, Default)]
    struct HeadlessPresenter {
        frames: u64,
        render_time: Duration,
        checksum: u64,
    }

    impl Present for HeadlessPresenter {
        fn present(&mut self, frame: &Frame<'_>) {
            self.frames += 1;
            self.render_time += frame.elapsed;
            self.checksum = checksum(frame.pixels);
            tracing::debug!(
                frame = frame.index,
                elapsed = ?frame.elapsed,
                checksum = self.checksum,
                "presented frame"
            );
        }
    }

    /// 64-bit FNV-1a.
    fn checksum(bytes: &[u8]) -> u64 {
        bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
            (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }

    /// Mean render time per presented frame in milliseconds; 0 when nothing
    /// was presented.
    fn average_frame_ms(total: Duration, frames: u64) -> f64 {
        if frames == 0 {
            return 0.0;
        }
        total.as_secs_f64() * 1e3 / frames as f64
    }

    fn render<K: FillKernel>(
        config: &PoolConfig,
        kernel: K,
        frames: u64,
    ) -> Result<(HeadlessPresenter, PoolReport)> {
        let mut pool =
            Coordinator::start(config, kernel).context("failed to start worker pool")?;
        let mut presenter = HeadlessPresenter::default();
        pool.run(frames, &mut presenter).context("frame loop stopped early")?;
        let report = pool.shutdown().context("worker pool did not shut down cleanly")?;
        Ok((presenter, report))
    }

    pub fn main() -> Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();

        let args = Args::parse();
        let mut config = PoolConfig::from_env().context("invalid FRAMEPOOL_* environment")?;
        args.apply(&mut config);
        if args.frames == 0 {
            bail!("--frames must be at least 1");
        }

        let (presenter, report) = match config.kernel {
            KernelKind::Noise => render(&config, NoiseKernel, args.frames)?,
            KernelKind::Fractal => render(
                &config,
                FractalKernel::new(config.width, config.height),
                args.frames,
            )?,
        };

        for worker in &report.workers {
            tracing::info!(
                worker_id = worker.worker_id,
                chunks = worker.chunks_filled,
                frames = worker.frames_joined,
                "worker load"
            );
        }

        println!(
            "rendered {} frames {}x{} kernel={} workers={} chunks={} avg={:.3}ms checksum={:016x}",
            report.frames_rendered,
            config.width,
            config.height,
            config.kernel,
            config.pool_size,
            config.chunk_count,
            average_frame_ms(presenter.render_time, presenter.frames),
            presenter.checksum,
        );
        Ok(())
    }

}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::main()
}
