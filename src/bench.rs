// bench.rs — Benchmark configuration, iteration driver and timing report.
//
// Timers follow the three buckets the report prints:
//
//   io    : decode input, crop, encode output, verification
//   exec  : the iteration loop (every acquire…release cycle)
//   init  : everything from start to finish; reported minus io
//
// The iteration loop stops at the first failing iteration. Whatever was
// timed up to that point is still reported.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::device::ComputeDevice;
use crate::error::{InputError, StencilError};
use crate::gpu::device::DeviceProfile;
use crate::image::Image;
use crate::lifecycle::{run_once, PhaseTimings};
use crate::tiling::TileSize;
use crate::verify::DEFAULT_TOLERANCE;

/// Inclusive bounds on the iteration count.
pub const MIN_ITERATIONS: u32 = 1;
pub const MAX_ITERATIONS: u32 = 100;

/// Where `--saveref` writes the reference image when no path is given.
pub const DEFAULT_REFERENCE_PATH: &str = "./scalar.bmp";

/// Which compute backend to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendChoice {
    /// GPU if one can be opened, host CPU otherwise.
    #[default]
    Auto,
    Gpu,
    Host,
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendChoice::Auto => write!(f, "auto"),
            BackendChoice::Gpu => write!(f, "gpu"),
            BackendChoice::Host => write!(f, "host"),
        }
    }
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub iterations: u32,
    pub verify: bool,
    pub tolerance: u8,
    /// Write the scalar reference image here (only with `verify`).
    pub save_reference: Option<PathBuf>,
    pub tile: TileSize,
    pub backend: BackendChoice,
    pub profile: DeviceProfile,
}

impl BenchConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        BenchConfig {
            input: input.into(),
            output: None,
            iterations: MIN_ITERATIONS,
            verify: false,
            tolerance: DEFAULT_TOLERANCE,
            save_reference: None,
            tile: TileSize::DEFAULT,
            backend: BackendChoice::Auto,
            profile: DeviceProfile::Native,
        }
    }

    /// Reject configurations the harness must not run.
    pub fn validate(&self) -> Result<(), InputError> {
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.iterations) {
            return Err(InputError::IterationsOutOfRange(self.iterations));
        }
        if let Some(out) = &self.output {
            if out.as_os_str().is_empty() {
                return Err(InputError::EmptyOutputPath);
            }
        }
        Ok(())
    }
}

/// Run `iterations` independent invocations, each with freshly acquired
/// buffers. Returns the output of the last one.
pub fn run_iterations<D: ComputeDevice>(
    device: &D,
    src: &Image<u8>,
    iterations: u32,
    tile: TileSize,
    timings: &mut PhaseTimings,
) -> Result<Image<u8>, StencilError> {
    let mut last = None;
    for i in 0..iterations {
        let out = run_once(device, src, tile, timings)?;
        tracing::trace!(iteration = i + 1, "iteration complete");
        last = Some(out);
    }
    // iterations == 0 is rejected by BenchConfig; still well-defined here.
    Ok(last.unwrap_or_else(|| Image::new(src.width(), src.height())))
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Accumulating stopwatch for one named bucket.
#[derive(Debug, Default)]
pub struct Stopwatch {
    total: Duration,
    started: Option<Instant>,
}

impl Stopwatch {
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Add the time since the last `start` to the total. No-op if not running.
    pub fn stop(&mut self) {
        if let Some(t) = self.started.take() {
            self.total += t.elapsed();
        }
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Time `f` into this bucket.
    pub fn time<R>(&mut self, f: impl FnOnce() -> R) -> R {
        self.start();
        let r = f();
        self.stop();
        r
    }
}

/// The harness's timing summary.
#[derive(Debug, Default)]
pub struct BenchTimings {
    pub init: Stopwatch,
    pub exec: Stopwatch,
    pub io: Stopwatch,
    pub phases: PhaseTimings,
}

impl BenchTimings {
    /// init+exec excluding I/O.
    pub fn compute_total(&self) -> Duration {
        self.init.total().saturating_sub(self.io.total())
    }
}

impl fmt::Display for BenchTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sobelfilter - I/O time: {} s", self.io.total().as_secs_f64())?;
        writeln!(f, "sobelfilter - execution time: {} s", self.exec.total().as_secs_f64())?;
        write!(f, "sobelfilter - total init+exec time: {} s", self.compute_total().as_secs_f64())
    }
}
