use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use edgebench::bench::{
    run_iterations, BackendChoice, BenchConfig, BenchTimings, DEFAULT_REFERENCE_PATH,
};
use edgebench::device::ComputeDevice;
use edgebench::error::{InputError, StencilError};
use edgebench::gpu::{DeviceProfile, WgpuDevice};
use edgebench::host::HostDevice;
use edgebench::image::Image;
use edgebench::io::{load_grayscale, save_grayscale};
use edgebench::stencil::crop_interior;
use edgebench::tiling::TileSize;
use edgebench::verify::{reference_interior, verify, DEFAULT_TOLERANCE};

#[derive(Parser)]
#[command(
    name = "edgebench",
    about = "Sobel edge-magnitude benchmark",
    long_about = "Runs a tiled 3x3 Sobel stencil over a grayscale image on the GPU (wgpu)\nor the host CPU (rayon), timing every buffer allocate/copy/launch/free.",
    version,
)]
struct Cli {
    /// Input image (any format the `image` crate decodes; converted to 8-bit gray)
    #[arg(short, long)]
    input: PathBuf,
    /// Output image for the cropped edge magnitude
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Number of full allocate→free cycles to run, 1 to 100
    #[arg(short = 'n', long, default_value_t = 1)]
    iterations: u32,
    /// Compare against the scalar reference
    #[arg(short, long)]
    verify: bool,
    /// Largest per-pixel difference still counted as a match
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: u8,
    /// Also write the scalar reference image (with --verify)
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = DEFAULT_REFERENCE_PATH)]
    saveref: Option<PathBuf>,
    /// Tile width in pixels (workgroup x)
    #[arg(long, default_value_t = TileSize::DEFAULT.x())]
    tile_x: u32,
    /// Tile height in pixels (workgroup y)
    #[arg(long, default_value_t = TileSize::DEFAULT.y())]
    tile_y: u32,
    #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
    backend: BackendArg,
    /// Device limits to request (rpi simulates a Raspberry Pi 4/5)
    #[arg(long, value_enum, default_value_t = ProfileArg::Native)]
    profile: ProfileArg,
    /// Debug-level logging, including per-phase timings
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum BackendArg {
    Auto,
    Gpu,
    Host,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ProfileArg {
    Native,
    Rpi,
}

impl Cli {
    fn into_config(self) -> Result<BenchConfig, InputError> {
        Ok(BenchConfig {
            input: self.input,
            output: self.output,
            iterations: self.iterations,
            verify: self.verify,
            tolerance: self.tolerance,
            save_reference: self.saveref,
            tile: TileSize::new(self.tile_x, self.tile_y)?,
            backend: match self.backend {
                BackendArg::Auto => BackendChoice::Auto,
                BackendArg::Gpu => BackendChoice::Gpu,
                BackendArg::Host => BackendChoice::Host,
            },
            profile: match self.profile {
                ProfileArg::Native => DeviceProfile::Native,
                ProfileArg::Rpi => DeviceProfile::RaspberryPi,
            },
        })
    }
}

/// The backend picked at startup.
enum Backend {
    Gpu(WgpuDevice),
    Host(HostDevice),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut timings = BenchTimings::default();
    timings.init.start();

    info!("edgebench v{}: tiled Sobel filter benchmark", env!("CARGO_PKG_VERSION"));

    let cfg = match cli.into_config().and_then(|cfg| cfg.validate().map(|()| cfg)) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Input file: {}", cfg.input.display());
    let source = match timings.io.time(|| load_grayscale(&cfg.input)) {
        Ok(img) => img,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!("Image: {}×{} pixels", source.width(), source.height());

    let backend = match select_backend(&cfg) {
        Ok(b) => b,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let produced = match &backend {
        Backend::Gpu(d) => execute(d, &cfg, &source, &mut timings),
        Backend::Host(d) => execute(d, &cfg, &source, &mut timings),
    };

    match produced {
        Ok(full) => finish(&cfg, &source, &full, &mut timings),
        Err(e) => error!("Sobel filter failed: {e}"),
    }

    drop(backend);
    timings.init.stop();
    debug!("per-phase totals: {}", timings.phases);
    println!("{timings}");
    ExitCode::SUCCESS
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn select_backend(cfg: &BenchConfig) -> Result<Backend, StencilError> {
    match cfg.backend {
        BackendChoice::Host => Ok(Backend::Host(HostDevice::new())),
        BackendChoice::Gpu => Ok(Backend::Gpu(WgpuDevice::new(cfg.profile, cfg.tile)?)),
        BackendChoice::Auto => match WgpuDevice::new(cfg.profile, cfg.tile) {
            Ok(d) => Ok(Backend::Gpu(d)),
            Err(e) => {
                warn!("GPU unavailable ({e}); falling back to the host backend");
                Ok(Backend::Host(HostDevice::new()))
            }
        },
    }
}

/// The timed iteration loop on one backend.
fn execute<D: ComputeDevice>(
    device: &D,
    cfg: &BenchConfig,
    source: &Image<u8>,
    timings: &mut BenchTimings,
) -> Result<Image<u8>, StencilError> {
    info!(
        "Launching Sobel filter on {} with # of iterations = {}",
        device.describe(),
        cfg.iterations
    );
    let BenchTimings { exec, phases, .. } = timings;
    exec.time(|| run_iterations(device, source, cfg.iterations, cfg.tile, phases))
}

/// Crop, write and verify the last iteration's output. Failures here are
/// logged; they never change the exit code.
fn finish(cfg: &BenchConfig, source: &Image<u8>, full: &Image<u8>, timings: &mut BenchTimings) {
    timings.io.start();
    let produced = crop_interior(full);

    if let Some(path) = &cfg.output {
        match save_grayscale(path, &produced) {
            Ok(()) => info!("Output written to {}", path.display()),
            Err(e) => error!("{e}"),
        }
    }

    if cfg.verify {
        let reference = reference_interior(source);
        let report = verify(&produced, &reference, cfg.tolerance);
        if report.passed() {
            info!("Verification {report}");
        } else {
            warn!("Verification {report}");
        }
        if let Some(path) = &cfg.save_reference {
            match save_grayscale(path, &reference) {
                Ok(()) => info!("Reference written to {}", path.display()),
                Err(e) => error!("{e}"),
            }
        }
    } else if cfg.save_reference.is_some() {
        warn!("--saveref has no effect without --verify");
    }
    timings.io.stop();
}
