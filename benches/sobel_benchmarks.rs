// benches/sobel_benchmarks.rs — Sobel stencil: scalar reference vs host
// backend vs GPU.
//
//   cargo bench --bench sobel_benchmarks
//
// Host and GPU timings are whole invocations (allocate, upload, launch,
// download, release), the unit the harness measures. The GPU group is
// skipped when no adapter can be opened.
//
// Criterion's warmup absorbs the first-dispatch shader compile on drivers
// that build pipelines lazily.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use edgebench::gpu::{DeviceProfile, WgpuDevice};
use edgebench::host::HostDevice;
use edgebench::image::Image;
use edgebench::lifecycle::{run_once, PhaseTimings};
use edgebench::stencil::sobel_reference;
use edgebench::tiling::TileSize;

// ============================================================
// Helpers
// ============================================================

/// Synthetic frame: gradient background plus bright rectangles.
fn make_scene(w: usize, h: usize) -> Image<u8> {
    let mut img = Image::new(w, h);
    for y in 0..h {
        for x in 0..w {
            img.set(x, y, ((x * 200 / w) + (y * 55 / h)) as u8);
        }
    }
    for rect in 0..6 {
        let rx = (50 + rect * 100) % w;
        let ry = (40 + (rect % 3) * 120) % h;
        let bright = 180u8.wrapping_add(rect as u8 * 10);
        for y in ry..(ry + 60).min(h) {
            for x in rx..(rx + 80).min(w) {
                img.set(x, y, bright);
            }
        }
    }
    img
}

const SIZES: [(usize, usize); 3] = [(640, 480), (1280, 720), (1920, 1080)];

// ============================================================
// CPU: scalar reference vs rayon host backend
// ============================================================

fn bench_host(c: &mut Criterion) {
    let mut group = c.benchmark_group("sobel_host");

    for (w, h) in SIZES {
        let img = make_scene(w, h);
        let id = format!("{w}x{h}");

        group.bench_with_input(BenchmarkId::new("reference", &id), &img, |b, img| {
            b.iter(|| sobel_reference(img))
        });

        let seq = HostDevice::sequential();
        group.bench_with_input(BenchmarkId::new("host_sequential", &id), &img, |b, img| {
            let mut t = PhaseTimings::default();
            b.iter(|| run_once(&seq, img, TileSize::DEFAULT, &mut t))
        });

        let par = HostDevice::new();
        group.bench_with_input(BenchmarkId::new("host_rayon", &id), &img, |b, img| {
            let mut t = PhaseTimings::default();
            b.iter(|| run_once(&par, img, TileSize::DEFAULT, &mut t))
        });
    }

    group.finish();
}

// ============================================================
// Tile shape sweep (host)
// ============================================================

fn bench_tiles(c: &mut Criterion) {
    let img = make_scene(1280, 720);
    let dev = HostDevice::new();
    let mut group = c.benchmark_group("sobel_tiles");

    for (tx, ty) in [(64, 2), (16, 16), (256, 1), (32, 8)] {
        let tile = TileSize::new(tx, ty).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(tile), &tile, |b, &tile| {
            let mut t = PhaseTimings::default();
            b.iter(|| run_once(&dev, &img, tile, &mut t))
        });
    }

    group.finish();
}

// ============================================================
// GPU
// ============================================================

fn bench_gpu(c: &mut Criterion) {
    let gpu = match WgpuDevice::new(DeviceProfile::Native, TileSize::DEFAULT) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("skipping GPU benchmarks: {e}");
            return;
        }
    };

    let mut group = c.benchmark_group("sobel_gpu");
    group.warm_up_time(Duration::from_secs(2));

    for (w, h) in SIZES {
        let img = make_scene(w, h);
        group.bench_with_input(BenchmarkId::new("wgpu", format!("{w}x{h}")), &img, |b, img| {
            let mut t = PhaseTimings::default();
            b.iter(|| run_once(&gpu, img, TileSize::DEFAULT, &mut t))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_host, bench_tiles, bench_gpu);
criterion_main!(benches);
