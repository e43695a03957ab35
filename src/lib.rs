// edgebench: tile-parallel 3×3 Sobel edge magnitude with explicit
// host/device buffer lifecycle, on wgpu or the host CPU.
//
// Layering, bottom up:
//   image, stencil, tiling   : pure data and the scalar reference
//   device, lifecycle        : backend seam and RAII buffer ownership
//   host, gpu                : the two backends
//   verify, io, bench        : the benchmark harness around them

pub mod image;
pub mod stencil;
pub mod tiling;

pub mod error;
pub mod device;
pub mod lifecycle;

pub mod host;
pub mod gpu;

pub mod verify;
pub mod io;
pub mod bench;
