// gpu/mod.rs — wgpu compute backend.
//
//   device : adapter selection, profiles, workgroup limits
//   buffer : storage buffers with blocking upload/download
//   sobel  : the compute pipeline and the `ComputeDevice` impl over it
//
// The CPU stencil in `stencil.rs` is the reference; GPU output is checked
// against it in the (ignored, GPU-only) tests.

pub mod buffer;
pub mod device;
pub mod sobel;

pub use device::{DeviceProfile, GpuDevice, GpuError};
pub use sobel::{GpuSobelPipeline, WgpuDevice};
