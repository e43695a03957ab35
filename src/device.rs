// device.rs — The seam between the lifecycle manager and a compute backend.
//
// A backend provides five blocking primitives over its own buffer type:
//
//   allocate  → one device buffer of `len` bytes (zero-filled)
//   upload    → host bytes into a device buffer, waits for completion
//   launch    → Sobel stencil from input buffer into output buffer, waits
//   download  → device buffer into host bytes, waits for completion
//   release   → give the buffer back to the device
//
// Callers never pair `allocate`/`release` by hand: `lifecycle::DeviceBuffer`
// owns every allocation and releases it on drop.
//
// Implementations: `host::HostDevice` (rayon on the CPU) and
// `gpu::sobel::WgpuDevice` (WGSL compute shader).

use crate::error::{BufferRole, StencilError};
use crate::tiling::{LaunchGeometry, TileSize};

/// Parameters for one stencil launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SobelLaunch {
    pub rows: usize,
    pub cols: usize,
    pub geometry: LaunchGeometry,
}

impl SobelLaunch {
    pub fn new(rows: usize, cols: usize, tile: TileSize) -> Self {
        SobelLaunch {
            rows,
            cols,
            geometry: LaunchGeometry::for_image(rows, cols, tile),
        }
    }

    /// Bytes per device buffer (one byte per pixel).
    pub fn buffer_len(&self) -> usize {
        self.rows * self.cols
    }
}

/// A compute backend able to run the Sobel stencil on its own memory.
pub trait ComputeDevice {
    /// Handle to one device-resident byte buffer.
    type Buffer;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    /// Allocate a zero-filled buffer of `len` bytes.
    fn allocate(&self, len: usize, role: BufferRole) -> Result<Self::Buffer, StencilError>;

    /// Copy `src` into `dst`. `src.len()` must equal the buffer length.
    fn upload(&self, src: &[u8], dst: &mut Self::Buffer) -> Result<(), StencilError>;

    /// Run the stencil over `input`, writing interior pixels of `output`.
    fn launch(
        &self,
        input: &Self::Buffer,
        output: &mut Self::Buffer,
        params: &SobelLaunch,
    ) -> Result<(), StencilError>;

    /// Copy `src` into `dst`. `dst.len()` must equal the buffer length.
    fn download(&self, src: &Self::Buffer, dst: &mut [u8]) -> Result<(), StencilError>;

    /// Return a buffer to the device.
    fn release(&self, buffer: Self::Buffer);
}
