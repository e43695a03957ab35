// host.rs — CPU compute backend.
//
// Device buffers are plain host vectors; a launch runs the tile grid on the
// rayon thread pool. Each horizontal band of tiles (one grid row, `tile.y`
// image rows) owns a disjoint `&mut` slice of the output, so bands run in
// parallel with no synchronisation. Tiles within a band run in order.
//
//   output rows:  0 ─────────── border (untouched)
//                 1 ┐
//                 2 ┘ band 0  (tile.y = 2)
//                 3 ┐
//                 4 ┘ band 1
//                 5 ─────────── border (untouched)
//
// Used when no GPU is present, and as the deterministic backend in tests.

use rayon::prelude::*;

use crate::device::{ComputeDevice, SobelLaunch};
use crate::error::{BufferRole, StencilError};
use crate::stencil::{gradient_of, magnitude_to_u8, RADIUS};
use crate::tiling::LaunchGeometry;

/// A host-memory buffer standing in for device memory.
#[derive(Debug)]
pub struct HostBuffer {
    data: Vec<u8>,
}

impl HostBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// CPU backend. Parallel across tile bands unless built with
/// [`HostDevice::sequential`].
#[derive(Debug, Clone, Copy)]
pub struct HostDevice {
    parallel: bool,
}

impl HostDevice {
    pub fn new() -> Self {
        HostDevice { parallel: true }
    }

    /// Single-threaded variant; same output, useful as a timing baseline.
    pub fn sequential() -> Self {
        HostDevice { parallel: false }
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeDevice for HostDevice {
    type Buffer = HostBuffer;

    fn describe(&self) -> String {
        if self.parallel {
            format!("host CPU (rayon, {} threads)", rayon::current_num_threads())
        } else {
            "host CPU (sequential)".to_string()
        }
    }

    fn allocate(&self, len: usize, role: BufferRole) -> Result<HostBuffer, StencilError> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| StencilError::Allocation {
            role,
            bytes: len,
            reason: e.to_string(),
        })?;
        data.resize(len, 0);
        Ok(HostBuffer { data })
    }

    fn upload(&self, src: &[u8], dst: &mut HostBuffer) -> Result<(), StencilError> {
        if src.len() != dst.data.len() {
            return Err(StencilError::upload(format!(
                "source holds {} bytes, device buffer holds {}",
                src.len(),
                dst.data.len()
            )));
        }
        dst.data.copy_from_slice(src);
        Ok(())
    }

    fn launch(
        &self,
        input: &HostBuffer,
        output: &mut HostBuffer,
        params: &SobelLaunch,
    ) -> Result<(), StencilError> {
        let (rows, cols) = (params.rows, params.cols);
        let expected = params.buffer_len();
        if input.data.len() != expected || output.data.len() != expected {
            return Err(StencilError::KernelExecution(format!(
                "launch expects {rows}×{cols} = {expected} byte buffers, got input {} / output {}",
                input.data.len(),
                output.data.len(),
            )));
        }

        let geom = &params.geometry;
        if geom.is_empty() {
            return Ok(());
        }

        let src = input.data.as_slice();
        let band_len = geom.tile.y() as usize * cols;
        // Rows 1 ..= rows-2, i.e. everything between the top and bottom border.
        let interior = &mut output.data[RADIUS * cols..(rows - RADIUS) * cols];

        if self.parallel {
            interior
                .par_chunks_mut(band_len)
                .enumerate()
                .for_each(|(band_idx, band)| run_band(src, cols, geom, band_idx, band));
        } else {
            interior
                .chunks_mut(band_len)
                .enumerate()
                .for_each(|(band_idx, band)| run_band(src, cols, geom, band_idx, band));
        }
        Ok(())
    }

    fn download(&self, src: &HostBuffer, dst: &mut [u8]) -> Result<(), StencilError> {
        if src.data.len() != dst.len() {
            return Err(StencilError::download(format!(
                "device buffer holds {} bytes, destination holds {}",
                src.data.len(),
                dst.len()
            )));
        }
        dst.copy_from_slice(&src.data);
        Ok(())
    }

    fn release(&self, buffer: HostBuffer) {
        drop(buffer);
    }
}

/// Execute every tile of grid row `band_idx`.
///
/// `band` starts at image row `1 + band_idx * tile.y` and spans up to
/// `tile.y` full image rows; the final band may be shorter.
fn run_band(src: &[u8], cols: usize, geom: &LaunchGeometry, band_idx: usize, band: &mut [u8]) {
    let band_row0 = band_idx * geom.tile.y() as usize;
    for tile in geom.band(band_idx as u32) {
        for (row, col) in tile.positions() {
            // Interior (row, col) → image (y, x).
            let y = row + RADIUS;
            let x = col + RADIUS;
            let above = &src[(y - 1) * cols + x - 1..(y - 1) * cols + x + 2];
            let center = &src[y * cols + x - 1..y * cols + x + 2];
            let below = &src[(y + 1) * cols + x - 1..(y + 1) * cols + x + 2];
            let (gx, gy) = gradient_of(above, center, below);
            band[(row - band_row0) * cols + x] = magnitude_to_u8(gx, gy);
        }
    }
}
