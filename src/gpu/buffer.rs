// gpu/buffer.rs — Storage buffers for the Sobel kernel: allocate, upload,
// download.
//
// SIZE AND ALIGNMENT
// ──────────────────
// Pixels are bytes, but wgpu copies and WGSL storage arrays work in 4-byte
// units (`COPY_BUFFER_ALIGNMENT`, `array<u32>`). Every buffer is therefore
// padded up to a multiple of 4 bytes; the shader packs four pixels per word
// and the padding bytes are never read as pixels.
//
// ERROR REPORTING
// ───────────────
// wgpu reports allocation and validation failures asynchronously through
// error scopes rather than return values. Each operation here pushes a scope,
// does its work, blocks until the queue is idle, then pops the scope and maps
// any captured error into the crate's taxonomy:
//
//   create_buffer         → StencilError::Allocation
//   write_buffer / map    → StencilError::Transfer
//
// READBACK
// ────────
// `download` copies into a MAP_READ staging buffer, requests a map, and polls
// the device until the map callback fires. This stalls the queue, which is
// what the benchmark wants: each phase is timed in isolation.

use crate::error::{BufferRole, StencilError};
use crate::gpu::device::GpuDevice;

/// wgpu's buffer copy granularity, in bytes.
const COPY_ALIGNMENT: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

/// A device-resident byte buffer holding `len` pixels.
#[derive(Debug)]
pub struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    /// Logical length in bytes (pixels), excluding alignment padding.
    pub len: usize,
    pub role: BufferRole,
}

impl GpuBuffer {
    /// Allocate a zero-filled storage buffer for `len` pixels.
    pub fn allocate(gpu: &GpuDevice, len: usize, role: BufferRole) -> Result<Self, StencilError> {
        let size = padded_size(len);
        let max = gpu.max_buffer_binding();
        if size > max {
            return Err(StencilError::Allocation {
                role,
                bytes: len,
                reason: format!("{size} bytes exceeds the device's {max} byte storage binding limit"),
            });
        }

        gpu.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(match role {
                BufferRole::Input => "sobel input",
                BufferRole::Output => "sobel output",
            }),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let validation = pollster::block_on(gpu.device.pop_error_scope());
        let oom = pollster::block_on(gpu.device.pop_error_scope());

        if let Some(err) = oom.or(validation) {
            buffer.destroy();
            return Err(StencilError::Allocation { role, bytes: len, reason: err.to_string() });
        }
        Ok(GpuBuffer { buffer, len, role })
    }

    /// Copy `src` into the buffer and wait for the copy to land.
    pub fn upload(&self, gpu: &GpuDevice, src: &[u8]) -> Result<(), StencilError> {
        if src.len() != self.len {
            return Err(StencilError::upload(format!(
                "source holds {} bytes, device buffer holds {}",
                src.len(),
                self.len
            )));
        }
        if src.is_empty() {
            return Ok(());
        }

        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        if src.len() as u64 % COPY_ALIGNMENT == 0 {
            gpu.queue.write_buffer(&self.buffer, 0, src);
        } else {
            let mut padded = vec![0u8; padded_size(src.len()) as usize];
            padded[..src.len()].copy_from_slice(src);
            gpu.queue.write_buffer(&self.buffer, 0, &padded);
        }
        gpu.queue.submit(std::iter::empty());
        gpu.device.poll(wgpu::Maintain::Wait);

        match pollster::block_on(gpu.device.pop_error_scope()) {
            Some(err) => Err(StencilError::upload(err.to_string())),
            None => Ok(()),
        }
    }

    /// Copy the buffer into `dst`, blocking until the data is on the host.
    pub fn download(&self, gpu: &GpuDevice, dst: &mut [u8]) -> Result<(), StencilError> {
        if dst.len() != self.len {
            return Err(StencilError::download(format!(
                "device buffer holds {} bytes, destination holds {}",
                self.len,
                dst.len()
            )));
        }
        if dst.is_empty() {
            return Ok(());
        }

        let size = padded_size(self.len);
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sobel readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("sobel readback") });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &readback, 0, size);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver only disappears if download() has already bailed.
            let _ = tx.send(result);
        });
        gpu.device.poll(wgpu::Maintain::Wait);

        if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
            readback.destroy();
            return Err(StencilError::download(err.to_string()));
        }

        let mapped = rx
            .recv()
            .map_err(|_| StencilError::download("map callback never fired"))
            .and_then(|r| r.map_err(|e| StencilError::download(e.to_string())));
        if let Err(err) = mapped {
            readback.destroy();
            return Err(err);
        }

        {
            let view = slice.get_mapped_range();
            dst.copy_from_slice(&view[..self.len]);
        }
        readback.unmap();
        readback.destroy();
        Ok(())
    }

    /// Free the device memory now instead of when the last handle drops.
    pub fn destroy(self) {
        self.buffer.destroy();
    }
}

/// Byte size of the device allocation backing `len` pixels: rounded up to
/// the copy alignment, and never zero (wgpu rejects empty storage bindings).
pub(crate) fn padded_size(len: usize) -> u64 {
    align_to((len as u64).max(1), COPY_ALIGNMENT)
}

/// Round `value` up to the next multiple of `alignment`.
#[inline]
pub(crate) fn align_to(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) / alignment * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(4, 4), 4);
        assert_eq!(align_to(5, 4), 8);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn test_padded_size_is_word_aligned_and_non_zero() {
        assert_eq!(padded_size(0), 4);
        assert_eq!(padded_size(9), 12);
        assert_eq!(padded_size(36), 36);
        assert_eq!(padded_size(640 * 480), 640 * 480);
    }

    fn run_gpu_test_in_subprocess(test_name: &str) -> String {
        let output = std::process::Command::new("cargo")
            .args(["test", "--lib", "--", test_name, "--exact", "--ignored", "--nocapture"])
            .output()
            .unwrap_or_else(|e| panic!("failed to spawn subprocess for {test_name}: {e}"));
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        print!("{stdout}");
        eprint!("{stderr}");
        stdout + &stderr
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_round_trip_unaligned_length() {
        let gpu = GpuDevice::new().expect("need a GPU");
        let pixels: Vec<u8> = (0u8..=250).collect(); // 251 bytes, not a multiple of 4
        let buf = GpuBuffer::allocate(&gpu, pixels.len(), BufferRole::Input).unwrap();
        buf.upload(&gpu, &pixels).unwrap();
        let mut back = vec![0u8; pixels.len()];
        buf.download(&gpu, &mut back).unwrap();
        assert_eq!(back, pixels);
        buf.destroy();
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_fresh_buffer_is_zeroed() {
        let gpu = GpuDevice::new().expect("need a GPU");
        let buf = GpuBuffer::allocate(&gpu, 1000, BufferRole::Output).unwrap();
        let mut back = vec![0xAAu8; 1000];
        buf.download(&gpu, &mut back).unwrap();
        assert!(back.iter().all(|&b| b == 0));
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_oversized_allocation_is_rejected() {
        let gpu = GpuDevice::new().expect("need a GPU");
        let too_big = gpu.max_buffer_binding() as usize + 1;
        let err = GpuBuffer::allocate(&gpu, too_big, BufferRole::Input).unwrap_err();
        assert!(matches!(err, StencilError::Allocation { role: BufferRole::Input, .. }));
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_round_trip_unaligned_length() {
        let out = run_gpu_test_in_subprocess("gpu::buffer::tests::inner_round_trip_unaligned_length");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_fresh_buffer_is_zeroed() {
        let out = run_gpu_test_in_subprocess("gpu::buffer::tests::inner_fresh_buffer_is_zeroed");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_oversized_allocation_is_rejected() {
        let out = run_gpu_test_in_subprocess("gpu::buffer::tests::inner_oversized_allocation_is_rejected");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }
}
