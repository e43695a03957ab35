// lifecycle.rs — Per-invocation device buffer management.
//
// One invocation is strictly sequential:
//
//   acquire(in, out) → upload(in) → launch(in → out) → download(out) → release
//
// Each step blocks until the device has finished, so per-phase timings are
// isolated. Buffers never outlive the invocation: the benchmark loop calls
// `run_once` per iteration and every iteration allocates afresh.
//
// RELEASE GUARANTEE
// ─────────────────
// A device buffer exists only inside a `DeviceBuffer` guard, whose `Drop`
// hands it back to the device exactly once. Early returns through `?` at any
// phase (including a failed second allocation in `BufferPair::acquire`) drop
// the guards that were already created, so nothing leaks and nothing is
// released twice.

use std::fmt;
use std::time::{Duration, Instant};

use crate::device::{ComputeDevice, SobelLaunch};
use crate::error::{BufferRole, StencilError};
use crate::image::Image;
use crate::tiling::TileSize;

// ---------------------------------------------------------------------------
// DeviceBuffer
// ---------------------------------------------------------------------------

/// Owns one device buffer and releases it when dropped.
pub struct DeviceBuffer<'d, D: ComputeDevice> {
    device: &'d D,
    raw: Option<D::Buffer>,
    len: usize,
    role: BufferRole,
}

impl<'d, D: ComputeDevice> DeviceBuffer<'d, D> {
    /// Allocate `len` bytes on `device`.
    pub fn acquire(device: &'d D, len: usize, role: BufferRole) -> Result<Self, StencilError> {
        let raw = device.allocate(len, role)?;
        tracing::trace!(%role, len, "device buffer acquired");
        Ok(DeviceBuffer { device, raw: Some(raw), len, role })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn role(&self) -> BufferRole {
        self.role
    }

    pub fn raw(&self) -> &D::Buffer {
        self.raw.as_ref().expect("device buffer used after release")
    }

    pub fn raw_mut(&mut self) -> &mut D::Buffer {
        self.raw.as_mut().expect("device buffer used after release")
    }

    /// Release now rather than at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl<D: ComputeDevice> Drop for DeviceBuffer<'_, D> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.device.release(raw);
            tracing::trace!(role = %self.role, len = self.len, "device buffer released");
        }
    }
}

impl<D: ComputeDevice> fmt::Debug for DeviceBuffer<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("role", &self.role)
            .field("len", &self.len)
            .field("live", &self.raw.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BufferPair
// ---------------------------------------------------------------------------

/// The input/output buffers of one invocation.
#[derive(Debug)]
pub struct BufferPair<'d, D: ComputeDevice> {
    pub input: DeviceBuffer<'d, D>,
    pub output: DeviceBuffer<'d, D>,
}

impl<'d, D: ComputeDevice> BufferPair<'d, D> {
    /// Allocate two equally sized buffers. If the output allocation fails,
    /// the input buffer is released before the error is returned.
    pub fn acquire(device: &'d D, len: usize) -> Result<Self, StencilError> {
        let input = DeviceBuffer::acquire(device, len, BufferRole::Input)?;
        let output = DeviceBuffer::acquire(device, len, BufferRole::Output)?;
        Ok(BufferPair { input, output })
    }

    /// Release both buffers (input first).
    pub fn release(self) {
        let BufferPair { input, output } = self;
        input.release();
        output.release();
    }
}

// ---------------------------------------------------------------------------
// PhaseTimings
// ---------------------------------------------------------------------------

/// Wall-clock time spent in each phase, accumulated across invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub allocate: Duration,
    pub upload: Duration,
    pub kernel: Duration,
    pub download: Duration,
    pub release: Duration,
    /// Completed invocations.
    pub invocations: u32,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.allocate + self.upload + self.kernel + self.download + self.release
    }

    pub fn accumulate(&mut self, other: &PhaseTimings) {
        self.allocate += other.allocate;
        self.upload += other.upload;
        self.kernel += other.kernel;
        self.download += other.download;
        self.release += other.release;
        self.invocations += other.invocations;
    }
}

impl fmt::Display for PhaseTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = |d: Duration| d.as_secs_f64() * 1e3;
        write!(
            f,
            "malloc {:.3} ms, memcpyH2D {:.3} ms, kernel {:.3} ms, memcpyD2H {:.3} ms, free {:.3} ms",
            ms(self.allocate),
            ms(self.upload),
            ms(self.kernel),
            ms(self.download),
            ms(self.release),
        )
    }
}

// ---------------------------------------------------------------------------
// run_once
// ---------------------------------------------------------------------------

/// Run one complete acquire → upload → launch → download → release cycle.
///
/// Returns the full-size output. Interior pixels hold the gradient
/// magnitude; the 1-pixel border is 0 (backends zero-fill new buffers).
/// Phase durations of this invocation are added to `timings`; on error,
/// phases that completed before the failure are still recorded.
pub fn run_once<D: ComputeDevice>(
    device: &D,
    src: &Image<u8>,
    tile: TileSize,
    timings: &mut PhaseTimings,
) -> Result<Image<u8>, StencilError> {
    let params = SobelLaunch::new(src.height(), src.width(), tile);
    let len = params.buffer_len();
    let host_src = src.to_packed();
    let mut this = PhaseTimings::default();

    let result = (|| -> Result<Image<u8>, StencilError> {
        let t = Instant::now();
        let mut buffers = BufferPair::acquire(device, len)?;
        this.allocate = t.elapsed();

        let t = Instant::now();
        device.upload(&host_src, buffers.input.raw_mut())?;
        this.upload = t.elapsed();

        let t = Instant::now();
        let BufferPair { input, output } = &mut buffers;
        device.launch(input.raw(), output.raw_mut(), &params)?;
        this.kernel = t.elapsed();

        let t = Instant::now();
        let mut host_dst = vec![0u8; len];
        device.download(buffers.output.raw(), &mut host_dst)?;
        this.download = t.elapsed();

        let t = Instant::now();
        buffers.release();
        this.release = t.elapsed();

        Ok(Image::from_vec(params.cols, params.rows, host_dst))
    })();

    if result.is_ok() {
        this.invocations = 1;
    }
    tracing::debug!(rows = params.rows, cols = params.cols, "{this}");
    timings.accumulate(&this);
    result
}
