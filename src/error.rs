// error.rs — Error taxonomy for the stencil benchmark.
//
//   Input           — bad file, bad iteration count, bad tile geometry.
//                     Detected by the harness before any device work; fatal.
//   Allocation      — a device buffer could not be acquired.
//   Transfer        — a host↔device copy failed.
//   KernelExecution — the launch faulted or was rejected by the device.
//   Output          — the result image could not be written.
//   Device          — no usable compute device / invalid device config.
//
// Compute-path errors (Allocation, Transfer, KernelExecution) are logged by
// the harness, which then carries on to its timing report. Buffers held at
// the point of failure are released by their guards in `lifecycle`.

use std::fmt;
use std::path::PathBuf;

use crate::gpu::device::GpuError;

/// Which of the two per-invocation device buffers an operation concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Input,
    Output,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferRole::Input => write!(f, "input"),
            BufferRole::Output => write!(f, "output"),
        }
    }
}

/// Direction of a host↔device copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    HostToDevice,
    DeviceToHost,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::HostToDevice => write!(f, "host-to-device"),
            TransferDirection::DeviceToHost => write!(f, "device-to-host"),
        }
    }
}

/// Problems with what the harness was asked to do.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to open input image '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("# of iterations must be within range [1, 100] (got {0})")]
    IterationsOutOfRange(u32),

    #[error("tile size {x}×{y} is invalid: both dimensions must be non-zero")]
    InvalidTile { x: u32, y: u32 },

    #[error("invalid output filename provided")]
    EmptyOutputPath,
}

/// Every failure the library can report.
#[derive(Debug, thiserror::Error)]
pub enum StencilError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("device allocation of {bytes} byte {role} buffer failed: {reason}")]
    Allocation {
        role: BufferRole,
        bytes: usize,
        reason: String,
    },

    #[error("{direction} transfer failed: {reason}")]
    Transfer {
        direction: TransferDirection,
        reason: String,
    },

    #[error("kernel execution failed: {0}")]
    KernelExecution(String),

    #[error("failed to write output image '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Device(#[from] GpuError),
}

impl StencilError {
    /// Input and device-selection errors end the process; everything else
    /// is reported and the harness moves on to its timing summary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StencilError::Input(_) | StencilError::Device(_))
    }

    pub(crate) fn upload(reason: impl Into<String>) -> Self {
        StencilError::Transfer {
            direction: TransferDirection::HostToDevice,
            reason: reason.into(),
        }
    }

    pub(crate) fn download(reason: impl Into<String>) -> Self {
        StencilError::Transfer {
            direction: TransferDirection::DeviceToHost,
            reason: reason.into(),
        }
    }
}
