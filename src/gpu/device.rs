// gpu/device.rs — wgpu adapter/device selection and device limits.
//
// Responsibilities:
//   - Enumerate adapters on the primary backends (Vulkan, Metal, DX12) and
//     pick the best non-software one.
//   - Expose a `DeviceProfile` for simulating a smaller target's limits on a
//     development machine.
//   - Validate a `TileSize` as a compute workgroup against those limits.
//
// ADAPTER SELECTION:
// wgpu's default `request_adapter` may hand back llvmpipe/softpipe when a
// software renderer is installed alongside a real GPU. We enumerate
// explicitly and prefer hardware adapters, falling back to whatever exists
// (logged, so the choice is visible in benchmark output).
//
// DEVICE LIMITS:
// Under a non-Native profile we request *lower* limits than the hardware
// supports. wgpu validates every dispatch and binding against the requested
// limits, so a tile or buffer that would be rejected on the target is
// rejected here too.

use std::fmt;

use crate::tiling::TileSize;

/// Hardware profile controlling the limits requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceProfile {
    /// wgpu default limits.
    #[default]
    Native,
    /// Raspberry Pi 4/5 (VideoCore VI/VII, V3DV): 256 invocations per
    /// workgroup, 128 MiB storage bindings.
    RaspberryPi,
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceProfile::Native => write!(f, "Native"),
            DeviceProfile::RaspberryPi => write!(f, "RaspberryPi (simulated limits)"),
        }
    }
}

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// Adapter, device, queue and active profile.
///
/// # Field drop order
/// Fields drop top to bottom. `_instance` is last so the `wgpu::Instance`
/// outlives `device` and `queue`; some Vulkan layers (dzn on WSL2) crash if
/// the instance goes first.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub profile: DeviceProfile,
    pub adapter_info: AdapterInfo,
    pub limits: wgpu::Limits,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Best available adapter with `DeviceProfile::Native` limits.
    pub fn new() -> Result<Self, GpuError> {
        Self::new_with_profile(DeviceProfile::Native)
    }

    pub fn new_with_profile(profile: DeviceProfile) -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async(profile))
    }

    async fn init_async(profile: DeviceProfile) -> Result<Self, GpuError> {
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags,
            ..Default::default()
        });

        let all_adapters = instance.enumerate_adapters(wgpu::Backends::PRIMARY);
        if all_adapters.is_empty() {
            return Err(GpuError::NoSuitableAdapter);
        }

        for a in &all_adapters {
            let info = a.get_info();
            tracing::debug!(
                name = %info.name,
                backend = ?info.backend,
                device_type = ?info.device_type,
                "adapter found"
            );
        }

        // Tier 1: hardware or pass-through GPU. Tier 2: anything, including
        // software rasterisers.
        let mut adapters = all_adapters;
        let preferred = adapters.iter().position(|a| {
            matches!(
                a.get_info().device_type,
                wgpu::DeviceType::DiscreteGpu
                    | wgpu::DeviceType::IntegratedGpu
                    | wgpu::DeviceType::VirtualGpu
                    | wgpu::DeviceType::Other
            )
        });
        let adapter = match preferred {
            Some(idx) => adapters.swap_remove(idx),
            None => {
                let fallback = adapters.swap_remove(0);
                tracing::warn!(
                    name = %fallback.get_info().name,
                    "no hardware adapter; using software renderer"
                );
                fallback
            }
        };

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name.clone(),
            vendor: raw_info.vendor,
            device: raw_info.device,
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };

        // A V3D adapter means we are on the Pi itself.
        let profile = match profile {
            DeviceProfile::Native if raw_info.name.to_ascii_lowercase().contains("v3d") => {
                tracing::info!("V3D adapter detected; using RaspberryPi profile");
                DeviceProfile::RaspberryPi
            }
            other => other,
        };

        let limits = limits_for_profile(profile);

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("edgebench"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        tracing::info!(adapter = %adapter_info, %profile, "GPU device ready");

        Ok(GpuDevice {
            device,
            queue,
            profile,
            adapter_info,
            limits,
            _instance: instance,
        })
    }

    /// Check that `tile` can be used as a workgroup size on this device.
    pub fn validate_tile(&self, tile: TileSize) -> Result<(), GpuError> {
        validate_tile_against(&self.limits, tile)
    }

    /// Largest single storage-buffer binding the device accepts, in bytes.
    pub fn max_buffer_binding(&self) -> u64 {
        self.limits.max_storage_buffer_binding_size as u64
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, profile: {} }}",
            self.adapter_info, self.profile
        )
    }
}

// ============================================================
// Limits helpers
// ============================================================

/// wgpu limits requested for the given profile.
fn limits_for_profile(profile: DeviceProfile) -> wgpu::Limits {
    match profile {
        DeviceProfile::Native => wgpu::Limits::default(),

        DeviceProfile::RaspberryPi => wgpu::Limits {
            max_compute_invocations_per_workgroup: 256,
            max_compute_workgroup_size_x: 256,
            max_compute_workgroup_size_y: 256,
            max_compute_workgroup_size_z: 64,
            max_texture_dimension_2d: 4096,
            max_storage_buffer_binding_size: 128 << 20,
            ..wgpu::Limits::default()
        },
    }
}

fn validate_tile_against(limits: &wgpu::Limits, tile: TileSize) -> Result<(), GpuError> {
    let total = tile.total();
    let max = limits.max_compute_invocations_per_workgroup;
    if total > u64::from(max) {
        return Err(GpuError::WorkgroupTooLarge { total, max });
    }
    if tile.x() > limits.max_compute_workgroup_size_x || tile.y() > limits.max_compute_workgroup_size_y {
        return Err(GpuError::WorkgroupDimension {
            x: tile.x(),
            y: tile.y(),
            max_x: limits.max_compute_workgroup_size_x,
            max_y: limits.max_compute_workgroup_size_y,
        });
    }
    Ok(())
}

// ============================================================
// Error type
// ============================================================

/// Errors from GPU device initialisation and configuration.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found (is a Vulkan/Metal/DX12 driver installed?)")]
    NoSuitableAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(#[source] wgpu::RequestDeviceError),

    #[error("workgroup size {total} exceeds profile limit of {max} invocations")]
    WorkgroupTooLarge { total: u64, max: u32 },

    #[error("workgroup {x}×{y} exceeds per-dimension limit {max_x}×{max_y}")]
    WorkgroupDimension { x: u32, y: u32, max_x: u32, max_y: u32 },
}

// ============================================================
// Tests
// ============================================================
