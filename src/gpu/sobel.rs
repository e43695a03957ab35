// gpu/sobel.rs — Sobel stencil as a wgpu compute pipeline.
//
// PIPELINE LIFETIME
// ─────────────────
// `GpuSobelPipeline` compiles `sobel.wgsl` for one tile shape. Create it once
// and reuse it for every iteration; only buffers, the params uniform and the
// bind group are per-launch.
//
//   let dev = WgpuDevice::new(DeviceProfile::Native, TileSize::DEFAULT)?;
//   for _ in 0..iterations {
//       let out = lifecycle::run_once(&dev, &frame, TileSize::DEFAULT, &mut timings)?;
//   }
//
// BINDINGS
// ────────
//   0 — input pixels   (storage, read)        array<u32>, 4 pixels per word
//   1 — output pixels  (storage, read_write)  array<atomic<u32>>
//   2 — SobelParams    (uniform)              rows, cols, row/col offset
//
// The workgroup size is baked into the shader source through the {{WG_X}} /
// {{WG_Y}} placeholders; naga does not accept `override` expressions inside
// @workgroup_size.

use wgpu::util::DeviceExt;

use crate::device::{ComputeDevice, SobelLaunch};
use crate::error::{BufferRole, StencilError};
use crate::gpu::buffer::GpuBuffer;
use crate::gpu::device::{DeviceProfile, GpuDevice, GpuError};
use crate::tiling::TileSize;

/// Layout must match `SobelParams` in `sobel.wgsl` (16 bytes).
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SobelParams {
    rows: u32,
    cols: u32,
    /// Interior row/column of this dispatch's first invocation.
    row_offset: u32,
    col_offset: u32,
}

/// Compiled Sobel compute pipeline for a fixed tile shape.
pub struct GpuSobelPipeline {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
    tile: TileSize,
}

impl GpuSobelPipeline {
    pub fn new(gpu: &GpuDevice, tile: TileSize) -> Result<Self, GpuError> {
        gpu.validate_tile(tile)?;

        let shader_src = shader_source(tile);
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sobel.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bgl = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GpuSobel BGL"),
            entries: &[
                storage(0, true),
                storage(1, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GpuSobel pipeline layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("sobel_magnitude"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "sobel_magnitude",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        tracing::debug!(%tile, "sobel pipeline compiled");
        Ok(GpuSobelPipeline { pipeline, bgl, tile })
    }

    pub fn tile(&self) -> TileSize {
        self.tile
    }

    /// Record and submit one launch, then block until it has executed.
    pub fn dispatch(
        &self,
        gpu: &GpuDevice,
        input: &GpuBuffer,
        output: &GpuBuffer,
        launch: &SobelLaunch,
    ) -> Result<(), StencilError> {
        let geom = &launch.geometry;
        if geom.tile != self.tile {
            return Err(StencilError::KernelExecution(format!(
                "pipeline compiled for tile {}, launch requested {}",
                self.tile, geom.tile
            )));
        }
        if geom.is_empty() {
            return Ok(());
        }

        let to_u32 = |v: usize, what: &str| {
            u32::try_from(v)
                .map_err(|_| StencilError::KernelExecution(format!("{what} {v} does not fit in u32")))
        };
        let rows = to_u32(launch.rows, "rows")?;
        let cols = to_u32(launch.cols, "cols")?;

        // Grids wider or taller than the per-dimension limit are launched as
        // several dispatches, each offset into the interior.
        let chunks = geom.dispatch_chunks(gpu.limits.max_compute_workgroups_per_dimension);
        let params = chunks
            .iter()
            .map(|chunk| {
                Ok(SobelParams {
                    rows,
                    cols,
                    row_offset: to_u32(chunk.row_offset, "row offset")?,
                    col_offset: to_u32(chunk.col_offset, "column offset")?,
                })
            })
            .collect::<Result<Vec<_>, StencilError>>()?;
        if chunks.len() > 1 {
            tracing::debug!(%geom, dispatches = chunks.len(), "splitting launch");
        }

        gpu.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("GpuSobel dispatch") });
        let mut param_bufs = Vec::with_capacity(chunks.len());
        for (chunk, params) in chunks.iter().zip(&params) {
            let params_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("SobelParams"),
                contents: bytemuck::bytes_of(params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("GpuSobel BG"),
                layout: &self.bgl,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: input.buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: output.buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 2, resource: params_buf.as_entire_binding() },
                ],
            });

            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("sobel_magnitude"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(chunk.groups_x, chunk.groups_y, 1);
            }
            param_bufs.push(params_buf);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        gpu.device.poll(wgpu::Maintain::Wait);

        let validation = pollster::block_on(gpu.device.pop_error_scope());
        let oom = pollster::block_on(gpu.device.pop_error_scope());
        for buf in param_bufs {
            buf.destroy();
        }

        match oom.or(validation) {
            Some(err) => Err(StencilError::KernelExecution(err.to_string())),
            None => Ok(()),
        }
    }
}

/// WGSL source with the tile baked in as the workgroup size.
fn shader_source(tile: TileSize) -> String {
    include_str!("../shaders/sobel.wgsl")
        .replace("{{WG_X}}", &tile.x().to_string())
        .replace("{{WG_Y}}", &tile.y().to_string())
}

// ---------------------------------------------------------------------------
// WgpuDevice
// ---------------------------------------------------------------------------

/// GPU backend: a `GpuDevice` plus the Sobel pipeline compiled for one tile.
pub struct WgpuDevice {
    pipeline: GpuSobelPipeline,
    gpu: GpuDevice,
}

impl WgpuDevice {
    /// Open the best available GPU and compile the pipeline for `tile`.
    pub fn new(profile: DeviceProfile, tile: TileSize) -> Result<Self, GpuError> {
        Self::from_device(GpuDevice::new_with_profile(profile)?, tile)
    }

    pub fn from_device(gpu: GpuDevice, tile: TileSize) -> Result<Self, GpuError> {
        let pipeline = GpuSobelPipeline::new(&gpu, tile)?;
        Ok(WgpuDevice { pipeline, gpu })
    }

    pub fn gpu(&self) -> &GpuDevice {
        &self.gpu
    }

    pub fn tile(&self) -> TileSize {
        self.pipeline.tile()
    }
}

impl ComputeDevice for WgpuDevice {
    type Buffer = GpuBuffer;

    fn describe(&self) -> String {
        format!("{} tile {}", self.gpu, self.pipeline.tile())
    }

    fn allocate(&self, len: usize, role: BufferRole) -> Result<GpuBuffer, StencilError> {
        GpuBuffer::allocate(&self.gpu, len, role)
    }

    fn upload(&self, src: &[u8], dst: &mut GpuBuffer) -> Result<(), StencilError> {
        dst.upload(&self.gpu, src)
    }

    fn launch(
        &self,
        input: &GpuBuffer,
        output: &mut GpuBuffer,
        params: &SobelLaunch,
    ) -> Result<(), StencilError> {
        let expected = params.buffer_len();
        if input.len != expected || output.len != expected {
            return Err(StencilError::KernelExecution(format!(
                "launch expects {expected} byte buffers, got input {} / output {}",
                input.len, output.len
            )));
        }
        self.pipeline.dispatch(&self.gpu, input, output, params)
    }

    fn download(&self, src: &GpuBuffer, dst: &mut [u8]) -> Result<(), StencilError> {
        src.download(&self.gpu, dst)
    }

    fn release(&self, buffer: GpuBuffer) {
        buffer.destroy();
    }
}
