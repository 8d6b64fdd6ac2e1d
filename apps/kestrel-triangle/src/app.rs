//! Triangle application.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use gpu_allocator::MemoryLocation;
use tracing::info;

use kestrel_app::{AppContext, Extent, FrameContext, KestrelApp};
use kestrel_gpu::{GpuBuffer, GraphicsPipeline, GraphicsPipelineConfig};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: Vec2,
    color: Vec3,
}

impl Vertex {
    const fn new(position: Vec2, color: Vec3) -> Self {
        Self { position, color }
    }

    fn binding() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    fn attributes() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription::default()
                .location(0)
                .binding(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(std::mem::offset_of!(Self, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(1)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(std::mem::offset_of!(Self, color) as u32),
        ]
    }
}

const VERTICES: [Vertex; 3] = [
    Vertex::new(Vec2::new(0.0, -0.5), Vec3::new(1.0, 0.0, 0.0)),
    Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 1.0, 0.0)),
    Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
];

pub struct Triangle {
    // Released before the GPU context the runner owns
    pipeline: GraphicsPipeline,
    vertices: GpuBuffer,
}

impl KestrelApp for Triangle {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let vertex_bytes = std::mem::size_of_val(&VERTICES) as u64;
        let mut vertices = GpuBuffer::new(
            ctx.gpu.clone(),
            vertex_bytes,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryLocation::CpuToGpu,
            "triangle_vertices",
        )?;
        // Written once, before any frame can read it
        vertices.write(&VERTICES)?;

        let config = GraphicsPipelineConfig {
            vertex_shader: kestrel_shaders::triangle_vertex_shader().to_vec(),
            fragment_shader: kestrel_shaders::triangle_fragment_shader().to_vec(),
            vertex_bindings: vec![Vertex::binding()],
            vertex_attributes: Vertex::attributes().to_vec(),
            ..Default::default()
        };
        let pipeline = GraphicsPipeline::new(ctx.gpu.clone(), &ctx.render_pass, &config)?;

        info!(
            "Triangle ready: {} frames in flight, {}",
            ctx.frames_in_flight(),
            ctx.extent()
        );

        Ok(Self { pipeline, vertices })
    }

    fn update(&mut self, _ctx: &AppContext, _dt: f32) {}

    fn record(&mut self, ctx: &AppContext, frame: &FrameContext) -> anyhow::Result<()> {
        let device = ctx.gpu.device();
        unsafe {
            device.cmd_bind_pipeline(
                frame.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.handle(),
            );
            device.cmd_bind_vertex_buffers(frame.command_buffer, 0, &[self.vertices.handle()], &[0]);
            device.cmd_draw(frame.command_buffer, VERTICES.len() as u32, 1, 0, 0);
        }
        Ok(())
    }

    fn on_resize(&mut self, _ctx: &mut AppContext, extent: Extent) -> anyhow::Result<()> {
        // Viewport and scissor are dynamic; nothing to rebuild
        info!("Drawing at {extent}");
        Ok(())
    }
}
