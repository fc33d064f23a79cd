//! Swapchain-dependent state: swapchain, render pass, batch pipeline and
//! framebuffers, rebuilt together whenever the surface changes size.

use std::sync::Arc;

use canvas_core::EngineConfig;
use canvas_rhi::device::Device;
use canvas_rhi::instance::Instance;
use canvas_rhi::pipeline::{
    ColorBlendAttachment, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use canvas_rhi::render_pass::RenderPass;
use canvas_rhi::shader::{Shader, ShaderStage};
use canvas_rhi::swapchain::{Swapchain, SwapchainDesc};
use canvas_rhi::vertex::Vertex2D;
use canvas_rhi::{RhiResult, vk};
use tracing::info;

/// Owns everything that has to be recreated with the swapchain.
///
/// Shader modules and the pipeline layout survive recreation; the render
/// pass is rebuilt because the surface format may change.
pub struct SurfaceManager {
    // Field order is drop order.
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    swapchain: Swapchain,
    render_pass: RenderPass,
    vertex_shader: Shader,
    fragment_shader: Shader,
    device: Arc<Device>,
    desc: SwapchainDesc,
}

impl SurfaceManager {
    /// Creates the swapchain for `surface` at `width`x`height` and builds the
    /// batch pipeline from the SPIR-V files named by `config`.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        config: &EngineConfig,
        set_layout: vk::DescriptorSetLayout,
    ) -> RhiResult<Self> {
        let desc = SwapchainDesc {
            surface,
            width,
            height,
            vsync: config.vsync,
        };

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &config.vertex_shader_path(),
            ShaderStage::Vertex,
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &config.fragment_shader_path(),
            ShaderStage::Fragment,
        )?;

        let mut swapchain = Swapchain::new(instance, device.clone(), &desc)?;
        let render_pass = RenderPass::new(device.clone(), swapchain.format())?;
        let pipeline_layout = PipelineLayout::new(device.clone(), &[set_layout])?;
        let pipeline = build_batch_pipeline(
            &device,
            &pipeline_layout,
            &render_pass,
            &vertex_shader,
            &fragment_shader,
            swapchain.extent(),
        )?;
        swapchain.create_framebuffers(&render_pass)?;

        info!(
            "Surface resources ready: {}x{} {:?}",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.format()
        );

        Ok(Self {
            pipeline,
            pipeline_layout,
            swapchain,
            render_pass,
            vertex_shader,
            fragment_shader,
            device,
            desc,
        })
    }

    /// Rebuilds the swapchain at the new size, then the render pass,
    /// pipeline and framebuffers against it.
    ///
    /// The caller must ensure no submitted work still references the old
    /// objects.
    pub fn recreate(&mut self, instance: &Instance, width: u32, height: u32) -> RhiResult<()> {
        self.desc.width = width;
        self.desc.height = height;
        self.swapchain.recreate(instance, &self.desc)?;

        let render_pass = RenderPass::new(self.device.clone(), self.swapchain.format())?;
        let pipeline = build_batch_pipeline(
            &self.device,
            &self.pipeline_layout,
            &render_pass,
            &self.vertex_shader,
            &self.fragment_shader,
            self.swapchain.extent(),
        )?;
        // Old pipeline goes before the render pass it was built against.
        self.pipeline = pipeline;
        self.render_pass = render_pass;
        self.swapchain.create_framebuffers(&self.render_pass)?;

        info!(
            "Swapchain recreated: {}x{}",
            self.swapchain.extent().width,
            self.swapchain.extent().height
        );
        Ok(())
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    #[inline]
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    #[inline]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[inline]
    pub fn pipeline_layout(&self) -> &PipelineLayout {
        &self.pipeline_layout
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

/// Alpha-blended, unculled triangle-list pipeline over [`Vertex2D`].
fn build_batch_pipeline(
    device: &Arc<Device>,
    layout: &PipelineLayout,
    render_pass: &RenderPass,
    vertex_shader: &Shader,
    fragment_shader: &Shader,
    extent: vk::Extent2D,
) -> RhiResult<Pipeline> {
    GraphicsPipelineBuilder::new()
        .vertex_shader(vertex_shader)
        .fragment_shader(fragment_shader)
        .vertex_binding(Vertex2D::binding_description())
        .vertex_attributes(&Vertex2D::attribute_descriptions())
        .cull_mode(CullMode::None)
        .color_blend_attachment(ColorBlendAttachment::alpha_blend())
        .extent(extent)
        .build(device.clone(), layout, render_pass)
}
