//! GPU side of the canvas: device objects, batch buffers, descriptors and
//! the textures bound through them.

use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::Arc;

use canvas_core::EngineConfig;
use canvas_platform::{Surface, Window};
use canvas_rhi::buffer::{Buffer, BufferUsage};
use canvas_rhi::command::{CommandBuffer, CommandPool};
use canvas_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, buffer_info,
    write_uniform_and_images,
};
use canvas_rhi::device::Device;
use canvas_rhi::instance::{Instance, InstanceDesc};
use canvas_rhi::physical_device::select_physical_device;
use canvas_rhi::texture::Texture;
use canvas_rhi::vertex::Vertex2D;
use canvas_rhi::{RhiError, RhiResult, vk};
use canvas_scene::{Camera2D, CameraUniform};
use tracing::{debug, error, info};

use crate::batch::{BatchTarget, MAX_BATCH_INDICES, MAX_BATCH_VERTICES, SubmitOutcome};
use crate::binding::TextureBinding;
use crate::error::{RenderError, RenderResult};
use crate::frame_sync::{AcquireOutcome, FrameSynchronizer};
use crate::surface_manager::SurfaceManager;
use crate::texture_registry::{MAX_TEXTURES, TextureHandle, TextureRegistry};

const UNIFORM_BINDING: u32 = 0;
const SAMPLER_BINDING: u32 = 1;

/// Owner of every Vulkan object the canvas uses.
///
/// # Resource Destruction Order
///
/// After a device-wide idle wait: batch command buffer and buffers, textures (one pass over
/// the registry), descriptor pool and layout, surface resources (pipeline,
/// swapchain, render pass), sync objects, command pool, device, surface,
/// instance. `ManuallyDrop` fields are released explicitly in that order.
pub struct RenderContext {
    instance: ManuallyDrop<Instance>,
    surface: ManuallyDrop<Surface>,
    device: ManuallyDrop<Arc<Device>>,
    command_pool: ManuallyDrop<CommandPool>,
    surface_manager: ManuallyDrop<SurfaceManager>,
    frame_sync: ManuallyDrop<FrameSynchronizer>,
    descriptor_set_layout: ManuallyDrop<DescriptorSetLayout>,
    descriptor_pool: ManuallyDrop<DescriptorPool>,
    descriptor_set: vk::DescriptorSet,
    uniform_buffer: ManuallyDrop<Buffer>,
    vertex_buffer: ManuallyDrop<Buffer>,
    index_buffer: ManuallyDrop<Buffer>,
    textures: ManuallyDrop<TextureRegistry<Texture>>,
    batch_cmd: ManuallyDrop<CommandBuffer>,

    camera: Camera2D,
    clear_color: [f32; 4],
    resize_requested: bool,
    window: Window,
}

impl RenderContext {
    /// Brings up Vulkan for `window`.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: no instance, surface, suitable GPU,
    /// swapchain, shader or pipeline.
    pub fn new(window: Window, config: &EngineConfig) -> RenderResult<Self> {
        let size = window.framebuffer_size();
        info!("Initializing canvas renderer ({}x{})", size.width, size.height);

        let surface_extensions = window.required_extensions()?;
        let app_name = CString::new(config.title.as_str()).unwrap_or_default();
        let instance = Instance::new(&InstanceDesc {
            app_name: &app_name,
            enable_validation: config.validation,
            surface_extensions: &surface_extensions,
        })?;

        let surface = window.create_surface(instance.entry(), instance.handle())?;
        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device)?;
        let command_pool =
            CommandPool::new(device.clone(), device.queue_families().graphics()?)?;

        let bindings = [
            DescriptorBindingBuilder::uniform_buffer(
                UNIFORM_BINDING,
                vk::ShaderStageFlags::VERTEX,
            ),
            DescriptorBindingBuilder::combined_image_sampler_array(
                SAMPLER_BINDING,
                MAX_TEXTURES as u32,
                vk::ShaderStageFlags::FRAGMENT,
            ),
        ];
        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
        let descriptor_pool = DescriptorPool::for_bindings(device.clone(), 1, &bindings)?;
        let descriptor_set = descriptor_pool.allocate_one(&descriptor_set_layout)?;

        let surface_manager = SurfaceManager::new(
            &instance,
            device.clone(),
            surface.handle(),
            size.width,
            size.height,
            config,
            descriptor_set_layout.handle(),
        )?;
        let frame_sync = FrameSynchronizer::new(device.clone())?;

        let uniform_buffer = Buffer::new(
            device.clone(),
            BufferUsage::Uniform,
            CameraUniform::SIZE as vk::DeviceSize,
        )?;
        let vertex_buffer = Buffer::new(
            device.clone(),
            BufferUsage::Vertex,
            (MAX_BATCH_VERTICES * Vertex2D::size()) as vk::DeviceSize,
        )?;
        let index_buffer = Buffer::new(
            device.clone(),
            BufferUsage::Index,
            (MAX_BATCH_INDICES * std::mem::size_of::<u32>()) as vk::DeviceSize,
        )?;

        let dummy = Texture::from_rgba8(device.clone(), &command_pool, 1, 1, &[255; 4])?;
        let textures = TextureRegistry::new(MAX_TEXTURES, dummy);
        let batch_cmd = CommandBuffer::new(device.clone(), &command_pool)?;

        let extent = surface_manager.extent();
        let camera = Camera2D::new(extent.width as f32, extent.height as f32);

        let context = Self {
            instance: ManuallyDrop::new(instance),
            surface: ManuallyDrop::new(surface),
            device: ManuallyDrop::new(device),
            command_pool: ManuallyDrop::new(command_pool),
            surface_manager: ManuallyDrop::new(surface_manager),
            frame_sync: ManuallyDrop::new(frame_sync),
            descriptor_set_layout: ManuallyDrop::new(descriptor_set_layout),
            descriptor_pool: ManuallyDrop::new(descriptor_pool),
            descriptor_set,
            uniform_buffer: ManuallyDrop::new(uniform_buffer),
            vertex_buffer: ManuallyDrop::new(vertex_buffer),
            index_buffer: ManuallyDrop::new(index_buffer),
            textures: ManuallyDrop::new(textures),
            batch_cmd: ManuallyDrop::new(batch_cmd),
            camera,
            clear_color: config.clear_color,
            resize_requested: false,
            window,
        };
        context.upload_camera()?;
        context.write_descriptors();

        info!(
            "Canvas renderer ready: {} swapchain images, batch capacity {} vertices / {} indices",
            context.surface_manager.swapchain().image_count(),
            MAX_BATCH_VERTICES,
            MAX_BATCH_INDICES
        );
        Ok(context)
    }

    #[inline]
    pub fn window(&self) -> &Window {
        &self.window
    }

    #[inline]
    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    #[inline]
    pub fn textures(&self) -> &TextureRegistry<Texture> {
        &self.textures
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.surface_manager.extent()
    }

    /// Flags the swapchain for recreation at the next flush and resizes the
    /// camera to match.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        debug!("Resize requested: {}x{}", width, height);
        self.resize_requested = true;
        if width > 0 && height > 0 {
            self.camera.update(width as f32, height as f32);
        }
    }

    /// Applies a scroll delta to the camera zoom and uploads the result.
    pub fn scroll(&mut self, delta_y: f32) -> RenderResult<()> {
        self.camera.on_scroll(delta_y);
        self.upload_camera()?;
        Ok(())
    }

    fn upload_camera(&self) -> RhiResult<()> {
        self.uniform_buffer
            .write_slice(0, &[CameraUniform::from_camera(&self.camera)])
    }

    /// Rewrites the whole descriptor set: the camera block and every sampler
    /// slot, empty slots pointing at the dummy texture.
    fn write_descriptors(&self) {
        let images: Vec<vk::DescriptorImageInfo> = self
            .textures
            .descriptor_textures()
            .into_iter()
            .map(Texture::descriptor_info)
            .collect();

        write_uniform_and_images(
            &self.device,
            self.descriptor_set,
            UNIFORM_BINDING,
            buffer_info(
                self.uniform_buffer.handle(),
                0,
                CameraUniform::SIZE as vk::DeviceSize,
            ),
            SAMPLER_BINDING,
            &images,
        );
    }

    /// Uploads RGBA8 pixels and registers them as a new texture.
    ///
    /// # Errors
    ///
    /// [`RenderError::TextureCapacity`] when the registry is full, checked
    /// before anything is uploaded.
    pub fn add_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> RenderResult<TextureHandle> {
        if self.textures.is_full() {
            return Err(RenderError::TextureCapacity {
                capacity: self.textures.capacity(),
            });
        }

        // The upload waits for the graphics queue, so the set is idle when
        // it is rewritten below.
        let texture = Texture::from_rgba8(
            (*self.device).clone(),
            &self.command_pool,
            width,
            height,
            rgba,
        )?;
        let handle = self.textures.add(texture)?;
        self.write_descriptors();
        Ok(handle)
    }

    /// Frees a texture's GPU image. Its handle is never handed out again.
    pub fn remove_texture(&mut self, handle: TextureHandle) -> RenderResult<bool> {
        if !self.textures.contains(handle) || handle == TextureHandle::DUMMY {
            return Ok(false);
        }
        self.device.graphics_queue_wait_idle()?;
        let removed = self.textures.remove(handle).is_some();
        self.write_descriptors();
        Ok(removed)
    }

    fn record_draw(&self, image_index: u32, index_count: u32) -> RhiResult<()> {
        let framebuffer = self
            .surface_manager
            .swapchain()
            .framebuffer(image_index)
            .ok_or_else(|| {
                RhiError::InvalidHandle(format!("No framebuffer for swapchain image {image_index}"))
            })?;
        let cmd = &self.batch_cmd;

        cmd.begin_render_pass(
            self.surface_manager.render_pass().handle(),
            framebuffer,
            self.surface_manager.extent(),
            self.clear_color,
        );
        cmd.bind_graphics_pipeline(self.surface_manager.pipeline().handle());
        cmd.bind_vertex_buffer(self.vertex_buffer.handle());
        cmd.bind_index_buffer_u32(self.index_buffer.handle());
        cmd.bind_descriptor_sets(
            self.surface_manager.pipeline_layout().handle(),
            &[self.descriptor_set],
        );
        cmd.draw_indexed(index_count);
        cmd.end_render_pass();
        cmd.end()
    }
}

impl BatchTarget for RenderContext {
    fn begin_recording(&mut self) -> RenderResult<()> {
        // The single batch command buffer may still be pending from the
        // previous flush.
        self.device.graphics_queue_wait_idle()?;
        self.batch_cmd.reset()?;
        self.batch_cmd.begin()?;
        Ok(())
    }

    fn end_recording(&mut self) -> RenderResult<()> {
        self.batch_cmd.end()?;
        Ok(())
    }

    fn resize_pending(&self) -> bool {
        self.resize_requested
    }

    fn recreate(&mut self) -> RenderResult<()> {
        let size = self.window.framebuffer_size();
        if size.is_zero() {
            debug!("Window minimized; deferring swapchain recreation");
            return Ok(());
        }

        self.device.wait_idle()?;
        self.surface_manager
            .recreate(&self.instance, size.width, size.height)?;
        self.frame_sync.reset()?;

        self.command_pool.free(&self.batch_cmd);
        *self.batch_cmd = CommandBuffer::new((*self.device).clone(), &self.command_pool)?;

        let extent = self.surface_manager.extent();
        self.camera
            .update(extent.width as f32, extent.height as f32);
        self.upload_camera()?;
        self.write_descriptors();

        self.resize_requested = false;
        Ok(())
    }

    fn submit(&mut self, vertices: &[Vertex2D], indices: &[u32]) -> RenderResult<SubmitOutcome> {
        self.frame_sync.wait()?;

        let image_index = match self.frame_sync.acquire(self.surface_manager.swapchain())? {
            AcquireOutcome::Acquired(index) => index,
            AcquireOutcome::OutOfDate => {
                self.resize_requested = true;
                return Ok(SubmitOutcome::Stale);
            }
        };
        self.frame_sync.reset_fence()?;

        self.vertex_buffer.write_slice(0, vertices)?;
        self.index_buffer.write_slice(0, indices)?;
        self.write_descriptors();
        self.record_draw(image_index, indices.len() as u32)?;

        self.frame_sync.submit(&self.batch_cmd)?;
        let stale = self.frame_sync.present(self.surface_manager.swapchain())?;
        self.frame_sync.advance();

        if stale || self.resize_requested {
            self.resize_requested = true;
            self.recreate()?;
        }
        Ok(SubmitOutcome::Presented)
    }
}

impl TextureBinding for RenderContext {
    fn current_texture(&self) -> TextureHandle {
        self.textures.current()
    }

    fn set_texture(&mut self, handle: TextureHandle) -> bool {
        self.textures.set_current(handle)
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during teardown: {:?}", e);
        }

        let released = self.textures.clear();
        debug!("Released {} textures", released);

        unsafe {
            ManuallyDrop::drop(&mut self.batch_cmd);
            ManuallyDrop::drop(&mut self.index_buffer);
            ManuallyDrop::drop(&mut self.vertex_buffer);
            ManuallyDrop::drop(&mut self.uniform_buffer);
            ManuallyDrop::drop(&mut self.textures);
            ManuallyDrop::drop(&mut self.descriptor_pool);
            ManuallyDrop::drop(&mut self.descriptor_set_layout);
            ManuallyDrop::drop(&mut self.surface_manager);
            ManuallyDrop::drop(&mut self.frame_sync);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Canvas renderer destroyed");
    }
}
