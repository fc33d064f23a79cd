//! Sampled 2D textures.
//!
//! A [`Texture`] owns an sRGB RGBA8 image, its view and a sampler. Pixels
//! are uploaded once through a staging buffer:
//!
//! 1. `UNDEFINED -> TRANSFER_DST_OPTIMAL`
//! 2. buffer-to-image copy
//! 3. `TRANSFER_DST_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use canvas_rhi::command::CommandPool;
//! use canvas_rhi::device::Device;
//! use canvas_rhi::texture::Texture;
//!
//! # fn example(device: Arc<Device>, pool: &CommandPool) -> Result<(), canvas_rhi::RhiError> {
//! let white = Texture::from_rgba8(device, pool, 1, 1, &[255, 255, 255, 255])?;
//! assert_eq!(white.width(), 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::buffer::{Buffer, BufferUsage, lock_allocator};
use crate::command::{CommandPool, submit_one_time};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Format of every texture the renderer creates.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Number of bytes an RGBA8 image of `width` x `height` occupies.
#[inline]
pub fn rgba8_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Access masks and stages for the two layout transitions of an upload.
///
/// Returns `(src_access, dst_access, src_stage, dst_stage)`, or `None` for a
/// transition the uploader never performs.
pub fn transition_masks(
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Option<(
    vk::AccessFlags,
    vk::AccessFlags,
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
)> {
    match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Some((
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        )),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Some((
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ))
        }
        _ => None,
    }
}

/// Linear filtering, repeat addressing, no anisotropy.
pub fn sampler_create_info() -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(false)
        .max_anisotropy(1.0)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(0.0)
}

fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn layout_barrier(
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> RhiResult<(
    vk::ImageMemoryBarrier<'static>,
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
)> {
    let (src_access, dst_access, src_stage, dst_stage) =
        transition_masks(old_layout, new_layout).ok_or_else(|| {
            RhiError::InvalidHandle(format!(
                "Unsupported layout transition {:?} -> {:?}",
                old_layout, new_layout
            ))
        })?;

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_subresource_range())
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    Ok((barrier, src_stage, dst_stage))
}

/// GPU image, view and sampler for one texture.
pub struct Texture {
    device: Arc<Device>,
    image: vk::Image,
    allocation: Option<Allocation>,
    view: vk::ImageView,
    sampler: vk::Sampler,
    width: u32,
    height: u32,
}

impl Texture {
    /// Uploads tightly packed RGBA8 `pixels` into a new texture.
    ///
    /// # Errors
    ///
    /// Fails if the dimensions are zero, `pixels` has the wrong length, or
    /// any Vulkan call fails.
    pub fn from_rgba8(
        device: Arc<Device>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "Texture dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if pixels.len() != rgba8_len(width, height) {
            return Err(RhiError::InvalidHandle(format!(
                "Expected {} bytes of RGBA8 data, got {}",
                rgba8_len(width, height),
                pixels.len()
            )));
        }

        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;

        // Partially built textures are released by Drop on the error paths.
        let mut texture = Self {
            device: device.clone(),
            image: vk::Image::null(),
            allocation: None,
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            width,
            height,
        };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(TEXTURE_FORMAT)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        texture.image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe {
            device
                .handle()
                .get_image_memory_requirements(texture.image)
        };

        let allocation = lock_allocator(&device)?.allocate(&AllocationCreateDesc {
            name: "texture",
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;
        unsafe {
            device
                .handle()
                .bind_image_memory(texture.image, allocation.memory(), allocation.offset())?;
        }
        texture.allocation = Some(allocation);

        let (to_transfer, src0, dst0) = layout_barrier(
            texture.image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        let (to_shader, src1, dst1) = layout_barrier(
            texture.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            });

        let image = texture.image;
        submit_one_time(&device, pool, |cmd| {
            cmd.pipeline_barrier(src0, dst0, &[to_transfer]);
            cmd.copy_buffer_to_image(
                staging.handle(),
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
            cmd.pipeline_barrier(src1, dst1, &[to_shader]);
        })?;
        drop(staging);

        let view_info = vk::ImageViewCreateInfo::default()
            .image(texture.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(TEXTURE_FORMAT)
            .subresource_range(color_subresource_range());
        texture.view = unsafe { device.handle().create_image_view(&view_info, None)? };

        texture.sampler = unsafe {
            device
                .handle()
                .create_sampler(&sampler_create_info(), None)?
        };

        debug!("Created texture {}x{}", width, height);
        Ok(texture)
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Descriptor info for binding this texture as a combined image sampler.
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        crate::descriptor::image_info(self.sampler, self.view)
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        let device = self.device.handle();
        unsafe {
            if self.sampler != vk::Sampler::null() {
                device.destroy_sampler(self.sampler, None);
            }
            if self.view != vk::ImageView::null() {
                device.destroy_image_view(self.view, None);
            }
            if self.image != vk::Image::null() {
                device.destroy_image(self.image, None);
            }
        }
        if let Some(allocation) = self.allocation.take() {
            match lock_allocator(&self.device) {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free texture allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking texture allocation: {e}"),
            }
        }
        debug!("Destroyed texture {}x{}", self.width, self.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_length() {
        assert_eq!(rgba8_len(1, 1), 4);
        assert_eq!(rgba8_len(1024, 1024), 4 * 1024 * 1024);
    }

    #[test]
    fn upload_transitions() {
        let (src, dst, src_stage, dst_stage) = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert!(src.is_empty());
        assert_eq!(dst, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);

        let (_, dst, _, dst_stage) = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(dst, vk::AccessFlags::SHADER_READ);
        assert_eq!(dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn unsupported_transition_is_rejected() {
        assert!(
            transition_masks(
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::ImageLayout::UNDEFINED
            )
            .is_none()
        );
    }

    #[test]
    fn sampler_settings() {
        let info = sampler_create_info();
        assert_eq!(info.mag_filter, vk::Filter::LINEAR);
        assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.anisotropy_enable, vk::FALSE);
        assert_eq!(info.border_color, vk::BorderColor::INT_OPAQUE_BLACK);
    }
}
