//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin RAII wrappers over `ash` for what the 2D batch renderer needs:
//! - Instance, physical device selection and logical device
//! - Swapchain, render pass and framebuffers
//! - Command pools and buffers
//! - Host-visible buffers and sampled textures
//! - Descriptor sets, shaders and the graphics pipeline
//! - Per-frame synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
