//! Batched immediate-mode 2D renderer.
//!
//! - [`batch`]: geometry accumulation with eager flush at capacity
//! - [`texture_registry`]: fixed-capacity texture table and handles
//! - [`font`]: glyph atlas packing and text layout
//! - [`frame_sync`]: frames-in-flight fences and semaphores
//! - [`surface_manager`]: swapchain-dependent objects and their recreation
//! - [`canvas`]: the public drawing API
//!
//! # Example
//!
//! ```no_run
//! use canvas_renderer::Canvas;
//! use glam::{Vec2, Vec4};
//!
//! # fn frame(canvas: &mut Canvas) -> canvas_renderer::RenderResult<()> {
//! canvas.begin_batch()?;
//! canvas.draw_rectangle(Vec2::new(10.0, 10.0), Vec2::new(100.0, 50.0), Vec4::new(1.0, 0.0, 0.0, 1.0))?;
//! canvas.draw_circle(Vec2::new(200.0, 200.0), 40.0, Vec4::ONE, 32)?;
//! canvas.end_batch()?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod binding;
pub mod canvas;
pub mod error;
pub mod font;
pub mod frame_sync;
pub mod render_context;
pub mod surface_manager;
pub mod texture_registry;

pub use batch::{Batch, BatchTarget, MAX_BATCH_INDICES, MAX_BATCH_VERTICES, SubmitOutcome};
pub use binding::{TextureBinding, TextureBindingGuard};
pub use canvas::Canvas;
pub use error::{RenderError, RenderResult};
pub use font::{FONT_ATLAS_SIZE, Font, GlyphAtlas, GlyphRasterizer, LINE_SPACING};
pub use render_context::RenderContext;
pub use texture_registry::{MAX_TEXTURES, TextureHandle, TextureRegistry, TextureResource};

pub use canvas_rhi::sync::FRAMES_IN_FLIGHT;
pub use canvas_rhi::vertex::{UNTEXTURED, Vertex2D};
