//! Immediate-mode drawing API.
//!
//! [`Canvas`] pairs the CPU-side [`Batch`] with the [`RenderContext`] it
//! submits to. Draw calls outside an explicit `begin_batch`/`end_batch`
//! pair begin a batch implicitly.

use std::path::Path;

use canvas_core::EngineConfig;
use canvas_platform::{ActiveEventLoop, Window};
use canvas_scene::Camera2D;
use glam::{Vec2, Vec4};
use tracing::{info, warn};

use crate::batch::Batch;
use crate::binding::{TextureBinding, TextureBindingGuard};
use crate::error::{RenderError, RenderResult};
use crate::font::{Font, GlyphAtlas, parse_font};
use crate::render_context::RenderContext;
use crate::texture_registry::TextureHandle;

/// The engine context: window, GPU state and the pending batch.
pub struct Canvas {
    batch: Batch,
    ctx: RenderContext,
}

impl Canvas {
    /// Opens a window on `event_loop` and initializes the renderer for it.
    pub fn new(event_loop: &ActiveEventLoop, config: &EngineConfig) -> RenderResult<Self> {
        config.validate()?;
        let window = Window::from_config(event_loop, config)?;
        Self::with_window(window, config)
    }

    pub fn with_window(window: Window, config: &EngineConfig) -> RenderResult<Self> {
        Ok(Self {
            batch: Batch::new(),
            ctx: RenderContext::new(window, config)?,
        })
    }

    #[inline]
    pub fn window(&self) -> &Window {
        self.ctx.window()
    }

    #[inline]
    pub fn camera(&self) -> &Camera2D {
        self.ctx.camera()
    }

    #[inline]
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    #[inline]
    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    // =========================================================================
    // Frame
    // =========================================================================

    pub fn begin_batch(&mut self) -> RenderResult<()> {
        self.batch.begin(&mut self.ctx)
    }

    pub fn end_batch(&mut self) -> RenderResult<()> {
        self.batch.end(&mut self.ctx)
    }

    pub fn flush_batch(&mut self) -> RenderResult<()> {
        self.batch.flush(&mut self.ctx)
    }

    /// Call from the window's resize event.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.ctx.request_resize(width, height);
    }

    /// Positive deltas zoom out, negative deltas zoom in.
    pub fn on_scroll(&mut self, delta_y: f32) -> RenderResult<()> {
        self.ctx.scroll(delta_y)
    }

    // =========================================================================
    // Shapes
    // =========================================================================

    pub fn draw_triangle(
        &mut self,
        p1: Vec2,
        p2: Vec2,
        p3: Vec2,
        color: Vec4,
    ) -> RenderResult<()> {
        self.batch.draw_triangle(&mut self.ctx, p1, p2, p3, color)
    }

    pub fn draw_quad(
        &mut self,
        p1: Vec2,
        p2: Vec2,
        p3: Vec2,
        p4: Vec2,
        color: Vec4,
    ) -> RenderResult<()> {
        self.batch.draw_quad(&mut self.ctx, p1, p2, p3, p4, color)
    }

    pub fn draw_rectangle(&mut self, pos: Vec2, size: Vec2, color: Vec4) -> RenderResult<()> {
        self.batch.draw_rectangle(&mut self.ctx, pos, size, color)
    }

    pub fn draw_gradient_rectangle(
        &mut self,
        pos: Vec2,
        size: Vec2,
        bl: Vec4,
        br: Vec4,
        tr: Vec4,
        tl: Vec4,
    ) -> RenderResult<()> {
        self.batch
            .draw_gradient_rectangle(&mut self.ctx, pos, size, bl, br, tr, tl)
    }

    pub fn draw_rounded_rectangle(
        &mut self,
        pos: Vec2,
        size: Vec2,
        radius: f32,
        color: Vec4,
        segments: u32,
    ) -> RenderResult<()> {
        self.batch
            .draw_rounded_rectangle(&mut self.ctx, pos, size, radius, color, segments)
    }

    pub fn draw_circle(
        &mut self,
        center: Vec2,
        radius: f32,
        color: Vec4,
        segments: u32,
    ) -> RenderResult<()> {
        self.batch
            .draw_circle(&mut self.ctx, center, radius, color, segments)
    }

    pub fn draw_line(
        &mut self,
        start: Vec2,
        end: Vec2,
        thickness: f32,
        color: Vec4,
    ) -> RenderResult<()> {
        self.batch
            .draw_line(&mut self.ctx, start, end, thickness, color)
    }

    // =========================================================================
    // Textures
    // =========================================================================

    /// Registers tightly packed RGBA8 pixels as a texture.
    ///
    /// # Errors
    ///
    /// [`RenderError::TextureCapacity`] once every slot is taken. Callers
    /// may log it and carry on without the texture.
    pub fn add_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> RenderResult<TextureHandle> {
        self.ctx.add_texture(width, height, rgba)
    }

    /// Decodes an image file (PNG or JPEG) and registers it.
    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> RenderResult<TextureHandle> {
        let path = path.as_ref();
        let image = image::open(path)?.to_rgba8();
        let (width, height) = image.dimensions();
        let handle = self.add_texture(width, height, image.as_raw())?;
        info!("Loaded texture {:?} as {} ({}x{})", path, handle, width, height);
        Ok(handle)
    }

    /// Frees a texture. The handle is not reused.
    pub fn unload_texture(&mut self, texture: TextureHandle) -> RenderResult<bool> {
        self.ctx.remove_texture(texture)
    }

    /// Makes `texture` the current texture. Unknown handles are ignored.
    pub fn set_texture(&mut self, texture: TextureHandle) -> bool {
        let bound = self.ctx.set_texture(texture);
        if !bound {
            warn!("Invalid texture ID {}", texture);
        }
        bound
    }

    #[inline]
    pub fn current_texture(&self) -> TextureHandle {
        self.ctx.current_texture()
    }

    fn texture_size(&self, texture: TextureHandle) -> RenderResult<Vec2> {
        let texture = self.ctx.textures().require(texture)?;
        Ok(Vec2::new(texture.width() as f32, texture.height() as f32))
    }

    /// Quad sampling `uv0..uv1` of `texture`.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidTexture`] for unknown handles; nothing is drawn.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_textured_quad(
        &mut self,
        pos: Vec2,
        size: Vec2,
        uv0: Vec2,
        uv1: Vec2,
        color: Vec4,
        texture: TextureHandle,
    ) -> RenderResult<()> {
        self.ctx.textures().require(texture)?;
        self.batch.draw_textured_quad(
            &mut self.ctx,
            pos,
            size,
            uv0,
            uv1,
            color,
            texture.sampler_id(),
        )
    }

    /// Whole texture at `pos`, sized by its pixel dimensions times `scale`.
    /// Unknown handles fail with [`RenderError::InvalidTexture`].
    pub fn draw_texture(
        &mut self,
        pos: Vec2,
        texture: TextureHandle,
        scale: f32,
        color: Vec4,
    ) -> RenderResult<()> {
        let dims = self.texture_size(texture)?;
        self.ctx.set_texture(texture);
        self.draw_textured_quad(pos, dims * scale, Vec2::ZERO, Vec2::ONE, color, texture)
    }

    /// Draws the pixel rectangle `region_pos..region_pos + region_size` of
    /// `texture` into a `size` quad at `pos`.
    pub fn draw_texture_region(
        &mut self,
        pos: Vec2,
        size: Vec2,
        texture: TextureHandle,
        region_pos: Vec2,
        region_size: Vec2,
        color: Vec4,
    ) -> RenderResult<()> {
        let dims = self.texture_size(texture)?;
        self.ctx.set_texture(texture);
        let (uv0, uv1) = region_uvs(region_pos, region_size, dims);
        self.draw_textured_quad(pos, size, uv0, uv1, color, texture)
    }

    // =========================================================================
    // Text
    // =========================================================================

    /// Loads a TrueType/OpenType file and packs its atlas at `base_size` px.
    pub fn load_font(&mut self, path: impl AsRef<Path>, base_size: f32) -> RenderResult<Font> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| RenderError::Font(format!("Failed to read font {:?}: {}", path, e)))?;
        self.load_font_from_bytes(&bytes, base_size)
    }

    pub fn load_font_from_bytes(&mut self, bytes: &[u8], base_size: f32) -> RenderResult<Font> {
        let face = parse_font(bytes)?;
        let mut atlas = GlyphAtlas::build(&face, base_size)?;
        let rgba = atlas.take_rgba();
        let texture = self.add_texture(atlas.size(), atlas.size(), &rgba)?;
        Ok(Font::new(atlas, texture))
    }

    /// Releases the font's atlas texture.
    pub fn unload_font(&mut self, font: Font) -> RenderResult<()> {
        self.ctx.remove_texture(font.texture())?;
        Ok(())
    }

    /// Draws `text` with its first line's top at `pos`, `size` pixels tall.
    /// The previously bound texture is restored afterwards. Fails with
    /// [`RenderError::InvalidTexture`] if the font has been unloaded.
    pub fn draw_text(
        &mut self,
        font: &Font,
        text: &str,
        pos: Vec2,
        size: f32,
        color: Vec4,
    ) -> RenderResult<()> {
        let texture = font.texture();
        self.ctx.textures().require(texture)?;

        let quads = font.atlas().layout(text, pos, size);
        let mut ctx = TextureBindingGuard::new(&mut self.ctx, texture);
        for quad in quads {
            self.batch.draw_textured_quad(
                &mut *ctx,
                quad.pos,
                quad.size,
                quad.uv0,
                quad.uv1,
                color,
                texture.sampler_id(),
            )?;
        }
        Ok(())
    }

    pub fn measure_text_width(&self, font: &Font, text: &str, size: f32) -> f32 {
        font.measure_width(text, size)
    }

    pub fn measure_text_height(&self, font: &Font, text: &str, size: f32) -> f32 {
        font.measure_height(text, size)
    }
}

/// Normalized UVs for a pixel region of a `dims`-sized texture.
pub fn region_uvs(region_pos: Vec2, region_size: Vec2, dims: Vec2) -> (Vec2, Vec2) {
    let uv0 = region_pos / dims;
    (uv0, uv0 + region_size / dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_uvs_normalize_by_texture_size() {
        let (uv0, uv1) = region_uvs(
            Vec2::new(32.0, 0.0),
            Vec2::new(32.0, 64.0),
            Vec2::new(128.0, 64.0),
        );
        assert_eq!(uv0, Vec2::new(0.25, 0.0));
        assert_eq!(uv1, Vec2::new(0.5, 1.0));
    }

    #[test]
    fn full_region_is_unit_square() {
        let dims = Vec2::new(300.0, 200.0);
        let (uv0, uv1) = region_uvs(Vec2::ZERO, dims, dims);
        assert_eq!((uv0, uv1), (Vec2::ZERO, Vec2::ONE));
    }
}
