//! Font atlas: glyph packing, metrics and text layout.
//!
//! Glyphs for codepoints `[0, 126)` are rasterized once at a base pixel
//! size and shelf-packed into a square RGBA atlas (white, coverage in
//! alpha). Drawing at another size scales the stored metrics by
//! `size / base_size`.

use glam::Vec2;
use tracing::{debug, info};

use crate::error::{RenderError, RenderResult};
use crate::texture_registry::TextureHandle;

/// Line advance as a multiple of the requested font size.
pub const LINE_SPACING: f32 = 1.2;
/// Side length of the square glyph atlas in pixels.
pub const FONT_ATLAS_SIZE: u32 = 1024;
/// Empty pixels kept around every packed glyph.
pub const ATLAS_PADDING: u32 = 1;
/// Glyphs are packed for codepoints below this value.
pub const GLYPH_COUNT: usize = 126;

/// A single rasterized glyph: 8-bit coverage plus placement metrics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RasterizedGlyph {
    pub width: usize,
    pub height: usize,
    /// Left edge relative to the pen position.
    pub xmin: i32,
    /// Bottom edge relative to the baseline, positive up.
    pub ymin: i32,
    pub advance: f32,
    /// Row-major coverage, `width * height` bytes.
    pub coverage: Vec<u8>,
}

/// Vertical font metrics in pixels at the rasterized size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VerticalMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub line_gap: f32,
}

/// Source of glyph bitmaps.
pub trait GlyphRasterizer {
    fn rasterize_glyph(&self, ch: char, px: f32) -> RasterizedGlyph;

    fn vertical_metrics(&self, px: f32) -> Option<VerticalMetrics>;
}

impl GlyphRasterizer for fontdue::Font {
    fn rasterize_glyph(&self, ch: char, px: f32) -> RasterizedGlyph {
        let (metrics, coverage) = self.rasterize(ch, px);
        RasterizedGlyph {
            width: metrics.width,
            height: metrics.height,
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            advance: metrics.advance_width,
            coverage,
        }
    }

    fn vertical_metrics(&self, px: f32) -> Option<VerticalMetrics> {
        self.horizontal_line_metrics(px).map(|m| VerticalMetrics {
            ascent: m.ascent,
            descent: m.descent,
            line_gap: m.line_gap,
        })
    }
}

/// Parses TrueType/OpenType data.
pub fn parse_font(bytes: &[u8]) -> RenderResult<fontdue::Font> {
    fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
        .map_err(|e| RenderError::Font(format!("Failed to parse font: {e}")))
}

/// Placement of one glyph inside the atlas, in atlas pixels, and its
/// metrics at the base size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlyphMetrics {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    /// Offset from the pen position to the glyph's top-left corner, +y down.
    pub xoff: f32,
    pub yoff: f32,
    pub advance: f32,
}

impl GlyphMetrics {
    #[inline]
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

/// One textured quad produced by [`GlyphAtlas::layout`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphQuad {
    pub pos: Vec2,
    pub size: Vec2,
    pub uv0: Vec2,
    pub uv1: Vec2,
}

/// Packed glyph atlas and the metrics needed to lay text out against it.
pub struct GlyphAtlas {
    glyphs: Vec<GlyphMetrics>,
    size: u32,
    base_size: f32,
    metrics: VerticalMetrics,
    rgba: Vec<u8>,
}

impl GlyphAtlas {
    /// Rasterizes and packs the glyph range at `base_size` pixels into a
    /// [`FONT_ATLAS_SIZE`] atlas.
    pub fn build<R: GlyphRasterizer>(rasterizer: &R, base_size: f32) -> RenderResult<Self> {
        Self::build_with_size(rasterizer, base_size, FONT_ATLAS_SIZE)
    }

    /// # Errors
    ///
    /// [`RenderError::Font`] if `base_size` is not positive or the glyphs do
    /// not fit in an `atlas_size` square.
    pub fn build_with_size<R: GlyphRasterizer>(
        rasterizer: &R,
        base_size: f32,
        atlas_size: u32,
    ) -> RenderResult<Self> {
        if !(base_size > 0.0) {
            return Err(RenderError::Font(format!(
                "Base font size must be positive, got {base_size}"
            )));
        }

        let side = atlas_size as usize;
        let mut coverage = vec![0u8; side * side];
        let mut glyphs = Vec::with_capacity(GLYPH_COUNT);
        let mut packer = ShelfPacker::new(atlas_size, ATLAS_PADDING);

        for code in 0..GLYPH_COUNT as u32 {
            let Some(ch) = char::from_u32(code) else {
                glyphs.push(GlyphMetrics::default());
                continue;
            };
            let glyph = rasterizer.rasterize_glyph(ch, base_size);
            let (w, h) = (glyph.width as u32, glyph.height as u32);

            let (x0, y0) = packer.place(w, h).ok_or_else(|| {
                RenderError::Font(format!(
                    "Glyphs at {base_size}px do not fit a {atlas_size}x{atlas_size} atlas"
                ))
            })?;

            for row in 0..glyph.height {
                let src = &glyph.coverage[row * glyph.width..(row + 1) * glyph.width];
                let dst_start = (y0 as usize + row) * side + x0 as usize;
                coverage[dst_start..dst_start + glyph.width].copy_from_slice(src);
            }

            glyphs.push(GlyphMetrics {
                x0,
                y0,
                x1: x0 + w,
                y1: y0 + h,
                xoff: glyph.xmin as f32,
                yoff: -(glyph.ymin as f32 + glyph.height as f32),
                advance: glyph.advance,
            });
        }

        let metrics = rasterizer.vertical_metrics(base_size).unwrap_or_default();
        debug!(
            "Packed {} glyphs into {}x{} atlas ({} rows used)",
            glyphs.len(),
            atlas_size,
            atlas_size,
            packer.rows
        );

        Ok(Self {
            glyphs,
            size: atlas_size,
            base_size,
            metrics,
            rgba: coverage_to_rgba(&coverage),
        })
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn base_size(&self) -> f32 {
        self.base_size
    }

    #[inline]
    pub fn vertical_metrics(&self) -> VerticalMetrics {
        self.metrics
    }

    /// Atlas pixels as RGBA8. Empty once [`take_rgba`](Self::take_rgba)
    /// has been called.
    #[inline]
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Hands the pixel data over for upload, leaving the metrics in place.
    pub fn take_rgba(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.rgba)
    }

    pub fn glyph(&self, ch: char) -> Option<&GlyphMetrics> {
        self.glyphs.get(ch as usize)
    }

    #[inline]
    fn scale(&self, size: f32) -> f32 {
        size / self.base_size
    }

    /// Sum of scaled advances. Newlines add nothing and do not restart the
    /// sum, so the result for multi-line text is the total run length.
    pub fn measure_width(&self, text: &str, size: f32) -> f32 {
        let scale = self.scale(size);
        text.chars()
            .filter(|&ch| ch != '\n')
            .filter_map(|ch| self.glyph(ch))
            .map(|g| g.advance * scale)
            .sum()
    }

    /// Number of lines times `size * LINE_SPACING`.
    pub fn measure_height(&self, text: &str, size: f32) -> f32 {
        let lines = 1 + text.chars().filter(|&ch| ch == '\n').count();
        lines as f32 * size * LINE_SPACING
    }

    /// Positions one quad per visible glyph. The first baseline sits half a
    /// line below `pos.y`; `'\n'` returns to `pos.x` on the next line.
    pub fn layout(&self, text: &str, pos: Vec2, size: f32) -> Vec<GlyphQuad> {
        let scale = self.scale(size);
        let line_advance = size * LINE_SPACING;
        let atlas = self.size as f32;

        let mut quads = Vec::with_capacity(text.len());
        let mut pen = Vec2::new(pos.x, pos.y + line_advance * 0.5);

        for ch in text.chars() {
            if ch == '\n' {
                pen.x = pos.x;
                pen.y += line_advance;
                continue;
            }
            let Some(glyph) = self.glyph(ch) else {
                continue;
            };

            if glyph.width() > 0 && glyph.height() > 0 {
                quads.push(GlyphQuad {
                    pos: pen + Vec2::new(glyph.xoff, glyph.yoff) * scale,
                    size: Vec2::new(glyph.width() as f32, glyph.height() as f32) * scale,
                    uv0: Vec2::new(glyph.x0 as f32, glyph.y0 as f32) / atlas,
                    uv1: Vec2::new(glyph.x1 as f32, glyph.y1 as f32) / atlas,
                });
            }
            pen.x += glyph.advance * scale;
        }
        quads
    }
}

/// Expands 8-bit coverage to white RGBA with coverage in alpha.
pub fn coverage_to_rgba(coverage: &[u8]) -> Vec<u8> {
    coverage
        .iter()
        .flat_map(|&alpha| [255, 255, 255, alpha])
        .collect()
}

/// Row-by-row packer: glyphs are placed left to right and a new shelf starts
/// below the tallest glyph of the current one when a row is full.
struct ShelfPacker {
    size: u32,
    padding: u32,
    x: u32,
    y: u32,
    row_height: u32,
    rows: u32,
}

impl ShelfPacker {
    fn new(size: u32, padding: u32) -> Self {
        Self {
            size,
            padding,
            x: padding,
            y: padding,
            row_height: 0,
            rows: 1,
        }
    }

    fn place(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        if self.x + width + self.padding > self.size {
            self.x = self.padding;
            self.y += self.row_height + self.padding;
            self.row_height = 0;
            self.rows += 1;
        }
        if self.x + width + self.padding > self.size || self.y + height + self.padding > self.size
        {
            return None;
        }

        let origin = (self.x, self.y);
        self.x += width + self.padding;
        self.row_height = self.row_height.max(height);
        Some(origin)
    }
}

/// A loaded font: its atlas metrics plus the registry slot of its texture.
pub struct Font {
    atlas: GlyphAtlas,
    texture: TextureHandle,
}

impl Font {
    pub(crate) fn new(atlas: GlyphAtlas, texture: TextureHandle) -> Self {
        info!(
            "Font ready: {}px base, atlas texture {}",
            atlas.base_size(),
            texture
        );
        Self { atlas, texture }
    }

    #[inline]
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    #[inline]
    pub fn atlas(&self) -> &GlyphAtlas {
        &self.atlas
    }

    #[inline]
    pub fn base_size(&self) -> f32 {
        self.atlas.base_size()
    }

    pub fn measure_width(&self, text: &str, size: f32) -> f32 {
        self.atlas.measure_width(text, size)
    }

    pub fn measure_height(&self, text: &str, size: f32) -> f32 {
        self.atlas.measure_height(text, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Solid boxes whose width depends on the codepoint.
    struct BoxRasterizer;

    impl GlyphRasterizer for BoxRasterizer {
        fn rasterize_glyph(&self, ch: char, px: f32) -> RasterizedGlyph {
            if ch == ' ' {
                return RasterizedGlyph {
                    advance: px * 0.25,
                    ..Default::default()
                };
            }
            let width = (ch as usize % 7) + 1;
            let height = px as usize;
            RasterizedGlyph {
                width,
                height,
                xmin: 1,
                ymin: -2,
                advance: width as f32 + 2.0,
                coverage: vec![200; width * height],
            }
        }

        fn vertical_metrics(&self, px: f32) -> Option<VerticalMetrics> {
            Some(VerticalMetrics {
                ascent: px * 0.8,
                descent: -px * 0.2,
                line_gap: 0.0,
            })
        }
    }

    fn atlas() -> GlyphAtlas {
        GlyphAtlas::build_with_size(&BoxRasterizer, 16.0, 256).unwrap()
    }

    #[test]
    fn every_glyph_is_packed_inside_the_atlas() {
        let atlas = atlas();
        for code in 0..GLYPH_COUNT as u32 {
            let g = atlas.glyph(char::from_u32(code).unwrap()).unwrap();
            assert!(g.x0 >= ATLAS_PADDING && g.y0 >= ATLAS_PADDING);
            assert!(g.x1 + ATLAS_PADDING <= 256 && g.y1 + ATLAS_PADDING <= 256);
        }
        assert!(atlas.glyph('~').is_none());
    }

    #[test]
    fn packed_glyphs_do_not_overlap() {
        let atlas = atlas();
        let boxes: Vec<&GlyphMetrics> = (0..GLYPH_COUNT)
            .map(|c| &atlas.glyphs[c])
            .filter(|g| g.width() > 0)
            .collect();
        for (i, a) in boxes.iter().enumerate() {
            for b in &boxes[i + 1..] {
                let apart = a.x1 + ATLAS_PADDING <= b.x0
                    || b.x1 + ATLAS_PADDING <= a.x0
                    || a.y1 + ATLAS_PADDING <= b.y0
                    || b.y1 + ATLAS_PADDING <= a.y0;
                assert!(apart, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn coverage_lands_in_alpha() {
        let atlas = atlas();
        let g = atlas.glyph('A').unwrap();
        let idx = ((g.y0 * 256 + g.x0) * 4) as usize;
        assert_eq!(&atlas.rgba()[idx..idx + 4], &[255, 255, 255, 200]);
        assert_eq!(&atlas.rgba()[..4], &[255, 255, 255, 0]);
        assert_eq!(atlas.rgba().len(), 256 * 256 * 4);
    }

    #[test]
    fn glyph_offsets_follow_baseline() {
        let atlas = atlas();
        let g = atlas.glyph('A').unwrap();
        assert_eq!(g.xoff, 1.0);
        // Top edge is (ymin + height) above the baseline.
        assert_eq!(g.yoff, -(16.0 - 2.0));
        assert_eq!(atlas.vertical_metrics().ascent, 12.8);
    }

    #[test]
    fn atlas_too_small_is_an_error() {
        let result = GlyphAtlas::build_with_size(&BoxRasterizer, 16.0, 32);
        assert!(matches!(result, Err(RenderError::Font(_))));
    }

    #[test]
    fn non_positive_base_size_is_rejected() {
        assert!(GlyphAtlas::build_with_size(&BoxRasterizer, 0.0, 256).is_err());
    }

    #[test]
    fn width_is_additive() {
        let atlas = atlas();
        let ab = atlas.measure_width("ab", 32.0);
        let a = atlas.measure_width("a", 32.0);
        let b = atlas.measure_width("b", 32.0);
        assert!((ab - (a + b)).abs() < 1e-5);
        // Scaled by size / base.
        assert!((atlas.measure_width("a", 32.0) - 2.0 * atlas.measure_width("a", 16.0)).abs() < 1e-5);
    }

    #[test]
    fn newline_adds_no_width() {
        let atlas = atlas();
        assert_eq!(
            atlas.measure_width("ab\ncd", 16.0),
            atlas.measure_width("abcd", 16.0)
        );
        assert_eq!(atlas.measure_width("\u{e9}", 16.0), 0.0);
    }

    #[test]
    fn height_counts_lines() {
        let atlas = atlas();
        assert!((atlas.measure_height("abc", 20.0) - 24.0).abs() < 1e-5);
        assert!((atlas.measure_height("a\nb\n", 20.0) - 72.0).abs() < 1e-5);
    }

    #[test]
    fn layout_places_first_baseline_half_a_line_down() {
        let atlas = atlas();
        let quads = atlas.layout("A", Vec2::new(10.0, 100.0), 32.0);
        assert_eq!(quads.len(), 1);

        let g = atlas.glyph('A').unwrap();
        let baseline = 100.0 + 32.0 * LINE_SPACING * 0.5;
        let q = quads[0];
        assert!((q.pos.x - (10.0 + g.xoff * 2.0)).abs() < 1e-4);
        assert!((q.pos.y - (baseline + g.yoff * 2.0)).abs() < 1e-4);
        assert_eq!(q.size, Vec2::new(g.width() as f32 * 2.0, g.height() as f32 * 2.0));
        assert_eq!(q.uv0, Vec2::new(g.x0 as f32, g.y0 as f32) / 256.0);
        assert_eq!(q.uv1, Vec2::new(g.x1 as f32, g.y1 as f32) / 256.0);
    }

    #[test]
    fn layout_advances_and_wraps_on_newline() {
        let atlas = atlas();
        let quads = atlas.layout("AB\nC", Vec2::ZERO, 16.0);
        assert_eq!(quads.len(), 3);

        let a = atlas.glyph('A').unwrap();
        assert!((quads[1].pos.x - (a.advance + 1.0)).abs() < 1e-4);
        assert!((quads[2].pos.x - 1.0).abs() < 1e-4);
        assert!((quads[2].pos.y - quads[0].pos.y - 16.0 * LINE_SPACING).abs() < 1e-4);
    }

    #[test]
    fn blank_glyphs_advance_without_quads() {
        let atlas = atlas();
        let quads = atlas.layout("A B", Vec2::ZERO, 16.0);
        assert_eq!(quads.len(), 2);
        let a = atlas.glyph('A').unwrap();
        let expected = a.advance + 4.0 + 1.0;
        assert!((quads[1].pos.x - expected).abs() < 1e-4);
    }

    #[test]
    fn rgba_expansion() {
        assert_eq!(coverage_to_rgba(&[0, 128]), vec![255, 255, 255, 0, 255, 255, 255, 128]);
    }
}
