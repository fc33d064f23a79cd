//! Integration tests for batching, texture bookkeeping and font layout
//! without a Vulkan device.

use std::path::Path;

use canvas_renderer::font::parse_font;
use canvas_renderer::{
    Batch, BatchTarget, GlyphAtlas, MAX_BATCH_INDICES, MAX_TEXTURES, RenderError, RenderResult,
    SubmitOutcome, TextureBinding, TextureBindingGuard, TextureHandle, TextureRegistry,
    TextureResource, UNTEXTURED, Vertex2D,
};
use glam::{Vec2, Vec4};

struct Image {
    width: u32,
    height: u32,
}

impl TextureResource for Image {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Records submissions and keeps a texture table, like the GPU context.
struct HeadlessTarget {
    textures: TextureRegistry<Image>,
    submitted: Vec<Vec<Vertex2D>>,
    index_counts: Vec<usize>,
}

impl HeadlessTarget {
    fn new() -> Self {
        Self {
            textures: TextureRegistry::new(
                MAX_TEXTURES,
                Image {
                    width: 1,
                    height: 1,
                },
            ),
            submitted: Vec::new(),
            index_counts: Vec::new(),
        }
    }
}

impl BatchTarget for HeadlessTarget {
    fn begin_recording(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn end_recording(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn resize_pending(&self) -> bool {
        false
    }

    fn recreate(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn submit(&mut self, vertices: &[Vertex2D], indices: &[u32]) -> RenderResult<SubmitOutcome> {
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        self.submitted.push(vertices.to_vec());
        self.index_counts.push(indices.len());
        Ok(SubmitOutcome::Presented)
    }
}

impl TextureBinding for HeadlessTarget {
    fn current_texture(&self) -> TextureHandle {
        self.textures.current()
    }

    fn set_texture(&mut self, handle: TextureHandle) -> bool {
        self.textures.set_current(handle)
    }
}

#[test]
fn large_grid_flushes_at_index_capacity() -> anyhow::Result<()> {
    let mut target = HeadlessTarget::new();
    let mut batch = Batch::new();

    let rects = 200_000;
    batch.begin(&mut target)?;
    for i in 0..rects {
        let pos = Vec2::new((i % 800) as f32, (i / 800) as f32);
        batch.draw_rectangle(&mut target, pos, Vec2::ONE, Vec4::new(0.2, 0.4, 0.8, 1.0))?;
    }
    batch.end(&mut target)?;

    let per_batch = MAX_BATCH_INDICES / 6;
    assert_eq!(target.index_counts, vec![per_batch * 6, per_batch * 6, (rects - 2 * per_batch) * 6]);
    let total: usize = target.submitted.iter().map(Vec::len).sum();
    assert_eq!(total, rects * 4);
    Ok(())
}

#[test]
fn textured_quad_references_registered_texture() -> anyhow::Result<()> {
    let mut target = HeadlessTarget::new();
    let sprite = target.textures.add(Image {
        width: 128,
        height: 64,
    })?;

    let mut batch = Batch::new();
    let (w, h) = target.textures.dimensions(sprite).unwrap();
    let uv0 = Vec2::new(32.0 / w as f32, 0.0);
    let uv1 = uv0 + Vec2::new(32.0 / w as f32, 64.0 / h as f32);
    batch.draw_textured_quad(
        &mut target,
        Vec2::ZERO,
        Vec2::splat(32.0),
        uv0,
        uv1,
        Vec4::ONE,
        sprite.sampler_id(),
    )?;
    batch.draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, Vec4::ONE)?;
    batch.end(&mut target)?;

    let frame = &target.submitted[0];
    assert!(frame[..4].iter().all(|v| v.sampler_id == sprite.sampler_id()));
    assert!(frame[4..].iter().all(|v| v.sampler_id == UNTEXTURED));
    assert_eq!(frame[0].tex_coord(), Vec2::new(0.25, 0.0));
    assert_eq!(frame[2].tex_coord(), Vec2::new(0.5, 1.0));
    Ok(())
}

#[test]
fn registry_rejects_textures_past_capacity() {
    let mut target = HeadlessTarget::new();
    let mut issued = Vec::new();
    loop {
        match target.textures.add(Image {
            width: 4,
            height: 4,
        }) {
            Ok(handle) => issued.push(handle),
            Err(err) => {
                assert!(matches!(err, RenderError::TextureCapacity { .. }));
                assert!(err.is_recoverable());
                break;
            }
        }
    }
    assert_eq!(issued.len(), MAX_TEXTURES - 1);
    assert_eq!(target.textures.len(), MAX_TEXTURES);
}

#[test]
fn binding_guard_restores_around_a_draw_run() -> anyhow::Result<()> {
    let mut target = HeadlessTarget::new();
    let sprite = target.textures.add(Image {
        width: 8,
        height: 8,
    })?;
    let glyphs = target.textures.add(Image {
        width: 256,
        height: 256,
    })?;
    target.set_texture(sprite);

    let mut batch = Batch::new();
    {
        let mut bound = TextureBindingGuard::new(&mut target, glyphs);
        assert_eq!(bound.current_texture(), glyphs);
        batch.draw_textured_quad(
            &mut *bound,
            Vec2::ZERO,
            Vec2::ONE,
            Vec2::ZERO,
            Vec2::ONE,
            Vec4::ONE,
            glyphs.sampler_id(),
        )?;
    }
    assert_eq!(target.current_texture(), sprite);
    Ok(())
}

#[test]
fn font_file_measures_consistently() -> anyhow::Result<()> {
    let font_path = Path::new("../../assets/fonts/font.ttf");

    // Skip test if the font isn't checked out
    if !font_path.exists() {
        println!("Skipping test: font file not found at {:?}", font_path);
        return Ok(());
    }

    let face = parse_font(&std::fs::read(font_path)?)?;
    let atlas = GlyphAtlas::build(&face, 32.0)?;

    let ab = atlas.measure_width("ab", 24.0);
    let a = atlas.measure_width("a", 24.0);
    let b = atlas.measure_width("b", 24.0);
    assert!((ab - (a + b)).abs() < 1e-3);
    assert!(a > 0.0);

    let quads = atlas.layout("Hello\nWorld", Vec2::new(10.0, 10.0), 24.0);
    assert_eq!(quads.len(), 10);
    assert!(quads.iter().all(|q| q.uv1.x <= 1.0 && q.uv1.y <= 1.0));
    Ok(())
}
