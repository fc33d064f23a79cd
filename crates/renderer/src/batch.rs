//! Batch accumulator and 2D primitive tessellation.
//!
//! Draw calls append vertices and `u32` indices to a fixed-capacity batch.
//! A batch is handed to a [`BatchTarget`] for submission when the caller
//! flushes or ends it, or eagerly when the next primitive would overflow
//! either capacity bound; the overflowing primitive then lands in the next
//! batch.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use canvas_rhi::vertex::{UNTEXTURED, Vertex2D};
use glam::{Vec2, Vec4};
use tracing::{debug, trace, warn};

use crate::error::{RenderError, RenderResult};

/// Vertex capacity of one batch.
pub const MAX_BATCH_VERTICES: usize = 500_000;
/// Index capacity of one batch.
pub const MAX_BATCH_INDICES: usize = 550_000;

/// Result of handing a batch to the GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The batch was drawn and presented.
    Presented,
    /// The swapchain was stale at acquire time. Nothing was submitted and a
    /// resize is now pending.
    Stale,
}

/// The GPU side of a batch: command recording, submission and swapchain
/// recreation.
pub trait BatchTarget {
    /// Resets the batch command buffer and opens a one-time recording scope.
    fn begin_recording(&mut self) -> RenderResult<()>;

    /// Closes the recording scope without drawing.
    fn end_recording(&mut self) -> RenderResult<()>;

    /// Whether a resize was flagged since the last recreation.
    fn resize_pending(&self) -> bool;

    /// Rebuilds the swapchain and everything derived from it, clearing the
    /// pending-resize flag.
    fn recreate(&mut self) -> RenderResult<()>;

    /// Uploads `vertices`/`indices`, records the draw, then acquires,
    /// submits and presents.
    fn submit(&mut self, vertices: &[Vertex2D], indices: &[u32]) -> RenderResult<SubmitOutcome>;
}

/// Pending geometry for one submission.
pub struct Batch {
    vertices: Vec<Vertex2D>,
    indices: Vec<u32>,
    max_vertices: usize,
    max_indices: usize,
    has_begun: bool,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BATCH_VERTICES, MAX_BATCH_INDICES)
    }

    pub fn with_capacity(max_vertices: usize, max_indices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(max_vertices),
            indices: Vec::with_capacity(max_indices),
            max_vertices,
            max_indices,
            has_begun: false,
        }
    }

    #[inline]
    pub fn has_begun(&self) -> bool {
        self.has_begun
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex2D] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn max_vertices(&self) -> usize {
        self.max_vertices
    }

    #[inline]
    pub fn max_indices(&self) -> usize {
        self.max_indices
    }

    /// Starts a batch.
    ///
    /// # Errors
    ///
    /// [`RenderError::BatchAlreadyBegun`] if a batch is in progress; the
    /// batch is left untouched.
    pub fn begin<T: BatchTarget>(&mut self, target: &mut T) -> RenderResult<()> {
        if self.has_begun {
            warn!("Batch already in progress");
            return Err(RenderError::BatchAlreadyBegun);
        }

        target.begin_recording()?;
        self.clear();
        self.has_begun = true;
        Ok(())
    }

    /// Ends the batch, flushing pending geometry. Recording is always
    /// closed and the batch left empty.
    ///
    /// If the swapchain turns out stale at acquire time the frame is
    /// skipped: its geometry is dropped and the swapchain recreated.
    ///
    /// # Errors
    ///
    /// [`RenderError::BatchNotBegun`] if no batch is in progress.
    pub fn end<T: BatchTarget>(&mut self, target: &mut T) -> RenderResult<()> {
        if !self.has_begun {
            warn!("No batch in progress");
            return Err(RenderError::BatchNotBegun);
        }

        if !self.vertices.is_empty() {
            self.submit_pending(target, false)?;
        }

        if self.has_begun {
            target.end_recording()?;
            self.has_begun = false;
            if !self.vertices.is_empty() {
                debug!(
                    "Skipping frame of {} vertices on stale swapchain",
                    self.vertices.len()
                );
                self.clear();
                target.recreate()?;
            }
        }
        Ok(())
    }

    /// Submits pending geometry. A no-op for an empty batch.
    ///
    /// If a resize is pending the geometry is dropped instead: recording is
    /// closed, the target recreates its swapchain, and a fresh batch is
    /// begun so subsequent draws in this frame still land somewhere.
    pub fn flush<T: BatchTarget>(&mut self, target: &mut T) -> RenderResult<()> {
        if self.vertices.is_empty() {
            return Ok(());
        }
        self.submit_pending(target, true)
    }

    fn submit_pending<T: BatchTarget>(
        &mut self,
        target: &mut T,
        rebegin_after_resize: bool,
    ) -> RenderResult<()> {
        if target.resize_pending() {
            if self.has_begun {
                target.end_recording()?;
                self.has_begun = false;
            }
            debug!(
                "Dropping {} pending vertices for swapchain recreation",
                self.vertices.len()
            );
            target.recreate()?;
            self.clear();
            if rebegin_after_resize {
                self.begin(target)?;
            }
            return Ok(());
        }

        match target.submit(&self.vertices, &self.indices)? {
            SubmitOutcome::Presented => {
                trace!(
                    "Flushed batch: {} vertices, {} indices",
                    self.vertices.len(),
                    self.indices.len()
                );
                self.clear();
                self.has_begun = false;
            }
            SubmitOutcome::Stale => {
                debug!("Swapchain stale at acquire; keeping batch for the next flush");
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    fn would_overflow(&self, vertex_count: usize, index_count: usize) -> bool {
        self.vertices.len() + vertex_count > self.max_vertices
            || self.indices.len() + index_count > self.max_indices
    }

    /// Makes room for a primitive, beginning or flushing as needed. Returns
    /// `false` if the primitive can never fit in a batch.
    fn reserve<T: BatchTarget>(
        &mut self,
        target: &mut T,
        vertex_count: usize,
        index_count: usize,
    ) -> RenderResult<bool> {
        if vertex_count > self.max_vertices || index_count > self.max_indices {
            warn!(
                "Primitive with {} vertices / {} indices exceeds batch capacity",
                vertex_count, index_count
            );
            return Ok(false);
        }

        if !self.has_begun {
            self.begin(target)?;
        }

        if self.would_overflow(vertex_count, index_count) {
            self.flush(target)?;
            // A stale acquire keeps the geometry and flags a resize; the
            // second flush takes the recreation path.
            if self.would_overflow(vertex_count, index_count) {
                self.flush(target)?;
            }
            if self.would_overflow(vertex_count, index_count) {
                warn!("Could not drain batch; dropping pending geometry");
                self.clear();
            }
            if !self.has_begun {
                self.begin(target)?;
            }
        }
        Ok(true)
    }

    fn push_quad(&mut self, corners: [Vertex2D; 4]) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&corners);
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    pub fn draw_triangle<T: BatchTarget>(
        &mut self,
        target: &mut T,
        p1: Vec2,
        p2: Vec2,
        p3: Vec2,
        color: Vec4,
    ) -> RenderResult<()> {
        if !self.reserve(target, 3, 3)? {
            return Ok(());
        }
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[
            Vertex2D::untextured(p1, color, Vec2::new(0.0, 0.0)),
            Vertex2D::untextured(p2, color, Vec2::new(1.0, 0.0)),
            Vertex2D::untextured(p3, color, Vec2::new(0.5, 1.0)),
        ]);
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
        Ok(())
    }

    /// Two triangles `(p1, p2, p3)` and `(p1, p3, p4)`.
    pub fn draw_quad<T: BatchTarget>(
        &mut self,
        target: &mut T,
        p1: Vec2,
        p2: Vec2,
        p3: Vec2,
        p4: Vec2,
        color: Vec4,
    ) -> RenderResult<()> {
        self.draw_gradient_quad(target, [p1, p2, p3, p4], [color; 4])
    }

    pub fn draw_rectangle<T: BatchTarget>(
        &mut self,
        target: &mut T,
        pos: Vec2,
        size: Vec2,
        color: Vec4,
    ) -> RenderResult<()> {
        self.draw_quad(
            target,
            pos,
            Vec2::new(pos.x + size.x, pos.y),
            pos + size,
            Vec2::new(pos.x, pos.y + size.y),
            color,
        )
    }

    /// Rectangle with one color per corner. Corners are named for a y-up
    /// layout: `bl` is at `pos`, `tr` at `pos + size`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_gradient_rectangle<T: BatchTarget>(
        &mut self,
        target: &mut T,
        pos: Vec2,
        size: Vec2,
        bl: Vec4,
        br: Vec4,
        tr: Vec4,
        tl: Vec4,
    ) -> RenderResult<()> {
        let corners = [
            pos,
            Vec2::new(pos.x + size.x, pos.y),
            pos + size,
            Vec2::new(pos.x, pos.y + size.y),
        ];
        self.draw_gradient_quad(target, corners, [bl, br, tr, tl])
    }

    fn draw_gradient_quad<T: BatchTarget>(
        &mut self,
        target: &mut T,
        corners: [Vec2; 4],
        colors: [Vec4; 4],
    ) -> RenderResult<()> {
        if !self.reserve(target, 4, 6)? {
            return Ok(());
        }
        let uvs = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        self.push_quad(std::array::from_fn(|i| {
            Vertex2D::untextured(corners[i], colors[i], uvs[i])
        }));
        Ok(())
    }

    /// Rectangle with circular corners: a center column, two side strips
    /// and a triangle fan per corner. `radius` is clamped to half the
    /// shorter side and `segments` (for the whole outline) to at least 4.
    pub fn draw_rounded_rectangle<T: BatchTarget>(
        &mut self,
        target: &mut T,
        pos: Vec2,
        size: Vec2,
        radius: f32,
        color: Vec4,
        segments: u32,
    ) -> RenderResult<()> {
        let segments = segments.max(4);
        let r = radius.min(size.x.min(size.y) * 0.5);
        let (x, y, w, h) = (pos.x, pos.y, size.x, size.y);

        self.draw_rectangle(target, Vec2::new(x + r, y), Vec2::new(w - 2.0 * r, h), color)?;
        self.draw_rectangle(target, Vec2::new(x, y + r), Vec2::new(r, h - 2.0 * r), color)?;
        self.draw_rectangle(
            target,
            Vec2::new(x + w - r, y + r),
            Vec2::new(r, h - 2.0 * r),
            color,
        )?;

        let per_corner = segments / 4;
        let step = FRAC_PI_2 / per_corner as f32;
        let corners = [
            (Vec2::new(x + r, y + r), PI),
            (Vec2::new(x + w - r, y + r), 1.5 * PI),
            (Vec2::new(x + w - r, y + h - r), 0.0),
            (Vec2::new(x + r, y + h - r), FRAC_PI_2),
        ];
        for (center, start) in corners {
            for i in 0..per_corner {
                let a0 = start + i as f32 * step;
                let a1 = start + (i + 1) as f32 * step;
                self.draw_triangle(
                    target,
                    center,
                    center + r * Vec2::new(a0.cos(), a0.sin()),
                    center + r * Vec2::new(a1.cos(), a1.sin()),
                    color,
                )?;
            }
        }
        Ok(())
    }

    /// Triangle fan around `center`, at least 3 segments.
    pub fn draw_circle<T: BatchTarget>(
        &mut self,
        target: &mut T,
        center: Vec2,
        radius: f32,
        color: Vec4,
        segments: u32,
    ) -> RenderResult<()> {
        let segments = segments.max(3);
        let rim: Vec<Vec2> = (0..segments)
            .map(|i| {
                let angle = i as f32 * (TAU / segments as f32);
                center + radius * Vec2::new(angle.cos(), angle.sin())
            })
            .collect();

        for i in 0..rim.len() {
            let next = (i + 1) % rim.len();
            self.draw_triangle(target, center, rim[i], rim[next], color)?;
        }
        Ok(())
    }

    /// Quad of width `thickness` centered on the segment `start`-`end`.
    pub fn draw_line<T: BatchTarget>(
        &mut self,
        target: &mut T,
        start: Vec2,
        end: Vec2,
        thickness: f32,
        color: Vec4,
    ) -> RenderResult<()> {
        let delta = end - start;
        let dir = if delta.length() > 0.0 {
            delta.normalize()
        } else {
            delta
        };
        let offset = Vec2::new(-dir.y, dir.x) * (thickness * 0.5);

        self.draw_quad(
            target,
            start + offset,
            end + offset,
            end - offset,
            start - offset,
            color,
        )
    }

    /// Axis-aligned quad sampling `uv0..uv1` from the texture bound at
    /// `sampler_id`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_textured_quad<T: BatchTarget>(
        &mut self,
        target: &mut T,
        pos: Vec2,
        size: Vec2,
        uv0: Vec2,
        uv1: Vec2,
        color: Vec4,
        sampler_id: i32,
    ) -> RenderResult<()> {
        if !self.reserve(target, 4, 6)? {
            return Ok(());
        }
        self.push_quad([
            Vertex2D::new(pos, color, uv0, sampler_id),
            Vertex2D::new(
                Vec2::new(pos.x + size.x, pos.y),
                color,
                Vec2::new(uv1.x, uv0.y),
                sampler_id,
            ),
            Vertex2D::new(pos + size, color, uv1, sampler_id),
            Vertex2D::new(
                Vec2::new(pos.x, pos.y + size.y),
                color,
                Vec2::new(uv0.x, uv1.y),
                sampler_id,
            ),
        ]);
        Ok(())
    }
}

/// Whether `vertex` is drawn with its color only.
#[inline]
pub fn is_untextured(vertex: &Vertex2D) -> bool {
    vertex.sampler_id == UNTEXTURED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingTarget {
        begins: usize,
        ends: usize,
        submits: Vec<(usize, usize)>,
        recreates: usize,
        resize_pending: bool,
        stale_next: bool,
        // Zero-sized framebuffer: recreation is deferred and the flag kept.
        minimized: bool,
    }

    impl BatchTarget for RecordingTarget {
        fn begin_recording(&mut self) -> RenderResult<()> {
            self.begins += 1;
            Ok(())
        }

        fn end_recording(&mut self) -> RenderResult<()> {
            self.ends += 1;
            Ok(())
        }

        fn resize_pending(&self) -> bool {
            self.resize_pending
        }

        fn recreate(&mut self) -> RenderResult<()> {
            if self.minimized {
                return Ok(());
            }
            self.recreates += 1;
            self.resize_pending = false;
            Ok(())
        }

        fn submit(
            &mut self,
            vertices: &[Vertex2D],
            indices: &[u32],
        ) -> RenderResult<SubmitOutcome> {
            if self.stale_next {
                self.stale_next = false;
                self.resize_pending = true;
                return Ok(SubmitOutcome::Stale);
            }
            self.submits.push((vertices.len(), indices.len()));
            Ok(SubmitOutcome::Presented)
        }
    }

    const WHITE: Vec4 = Vec4::ONE;

    #[test]
    fn rectangle_emits_one_quad() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::splat(10.0), WHITE)
            .unwrap();

        assert!(batch.has_begun());
        assert_eq!(batch.vertex_count(), 4);
        assert_eq!(batch.indices(), &[0, 1, 2, 0, 2, 3]);
        let positions: Vec<Vec2> = batch.vertices().iter().map(|v| v.position()).collect();
        assert_eq!(
            positions,
            vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(10.0, 0.0),
                Vec2::new(10.0, 10.0),
                Vec2::new(0.0, 10.0)
            ]
        );
        assert!(batch.vertices().iter().all(is_untextured));
    }

    #[test]
    fn triangle_uvs_and_indices() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_triangle(
                &mut target,
                Vec2::new(0.0, 0.0),
                Vec2::new(4.0, 0.0),
                Vec2::new(2.0, 3.0),
                WHITE,
            )
            .unwrap();
        let uvs: Vec<Vec2> = batch.vertices().iter().map(|v| v.tex_coord()).collect();
        assert_eq!(
            uvs,
            vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.5, 1.0)]
        );
        assert_eq!(batch.indices(), &[0, 1, 2]);
    }

    #[test]
    fn end_flushes_once() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch.begin(&mut target).unwrap();
        for i in 0..100 {
            batch
                .draw_rectangle(&mut target, Vec2::splat(i as f32), Vec2::ONE, WHITE)
                .unwrap();
        }
        batch.end(&mut target).unwrap();

        assert_eq!(target.submits, vec![(400, 600)]);
        assert!(!batch.has_begun());
        assert_eq!(batch.vertex_count(), 0);
    }

    #[test]
    fn empty_end_closes_recording() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch.begin(&mut target).unwrap();
        batch.end(&mut target).unwrap();
        assert!(target.submits.is_empty());
        assert_eq!(target.ends, 1);
    }

    #[test]
    fn double_begin_is_rejected() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch.begin(&mut target).unwrap();
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();

        let err = batch.begin(&mut target).unwrap_err();
        assert!(matches!(err, RenderError::BatchAlreadyBegun));
        assert_eq!(batch.vertex_count(), 4);
        assert_eq!(target.begins, 1);
    }

    #[test]
    fn end_without_begin_is_rejected() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        assert!(matches!(
            batch.end(&mut target),
            Err(RenderError::BatchNotBegun)
        ));
    }

    #[test]
    fn flush_of_empty_batch_is_noop() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch.flush(&mut target).unwrap();
        assert!(target.submits.is_empty());
        assert_eq!(target.begins, 0);
    }

    #[test]
    fn overflow_flushes_before_the_overflowing_call() {
        let mut target = RecordingTarget::default();
        // Room for exactly two quads.
        let mut batch = Batch::with_capacity(8, 12);
        for _ in 0..3 {
            batch
                .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
                .unwrap();
        }

        assert_eq!(target.submits, vec![(8, 12)]);
        assert_eq!(batch.vertex_count(), 4);
        assert_eq!(batch.indices(), &[0, 1, 2, 0, 2, 3]);
        assert!(batch.has_begun());
        assert_eq!(target.begins, 2);
    }

    #[test]
    fn index_bound_also_triggers_flush() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::with_capacity(100, 9);
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        batch
            .draw_triangle(&mut target, Vec2::ZERO, Vec2::X, Vec2::Y, WHITE)
            .unwrap();
        assert!(target.submits.is_empty());
        batch
            .draw_triangle(&mut target, Vec2::ZERO, Vec2::X, Vec2::Y, WHITE)
            .unwrap();
        assert_eq!(target.submits, vec![(7, 9)]);
        assert_eq!(batch.index_count(), 3);
    }

    #[test]
    fn resize_drops_pending_geometry_and_rebegins() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        target.resize_pending = true;

        batch.flush(&mut target).unwrap();
        assert_eq!(target.recreates, 1);
        assert_eq!(target.ends, 1);
        assert!(target.submits.is_empty());
        assert_eq!(batch.vertex_count(), 0);
        assert_eq!(batch.index_count(), 0);
        assert!(batch.has_begun());

        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        batch.end(&mut target).unwrap();
        assert_eq!(target.submits, vec![(4, 6)]);
    }

    #[test]
    fn stale_acquire_keeps_geometry() {
        let mut target = RecordingTarget {
            stale_next: true,
            ..Default::default()
        };
        let mut batch = Batch::new();
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        batch.flush(&mut target).unwrap();

        assert_eq!(batch.vertex_count(), 4);
        assert!(target.resize_pending);

        batch.flush(&mut target).unwrap();
        assert_eq!(target.recreates, 1);
        assert_eq!(batch.vertex_count(), 0);
    }

    #[test]
    fn stale_acquire_at_end_skips_the_frame() {
        let mut target = RecordingTarget {
            stale_next: true,
            ..Default::default()
        };
        let mut batch = Batch::new();
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        batch.end(&mut target).unwrap();

        assert!(!batch.has_begun());
        assert_eq!(batch.vertex_count(), 0);
        assert_eq!(batch.index_count(), 0);
        assert_eq!(target.begins, target.ends);
        assert!(target.submits.is_empty());
        assert_eq!(target.recreates, 1);
        assert!(!target.resize_pending);

        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        batch.end(&mut target).unwrap();
        assert_eq!(target.submits, vec![(4, 6)]);
    }

    #[test]
    fn resize_at_end_closes_recording_without_rebegin() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        target.resize_pending = true;

        batch.end(&mut target).unwrap();
        assert_eq!(target.begins, 1);
        assert_eq!(target.ends, 1);
        assert_eq!(target.recreates, 1);
        assert!(!batch.has_begun());
        assert_eq!(batch.vertex_count(), 0);
        assert!(target.submits.is_empty());

        // The next frame starts cleanly.
        batch.begin(&mut target).unwrap();
        assert_eq!(target.begins, 2);
    }

    #[test]
    fn minimized_window_keeps_resize_pending() {
        let mut target = RecordingTarget {
            resize_pending: true,
            minimized: true,
            ..Default::default()
        };
        let mut batch = Batch::new();
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        batch.flush(&mut target).unwrap();

        assert!(target.resize_pending);
        assert_eq!(target.recreates, 0);
        assert!(target.submits.is_empty());
        assert_eq!(batch.vertex_count(), 0);
        assert!(batch.has_begun());

        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        batch.end(&mut target).unwrap();
        assert!(target.resize_pending);
        assert_eq!(target.begins, target.ends);

        // Restored: the next frame recreates, then draws.
        target.minimized = false;
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        batch.flush(&mut target).unwrap();
        assert_eq!(target.recreates, 1);
        assert!(!target.resize_pending);
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        batch.end(&mut target).unwrap();
        assert_eq!(target.submits, vec![(4, 6)]);
    }

    #[test]
    fn oversized_primitive_is_skipped() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::with_capacity(3, 12);
        batch
            .draw_rectangle(&mut target, Vec2::ZERO, Vec2::ONE, WHITE)
            .unwrap();
        assert_eq!(batch.vertex_count(), 0);
        assert!(!batch.has_begun());
        assert!(target.submits.is_empty());

        // Triangles still fit.
        batch
            .draw_triangle(&mut target, Vec2::ZERO, Vec2::X, Vec2::Y, WHITE)
            .unwrap();
        assert_eq!(batch.vertex_count(), 3);
    }

    #[test]
    fn gradient_colors_follow_corners() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        let (bl, br, tr, tl) = (Vec4::X, Vec4::Y, Vec4::Z, Vec4::W);
        batch
            .draw_gradient_rectangle(
                &mut target,
                Vec2::new(200.0, 200.0),
                Vec2::splat(400.0),
                bl,
                br,
                tr,
                tl,
            )
            .unwrap();
        let colors: Vec<Vec4> = batch.vertices().iter().map(|v| v.color()).collect();
        assert_eq!(colors, vec![bl, br, tr, tl]);
        assert_eq!(batch.vertices()[2].position(), Vec2::new(600.0, 600.0));
    }

    #[test]
    fn circle_is_a_fan() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_circle(&mut target, Vec2::new(50.0, 50.0), 10.0, WHITE, 32)
            .unwrap();
        assert_eq!(batch.vertex_count(), 32 * 3);
        for tri in batch.vertices().chunks(3) {
            assert_eq!(tri[0].position(), Vec2::new(50.0, 50.0));
            assert!((tri[1].position().distance(Vec2::new(50.0, 50.0)) - 10.0).abs() < 1e-4);
        }
        // Last triangle closes onto the first rim point.
        let last = &batch.vertices()[31 * 3..];
        assert!((last[2].position() - batch.vertices()[1].position()).length() < 1e-4);
    }

    #[test]
    fn circle_segments_clamped() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_circle(&mut target, Vec2::ZERO, 1.0, WHITE, 1)
            .unwrap();
        assert_eq!(batch.vertex_count(), 9);
    }

    #[test]
    fn rounded_rectangle_geometry() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_rounded_rectangle(
                &mut target,
                Vec2::ZERO,
                Vec2::splat(100.0),
                20.0,
                WHITE,
                128,
            )
            .unwrap();
        // 3 rectangles + 4 corners x 32 fan triangles.
        assert_eq!(batch.vertex_count(), 3 * 4 + 4 * 32 * 3);
        assert_eq!(batch.index_count(), 3 * 6 + 4 * 32 * 3);

        // Center column spans the full height.
        let column: Vec<Vec2> = batch.vertices()[..4].iter().map(|v| v.position()).collect();
        assert_eq!(column[0], Vec2::new(20.0, 0.0));
        assert_eq!(column[2], Vec2::new(80.0, 100.0));

        // Top-left fan starts at angle pi, i.e. on the left edge.
        let fan = &batch.vertices()[12..15];
        assert_eq!(fan[0].position(), Vec2::new(20.0, 20.0));
        assert!((fan[1].position() - Vec2::new(0.0, 20.0)).length() < 1e-4);
    }

    #[test]
    fn rounded_rectangle_clamps_radius_and_segments() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_rounded_rectangle(
                &mut target,
                Vec2::ZERO,
                Vec2::new(40.0, 10.0),
                50.0,
                WHITE,
                1,
            )
            .unwrap();
        // segments -> 4, one triangle per corner.
        assert_eq!(batch.vertex_count(), 3 * 4 + 4 * 3);
        // radius -> 5: center column starts at x = 5.
        assert_eq!(batch.vertices()[0].position(), Vec2::new(5.0, 0.0));
    }

    #[test]
    fn line_is_offset_perpendicular() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_line(
                &mut target,
                Vec2::new(0.0, 0.0),
                Vec2::new(10.0, 0.0),
                2.0,
                WHITE,
            )
            .unwrap();
        let positions: Vec<Vec2> = batch.vertices().iter().map(|v| v.position()).collect();
        assert_eq!(
            positions,
            vec![
                Vec2::new(0.0, 1.0),
                Vec2::new(10.0, 1.0),
                Vec2::new(10.0, -1.0),
                Vec2::new(0.0, -1.0)
            ]
        );
    }

    #[test]
    fn zero_length_line_degenerates() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_line(&mut target, Vec2::splat(3.0), Vec2::splat(3.0), 4.0, WHITE)
            .unwrap();
        assert!(
            batch
                .vertices()
                .iter()
                .all(|v| v.position() == Vec2::splat(3.0))
        );
    }

    #[test]
    fn textured_quad_maps_uv_corners() {
        let mut target = RecordingTarget::default();
        let mut batch = Batch::new();
        batch
            .draw_textured_quad(
                &mut target,
                Vec2::new(10.0, 20.0),
                Vec2::new(30.0, 40.0),
                Vec2::new(0.25, 0.5),
                Vec2::new(0.75, 1.0),
                WHITE,
                3,
            )
            .unwrap();
        let uvs: Vec<Vec2> = batch.vertices().iter().map(|v| v.tex_coord()).collect();
        assert_eq!(
            uvs,
            vec![
                Vec2::new(0.25, 0.5),
                Vec2::new(0.75, 0.5),
                Vec2::new(0.75, 1.0),
                Vec2::new(0.25, 1.0)
            ]
        );
        assert!(batch.vertices().iter().all(|v| v.sampler_id == 3));
        assert_eq!(batch.vertices()[2].position(), Vec2::new(40.0, 60.0));
    }
}
