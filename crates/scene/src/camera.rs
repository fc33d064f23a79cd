//! Orthographic 2D camera.
//!
//! World units are pixels: the origin sits at the top-left of the window
//! and +y points down.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Lower bound for [`Camera2D::zoom`].
pub const MIN_ZOOM: f32 = 0.1;
/// Upper bound for [`Camera2D::zoom`].
pub const MAX_ZOOM: f32 = 10.0;

/// Orthographic bounds plus a zoom factor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera2D {
    pub zoom: f32,
    pub near: f32,
    pub far: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    width: f32,
    height: f32,
}

impl Camera2D {
    /// Camera covering a `width` x `height` pixel surface at zoom 1.
    pub fn new(width: f32, height: f32) -> Self {
        let mut camera = Self {
            zoom: 1.0,
            near: -1.0,
            far: 1.0,
            left: 0.0,
            right: 0.0,
            top: 0.0,
            bottom: 0.0,
            width,
            height,
        };
        camera.update(width, height);
        camera
    }

    /// Resets the bounds to `[0, width] x [0, height]`. Zoom is kept.
    pub fn update(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.left = 0.0;
        self.right = width;
        self.top = 0.0;
        self.bottom = height;
    }

    /// Multiplies the zoom by `factor`, clamped to `[MIN_ZOOM, MAX_ZOOM]`,
    /// then refreshes the bounds for the current size.
    pub fn zoom(&mut self, factor: f32) {
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.update(self.width, self.height);
        tracing::trace!("Camera zoom now {:.3}", self.zoom);
    }

    /// Applies a mouse-wheel step: scrolling up zooms by 0.9, down by 1.1.
    pub fn on_scroll(&mut self, delta_y: f32) {
        if delta_y > 0.0 {
            self.zoom(0.9);
        } else if delta_y < 0.0 {
            self.zoom(1.1);
        }
    }

    /// Orthographic projection for the current bounds, mapping `top` to
    /// clip-space -1 and `bottom` to +1.
    pub fn projection(&self) -> Mat4 {
        let (l, r, t, b, n, f) = (
            self.left, self.right, self.top, self.bottom, self.near, self.far,
        );
        Mat4::from_cols(
            Vec4::new(2.0 / (r - l), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / (b - t), 0.0, 0.0),
            Vec4::new(0.0, 0.0, -2.0 / (f - n), 0.0),
            Vec4::new(
                -(r + l) / (r - l),
                -(b + t) / (b - t),
                -(f + n) / (f - n),
                1.0,
            ),
        )
    }
}

/// Uniform block at binding 0 of the batch pipeline.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl CameraUniform {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Identity model and view with the camera's projection.
    pub fn from_camera(camera: &Camera2D) -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            proj: camera.projection(),
        }
    }
}
