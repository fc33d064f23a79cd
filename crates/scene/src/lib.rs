//! Scene state for the canvas renderer.
//!
//! Currently a single orthographic [`Camera2D`] and the uniform block it
//! produces for the batch pipeline.

pub mod camera;

pub use camera::{Camera2D, CameraUniform, MAX_ZOOM, MIN_ZOOM};
