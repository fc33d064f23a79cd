//! Renderer error type.

use canvas_rhi::RhiError;
use thiserror::Error;

use crate::texture_registry::TextureHandle;

/// Errors reported by the canvas renderer.
///
/// Two tiers: [`RenderError::is_recoverable`] separates usage mistakes and
/// stale-swapchain results, which callers may log and continue past, from
/// setup and device failures that should end the program.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Rhi(#[from] RhiError),

    #[error(transparent)]
    Core(#[from] canvas_core::Error),

    /// The texture registry already holds its maximum number of textures.
    #[error("Texture registry is full ({capacity} textures)")]
    TextureCapacity { capacity: usize },

    #[error("Unknown or unloaded texture handle {0}")]
    InvalidTexture(TextureHandle),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Batch already begun")]
    BatchAlreadyBegun,

    #[error("No batch in progress")]
    BatchNotBegun,
}

impl RenderError {
    /// Returns `true` for errors the frame loop can continue past.
    pub fn is_recoverable(&self) -> bool {
        match self {
            RenderError::BatchAlreadyBegun
            | RenderError::BatchNotBegun
            | RenderError::TextureCapacity { .. }
            | RenderError::InvalidTexture(_) => true,
            RenderError::Rhi(err) => err.is_out_of_date(),
            _ => false,
        }
    }
}

/// Result alias for renderer operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_rhi::vk;

    #[test]
    fn usage_errors_are_recoverable() {
        assert!(RenderError::BatchAlreadyBegun.is_recoverable());
        assert!(RenderError::BatchNotBegun.is_recoverable());
        assert!(RenderError::TextureCapacity { capacity: 10 }.is_recoverable());
        assert!(RenderError::InvalidTexture(TextureHandle::new(3)).is_recoverable());
    }

    #[test]
    fn stale_swapchain_is_recoverable() {
        let err: RenderError = RhiError::from(vk::Result::ERROR_OUT_OF_DATE_KHR).into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn device_failures_are_fatal() {
        let err: RenderError = RhiError::from(vk::Result::ERROR_DEVICE_LOST).into();
        assert!(!err.is_recoverable());
        assert!(!RenderError::Font("bad table".into()).is_recoverable());
        let err: RenderError = canvas_core::Error::Config("zero width".into()).into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn messages() {
        assert_eq!(
            RenderError::TextureCapacity { capacity: 10 }.to_string(),
            "Texture registry is full (10 textures)"
        );
        assert_eq!(
            RenderError::InvalidTexture(TextureHandle::new(7)).to_string(),
            "Unknown or unloaded texture handle 7"
        );
    }
}
