//! Error types shared across the canvas crates.

use thiserror::Error;

/// Top-level error type for setup and platform failures.
///
/// Everything reported through this type belongs to the fatal tier: the
/// caller has no defined recovery and is expected to log and exit.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or surface errors
    #[error("Window error: {0}")]
    Window(String),

    /// Texture, font or image loading errors
    #[error("Resource error: {0}")]
    Resource(String),

    /// Shader module loading errors
    #[error("Shader error: {0}")]
    Shader(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid engine configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the core [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.spv");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("missing.spv"));
    }

    #[test]
    fn display_includes_category() {
        let err = Error::Config("width must be nonzero".into());
        assert_eq!(err.to_string(), "Config error: width must be nonzero");
    }
}
