//! Engine configuration.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Startup configuration for the canvas engine and its window.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Initial window width in physical pixels.
    pub width: u32,
    /// Initial window height in physical pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
    /// Enable the Khronos validation layer and debug messenger.
    pub validation: bool,
    /// Directory holding `batch.vert.spv` and `batch.frag.spv`.
    pub shader_dir: PathBuf,
    /// Color the render pass clears to, as linear RGBA.
    pub clear_color: [f32; 4],
    /// Prefer FIFO presentation over mailbox.
    pub vsync: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Canvas".to_string(),
            validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from("shaders/spirv"),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation = enabled;
        self
    }

    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Overlays `CANVAS_VALIDATION`, `CANVAS_SHADER_DIR` and `CANVAS_VSYNC`
    /// from the process environment.
    pub fn from_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("CANVAS_VALIDATION") {
            match parse_flag(&value) {
                Some(flag) => self.validation = flag,
                None => tracing::warn!("Ignoring CANVAS_VALIDATION={value:?}"),
            }
        }
        if let Some(dir) = lookup("CANVAS_SHADER_DIR")
            && !dir.is_empty()
        {
            self.shader_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("CANVAS_VSYNC") {
            match parse_flag(&value) {
                Some(flag) => self.vsync = flag,
                None => tracing::warn!("Ignoring CANVAS_VSYNC={value:?}"),
            }
        }
        self
    }

    /// Rejects configurations that cannot produce a usable window.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window size must be nonzero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.title.trim().is_empty() {
            return Err(Error::Config("window title must not be empty".into()));
        }
        Ok(())
    }

    pub fn vertex_shader_path(&self) -> PathBuf {
        self.shader_dir.join("batch.vert.spv")
    }

    pub fn fragment_shader_path(&self) -> PathBuf {
        self.shader_dir.join("batch.frag.spv")
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn zero_size_is_rejected() {
        let config = EngineConfig::new().with_size(0, 600);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn empty_title_is_rejected() {
        let config = EngineConfig::new().with_title("   ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("CANVAS_VALIDATION", "0"),
            ("CANVAS_SHADER_DIR", "/tmp/spv"),
            ("CANVAS_VSYNC", "yes"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::new()
            .with_validation(true)
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert!(!config.validation);
        assert!(config.vsync);
        assert_eq!(
            config.vertex_shader_path(),
            PathBuf::from("/tmp/spv/batch.vert.spv")
        );
    }

    #[test]
    fn malformed_flags_are_ignored() {
        let config = EngineConfig::new()
            .with_vsync(true)
            .apply_overrides(|key| (key == "CANVAS_VSYNC").then(|| "maybe".to_string()));
        assert!(config.vsync);
    }
}
