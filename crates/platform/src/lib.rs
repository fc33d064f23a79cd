//! Platform layer for the canvas renderer.
//!
//! - Window creation via winit
//! - Vulkan surface creation and required instance extensions
//! - Keyboard, mouse and scroll input state

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{FramebufferSize, Surface, Window, required_extensions};

pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
