//! Canvas demo.
//!
//! Draws a large rectangle grid plus one of every primitive each frame, with
//! an FPS label and a circle following the cursor. Textures and the font are
//! loaded from `assets/` when present.

use std::path::Path;

use anyhow::Result;
use glam::{Vec2, Vec4};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event_loop::ControlFlow;
use winit::window::WindowId;

use canvas_core::{EngineConfig, Timer};
use canvas_platform::{ActiveEventLoop, EventLoop, InputState, KeyCode, WindowEvent};
use canvas_renderer::{Canvas, Font, RenderError, RenderResult, TextureHandle};

// 320 * 320 quads need 614,400 indices, past one batch, so each frame
// flushes mid-grid.
const GRID_SIZE: i32 = 320;
const CELL_SIZE: f32 = 64.0;
const FONT_SIZE: f32 = 90.0;
const LABEL_SIZE: f32 = 32.0;

const TEXTURE_PATHS: [&str; 2] = ["assets/textures/uv.jpg", "assets/textures/logo.png"];
const FONT_PATH: &str = "assets/fonts/font.ttf";

struct App {
    config: EngineConfig,
    canvas: Option<Canvas>,
    font: Option<Font>,
    textures: Vec<TextureHandle>,
    input: InputState,
    timer: Timer,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            canvas: None,
            font: None,
            textures: Vec::new(),
            input: InputState::new(),
            timer: Timer::new(),
        }
    }

    fn load_assets(&mut self) {
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };

        for path in TEXTURE_PATHS {
            if !Path::new(path).exists() {
                warn!("Texture {} not found, skipping", path);
                continue;
            }
            match canvas.load_texture(path) {
                Ok(handle) => self.textures.push(handle),
                Err(e) => warn!("Failed to load texture {}: {}", path, e),
            }
        }

        if Path::new(FONT_PATH).exists() {
            match canvas.load_font(FONT_PATH, FONT_SIZE) {
                Ok(font) => self.font = Some(font),
                Err(e) => warn!("Failed to load font {}: {}", FONT_PATH, e),
            }
        } else {
            warn!("Font {} not found, FPS label disabled", FONT_PATH);
        }
    }

    fn draw_frame(&mut self) -> RenderResult<()> {
        let Some(canvas) = self.canvas.as_mut() else {
            return Ok(());
        };

        let extent = canvas.context().extent();
        let screen = Vec2::new(extent.width as f32, extent.height as f32);

        canvas.begin_batch()?;

        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                let pos = Vec2::new(x as f32, y as f32) * CELL_SIZE;
                let color = Vec4::new(1.0, (x + y) as f32 / 20.0, 1.0, 1.0);
                canvas.draw_rectangle(pos, Vec2::splat(CELL_SIZE), color)?;
            }
        }

        canvas.draw_triangle(
            Vec2::new(screen.x * 0.5, 0.0),
            screen,
            Vec2::new(0.0, screen.y),
            Vec4::new(1.0, 1.0, 0.0, 1.0),
        )?;

        let size = Vec2::splat(100.0);
        canvas.draw_rounded_rectangle(
            Vec2::new((screen.x - size.x) * 0.5, 100.0),
            size,
            20.0,
            Vec4::new(0.9, 0.6, 0.3, 0.8),
            128,
        )?;

        canvas.draw_gradient_rectangle(
            Vec2::splat(200.0),
            Vec2::splat(400.0),
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::new(0.0, 1.0, 0.0, 1.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            Vec4::new(0.0, 0.0, 1.0, 1.0),
        )?;

        // First texture in the bottom-right corner, second in the bottom-left.
        for (i, &texture) in self.textures.iter().enumerate() {
            let Some((w, h)) = canvas.context().textures().dimensions(texture) else {
                continue;
            };
            let dims = Vec2::new(w as f32, h as f32);
            let x = if i == 0 { screen.x - (dims.x + 20.0) } else { 20.0 };
            let pos = Vec2::new(x, screen.y - (dims.y + 20.0));
            canvas.draw_texture(pos, texture, 1.0, Vec4::ONE)?;
        }

        if let Some(font) = &self.font {
            let label = self.timer.stats_line();
            let pos = Vec2::new(20.0, 10.0);
            let bg_size = Vec2::new(
                canvas.measure_text_width(font, &label, LABEL_SIZE) + 20.0,
                canvas.measure_text_height(font, &label, LABEL_SIZE),
            );
            canvas.draw_rounded_rectangle(
                Vec2::new(pos.x - 10.0, pos.y),
                bg_size,
                20.0,
                Vec4::new(0.0, 0.0, 0.0, 0.8),
                128,
            )?;
            canvas.draw_text(font, &label, pos, LABEL_SIZE, Vec4::new(0.0, 0.0, 0.0, 1.0))?;
            canvas.draw_text(
                font,
                &label,
                pos + Vec2::splat(2.0),
                LABEL_SIZE,
                Vec4::new(0.0, 1.0, 0.0, 1.0),
            )?;
        }

        let (mx, my) = self.input.cursor_position();
        canvas.draw_circle(Vec2::new(mx, my), 10.0, Vec4::new(1.0, 0.0, 0.0, 1.0), 32)?;

        canvas.draw_line(
            Vec2::new(0.0, screen.y * 0.5),
            Vec2::new(screen.x, screen.y * 0.5),
            4.0,
            Vec4::new(0.2, 0.8, 1.0, 1.0),
        )?;

        canvas.end_batch()
    }
}

/// Logs `err`; returns `false` if the loop should stop.
fn keep_running(err: &RenderError) -> bool {
    if err.is_recoverable() {
        warn!("Frame error: {}", err);
        true
    } else {
        error!("Render error: {:?}", err);
        false
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.canvas.is_some() {
            return;
        }
        match Canvas::new(event_loop, &self.config) {
            Ok(canvas) => {
                self.canvas = Some(canvas);
                self.load_assets();
                info!("Initialization complete, entering main loop");
            }
            Err(e) => {
                error!("Failed to create canvas: {:?}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(canvas) = self.canvas.as_mut() {
                    canvas.on_resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if self.input.is_key_pressed(KeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                self.timer.tick();
                let (_, scroll) = self.input.scroll_delta();
                if scroll != 0.0
                    && let Some(canvas) = self.canvas.as_mut()
                    && let Err(e) = canvas.on_scroll(scroll)
                    && !keep_running(&e)
                {
                    event_loop.exit();
                    return;
                }
                if let Err(e) = self.draw_frame()
                    && !keep_running(&e)
                {
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.input.begin_frame();
        if let Some(canvas) = &self.canvas {
            canvas.window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let (Some(canvas), Some(font)) = (self.canvas.as_mut(), self.font.take())
            && let Err(e) = canvas.unload_font(font)
        {
            warn!("Failed to unload font: {}", e);
        }
        // Tear down GPU state before the event loop drops the window system.
        self.canvas = None;
    }
}

fn main() -> Result<()> {
    canvas_core::init_logging();
    info!("Starting canvas demo");

    let config = EngineConfig::default()
        .with_title("Canvas Renderer")
        .from_env();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
