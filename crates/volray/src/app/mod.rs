//! Application window and event loop management.

mod input;
mod render;

pub(super) use std::sync::Arc;

pub(super) use pollster::FutureExt;
pub(super) use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::KeyCode,
    window::{Window, WindowId},
};

pub(super) use volray_render::{RaycastRenderer, RenderEngine, RenderError};

use crate::{Result, VolrayError, Viewer, ViewerConfig};

/// The volray application state.
pub struct App {
    pub(super) window: Option<Arc<Window>>,
    pub(super) engine: Option<RenderEngine>,
    pub(super) renderer: Option<RaycastRenderer>,
    pub(super) viewer: Viewer,
    pub(super) title: String,
    pub(super) window_size: (u32, u32),
    pub(super) close_requested: bool,
    // Last cursor position in physical pixels
    pub(super) mouse_pos: (f64, f64),
    // Screenshot state
    pub(super) screenshot_pending: Option<String>,
    pub(super) screenshot_counter: u32,
    // First error that ended the rendering session
    pub(super) fatal: Option<RenderError>,
}

impl App {
    /// Creates a new application around a viewer.
    pub fn new(viewer: Viewer, config: &ViewerConfig) -> Self {
        Self {
            window: None,
            engine: None,
            renderer: None,
            viewer,
            title: config.title.clone(),
            window_size: (config.window_width, config.window_height),
            close_requested: false,
            mouse_pos: (0.0, 0.0),
            screenshot_pending: None,
            screenshot_counter: 0,
            fatal: None,
        }
    }

    /// Requests a screenshot with an auto-generated filename.
    pub fn request_auto_screenshot(&mut self) {
        let filename = format!("volray_{:04}.png", self.screenshot_counter);
        self.screenshot_counter += 1;
        self.screenshot_pending = Some(filename);
    }

    /// Ends the session with an error. Only the first one is kept.
    pub(super) fn fail(&mut self, event_loop: &ActiveEventLoop, error: RenderError) {
        self.record_fatal(error);
        event_loop.exit();
    }

    fn record_fatal(&mut self, error: RenderError) {
        log::error!("{error}");
        self.close_requested = true;
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
    }

    /// The outcome of the session once the event loop has returned.
    fn into_result(self) -> Result<()> {
        match self.fatal {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    pub(super) fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Runs the volray application until the window is closed.
pub fn run_app(viewer: Viewer, config: &ViewerConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|e| VolrayError::GpuConfig(format!("event loop: {e}")))?;
    event_loop.set_control_flow(ControlFlow::Wait);
    let mut app = App::new(viewer, config);

    event_loop
        .run_app(&mut app)
        .map_err(|e| VolrayError::GpuConfig(format!("event loop error: {e}")))?;
    app.into_result()
}
