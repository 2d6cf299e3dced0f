//! Window creation and event handling via winit.
//!
//! [`App`] implements winit's [`ApplicationHandler`]: it creates the window
//! on resume, mounts a [`Viewport`] on it and forwards input, resize and
//! redraw events. `R` rebuilds the viewport with freshly seeded fields and
//! `Escape` closes the window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use orrery_config::Config;
use orrery_render::init_render_context_blocking;
use tracing::{error, info, instrument};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use crate::viewport::{Viewport, ViewportError};

/// Interval between texture barrier polls while loading.
pub const LOADING_POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Viewport(#[from] ViewportError),
}

/// Returns [`WindowAttributes`] based on the given configuration.
pub fn window_attributes_from_config(config: &Config) -> WindowAttributes {
    let attrs = WindowAttributes::default()
        .with_title(config.window.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(
            config.window.width as f64,
            config.window.height as f64,
        ));
    if config.window.fullscreen {
        attrs.with_fullscreen(Some(Fullscreen::Borderless(None)))
    } else {
        attrs
    }
}

/// What a key press asks the app to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCommand {
    Rebuild,
    Quit,
}

pub fn key_command(event: &KeyEvent) -> Option<KeyCommand> {
    if event.state != ElementState::Pressed || event.repeat {
        return None;
    }
    match event.physical_key {
        PhysicalKey::Code(KeyCode::KeyR) => Some(KeyCommand::Rebuild),
        PhysicalKey::Code(KeyCode::Escape) => Some(KeyCommand::Quit),
        _ => None,
    }
}

/// Application state for the winit event loop.
pub struct App {
    config: Config,
    window: Option<Arc<Window>>,
    viewport: Option<Viewport>,
    failure: Option<AppError>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            window: None,
            viewport: None,
            failure: None,
        }
    }

    fn mount(&self, window: &Arc<Window>) -> Result<Viewport, ViewportError> {
        let context = init_render_context_blocking(window.clone(), self.config.window.vsync)?;
        info!(
            "GPU ready: {} ({:?})",
            context.adapter.get_info().name,
            context.surface_format
        );
        Viewport::mount(
            window.clone(),
            context,
            window.scale_factor(),
            self.config.clone(),
        )
    }

    /// Unmount the current viewport, then mount a fresh one.
    fn rebuild(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.clone() else {
            return;
        };
        info!("Rebuilding viewport");
        self.viewport = None;
        match self.mount(&window) {
            Ok(viewport) => self.viewport = Some(viewport),
            Err(err) => self.fail(event_loop, err.into()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        error!("{err}");
        self.viewport = None;
        self.failure = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = match event_loop.create_window(window_attributes_from_config(&self.config)) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.fail(event_loop, err.into());
                return;
            }
        };
        let size = window.inner_size();
        info!(
            "Window created: {}x{} (scale: {:.2})",
            size.width,
            size.height,
            window.scale_factor()
        );

        match self.mount(&window) {
            Ok(viewport) => self.viewport = Some(viewport),
            Err(err) => {
                self.fail(event_loop, err.into());
                return;
            }
        }
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.viewport = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(viewport) = &mut self.viewport {
                    viewport.resize(size.width, size.height);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let (Some(viewport), Some(window)) = (&mut self.viewport, &self.window) {
                    let size = window.inner_size();
                    viewport.rescale(scale_factor, size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => match key_command(&event) {
                Some(KeyCommand::Rebuild) => self.rebuild(event_loop),
                Some(KeyCommand::Quit) => {
                    info!("Escape pressed, shutting down");
                    self.viewport = None;
                    event_loop.exit();
                }
                None => {}
            },
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(viewport) = &mut self.viewport {
                    viewport.mouse_mut().on_cursor_moved(position.x, position.y);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(viewport) = &mut self.viewport {
                    viewport.mouse_mut().on_button(button, state);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(viewport) = &mut self.viewport {
                    viewport.mouse_mut().on_scroll(delta);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                if let Some(viewport) = &mut self.viewport {
                    viewport.mouse_mut().on_cursor_left();
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(viewport) = &mut self.viewport
                    && let Err(err) = viewport.on_redraw()
                {
                    self.fail(event_loop, err.into());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(viewport) = &mut self.viewport else {
            return;
        };
        match viewport.poll_loading() {
            Ok(true) => event_loop.set_control_flow(ControlFlow::WaitUntil(
                Instant::now() + LOADING_POLL_INTERVAL,
            )),
            Ok(false) => event_loop.set_control_flow(ControlFlow::Wait),
            Err(err) => self.fail(event_loop, err.into()),
        }
    }
}

/// Creates an event loop and runs the orrery until the window closes.
#[instrument(skip_all)]
pub fn run(config: Config) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_starts_unmounted() {
        let app = App::new(Config::default());
        assert!(app.window.is_none());
        assert!(app.viewport.is_none());
        assert!(app.failure.is_none());
    }

    #[test]
    fn test_window_attributes_follow_config() {
        let mut config = Config::default();
        config.window.title = "Orrery".into();
        config.window.fullscreen = true;
        let attrs = window_attributes_from_config(&config);
        assert_eq!(attrs.title, "Orrery");
        assert!(attrs.fullscreen.is_some());
    }

    #[test]
    fn test_loading_poll_is_one_frame() {
        assert_eq!(LOADING_POLL_INTERVAL.as_millis(), 16);
    }
}
