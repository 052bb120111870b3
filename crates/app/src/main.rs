//! Ember demo application.
//!
//! Creates a window, brings up the renderer, and drives one frame per
//! redraw. Resize and close events are latched through `WindowSignals` and
//! consumed once per tick.

use std::path::Path;

use anyhow::Result;
use tracing::{error, info, trace};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use ember_core::{EngineConfig, Timer};
use ember_platform::{Window, WindowSignals};
use ember_renderer::{ClearPass, Renderer};

struct App {
    config: EngineConfig,
    window: Option<Window>,
    renderer: Option<Renderer>,
    signals: WindowSignals,
    timer: Timer,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
            signals: WindowSignals::new(),
            timer: Timer::new(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(
            event_loop,
            self.config.window.width,
            self.config.window.height,
            &self.config.window.title,
        ) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match Renderer::new(&window, &self.config, Box::new(ClearPass::default())) {
            Ok(renderer) => {
                info!("Initialization complete, entering main loop");
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                error!("Failed to create renderer: {:?}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.signals.notify_close_requested();
                if let Some(ref mut renderer) = self.renderer
                    && let Err(e) = renderer.shutdown()
                {
                    error!("Shutdown error: {:?}", e);
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                }
                self.signals.notify_resized();
            }
            WindowEvent::RedrawRequested => {
                if self.signals.close_requested() {
                    return;
                }

                let delta = self.timer.delta_secs();
                trace!("frame delta: {:.2} ms", delta * 1000.0);

                let (Some(window), Some(renderer)) = (&self.window, &mut self.renderer) else {
                    return;
                };

                if self.signals.take_resized() {
                    renderer.notify_resized();
                }

                if let Err(e) = renderer.render_frame(window.extent()) {
                    error!("Fatal render error: {:?}", e);
                    if let Err(e) = renderer.shutdown() {
                        error!("Shutdown error: {:?}", e);
                    }
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    ember_core::init_logging();

    let config = EngineConfig::load(Path::new("ember.toml"))?;
    info!(
        "Starting Ember ({}x{}, {} frame(s) in flight)",
        config.window.width, config.window.height, config.frames_in_flight
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
