//! Interactive renderer hub: one window, one technique, optional recording.
//!
//! Keys: Space pauses, R toggles recording, Backspace restarts the image and
//! rewinds the clock, Up/Down double or halve the render cap.

mod config;
mod gpu_state;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use render_protocol::Extent;
use renderer::{FrameReport, FrameStatus};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::{Cli, HubConfig};
use crate::gpu_state::GpuState;

struct App {
    config: HubConfig,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: HubConfig) -> Self {
        Self {
            config,
            window: None,
            gpu: None,
            fatal: None,
        }
    }

    fn window_id(&self) -> Option<WindowId> {
        self.window.as_ref().map(|w| w.id())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        error!("{error:#}");
        self.fatal = Some(error);
        event_loop.exit();
    }

    fn handle_key(&mut self, key: KeyCode) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let core = gpu.core_mut();
        match key {
            KeyCode::Space => {
                let paused = core.toggle_paused();
                info!(paused, "pause toggled");
            }
            KeyCode::KeyR => {
                let recording = core.toggle_recording();
                info!(recording, "recording toggled");
            }
            KeyCode::Backspace => {
                core.reset();
                info!("image reset");
            }
            KeyCode::ArrowUp | KeyCode::ArrowDown => {
                let cap = core.render_cap();
                let requested = if key == KeyCode::ArrowUp {
                    Extent::new(cap.width.saturating_mul(2), cap.height.saturating_mul(2))
                } else {
                    Extent::new((cap.width / 2).max(1), (cap.height / 2).max(1))
                };
                core.set_render_cap(requested);
            }
            _ => {}
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        match gpu.render() {
            Ok(report) => log_frame(&report),
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                if let Some(window) = self.window.as_ref() {
                    gpu.resize(window.inner_size());
                }
            }
            Err(wgpu::SurfaceError::Timeout) => {}
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow::anyhow!("surface out of memory"));
            }
            Err(error) => warn!(%error, "surface frame skipped"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);

        if self.window.is_some() {
            return;
        }

        let title = techniques::find(&self.config.technique)
            .map(|entry| entry.name)
            .unwrap_or("hub");
        let window = match event_loop.create_window(
            WindowAttributes::default()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(self.config.width, self.config.height)),
        ) {
            Ok(window) => Arc::new(window),
            Err(error) => {
                self.fail(event_loop, anyhow::Error::new(error).context("create window"));
                return;
            }
        };

        match pollster::block_on(GpuState::new(window.clone(), &self.config)) {
            Ok(gpu) => {
                info!(technique = %self.config.technique, "initialization complete, entering main loop");
                window.request_redraw();
                self.window = Some(window);
                self.gpu = Some(gpu);
            }
            Err(error) => self.fail(event_loop, error),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window_id() != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("close requested, shutting down");
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.flush();
                }
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        self.handle_key(key);
                    }
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(new_size);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn log_frame(report: &FrameReport) {
    match &report.status {
        FrameStatus::Dropped(reason) => {
            warn!(frame = report.animation_frame, ?reason, "frame dropped");
        }
        FrameStatus::BuffersUnavailable(error) => {
            warn!(%error, "frame buffers unavailable");
        }
        FrameStatus::Paused | FrameStatus::Completed { .. } => {}
    }
    if let Some(index) = report.exported {
        debug!(index = index.0, frame = report.animation_frame, "frame queued for export");
    }
    if report.recording_stopped {
        info!("loop finished, recording stopped");
    }
}

fn print_catalog() {
    for entry in techniques::catalog() {
        println!("{:<12} {:<26} {}", entry.id, entry.name, entry.summary);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.list {
        print_catalog();
        return Ok(());
    }

    logging::init_logging();
    let config = HubConfig::load(&cli).context("load hub configuration")?;
    info!(technique = %config.technique, width = config.width, height = config.height, "starting hub");

    let event_loop = EventLoop::new().context("create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("run event loop")?;

    match app.fatal.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
