use std::sync::Arc;

use anyhow::{Context, Result};
use parameters::ParameterStore;
use recording::{DEFAULT_EXPORT_QUEUE_CAPACITY, ExportWorker, PngFrameWriter};
use render_protocol::Extent;
use renderer::{FrameReport, GpuBackend, RenderCore};
use techniques::{Catalog, ImageAssetLoader};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::config::HubConfig;

/// Surface plus the render core drawing into it.
pub struct GpuState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    core: RenderCore<GpuBackend>,
}

impl GpuState {
    pub async fn new(window: Arc<Window>, hub: &HubConfig) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("request wgpu adapter")?;

        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("hub"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("request wgpu device")?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let mut size = window.inner_size();
        size.width = size.width.max(1);
        size.height = size.height.max(1);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let backend =
            GpuBackend::new(device, queue, surface_format).context("create render backend")?;
        let display = Extent::new(size.width, size.height);
        let mut parameters = ParameterStore::new();
        let assets = ImageAssetLoader::new(&hub.asset_dir);
        let mut catalog = Catalog::new();
        let technique = catalog
            .create_technique(&hub.technique, display, &backend, &mut parameters, &assets)
            .with_context(|| format!("construct technique `{}`", hub.technique))?;
        hub.apply_parameters(&mut parameters)
            .context("apply configured parameter values")?;
        let animators = hub
            .animators(&parameters)
            .context("build configured animations")?;

        let exporter = ExportWorker::spawn(
            Box::new(PngFrameWriter),
            hub.output_dir.clone(),
            DEFAULT_EXPORT_QUEUE_CAPACITY,
        )
        .context("spawn frame export worker")?;
        let mut core = RenderCore::new(
            backend,
            technique,
            parameters,
            hub.core_settings(display),
            exporter,
        )
        .context("create render core")?;
        for (parameter, animator) in animators {
            core.bind_animator(parameter, animator)
                .context("bind configured animation")?;
        }

        Ok(Self {
            surface,
            config,
            core,
        })
    }

    pub fn core_mut(&mut self) -> &mut RenderCore<GpuBackend> {
        &mut self.core
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let width = new_size.width.max(1);
        let height = new_size.height.max(1);
        if self.config.width == width && self.config.height == height {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface
            .configure(self.core.backend().device(), &self.config);
        self.core.request_resize(Extent::new(width, height));
    }

    pub fn render(&mut self) -> Result<FrameReport, wgpu::SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let report = self.core.render_frame(Some(&view));
        frame.present();
        Ok(report)
    }

    /// Waits for in-flight work so queued exports reach the writer.
    pub fn flush(&mut self) {
        self.core.flush();
    }
}
