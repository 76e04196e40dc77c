mod camera;
pub mod compositor;
mod layout;
mod scheduler;
mod slots;

pub use camera::FlyCamera;
pub use layout::TileLayout;
pub use scheduler::{FrameScheduler, Phase, ScheduleError};
pub use slots::SlotPool;

use glam::UVec2;
use std::sync::Arc;
use winit::window::Window;

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("failed to create presentation surface: {0}")]
    SurfaceCreate(String),
    #[error("no suitable GPU adapter: {0}")]
    AdapterUnavailable(String),
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),
    #[error("surface offers no RGBA8 format (packed frame buffers are RGBA8)")]
    NoRgba8Surface,
    #[error("surface does not support copy-destination usage")]
    CopyDstUnsupported,
    #[error("failed to acquire surface frame: {0}")]
    SurfaceAcquire(#[from] wgpu::SurfaceError),
    #[error("copy stream synchronization failed: {0}")]
    StreamSync(String),
    #[error("frame slot {0} is already mapped")]
    SlotAlreadyMapped(usize),
    #[error("frame slot {0} is still mapped for copy")]
    SlotStillMapped(usize),
}

/// Owns the windowing-side GPU state: surface, device, queue.
///
/// The surface is configured FIFO (vsync, one present per refresh) at the
/// fixed tiled image size; the window is not resizable.
pub struct DisplayContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
}

impl DisplayContext {
    pub fn new(window: Arc<Window>, image_dim: UVec2) -> Result<Self, DisplayError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|err| DisplayError::SurfaceCreate(err.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| DisplayError::AdapterUnavailable(err.to_string()))?;

        log::info!("adapter: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("flyview device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|err| DisplayError::DeviceRequest(err.to_string()))?;

        let caps = surface.get_capabilities(&adapter);

        // The slot textures receive the renderer's packed RGBA8 pixels by
        // copy, and texture-to-surface copies must match formats modulo the
        // sRGB suffix, so the surface itself has to be RGBA8.
        let format = [
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ]
        .into_iter()
        .find(|format| caps.formats.contains(format))
        .ok_or(DisplayError::NoRgba8Surface)?;

        if !caps.usages.contains(wgpu::TextureUsages::COPY_DST) {
            return Err(DisplayError::CopyDstUnsupported);
        }

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            format,
            width: image_dim.x,
            height: image_dim.y,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        log::info!(
            "surface {}x{} {:?}, present mode {:?}",
            config.width,
            config.height,
            config.format,
            config.present_mode
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Format for the slot textures: the surface format without its sRGB
    /// suffix, keeping slot-to-surface copies copy-compatible.
    pub fn slot_format(&self) -> wgpu::TextureFormat {
        self.config.format.remove_srgb_suffix()
    }

    /// Copies a slot texture to the swapchain image and presents it.
    ///
    /// The caller must have released the slot's mapping and synchronized its
    /// copy stream first.
    pub fn blit_and_present(&self, src: &wgpu::Texture) -> Result<(), DisplayError> {
        let frame = self.surface.get_current_texture()?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present blit"),
            });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: src,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &frame.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: self.config.width,
                height: self.config.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
