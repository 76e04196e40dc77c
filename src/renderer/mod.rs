//! Boundary to the batch renderer.
//!
//! The renderer is an external collaborator: it takes the full environment
//! set, renders every environment's tile into one packed device buffer, and
//! hands back an opaque frame handle. Everything behind [`BatchRenderer`] is
//! a black box to the display pipeline; the in-tree [`PreviewRenderer`] is a
//! CPU stand-in at the same boundary.

mod preview;

pub use preview::PreviewRenderer;

use crate::scene::Scene;
use glam::{Affine3A, Vec3};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Flat-shaded color output.
    UnlitRgb,
    /// Distance-shaded grayscale output.
    Depth,
}

#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub gpu_id: u32,
    pub environment_count: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub double_buffered: bool,
    pub mode: RenderMode,
}

impl RendererConfig {
    pub fn buffer_count(&self) -> u32 {
        if self.double_buffered {
            2
        } else {
            1
        }
    }

    /// Bytes of one environment's RGBA8 tile.
    pub fn tile_bytes(&self) -> u64 {
        u64::from(self.tile_width) * u64::from(self.tile_height) * 4
    }

    /// Size of one packed output buffer covering every environment.
    pub fn buffer_bytes(&self) -> u64 {
        self.tile_bytes() * u64::from(self.environment_count)
    }
}

/// Opaque token for one dispatched frame's output buffer.
///
/// Handles are cyclic over the renderer's internal buffer set and double as
/// the frame slot index on the display side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(u32);

impl FrameHandle {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct InstancePlacement {
    pub mesh: u32,
    pub material: u32,
    pub transform: Affine3A,
}

/// One independently rendered camera + instance configuration.
///
/// Every environment carries its own view basis even though this viewer feeds
/// the same camera into all of them; the instance list is set once at startup
/// but supports incremental additions.
#[derive(Debug, Clone)]
pub struct Environment {
    scene: Arc<Scene>,
    pub eye: Vec3,
    pub fwd: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    pub vfov_deg: f32,
    instances: Vec<InstancePlacement>,
}

impl Environment {
    pub fn new(
        scene: Arc<Scene>,
        eye: Vec3,
        fwd: Vec3,
        up: Vec3,
        right: Vec3,
        vfov_deg: f32,
    ) -> Self {
        Self {
            scene,
            eye,
            fwd,
            up,
            right,
            vfov_deg,
            instances: Vec::new(),
        }
    }

    pub fn set_camera_view(&mut self, eye: Vec3, fwd: Vec3, up: Vec3, right: Vec3) {
        self.eye = eye;
        self.fwd = fwd;
        self.up = up;
        self.right = right;
    }

    pub fn add_instance(&mut self, mesh: u32, material: u32, transform: Affine3A) {
        self.instances.push(InstancePlacement {
            mesh,
            material,
            transform,
        });
    }

    pub fn instances(&self) -> &[InstancePlacement] {
        &self.instances
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("render worker is no longer running")]
    WorkerGone,
    #[error("frame {0} is not in flight")]
    FrameNotInFlight(FrameHandle),
    #[error("environment count mismatch: configured {expected}, dispatched {actual}")]
    EnvironmentCount { expected: usize, actual: usize },
}

/// The renderer boundary.
///
/// `render` is a non-blocking dispatch; `wait_for_frame` blocks until the
/// named frame's GPU work and host synchronization are done; `color_buffer`
/// is the frame's packed output: RGBA8, `environment_count * tile_w * tile_h
/// * 4` bytes, tiles consecutive in row-major environment order.
pub trait BatchRenderer {
    fn render(&mut self, envs: &[Environment]) -> Result<FrameHandle, RendererError>;

    fn wait_for_frame(&mut self, frame: FrameHandle) -> Result<(), RendererError>;

    fn color_buffer(&self, frame: FrameHandle) -> Result<&wgpu::Buffer, RendererError>;
}
