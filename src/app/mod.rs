mod input;
mod timing;

use crate::render::{
    compositor, DisplayContext, DisplayError, FlyCamera, FrameScheduler, Phase, ScheduleError,
    SlotPool, TileLayout,
};
use crate::renderer::{
    BatchRenderer, Environment, PreviewRenderer, RenderMode, RendererConfig, RendererError,
};
use crate::scene::{self, PlacementDef, SceneError};
use input::InputState;
use timing::FrameTiming;

use glam::{Affine3A, Quat, Vec3};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowAttributes, WindowId};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("failed to create window: {0}")]
    WindowCreate(String),
}

#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub scene_path: PathBuf,
    pub show_camera: bool,
    pub layout: TileLayout,
    pub double_buffered: bool,
    pub mode: RenderMode,
    pub vfov_deg: f32,
}

/// Everything created once the window exists.
struct Stage {
    display: DisplayContext,
    slots: SlotPool,
    renderer: Box<dyn BatchRenderer>,
    envs: Vec<Environment>,
    scheduler: FrameScheduler,
    camera: FlyCamera,
}

pub struct App {
    options: ViewerOptions,
    window: Option<Arc<Window>>,
    stage: Option<Stage>,
    input: InputState,
    timing: FrameTiming,
    fatal: Option<String>,
}

impl App {
    pub fn new(options: ViewerOptions) -> Self {
        Self {
            options,
            window: None,
            stage: None,
            input: InputState::default(),
            timing: FrameTiming::new("flyview".to_string()),
            fatal: None,
        }
    }

    /// Message of the error that ended the session, if any.
    pub fn fatal_error(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    fn build_stage(&self, window: Arc<Window>) -> Result<Stage, AppError> {
        let layout = self.options.layout;
        let display = DisplayContext::new(window, layout.image_dim)?;

        let slot_count = if self.options.double_buffered { 2 } else { 1 };
        let slots = SlotPool::new(display.device(), &layout, slot_count, display.slot_format());
        log::info!("{} frame slot(s)", slots.slot_count());

        let scene = scene::load(&self.options.scene_path)?;

        let config = RendererConfig {
            gpu_id: 0,
            environment_count: layout.env_count(),
            tile_width: layout.tile_dim.x,
            tile_height: layout.tile_dim.y,
            double_buffered: self.options.double_buffered,
            mode: self.options.mode,
        };
        log::debug!(
            "renderer config: gpu {}, {} environment(s), double buffered: {}",
            config.gpu_id,
            config.environment_count,
            config.double_buffered
        );
        let mut renderer: Box<dyn BatchRenderer> = Box::new(PreviewRenderer::new(
            display.device(),
            display.queue().clone(),
            config,
        ));

        let camera = FlyCamera::default();
        let mut envs = Vec::with_capacity(layout.env_count() as usize);
        for i in 0..layout.env_count() {
            let mut env = Environment::new(
                scene.clone(),
                camera.eye,
                camera.fwd,
                camera.up,
                camera.right,
                self.options.vfov_deg,
            );
            for placement in &scene.placements {
                env.add_instance(
                    placement.mesh,
                    placement.material,
                    placement_transform(placement, i),
                );
            }
            envs.push(env);
        }

        // Prime the pipeline: one frame in flight before the first iteration.
        let first = renderer.render(&envs)?;
        let scheduler = FrameScheduler::primed(slot_count, first);
        log::debug!("scheduler primed with frame {}", scheduler.pending());

        Ok(Stage {
            display,
            slots,
            renderer,
            envs,
            scheduler,
            camera,
        })
    }

    /// One display iteration: camera update, dispatch, wait on the previous
    /// frame, tile copy, present.
    fn frame(&mut self) -> Result<(), AppError> {
        let Some(stage) = &mut self.stage else {
            return Ok(());
        };

        self.timing.update(self.window.as_deref(), Instant::now());
        let mouse_delta = self.input.take_mouse_delta();
        stage
            .camera
            .advance(self.input.movement(), mouse_delta, self.timing.frame_dt);

        for env in &mut stage.envs {
            env.set_camera_view(
                stage.camera.eye,
                stage.camera.fwd,
                stage.camera.up,
                stage.camera.right,
            );
        }
        if self.options.show_camera {
            println!("{}", stage.camera);
        }

        let new_frame = stage.renderer.render(&stage.envs)?;
        let await_frame = stage.scheduler.dispatched(new_frame)?;
        stage.renderer.wait_for_frame(await_frame)?;
        let ready = stage.scheduler.awaited()?;

        {
            let mut slot = stage.slots.acquire_for_copy(ready.index())?;
            let mut encoder = slot.begin(stage.display.device());
            compositor::encode(
                &mut encoder,
                stage.renderer.color_buffer(ready)?,
                slot.texture(),
                &self.options.layout,
            );
            slot.submit_and_sync(stage.display.queue(), stage.display.device(), encoder)?;
        } // slot unmapped here, before presentation touches the texture

        stage.scheduler.presenting()?;
        stage
            .display
            .blit_and_present(stage.slots.presentable_texture(ready.index())?)?;
        stage.scheduler.presented()?;
        debug_assert_eq!(stage.scheduler.phase(), Phase::Idle);

        Ok(())
    }

    fn capture_cursor(&mut self, window: &Window) {
        if self.input.captured() {
            return;
        }
        let grabbed = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        match grabbed {
            Ok(()) => {
                window.set_cursor_visible(false);
                self.input.set_captured(true);
            }
            Err(err) => log::warn!("cursor capture unavailable: {err}"),
        }
    }

    fn release_cursor(&mut self, window: &Window) {
        if let Err(err) = window.set_cursor_grab(CursorGrabMode::None) {
            log::warn!("cursor release failed: {err}");
        }
        window.set_cursor_visible(true);
        self.input.set_captured(false);
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: &AppError) {
        log::error!("fatal: {err}");
        self.fatal = Some(err.to_string());
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let dim = self.options.layout.image_dim;
        let attrs = WindowAttributes::default()
            .with_title("flyview")
            .with_inner_size(PhysicalSize::new(dim.x, dim.y))
            .with_resizable(false);

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                let err = AppError::WindowCreate(err.to_string());
                self.fail(event_loop, &err);
                return;
            }
        };

        log::info!(
            "window {}x{} for a {}x{} tile grid",
            dim.x,
            dim.y,
            self.options.layout.tiles.x,
            self.options.layout.tiles.y
        );
        log::info!("Enter captures the cursor, Escape releases it");

        match self.build_stage(window.clone()) {
            Ok(stage) => self.stage = Some(stage),
            Err(err) => {
                self.fail(event_loop, &err);
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
                log::info!("close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.repeat {
                    return;
                }
                let pressed = event.state.is_pressed();
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Enter) if pressed => {
                        if let Some(window) = self.window.clone() {
                            self.capture_cursor(&window);
                        }
                    }
                    PhysicalKey::Code(KeyCode::Escape) if pressed => {
                        if let Some(window) = self.window.clone() {
                            self.release_cursor(&window);
                        }
                    }
                    key => self.input.handle_key(key, pressed),
                }
            }
            WindowEvent::RedrawRequested => {
                if self.fatal.is_none() {
                    if let Err(err) = self.frame() {
                        self.fail(event_loop, &err);
                    }
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.input.accumulate_mouse(dx, dy);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Instance transform for one placement in environment `env_index`.
///
/// Environments step their placements along -X so every tile shows a
/// distinct view of the same scene.
fn placement_transform(placement: &PlacementDef, env_index: u32) -> Affine3A {
    let offset = Vec3::new(-(env_index as f32), 0.0, 0.0);
    Affine3A::from_scale_rotation_translation(
        Vec3::splat(placement.scale),
        Quat::IDENTITY,
        Vec3::from(placement.position) + offset,
    )
}

#[cfg(test)]
mod tests {
    use super::placement_transform;
    use crate::scene::PlacementDef;
    use glam::Vec3;

    #[test]
    fn placements_shift_along_negative_x_per_environment() {
        let placement = PlacementDef {
            mesh: 12,
            material: 5,
            position: [3.87, 0.85, -0.67],
            scale: 0.01,
        };
        let t0 = placement_transform(&placement, 0);
        let t3 = placement_transform(&placement, 3);
        assert!(Vec3::from(t0.translation).distance(Vec3::new(3.87, 0.85, -0.67)) < 1e-6);
        assert!(Vec3::from(t3.translation).distance(Vec3::new(0.87, 0.85, -0.67)) < 1e-6);
        assert!((t0.matrix3.x_axis.length() - 0.01).abs() < 1e-6);
    }
}
