//! Built-in CPU preview backend.
//!
//! Stands in for a native batch renderer at the [`BatchRenderer`] boundary:
//! a worker thread shades every environment into one packed RGBA8 buffer per
//! dispatch (horizon gradient plus projected instance splats), and
//! `wait_for_frame` uploads the finished pixels into the frame's
//! device-resident buffer. Dispatch stays non-blocking, waits are real, and
//! double buffering pipelines exactly like a GPU backend would.

use super::{BatchRenderer, Environment, FrameHandle, RenderMode, RendererConfig, RendererError};
use glam::Vec3;
use std::sync::mpsc;
use std::thread;

struct Job {
    frame: u32,
    envs: Vec<Environment>,
}

struct Finished {
    frame: u32,
    pixels: Vec<u8>,
}

pub struct PreviewRenderer {
    config: RendererConfig,
    queue: wgpu::Queue,
    buffers: Vec<wgpu::Buffer>,
    in_flight: Vec<bool>,
    next_frame: u32,
    job_tx: Option<mpsc::Sender<Job>>,
    done_rx: mpsc::Receiver<Finished>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PreviewRenderer {
    pub fn new(device: &wgpu::Device, queue: wgpu::Queue, config: RendererConfig) -> Self {
        let buffer_count = config.buffer_count() as usize;
        let mut buffers = Vec::with_capacity(buffer_count);
        for i in 0..buffer_count {
            let label = format!("packed frame buffer {i}");
            buffers.push(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&label),
                size: config.buffer_bytes(),
                usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (done_tx, done_rx) = mpsc::channel::<Finished>();
        let worker_config = config.clone();
        let worker = thread::Builder::new()
            .name("preview-render".into())
            .spawn(move || worker_loop(&worker_config, &job_rx, &done_tx))
            .expect("failed to spawn render worker");

        log::info!(
            "preview backend: {} environments of {}x{}, {} buffer(s), {:?}",
            config.environment_count,
            config.tile_width,
            config.tile_height,
            buffer_count,
            config.mode
        );

        Self {
            config,
            queue,
            buffers,
            in_flight: vec![false; buffer_count],
            next_frame: 0,
            job_tx: Some(job_tx),
            done_rx,
            worker: Some(worker),
        }
    }
}

impl BatchRenderer for PreviewRenderer {
    fn render(&mut self, envs: &[Environment]) -> Result<FrameHandle, RendererError> {
        if envs.len() != self.config.environment_count as usize {
            return Err(RendererError::EnvironmentCount {
                expected: self.config.environment_count as usize,
                actual: envs.len(),
            });
        }

        let frame = self.next_frame;
        self.next_frame = (frame + 1) % self.config.buffer_count();
        self.in_flight[frame as usize] = true;

        self.job_tx
            .as_ref()
            .ok_or(RendererError::WorkerGone)?
            .send(Job {
                frame,
                envs: envs.to_vec(),
            })
            .map_err(|_| RendererError::WorkerGone)?;

        Ok(FrameHandle::new(frame))
    }

    fn wait_for_frame(&mut self, frame: FrameHandle) -> Result<(), RendererError> {
        if !*frame_slot(&self.in_flight, frame)? {
            return Err(RendererError::FrameNotInFlight(frame));
        }

        // Jobs finish in dispatch order; drain until the requested one lands.
        loop {
            let finished = self.done_rx.recv().map_err(|_| RendererError::WorkerGone)?;
            self.queue.write_buffer(
                &self.buffers[finished.frame as usize],
                0,
                &finished.pixels,
            );
            self.in_flight[finished.frame as usize] = false;
            if finished.frame == frame.index() as u32 {
                return Ok(());
            }
        }
    }

    fn color_buffer(&self, frame: FrameHandle) -> Result<&wgpu::Buffer, RendererError> {
        frame_slot(&self.buffers, frame)
    }
}

impl Drop for PreviewRenderer {
    fn drop(&mut self) {
        drop(self.job_tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Per-frame state lookup that rejects handles outside the buffer ring
/// instead of panicking on them.
fn frame_slot<T>(slots: &[T], frame: FrameHandle) -> Result<&T, RendererError> {
    slots
        .get(frame.index())
        .ok_or(RendererError::FrameNotInFlight(frame))
}

fn worker_loop(config: &RendererConfig, jobs: &mpsc::Receiver<Job>, done: &mpsc::Sender<Finished>) {
    let tile_bytes = config.tile_bytes() as usize;
    while let Ok(job) = jobs.recv() {
        let mut pixels = vec![0u8; config.buffer_bytes() as usize];
        for (i, env) in job.envs.iter().enumerate() {
            let tile = &mut pixels[i * tile_bytes..(i + 1) * tile_bytes];
            shade_environment(
                env,
                config.mode,
                config.tile_width,
                config.tile_height,
                tile,
            );
        }
        if done
            .send(Finished {
                frame: job.frame,
                pixels,
            })
            .is_err()
        {
            break;
        }
    }
}

/// Shades one environment's tile.
///
/// Background is a horizon gradient from the per-pixel view ray; each
/// instance is splatted as a screen-space square at its projected position,
/// sized by instance scale over distance. Depth mode swaps colors for
/// distance-shaded grayscale on black.
fn shade_environment(env: &Environment, mode: RenderMode, width: u32, height: u32, out: &mut [u8]) {
    let texels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(out);
    let tan_half = (env.vfov_deg.to_radians() * 0.5).tan();
    let aspect = width as f32 / height as f32;

    for py in 0..height {
        // +y up in camera space, rows top-down in the buffer.
        let ndc_y = 1.0 - 2.0 * (py as f32 + 0.5) / height as f32;
        for px in 0..width {
            let ndc_x = 2.0 * (px as f32 + 0.5) / width as f32 - 1.0;
            let color = match mode {
                RenderMode::UnlitRgb => {
                    let ray = env.fwd
                        + env.right * (ndc_x * tan_half * aspect)
                        + env.up * (ndc_y * tan_half);
                    horizon_color(ray.normalize_or_zero().y)
                }
                RenderMode::Depth => [0, 0, 0, 255],
            };
            texels[(py * width + px) as usize] = color;
        }
    }

    for instance in env.instances() {
        let world = Vec3::from(instance.transform.translation);
        let rel = world - env.eye;
        let depth = rel.dot(env.fwd);
        if depth <= 0.05 {
            continue;
        }

        let ndc_x = rel.dot(env.right) / (depth * tan_half * aspect);
        let ndc_y = rel.dot(env.up) / (depth * tan_half);
        let center_x = (ndc_x * 0.5 + 0.5) * width as f32;
        let center_y = (1.0 - (ndc_y * 0.5 + 0.5)) * height as f32;

        let scale = instance.transform.matrix3.x_axis.length();
        let half_px = (scale / (depth * tan_half) * height as f32 * 0.5).clamp(1.0, height as f32);

        let color = match mode {
            RenderMode::UnlitRgb => {
                let rgb = env.scene().material_color(instance.material);
                [
                    (rgb[0].clamp(0.0, 1.0) * 255.0) as u8,
                    (rgb[1].clamp(0.0, 1.0) * 255.0) as u8,
                    (rgb[2].clamp(0.0, 1.0) * 255.0) as u8,
                    255,
                ]
            }
            RenderMode::Depth => {
                let shade = (255.0 / (1.0 + depth * 0.25)) as u8;
                [shade, shade, shade, 255]
            }
        };

        let x0 = (center_x - half_px).floor().max(0.0) as u32;
        let x1 = ((center_x + half_px).ceil() as u32).min(width);
        let y0 = (center_y - half_px).floor().max(0.0) as u32;
        let y1 = ((center_y + half_px).ceil() as u32).min(height);
        for y in y0..y1 {
            for x in x0..x1 {
                texels[(y * width + x) as usize] = color;
            }
        }
    }
}

fn horizon_color(up_amount: f32) -> [u8; 4] {
    const SKY: [f32; 3] = [0.36, 0.58, 0.90];
    const GROUND: [f32; 3] = [0.23, 0.21, 0.19];
    let t = (up_amount * 0.5 + 0.5).clamp(0.0, 1.0);
    [
        ((GROUND[0] + (SKY[0] - GROUND[0]) * t) * 255.0) as u8,
        ((GROUND[1] + (SKY[1] - GROUND[1]) * t) * 255.0) as u8,
        ((GROUND[2] + (SKY[2] - GROUND[2]) * t) * 255.0) as u8,
        255,
    ]
}

#[cfg(test)]
mod tests {
    use super::{frame_slot, shade_environment};
    use crate::renderer::{Environment, FrameHandle, RenderMode, RendererError};
    use crate::scene::Scene;
    use glam::{Affine3A, Quat, Vec3};
    use std::sync::Arc;

    fn test_env() -> Environment {
        let scene: Scene = serde_json::from_str(
            r#"{
                "materials": [{ "base_color": [1.0, 0.0, 0.0] }],
                "placements": []
            }"#,
        )
        .unwrap();
        Environment::new(
            Arc::new(scene),
            Vec3::ZERO,
            Vec3::Z,
            Vec3::Y,
            Vec3::X,
            45.0,
        )
    }

    #[test]
    fn gradient_is_brighter_toward_the_top() {
        let env = test_env();
        let mut tile = vec![0u8; 64 * 64 * 4];
        shade_environment(&env, RenderMode::UnlitRgb, 64, 64, &mut tile);
        let top_blue = tile[2];
        let bottom_blue = tile[(63 * 64) * 4 + 2];
        assert!(top_blue > bottom_blue);
    }

    #[test]
    fn instance_ahead_of_camera_splats_its_material_color() {
        let mut env = test_env();
        env.add_instance(0, 0, Affine3A::from_translation(Vec3::new(0.0, 0.0, 4.0)));
        let mut tile = vec![0u8; 64 * 64 * 4];
        shade_environment(&env, RenderMode::UnlitRgb, 64, 64, &mut tile);
        let center = ((32 * 64 + 32) * 4) as usize;
        assert_eq!(&tile[center..center + 4], &[255, 0, 0, 255]);
    }

    #[test]
    fn instance_behind_camera_is_culled() {
        let mut env = test_env();
        env.add_instance(0, 0, Affine3A::from_translation(Vec3::new(0.0, 0.0, -4.0)));
        let mut tile = vec![0u8; 64 * 64 * 4];
        let mut reference = vec![0u8; 64 * 64 * 4];
        shade_environment(&env, RenderMode::UnlitRgb, 64, 64, &mut tile);
        let empty = test_env();
        shade_environment(&empty, RenderMode::UnlitRgb, 64, 64, &mut reference);
        assert_eq!(tile, reference);
    }

    #[test]
    fn depth_mode_shades_by_distance() {
        // Small scale keeps the near splat well inside the tile.
        let splat = |z| {
            Affine3A::from_scale_rotation_translation(
                Vec3::splat(0.1),
                Quat::IDENTITY,
                Vec3::new(0.0, 0.0, z),
            )
        };
        let mut near = test_env();
        near.add_instance(0, 0, splat(2.0));
        let mut far = test_env();
        far.add_instance(0, 0, splat(12.0));

        let mut near_tile = vec![0u8; 64 * 64 * 4];
        let mut far_tile = vec![0u8; 64 * 64 * 4];
        shade_environment(&near, RenderMode::Depth, 64, 64, &mut near_tile);
        shade_environment(&far, RenderMode::Depth, 64, 64, &mut far_tile);

        let center = ((32 * 64 + 32) * 4) as usize;
        assert!(near_tile[center] > far_tile[center]);
        // Background stays black in depth mode.
        assert_eq!(&near_tile[0..3], &[0, 0, 0]);
    }

    #[test]
    fn frame_handle_outside_the_buffer_ring_is_rejected() {
        let in_flight = [true, false];
        assert!(*frame_slot(&in_flight, FrameHandle::new(0)).unwrap());
        assert!(matches!(
            frame_slot(&in_flight, FrameHandle::new(2)),
            Err(RendererError::FrameNotInFlight(_))
        ));
    }
}
