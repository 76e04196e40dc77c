//! flyview - interactive tiled viewer for a batched multi-environment
//! renderer.
//!
//! Drives N rendering environments per frame through the renderer boundary,
//! composites their packed tile outputs into one presentation image, and
//! displays it with vsync while a fly camera steers every environment.

mod app;
mod render;
mod renderer;
mod scene;

use app::{App, ViewerOptions};
use glam::UVec2;
use render::TileLayout;
use renderer::RenderMode;
use std::path::PathBuf;
use std::process::ExitCode;
use winit::event_loop::{ControlFlow, EventLoop};

const TILES: UVec2 = UVec2::new(3, 4);
const TILE_DIM: UVec2 = UVec2::new(256, 256);
// Single-slot mode degenerates to a fully synchronous render, wait, copy,
// present loop; two slots pipeline render against copy/present.
const DOUBLE_BUFFERED: bool = false;
const VERTICAL_FOV_DEG: f32 = 45.0;

struct CliArgs {
    scene_path: PathBuf,
    show_camera: bool,
    mode: RenderMode,
}

fn usage(program: &str) {
    eprintln!("usage: {program} <scene.json> [--cam] [--depth]");
}

fn parse_args() -> Result<CliArgs, ()> {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "flyview".to_string());

    let Some(scene_path) = args.next() else {
        usage(&program);
        return Err(());
    };

    let mut show_camera = false;
    let mut mode = RenderMode::UnlitRgb;
    for arg in args {
        match arg.as_str() {
            "--cam" => show_camera = true,
            "--depth" => mode = RenderMode::Depth,
            other => {
                eprintln!("unknown argument: {other}");
                usage(&program);
                return Err(());
            }
        }
    }

    Ok(CliArgs {
        scene_path: PathBuf::from(scene_path),
        show_camera,
        mode,
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let Ok(args) = parse_args() else {
        return ExitCode::FAILURE;
    };

    let layout = match TileLayout::new(TILE_DIM * TILES, TILES) {
        Ok(layout) => layout,
        Err(err) => {
            log::error!("invalid tile configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "{}x{} tile grid of {}x{} ({} environments), image {}x{}",
        layout.tiles.x,
        layout.tiles.y,
        layout.tile_dim.x,
        layout.tile_dim.y,
        layout.env_count(),
        layout.image_dim.x,
        layout.image_dim.y
    );

    let options = ViewerOptions {
        scene_path: args.scene_path,
        show_camera: args.show_camera,
        layout,
        double_buffered: DOUBLE_BUFFERED,
        mode: args.mode,
        vfov_deg: VERTICAL_FOV_DEG,
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("failed to create event loop: {err}");
            return ExitCode::FAILURE;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(options);
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("event loop error: {err}");
        return ExitCode::FAILURE;
    }
    if app.fatal_error().is_some() {
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
