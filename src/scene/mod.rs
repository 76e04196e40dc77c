//! Scene loading boundary.
//!
//! A scene file is a small JSON document naming material colors and default
//! instance placements; mesh and material ids are opaque to the pipeline and
//! only resolved by the renderer backend. The loaded scene is shared
//! read-only across every environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("scene file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read scene file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scene file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MaterialDef {
    #[serde(default)]
    pub name: String,
    pub base_color: [f32; 3],
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlacementDef {
    pub mesh: u32,
    pub material: u32,
    pub position: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: f32,
}

fn default_scale() -> f32 {
    1.0
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub materials: Vec<MaterialDef>,
    #[serde(default)]
    pub placements: Vec<PlacementDef>,
}

impl Scene {
    pub fn material_color(&self, material: u32) -> [f32; 3] {
        self.materials
            .get(material as usize)
            .map(|def| def.base_color)
            .unwrap_or([0.8, 0.8, 0.8])
    }
}

pub fn load(path: &Path) -> Result<Arc<Scene>, SceneError> {
    if !path.exists() {
        return Err(SceneError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    let scene: Scene = serde_json::from_str(&text)?;
    log::info!(
        "scene '{}': {} materials, {} placements",
        scene.name,
        scene.materials.len(),
        scene.placements.len()
    );
    Ok(Arc::new(scene))
}
