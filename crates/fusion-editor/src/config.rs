//! editor.yaml configuration parsing.
//!
//! Every section is optional. A missing file is only an error when the
//! caller asked for a specific path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use fusion_core::components::PointLight;

use crate::render::ShadowSettings;
use crate::scene::{BodyParams, ScatterParams};

pub const CONFIG_FILE_NAME: &str = "editor.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub toolbar: ToolbarConfig,
    #[serde(default)]
    pub gizmo: GizmoConfig,
    #[serde(default)]
    pub lighting: LightingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: [f32; 3],
    pub fixed_dt: f32,
    pub max_substeps: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            fixed_dt: 1.0 / 60.0,
            max_substeps: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 70.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 0.0, 60.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub mesh: String,
    pub count: usize,
    pub spread: i32,
    /// Fixed seed for the initial scatter. Random when absent.
    pub seed: Option<u64>,
    pub restitution: f32,
    pub friction: f32,
    pub mass: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            mesh: "procedural:cube".to_string(),
            count: 100,
            spread: 50,
            seed: None,
            restitution: 1.0,
            friction: 0.5,
            mass: 0.0,
        }
    }
}

impl SceneConfig {
    pub fn body(&self) -> BodyParams {
        BodyParams {
            mass: self.mass,
            restitution: self.restitution,
            friction: self.friction,
        }
    }

    pub fn scatter(&self) -> ScatterParams {
        ScatterParams {
            count: self.count,
            spread: self.spread,
            body: self.body(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolbarItemConfig {
    pub name: String,
    pub mesh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolbarConfig {
    pub items: Vec<ToolbarItemConfig>,
    pub spawn_distance: f32,
    pub grid: f32,
}

impl Default for ToolbarConfig {
    fn default() -> Self {
        Self {
            items: vec![ToolbarItemConfig {
                name: "Cube".to_string(),
                mesh: "procedural:cube".to_string(),
            }],
            spawn_distance: 5.0,
            grid: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GizmoConfig {
    pub snap: [f32; 3],
}

impl Default for GizmoConfig {
    fn default() -> Self {
        Self { snap: [1.0, 1.0, 1.0] }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub point_light: PointLight,
    pub sun_speed: f32,
    pub shadow: ShadowSettings,
    pub gamma: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            point_light: PointLight::default(),
            sun_speed: 0.001,
            shadow: ShadowSettings::default(),
            gamma: 2.2,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    NotFound(PathBuf),
    Io(std::io::Error),
    Parse(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(path) => write!(f, "{} not found", path.display()),
            ConfigError::Io(e) => write!(f, "IO error reading {}: {}", CONFIG_FILE_NAME, e),
            ConfigError::Parse(e) => write!(f, "Failed to parse {}: {}", CONFIG_FILE_NAME, e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Walk up from `start_dir` looking for `editor.yaml`.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = start_dir.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Load and parse an `editor.yaml` file.
pub fn load_config(path: &Path) -> Result<EditorConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<EditorConfig, ConfigError> {
    // An empty document deserializes to unit, not to an empty mapping.
    if contents.trim().is_empty() {
        return Ok(EditorConfig::default());
    }
    serde_yaml::from_str(contents).map_err(ConfigError::Parse)
}

/// Explicit path if given, else the nearest `editor.yaml` above
/// `start_dir`, else defaults.
pub fn resolve_config(explicit: Option<&Path>, start_dir: &Path) -> Result<EditorConfig, ConfigError> {
    if let Some(path) = explicit {
        let config = load_config(path)?;
        tracing::info!("Loaded config from {:?}", path);
        return Ok(config);
    }
    match find_config(start_dir) {
        Some(path) => {
            let config = load_config(&path)?;
            tracing::info!("Loaded config from {:?}", path);
            Ok(config)
        }
        None => {
            tracing::info!("No {} found, using defaults", CONFIG_FILE_NAME);
            Ok(EditorConfig::default())
        }
    }
}
