use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fusion_core::components::MeshHandle;
use glam::Vec3;

#[derive(Debug)]
pub enum MeshError {
    NotFound(PathBuf),
    GltfError(gltf::Error),
    NoMeshes,
    UnknownProcedural(String),
}

impl std::fmt::Display for MeshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "Mesh file not found: {}", path.display()),
            Self::GltfError(e) => write!(f, "glTF error: {}", e),
            Self::NoMeshes => write!(f, "glTF file contains no mesh positions"),
            Self::UnknownProcedural(name) => write!(f, "Unknown procedural mesh '{}'", name),
        }
    }
}

impl std::error::Error for MeshError {}

impl From<gltf::Error> for MeshError {
    fn from(e: gltf::Error) -> Self {
        Self::GltfError(e)
    }
}

/// CPU-side mesh geometry. Positions feed both the renderer and the
/// convex-hull collision shapes.
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

/// Cache of loaded meshes, keyed by path or procedural specifier.
#[derive(Default)]
pub struct MeshCache {
    meshes: Vec<MeshData>,
    path_to_handle: HashMap<PathBuf, MeshHandle>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a mesh once. Supports `procedural:cube`, `procedural:sphere` and
    /// glTF files relative to `project_root`. A missing file is an error, the
    /// caller decides whether that is fatal.
    pub fn get_or_load(&mut self, project_root: &Path, mesh_path: &str) -> Result<MeshHandle, MeshError> {
        let key = PathBuf::from(mesh_path);
        if let Some(&handle) = self.path_to_handle.get(&key) {
            return Ok(handle);
        }

        let mesh = if let Some(shape) = mesh_path.strip_prefix("procedural:") {
            match shape {
                "cube" => create_procedural_cube(),
                "sphere" => create_procedural_sphere(0.5, 16, 16),
                other => return Err(MeshError::UnknownProcedural(other.to_string())),
            }
        } else {
            load_gltf(project_root, mesh_path)?
        };

        let handle = MeshHandle(self.meshes.len());
        self.meshes.push(mesh);
        self.path_to_handle.insert(key, handle);
        tracing::info!("Loaded mesh: {}", mesh_path);
        Ok(handle)
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&MeshData> {
        self.meshes.get(handle.0)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

/// Load every mesh primitive of a glTF file, merged into one position list
/// with node transforms applied.
fn load_gltf(project_root: &Path, mesh_path: &str) -> Result<MeshData, MeshError> {
    let full_path = project_root.join(mesh_path);
    if !full_path.exists() {
        return Err(MeshError::NotFound(full_path));
    }

    let (document, buffers, _images) = gltf::import(&full_path)?;

    let mut positions = Vec::new();
    let mut indices = Vec::new();
    for scene in document.scenes() {
        for node in scene.nodes() {
            collect_node_positions(&node, glam::Mat4::IDENTITY, &buffers, &mut positions, &mut indices);
        }
    }

    if positions.is_empty() {
        return Err(MeshError::NoMeshes);
    }

    tracing::info!(
        "glTF '{}': {} verts, {} indices",
        mesh_path,
        positions.len(),
        indices.len()
    );

    Ok(MeshData {
        name: mesh_path.to_string(),
        positions,
        indices,
    })
}

fn collect_node_positions(
    node: &gltf::Node,
    parent_transform: glam::Mat4,
    buffers: &[gltf::buffer::Data],
    positions: &mut Vec<Vec3>,
    indices: &mut Vec<u32>,
) {
    let local = glam::Mat4::from_cols_array_2d(&node.transform().matrix());
    let world = parent_transform * local;

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buf| Some(&buffers[buf.index()]));
            let Some(read_positions) = reader.read_positions() else {
                continue;
            };
            let base_vertex = positions.len() as u32;
            let before = positions.len();
            positions.extend(read_positions.map(|p| world.transform_point3(Vec3::from(p))));
            let count = (positions.len() - before) as u32;

            match reader.read_indices() {
                Some(read_indices) => indices.extend(read_indices.into_u32().map(|i| base_vertex + i)),
                None => indices.extend(base_vertex..base_vertex + count),
            }
        }
    }

    for child in node.children() {
        collect_node_positions(&child, world, buffers, positions, indices);
    }
}

/// Unit cube centered on the origin.
fn create_procedural_cube() -> MeshData {
    #[rustfmt::skip]
    let positions = vec![
        Vec3::new(-0.5, -0.5,  0.5), Vec3::new( 0.5, -0.5,  0.5),
        Vec3::new( 0.5,  0.5,  0.5), Vec3::new(-0.5,  0.5,  0.5),
        Vec3::new(-0.5, -0.5, -0.5), Vec3::new( 0.5, -0.5, -0.5),
        Vec3::new( 0.5,  0.5, -0.5), Vec3::new(-0.5,  0.5, -0.5),
    ];

    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2, 0, 2, 3, // front
        5, 4, 7, 5, 7, 6, // back
        3, 2, 6, 3, 6, 7, // top
        4, 5, 1, 4, 1, 0, // bottom
        1, 5, 6, 1, 6, 2, // right
        4, 0, 3, 4, 3, 7, // left
    ];

    MeshData {
        name: "procedural:cube".to_string(),
        positions,
        indices,
    }
}

/// UV sphere.
fn create_procedural_sphere(radius: f32, rings: u32, sectors: u32) -> MeshData {
    let mut positions = Vec::new();
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let theta = std::f32::consts::PI * ring as f32 / rings as f32;
        for sector in 0..=sectors {
            let phi = 2.0 * std::f32::consts::PI * sector as f32 / sectors as f32;
            positions.push(Vec3::new(
                radius * theta.sin() * phi.cos(),
                radius * theta.cos(),
                radius * theta.sin() * phi.sin(),
            ));
        }
    }

    for ring in 0..rings {
        for sector in 0..sectors {
            let curr_row = ring * (sectors + 1);
            let next_row = (ring + 1) * (sectors + 1);
            indices.extend_from_slice(&[
                curr_row + sector,
                next_row + sector + 1,
                next_row + sector,
                curr_row + sector,
                curr_row + sector + 1,
                next_row + sector + 1,
            ]);
        }
    }

    MeshData {
        name: "procedural:sphere".to_string(),
        positions,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TETRA_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "translation": [0.0, 2.0, 0.0] }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "mode": 0 }] }],
        "buffers": [{
            "byteLength": 48,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/"
        }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 48 }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 4,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 1.0]
        }]
    }"#;

    #[test]
    fn test_procedural_meshes_are_cached() {
        let mut cache = MeshCache::new();
        let cube = cache.get_or_load(Path::new("."), "procedural:cube").unwrap();
        let again = cache.get_or_load(Path::new("."), "procedural:cube").unwrap();
        let sphere = cache.get_or_load(Path::new("."), "procedural:sphere").unwrap();

        assert_eq!(cube, again);
        assert_ne!(cube, sphere);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(cube).unwrap().positions.len(), 8);
        assert_eq!(cache.get(cube).unwrap().indices.len(), 36);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let mut cache = MeshCache::new();
        let err = cache
            .get_or_load(Path::new("/nonexistent-project"), "models/cube.glb")
            .unwrap_err();
        assert!(matches!(err, MeshError::NotFound(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unknown_procedural() {
        let mut cache = MeshCache::new();
        let err = cache.get_or_load(Path::new("."), "procedural:torus").unwrap_err();
        assert!(matches!(err, MeshError::UnknownProcedural(ref s) if s == "torus"));
    }

    #[test]
    fn test_load_gltf_applies_node_transform() {
        let dir = std::env::temp_dir().join(format!("fusion-mesh-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tetra.gltf"), TETRA_GLTF).unwrap();

        let mut cache = MeshCache::new();
        let handle = cache.get_or_load(&dir, "tetra.gltf").unwrap();
        let mesh = cache.get(handle).unwrap();

        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3]);
        assert_eq!(mesh.positions[0], Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(mesh.positions[3], Vec3::new(0.0, 2.0, 1.0));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
