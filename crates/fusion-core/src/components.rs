use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::transform;

/// Render pose of a scene component. Authoritative for drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Model matrix, translate * rotate * scale.
    pub fn matrix(&self) -> Mat4 {
        transform::matrix_from_pose(self.position, self.rotation, self.scale)
    }

    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (position, rotation, scale) = transform::pose_from_matrix(matrix);
        Self {
            position,
            rotation,
            scale,
        }
    }
}

/// Newtype handle into the mesh cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub usize);

/// Identifies this entity as an instance of a shared mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshInstance {
    pub mesh: MeshHandle,
}

/// Marker component: entity is the active pick target and its pose is
/// driven by the editor instead of the simulation.
pub struct Manipulated;

/// Perspective camera. Projection parameters are fixed at creation, the
/// pose is moved by an outside controller between frames.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub orientation: Quat,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub aspect_ratio: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            orientation: Quat::IDENTITY,
            fov_degrees: 70.0,
            near: 0.1,
            far: 1000.0,
            aspect_ratio: 16.0 / 9.0,
        }
    }
}

impl Camera {
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect_ratio,
            self.near,
            self.far,
        )
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(
            self.position,
            self.orientation * Vec3::NEG_Z,
            self.orientation * Vec3::Y,
        )
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Point the camera at `target` from `eye`, keeping +Y up.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3) {
        self.position = eye;
        let forward = (target - eye).normalize_or_zero();
        if forward == Vec3::ZERO {
            return;
        }
        let up = if forward.dot(Vec3::Y).abs() > 0.999 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_to_rh(eye, forward, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.orientation = rotation.normalize();
    }

    /// Adopt the orientation of a view matrix produced by a view-cube widget.
    /// The camera position is kept.
    pub fn set_view_matrix(&mut self, view: &Mat4) {
        let world = view.inverse();
        if !world.is_finite() {
            return;
        }
        let (_, rotation, _) = transform::pose_from_matrix(&world);
        self.orientation = rotation;
    }
}

/// Point light parameters uploaded to the lit pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLight {
    pub position: [f32; 3],
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: [10.0, 15.0, -5.0],
            ambient: [0.2, 0.2, 0.2],
            diffuse: [0.5, 0.5, 0.5],
            specular: [1.0, 1.0, 1.0],
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

/// Directional light component (sun-like, infinite distance).
#[derive(Debug, Clone)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.3, -1.0, 0.5).normalize(),
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::splat(0.6),
            specular: Vec3::splat(0.3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_look_at_faces_target() {
        let mut camera = Camera::default();
        camera.look_at(Vec3::new(0.0, 5.0, 10.0), Vec3::ZERO);
        let forward = camera.orientation * Vec3::NEG_Z;
        let expected = (Vec3::ZERO - Vec3::new(0.0, 5.0, 10.0)).normalize();
        assert!(forward.abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn test_view_matrix_moves_eye_to_origin() {
        let mut camera = Camera::default();
        camera.look_at(Vec3::new(3.0, 2.0, 8.0), Vec3::ZERO);
        let eye = camera.view_matrix().transform_point3(camera.position);
        assert!(eye.abs_diff_eq(Vec3::ZERO, 1e-4));
    }

    #[test]
    fn test_set_view_matrix_keeps_position() {
        let mut camera = Camera::default();
        let mut other = Camera::default();
        other.look_at(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO);

        camera.set_view_matrix(&other.view_matrix());
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 10.0));
        assert!(camera.orientation.dot(other.orientation).abs() > 0.9999);
    }
}
