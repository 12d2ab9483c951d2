//! Conversions between 4x4 model matrices, decomposed poses and the
//! Euler-angle triples shown in numeric fields.
//!
//! Scale is a render-only concept. The rigid (position + rotation) half is
//! what crosses into the physics layer, see `fusion_editor::physics`.

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

/// Compose translate * rotate * scale. Scale is applied to local geometry first.
pub fn matrix_from_pose(position: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, rotation, position)
}

/// Decompose a model matrix into position, unit rotation and scale.
///
/// The rotation is re-normalized so that drift accumulated by repeated
/// gizmo edits does not leak into the pose.
pub fn pose_from_matrix(matrix: &Mat4) -> (Vec3, Quat, Vec3) {
    let position = matrix.w_axis.truncate();

    let x_axis = matrix.x_axis.truncate();
    let y_axis = matrix.y_axis.truncate();
    let z_axis = matrix.z_axis.truncate();

    let sign = if matrix.determinant() < 0.0 { -1.0 } else { 1.0 };
    let scale = Vec3::new(x_axis.length() * sign, y_axis.length(), z_axis.length());

    if scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
        return (position, Quat::IDENTITY, scale);
    }

    let basis = Mat3::from_cols(x_axis / scale.x, y_axis / scale.y, z_axis / scale.z);
    let rotation = Quat::from_mat3(&basis).normalize();
    (position, rotation, scale)
}

/// Wrap an angle in degrees into (-180, 180].
pub fn normalize_angle(degrees: f32) -> f32 {
    let wrapped = degrees % 360.0;
    if wrapped > 180.0 {
        wrapped - 360.0
    } else if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// XYZ Euler angles in degrees, each wrapped into (-180, 180].
pub fn euler_degrees_from_rotation(rotation: Quat) -> Vec3 {
    let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
    Vec3::new(
        normalize_angle(x.to_degrees()),
        normalize_angle(y.to_degrees()),
        normalize_angle(z.to_degrees()),
    )
}

pub fn rotation_from_euler_degrees(degrees: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::XYZ,
        degrees.x.to_radians(),
        degrees.y.to_radians(),
        degrees.z.to_radians(),
    )
    .normalize()
}

/// Exact cell-by-cell comparison, used for change detection against a
/// previously written matrix.
pub fn matrices_identical(a: &Mat4, b: &[f32; 16]) -> bool {
    a.to_cols_array() == *b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn same_rotation(a: Quat, b: Quat) -> bool {
        a.dot(b).abs() > 1.0 - 1e-5
    }

    #[test]
    fn test_pose_round_trip() {
        let poses = [
            (Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
            (
                Vec3::new(5.0, -2.0, 13.5),
                Quat::from_rotation_y(1.2),
                Vec3::new(2.0, 0.5, 3.0),
            ),
            (
                Vec3::new(-40.0, 7.25, 0.0),
                Quat::from_euler(EulerRot::XYZ, 0.3, -2.1, 2.9),
                Vec3::new(0.1, 10.0, 1.0),
            ),
        ];

        for (position, rotation, scale) in poses {
            let matrix = matrix_from_pose(position, rotation, scale);
            let (p, r, s) = pose_from_matrix(&matrix);
            assert!(p.abs_diff_eq(position, 1e-4), "position {p} vs {position}");
            assert!(s.abs_diff_eq(scale, 1e-4), "scale {s} vs {scale}");
            assert!(same_rotation(r, rotation), "rotation {r} vs {rotation}");
        }
    }

    #[test]
    fn test_rotation_is_normalized_after_drift() {
        let mut matrix = matrix_from_pose(Vec3::ONE, Quat::from_rotation_z(0.7), Vec3::ONE);
        matrix.x_axis *= 1.0001;
        let (_, rotation, _) = pose_from_matrix(&matrix);
        assert!((rotation.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(270.0), -90.0);
        assert_eq!(normalize_angle(-200.0), 160.0);
        assert_eq!(normalize_angle(180.0), 180.0);
        assert_eq!(normalize_angle(-180.0), 180.0);
        assert_eq!(normalize_angle(720.0 + 45.0), 45.0);
        assert_eq!(normalize_angle(-30.0), -30.0);
    }

    #[test]
    fn test_euler_fields_round_trip() {
        let degrees = Vec3::new(30.0, -45.0, 120.0);
        let rotation = rotation_from_euler_degrees(degrees);
        let back = euler_degrees_from_rotation(rotation);
        assert!(same_rotation(rotation_from_euler_degrees(back), rotation));
    }

    #[test]
    fn test_matrices_identical_detects_single_cell() {
        let matrix = matrix_from_pose(Vec3::ONE, Quat::IDENTITY, Vec3::ONE);
        let mut cells = matrix.to_cols_array();
        assert!(matrices_identical(&matrix, &cells));
        cells[13] += 0.001;
        assert!(!matrices_identical(&matrix, &cells));
    }
}
