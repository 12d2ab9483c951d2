use fusion_core::components::Transform;
use fusion_core::transform;
use glam::{Mat4, Vec3};

use crate::ui::EditorUi;

pub const TRANSLATION_LABEL: &str = "Translation";
pub const ROTATION_LABEL: &str = "Rotation";
pub const SCALE_LABEL: &str = "Scale";

/// Numeric pose fields of the selected component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseFields {
    pub translation: Vec3,
    /// XYZ Euler angles in degrees.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl PoseFields {
    pub fn from_transform(pose: &Transform) -> Self {
        Self {
            translation: pose.position,
            rotation: transform::euler_degrees_from_rotation(pose.rotation),
            scale: pose.scale,
        }
    }

    /// Recompose the model matrix. Angles are wrapped into (-180, 180] first.
    pub fn matrix(&self) -> Mat4 {
        let wrapped = Vec3::new(
            transform::normalize_angle(self.rotation.x),
            transform::normalize_angle(self.rotation.y),
            transform::normalize_angle(self.rotation.z),
        );
        transform::matrix_from_pose(
            self.translation,
            transform::rotation_from_euler_degrees(wrapped),
            self.scale,
        )
    }
}

/// Draw the three fields for `pose`. Returns the recomposed matrix when any
/// field was committed this frame.
pub fn draw_fields(ui: &mut dyn EditorUi, pose: &Transform) -> Option<[f32; 16]> {
    let mut fields = PoseFields::from_transform(pose);

    // Every field is drawn each frame, so no short-circuiting here.
    let mut committed = ui.input_vec3(TRANSLATION_LABEL, &mut fields.translation);
    committed |= ui.input_vec3(ROTATION_LABEL, &mut fields.rotation);
    committed |= ui.input_vec3(SCALE_LABEL, &mut fields.scale);

    if !committed {
        return None;
    }
    tracing::debug!(
        "Fields committed: t {} r {} s {}",
        fields.translation,
        fields.rotation,
        fields.scale
    );
    Some(fields.matrix().to_cols_array())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::HeadlessUi;
    use glam::Quat;

    #[test]
    fn test_fields_show_pose() {
        let mut ui = HeadlessUi::new(800.0, 600.0);
        let pose = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(90f32.to_radians()),
            scale: Vec3::splat(2.0),
        };
        assert_eq!(draw_fields(&mut ui, &pose), None);
        assert_eq!(ui.last_fields[TRANSLATION_LABEL], pose.position);
        assert!(ui.last_fields[ROTATION_LABEL].abs_diff_eq(Vec3::new(0.0, 90.0, 0.0), 1e-3));
        assert_eq!(ui.last_fields[SCALE_LABEL], pose.scale);
    }

    #[test]
    fn test_rotation_commit_is_wrapped() {
        let mut ui = HeadlessUi::new(800.0, 600.0);
        ui.commit_field(ROTATION_LABEL, Vec3::new(0.0, 0.0, 270.0));

        let matrix = draw_fields(&mut ui, &Transform::default()).unwrap();
        let (_, rotation, _) = transform::pose_from_matrix(&Mat4::from_cols_array(&matrix));
        let expected = Quat::from_rotation_z((-90f32).to_radians());
        assert!(rotation.dot(expected).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn test_translation_commit_keeps_other_fields() {
        let mut ui = HeadlessUi::new(800.0, 600.0);
        ui.commit_field(TRANSLATION_LABEL, Vec3::new(5.0, 0.0, 0.0));
        let pose = Transform {
            scale: Vec3::new(1.0, 3.0, 1.0),
            ..Default::default()
        };

        let matrix = draw_fields(&mut ui, &pose).unwrap();
        let edited = Transform::from_matrix(&Mat4::from_cols_array(&matrix));
        assert!(edited.position.abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-6));
        assert!(edited.scale.abs_diff_eq(pose.scale, 1e-6));
    }
}
