use std::collections::HashMap;

use glam::{Mat4, Vec3};

use crate::manipulation::{GizmoMode, GizmoOperation};
use crate::picking::ViewportRect;

/// The immediate-mode widgets the editor draws into. The host's UI toolkit
/// implements this; the editor never lays anything out itself.
pub trait EditorUi {
    /// Screen rectangle of the scene viewport.
    fn viewport_rect(&self) -> ViewportRect;
    fn viewport_hovered(&self) -> bool;
    /// Whether the cursor is over a gizmo handle.
    fn gizmo_is_over(&self) -> bool;

    /// Operation and mode toggle buttons. Returns true when a button was
    /// clicked this frame.
    fn gizmo_mode_buttons(&mut self, operation: &mut GizmoOperation, mode: &mut GizmoMode) -> bool;

    /// Three-float field. Returns true when the user committed a new value.
    fn input_vec3(&mut self, label: &str, value: &mut Vec3) -> bool;

    /// Draw the gizmo over a column-major model matrix and let the user drag
    /// it. Returns true while the gizmo is in use.
    fn gizmo_manipulate(
        &mut self,
        view: &Mat4,
        projection: &Mat4,
        operation: GizmoOperation,
        mode: GizmoMode,
        snap: Vec3,
        matrix: &mut [f32; 16],
    ) -> bool;

    /// View-cube widget. Returns true when it changed the view matrix.
    fn view_manipulate(&mut self, view: &mut Mat4) -> bool;

    /// Index of the toolbar item under the cursor, if any.
    fn toolbar_item_hovered(&mut self, items: &[String]) -> Option<usize>;
}

/// Scriptable UI for headless runs and tests. Every queued interaction is
/// delivered once, on the next frame that asks for it.
#[derive(Debug)]
pub struct HeadlessUi {
    pub viewport: ViewportRect,
    pub hovered: bool,
    pub gizmo_over: bool,
    pub toolbar_hover: Option<usize>,
    pending_buttons: Option<(GizmoOperation, GizmoMode)>,
    pending_fields: HashMap<String, Vec3>,
    pending_gizmo: Option<[f32; 16]>,
    pending_view: Option<Mat4>,
    /// Matrix the gizmo was last drawn with.
    pub last_gizmo_matrix: Option<[f32; 16]>,
    /// Values the fields last displayed, by label.
    pub last_fields: HashMap<String, Vec3>,
}

impl HeadlessUi {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            viewport: ViewportRect::new(0.0, 0.0, width, height),
            hovered: true,
            gizmo_over: false,
            toolbar_hover: None,
            pending_buttons: None,
            pending_fields: HashMap::new(),
            pending_gizmo: None,
            pending_view: None,
            last_gizmo_matrix: None,
            last_fields: HashMap::new(),
        }
    }

    pub fn click_gizmo_buttons(&mut self, operation: GizmoOperation, mode: GizmoMode) {
        self.pending_buttons = Some((operation, mode));
    }

    pub fn commit_field(&mut self, label: &str, value: Vec3) {
        self.pending_fields.insert(label.to_string(), value);
    }

    pub fn drag_gizmo_to(&mut self, matrix: Mat4) {
        self.pending_gizmo = Some(matrix.to_cols_array());
    }

    pub fn turn_view_cube(&mut self, view: Mat4) {
        self.pending_view = Some(view);
    }
}

impl EditorUi for HeadlessUi {
    fn viewport_rect(&self) -> ViewportRect {
        self.viewport
    }

    fn viewport_hovered(&self) -> bool {
        self.hovered
    }

    fn gizmo_is_over(&self) -> bool {
        self.gizmo_over
    }

    fn gizmo_mode_buttons(&mut self, operation: &mut GizmoOperation, mode: &mut GizmoMode) -> bool {
        match self.pending_buttons.take() {
            Some((op, m)) => {
                *operation = op;
                *mode = m;
                true
            }
            None => false,
        }
    }

    fn input_vec3(&mut self, label: &str, value: &mut Vec3) -> bool {
        let committed = match self.pending_fields.remove(label) {
            Some(new_value) => {
                *value = new_value;
                true
            }
            None => false,
        };
        self.last_fields.insert(label.to_string(), *value);
        committed
    }

    fn gizmo_manipulate(
        &mut self,
        _view: &Mat4,
        _projection: &Mat4,
        _operation: GizmoOperation,
        _mode: GizmoMode,
        _snap: Vec3,
        matrix: &mut [f32; 16],
    ) -> bool {
        self.last_gizmo_matrix = Some(*matrix);
        match self.pending_gizmo.take() {
            Some(edited) => {
                *matrix = edited;
                true
            }
            None => false,
        }
    }

    fn view_manipulate(&mut self, view: &mut Mat4) -> bool {
        match self.pending_view.take() {
            Some(new_view) => {
                *view = new_view;
                true
            }
            None => false,
        }
    }

    fn toolbar_item_hovered(&mut self, items: &[String]) -> Option<usize> {
        self.toolbar_hover.filter(|&i| i < items.len())
    }
}
