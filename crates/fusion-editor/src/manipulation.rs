//! Selection and gizmo editing of scene components.
//!
//! The controller only remembers an entity id. Every frame the id is checked
//! against the registry before anything is dereferenced, so a component that
//! disappeared under the selection is dropped instead of touched.

use fusion_core::components::Transform;
use fusion_core::events::{EditorEvent, EventLog};
use fusion_core::transform;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::physics::PhysicsWorld;
use crate::picking::PickResult;
use crate::scene::{SceneError, SceneRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManipulationState {
    Idle,
    Selected(hecs::Entity),
    /// Selected and edited this frame.
    Dragging(hecs::Entity),
}

impl ManipulationState {
    pub fn selected(&self) -> Option<hecs::Entity> {
        match *self {
            ManipulationState::Idle => None,
            ManipulationState::Selected(e) | ManipulationState::Dragging(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GizmoOperation {
    #[default]
    Translate,
    Rotate,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GizmoMode {
    #[default]
    World,
    Local,
}

pub struct ManipulationController {
    state: ManipulationState,
    /// Matrix last written to the selected component, used to detect edits.
    baseline: Mat4,
    pick_pending: bool,
    pub operation: GizmoOperation,
    pub mode: GizmoMode,
    pub snap: Vec3,
}

impl Default for ManipulationController {
    fn default() -> Self {
        Self::new(Vec3::ONE)
    }
}

impl ManipulationController {
    pub fn new(snap: Vec3) -> Self {
        Self {
            state: ManipulationState::Idle,
            baseline: Mat4::IDENTITY,
            pick_pending: false,
            operation: GizmoOperation::default(),
            mode: GizmoMode::default(),
            snap,
        }
    }

    pub fn state(&self) -> ManipulationState {
        self.state
    }

    pub fn selected(&self) -> Option<hecs::Entity> {
        self.state.selected()
    }

    pub fn baseline(&self) -> Mat4 {
        self.baseline
    }

    /// Left press in the viewport. Ignored while the cursor is over the gizmo.
    pub fn arm_pick(&mut self, gizmo_over: bool) -> bool {
        if gizmo_over {
            return false;
        }
        self.pick_pending = true;
        true
    }

    /// A gizmo toolbar button took the click.
    pub fn cancel_pick(&mut self) {
        self.pick_pending = false;
    }

    pub fn pick_pending(&self) -> bool {
        self.pick_pending
    }

    /// Consume the pending pick, if any.
    pub fn take_pick(&mut self) -> bool {
        std::mem::take(&mut self.pick_pending)
    }

    /// Drop a selection whose component no longer exists.
    pub fn validate(&mut self, registry: &SceneRegistry, events: &mut EventLog) -> Option<hecs::Entity> {
        let entity = self.selected()?;
        if registry.contains(entity) {
            return Some(entity);
        }
        tracing::warn!("Selected component {:?} no longer exists, clearing selection", entity);
        self.state = ManipulationState::Idle;
        self.baseline = Mat4::IDENTITY;
        events.emit(EditorEvent::StaleSelection { entity });
        None
    }

    /// Apply the outcome of a viewport click.
    pub fn apply_pick(
        &mut self,
        result: &PickResult,
        registry: &mut SceneRegistry,
        physics: &mut PhysicsWorld,
        events: &mut EventLog,
    ) {
        let current = self.selected();
        match result.entity() {
            Some(entity) if Some(entity) != current => {
                self.select(entity, registry, physics, events);
            }
            hit => {
                self.deselect(registry, physics, events);
                if hit.is_none() {
                    events.emit(EditorEvent::PickMissed);
                }
            }
        }
    }

    /// Make `entity` the single manipulated component.
    pub fn select(
        &mut self,
        entity: hecs::Entity,
        registry: &mut SceneRegistry,
        physics: &mut PhysicsWorld,
        events: &mut EventLog,
    ) {
        let Some(pose) = registry.transform(entity) else {
            tracing::warn!("Cannot select missing component {:?}", entity);
            return;
        };
        self.deselect(registry, physics, events);

        registry.set_manipulated(entity, true);
        if let Some(rb) = registry.body(entity) {
            physics.zero_velocity(rb.handle);
        }
        self.baseline = pose.matrix();
        self.state = ManipulationState::Selected(entity);
        tracing::debug!("Selected {:?} at {}", entity, pose.position);
        events.emit(EditorEvent::Selected { entity });
    }

    /// Release the current selection back to the simulation.
    pub fn deselect(&mut self, registry: &mut SceneRegistry, physics: &mut PhysicsWorld, events: &mut EventLog) {
        let Some(entity) = self.selected() else {
            return;
        };
        self.state = ManipulationState::Idle;
        self.baseline = Mat4::IDENTITY;

        if registry.contains(entity) {
            registry.set_manipulated(entity, false);
            if let Some(rb) = registry.body(entity) {
                physics.zero_velocity(rb.handle);
            }
        }
        tracing::debug!("Deselected {:?}", entity);
        events.emit(EditorEvent::Deselected { entity });
    }

    /// Column-major matrix handed to the gizmo widget.
    pub fn gizmo_matrix(&self) -> Option<[f32; 16]> {
        self.selected().map(|_| self.baseline.to_cols_array())
    }

    /// Push an edited matrix into the selected component. Returns whether
    /// anything was written. A matrix equal to the baseline in every cell is
    /// not an edit.
    pub fn apply_edit(
        &mut self,
        matrix: &[f32; 16],
        registry: &mut SceneRegistry,
        physics: &mut PhysicsWorld,
        events: &mut EventLog,
    ) -> Result<bool, SceneError> {
        let Some(entity) = self.selected() else {
            return Ok(false);
        };
        if transform::matrices_identical(&self.baseline, matrix) {
            return Ok(false);
        }

        let pose = Transform::from_matrix(&Mat4::from_cols_array(matrix));
        let update = registry.apply_pose(entity, pose, physics)?;
        self.baseline = pose.matrix();
        self.state = ManipulationState::Dragging(entity);

        tracing::debug!(
            "Pushed pose to {:?}: pos {} scale {} (shape rebuilt: {})",
            entity,
            pose.position,
            pose.scale,
            update.shape_rebuilt
        );
        events.emit(EditorEvent::TransformPushed {
            entity,
            shape_rebuilt: update.shape_rebuilt,
        });
        Ok(true)
    }

    /// End of the UI phase. `active` is whether the gizmo or a field was in
    /// use this frame.
    pub fn end_interaction(&mut self, active: bool) {
        self.state = match (self.state, active) {
            (ManipulationState::Selected(entity), true) => ManipulationState::Dragging(entity),
            (ManipulationState::Dragging(entity), false) => ManipulationState::Selected(entity),
            (state, _) => state,
        };
    }

    /// Force the selected body back to its render pose after a physics step.
    pub fn hold_selected(&self, registry: &SceneRegistry, physics: &mut PhysicsWorld) {
        let Some(entity) = self.selected() else {
            return;
        };
        let (Some(pose), Some(rb)) = (registry.transform(entity), registry.body(entity)) else {
            return;
        };
        physics.set_world_transform(rb.handle, pose.position, pose.rotation);
        physics.zero_velocity(rb.handle);
    }
}
