use std::path::{Path, PathBuf};

use fusion_core::components::Camera;
use fusion_core::events::EditorEvent;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::config::EditorConfig;
use crate::input::{InputState, MouseButton};
use crate::manipulation::{ManipulationController, ManipulationState};
use crate::mesh::{MeshCache, MeshError};
use crate::physics::PhysicsWorld;
use crate::picking::{self, PickResult};
use crate::properties;
use crate::render::{FrameStats, RenderBackend, ShadowRenderer};
use crate::scene::{ComponentSnapshot, SceneError, SceneRegistry};
use crate::state::EditorSceneState;
use crate::stepper::PhysicsStepper;
use crate::toolbar::{Toolbar, ToolbarItem};
use crate::ui::EditorUi;

#[derive(Debug)]
pub enum EditorError {
    Mesh { path: String, source: MeshError },
    Scene(SceneError),
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorError::Mesh { path, source } => write!(f, "Failed to load mesh '{}': {}", path, source),
            EditorError::Scene(e) => write!(f, "Failed to build scene: {}", e),
        }
    }
}

impl std::error::Error for EditorError {}

impl From<SceneError> for EditorError {
    fn from(e: SceneError) -> Self {
        EditorError::Scene(e)
    }
}

/// What happened during one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame: u64,
    pub physics_steps: u32,
    pub render: FrameStats,
    pub picked: Option<PickResult>,
    pub spawned: Option<hecs::Entity>,
    pub state: ManipulationState,
    pub events: Vec<EditorEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditorSnapshot {
    pub frame: u64,
    pub selected: Option<u64>,
    pub components: Vec<ComponentSnapshot>,
}

/// The scene editor: owns the scene state and runs the per-frame sequence.
pub struct Editor {
    pub state: EditorSceneState,
    pub stepper: PhysicsStepper,
    pub renderer: ShadowRenderer,
    project_root: PathBuf,
    frame: u64,
}

impl Editor {
    /// Load the scene and toolbar meshes and scatter the initial scene.
    /// Any asset failure here is fatal.
    pub fn new(config: &EditorConfig, project_root: &Path) -> Result<Self, EditorError> {
        let mut meshes = MeshCache::new();
        let load = |meshes: &mut MeshCache, path: &str| {
            meshes
                .get_or_load(project_root, path)
                .map_err(|source| EditorError::Mesh {
                    path: path.to_string(),
                    source,
                })
        };

        let scene_mesh = load(&mut meshes, &config.scene.mesh)?;
        let mut items = Vec::with_capacity(config.toolbar.items.len());
        for item in &config.toolbar.items {
            items.push(ToolbarItem {
                name: item.name.clone(),
                mesh: load(&mut meshes, &item.mesh)?,
            });
        }

        let mut registry = SceneRegistry::new(meshes);
        let mut physics = PhysicsWorld::new(Vec3::from(config.physics.gravity));
        tracing::info!("Physics world initialized");

        let mut rng = match config.scene.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        registry.populate(&mut physics, scene_mesh, &config.scene.scatter(), &mut rng)?;

        let mut camera = Camera {
            fov_degrees: config.camera.fov,
            near: config.camera.near,
            far: config.camera.far,
            ..Default::default()
        };
        camera.look_at(Vec3::from(config.camera.position), Vec3::from(config.camera.target));

        let toolbar = Toolbar::new(
            items,
            config.toolbar.spawn_distance,
            config.toolbar.grid,
            config.scene.body(),
        );
        let controller = ManipulationController::new(Vec3::from(config.gizmo.snap));

        let renderer = ShadowRenderer::new(
            config.lighting.shadow.clone(),
            config.lighting.point_light.clone(),
            config.lighting.sun_speed,
            config.lighting.gamma,
        );

        tracing::info!(
            "Editor ready: {} components, {} toolbar items",
            registry.len(),
            toolbar.items().len()
        );

        Ok(Self {
            state: EditorSceneState::new(registry, physics, controller, toolbar, camera),
            stepper: PhysicsStepper::new(config.physics.fixed_dt, config.physics.max_substeps),
            renderer,
            project_root: project_root.to_path_buf(),
            frame: 0,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Run one frame: physics, selection hold, render sync, the two render
    /// passes, the UI phase, then the pending pick.
    pub fn frame(
        &mut self,
        input: &InputState,
        ui: &mut dyn EditorUi,
        backend: &mut dyn RenderBackend,
        elapsed: f32,
    ) -> FrameReport {
        self.frame += 1;
        self.state.events.next_frame();
        self.state.controller.validate(&self.state.registry, &mut self.state.events);

        let viewport = ui.viewport_rect();
        if viewport.size.x > 0.0 && viewport.size.y > 0.0 {
            self.state.camera.aspect_ratio = viewport.size.x / viewport.size.y;
        }

        // Physics, with the selection held after each step.
        let EditorSceneState {
            registry,
            physics,
            controller,
            ..
        } = &mut self.state;
        let physics_steps = self
            .stepper
            .advance_elapsed_with(physics, elapsed, |physics| controller.hold_selected(registry, physics));
        self.state.registry.sync_from_physics(&self.state.physics);

        let batches = self.state.registry.batches();
        let render = self.renderer.render_frame(backend, &self.state.camera, &batches);

        self.ui_phase(input, ui);
        let spawned = self.state.toolbar.update(
            ui,
            input,
            &self.state.camera,
            &mut self.state.registry,
            &mut self.state.physics,
            &mut self.state.events,
        );

        let picked = self.process_pick(input, ui);

        FrameReport {
            frame: self.frame,
            physics_steps,
            render,
            picked,
            spawned,
            state: self.state.controller.state(),
            events: self.state.events.flush(),
        }
    }

    /// Gizmo toolbar, numeric fields, gizmo and view cube.
    fn ui_phase(&mut self, input: &InputState, ui: &mut dyn EditorUi) {
        let state = &mut self.state;

        if input.just_pressed(MouseButton::Left) {
            state.controller.arm_pick(ui.gizmo_is_over());
        }

        let (mut operation, mut mode) = (state.controller.operation, state.controller.mode);
        if ui.gizmo_mode_buttons(&mut operation, &mut mode) {
            state.controller.operation = operation;
            state.controller.mode = mode;
            state.controller.cancel_pick();
        }

        let mut active = false;
        if let Some(pose) = state.selected().and_then(|e| state.registry.transform(e)) {
            if let Some(matrix) = properties::draw_fields(ui, &pose) {
                active = true;
                if let Err(e) =
                    state
                        .controller
                        .apply_edit(&matrix, &mut state.registry, &mut state.physics, &mut state.events)
                {
                    tracing::warn!("Field edit rejected: {}", e);
                }
            }
        }

        if let Some(mut matrix) = state.controller.gizmo_matrix() {
            let view = state.camera.view_matrix();
            let projection = state.camera.projection_matrix();
            let using = ui.gizmo_manipulate(
                &view,
                &projection,
                state.controller.operation,
                state.controller.mode,
                state.controller.snap,
                &mut matrix,
            );
            if using {
                active = true;
                if let Err(e) =
                    state
                        .controller
                        .apply_edit(&matrix, &mut state.registry, &mut state.physics, &mut state.events)
                {
                    tracing::warn!("Gizmo edit rejected: {}", e);
                }
            }
        }
        state.controller.end_interaction(active);

        let mut view = state.camera.view_matrix();
        if ui.view_manipulate(&mut view) {
            state.camera.set_view_matrix(&view);
        }
    }

    /// Consume the pending pick. It only counts when the viewport is hovered.
    fn process_pick(&mut self, input: &InputState, ui: &mut dyn EditorUi) -> Option<PickResult> {
        if !self.state.controller.take_pick() || !ui.viewport_hovered() {
            return None;
        }

        let state = &mut self.state;
        let viewport = ui.viewport_rect();
        let cursor = viewport.to_local(input.cursor_position());
        let result = picking::pick(
            cursor,
            viewport.size,
            &state.camera.projection_matrix(),
            &state.camera.view_matrix(),
            state.camera.far,
            &state.physics,
            &state.registry,
        );
        tracing::debug!("Pick at {}: {:?}", cursor, result);
        state
            .controller
            .apply_pick(&result, &mut state.registry, &mut state.physics, &mut state.events);
        Some(result)
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            frame: self.frame,
            selected: self.state.selected().map(|e| e.to_bits().get()),
            components: self.state.registry.snapshot(),
        }
    }

    /// Release the selection and destroy every component.
    pub fn shutdown(&mut self) {
        let state = &mut self.state;
        state
            .controller
            .deselect(&mut state.registry, &mut state.physics, &mut state.events);
        let count = state.registry.len();
        state.registry.clear(&mut state.physics);
        state.events.flush();
        tracing::info!("Editor shut down, {} components released", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolbarItemConfig;
    use crate::manipulation::{GizmoMode, GizmoOperation};
    use crate::properties::TRANSLATION_LABEL;
    use crate::render::RecordingBackend;
    use crate::scene::BodyParams;
    use crate::ui::HeadlessUi;
    use fusion_core::components::Transform;
    use glam::{Mat4, Quat, Vec2};

    const DT: f32 = 1.0 / 60.0;

    fn empty_config() -> EditorConfig {
        let mut config = EditorConfig::default();
        config.scene.count = 0;
        config.scene.seed = Some(1);
        config.camera.position = [0.0, 0.0, 10.0];
        config
    }

    struct Harness {
        editor: Editor,
        ui: HeadlessUi,
        input: InputState,
        backend: RecordingBackend,
    }

    impl Harness {
        fn new(config: EditorConfig) -> Self {
            Self {
                editor: Editor::new(&config, Path::new(".")).unwrap(),
                ui: HeadlessUi::new(800.0, 600.0),
                input: InputState::new(),
                backend: RecordingBackend::new(),
            }
        }

        fn add(&mut self, position: Vec3, mass: f32) -> hecs::Entity {
            let state = &mut self.editor.state;
            let mesh = state.toolbar.items()[0].mesh;
            let body = BodyParams {
                mass,
                ..Default::default()
            };
            state
                .registry
                .add_instance(&mut state.physics, mesh, Transform::from_position(position), body)
                .unwrap()
        }

        fn frame(&mut self) -> FrameReport {
            self.input.begin_frame();
            self.backend.clear();
            self.editor
                .frame(&self.input, &mut self.ui, &mut self.backend, DT)
        }

        fn click(&mut self, x: f32, y: f32) -> FrameReport {
            self.input.inject_click(Vec2::new(x, y));
            self.frame()
        }
    }

    #[test]
    fn test_new_populates_seeded_scene() {
        let mut config = EditorConfig::default();
        config.scene.seed = Some(5);
        let a = Editor::new(&config, Path::new(".")).unwrap();
        let b = Editor::new(&config, Path::new(".")).unwrap();
        assert_eq!(a.state.registry.len(), 100);
        let positions = |e: &Editor| {
            e.snapshot()
                .components
                .iter()
                .map(|c| c.position)
                .collect::<Vec<_>>()
        };
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn test_missing_mesh_is_fatal() {
        let mut config = empty_config();
        config.toolbar.items.push(ToolbarItemConfig {
            name: "Statue".to_string(),
            mesh: "models/statue.glb".to_string(),
        });
        let err = Editor::new(&config, Path::new("/nonexistent-project")).err().unwrap();
        assert!(matches!(err, EditorError::Mesh { ref path, .. } if path == "models/statue.glb"));
    }

    #[test]
    fn test_click_selects_then_empty_click_clears() {
        let mut h = Harness::new(empty_config());
        let b = h.add(Vec3::ZERO, 0.0);
        h.add(Vec3::new(20.0, 0.0, 0.0), 0.0);

        let report = h.click(400.0, 300.0);
        assert_eq!(report.state, ManipulationState::Selected(b));
        assert!(h.editor.state.registry.is_manipulated(b));
        assert!(report.events.contains(&EditorEvent::Selected { entity: b }));

        let report = h.click(5.0, 5.0);
        assert_eq!(report.picked, Some(PickResult::Miss));
        assert_eq!(report.state, ManipulationState::Idle);
        assert_eq!(h.editor.state.registry.manipulated_count(), 0);
    }

    #[test]
    fn test_pick_needs_hovered_viewport() {
        let mut h = Harness::new(empty_config());
        h.add(Vec3::ZERO, 0.0);
        h.ui.hovered = false;
        let report = h.click(400.0, 300.0);
        assert_eq!(report.picked, None);
        assert_eq!(report.state, ManipulationState::Idle);

        // The discarded pick does not linger into the next frame.
        h.ui.hovered = true;
        let report = h.frame();
        assert_eq!(report.picked, None);
    }

    #[test]
    fn test_gizmo_hover_and_buttons_block_pick() {
        let mut h = Harness::new(empty_config());
        h.add(Vec3::ZERO, 0.0);

        h.ui.gizmo_over = true;
        assert_eq!(h.click(400.0, 300.0).picked, None);
        h.ui.gizmo_over = false;

        h.ui.click_gizmo_buttons(GizmoOperation::Rotate, GizmoMode::Local);
        assert_eq!(h.click(400.0, 300.0).picked, None);
        assert_eq!(h.editor.state.controller.operation, GizmoOperation::Rotate);
        assert_eq!(h.editor.state.controller.mode, GizmoMode::Local);
    }

    #[test]
    fn test_gizmo_edit_moves_body_and_render_pose() {
        let mut h = Harness::new(empty_config());
        let b = h.add(Vec3::ZERO, 0.0);
        h.click(400.0, 300.0);

        h.ui.drag_gizmo_to(Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        let report = h.frame();
        assert_eq!(report.state, ManipulationState::Dragging(b));
        assert!(report.events.contains(&EditorEvent::TransformPushed {
            entity: b,
            shape_rebuilt: false
        }));

        let rb = h.editor.state.registry.body(b).unwrap();
        let body_pos = h.editor.state.physics.body_pose(rb.handle).unwrap().0;
        assert!(body_pos.abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-5));

        // Nothing touched this frame: back to Selected, pose kept.
        let report = h.frame();
        assert_eq!(report.state, ManipulationState::Selected(b));
        let pose = h.editor.state.registry.transform(b).unwrap();
        assert!(pose.position.abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_gizmo_wins_over_physics_step_on_dynamic_body() {
        let mut h = Harness::new(empty_config());
        let b = h.add(Vec3::ZERO, 1.0);
        h.click(400.0, 300.0);
        assert_eq!(h.editor.state.selected(), Some(b));

        let target = Vec3::new(2.0, 7.0, 0.0);
        h.ui.drag_gizmo_to(Mat4::from_translation(target));
        let report = h.frame();
        assert_eq!(report.physics_steps, 1);
        assert_eq!(report.state, ManipulationState::Dragging(b));

        let rb = h.editor.state.registry.body(b).unwrap();
        let check = |editor: &Editor| {
            let pose = editor.state.registry.transform(b).unwrap();
            let (body_pos, body_rot) = editor.state.physics.body_pose(rb.handle).unwrap();
            assert!(pose.position.abs_diff_eq(target, 1e-5));
            assert!(body_pos.abs_diff_eq(target, 1e-5));
            assert!(body_rot.abs_diff_eq(Quat::IDENTITY, 1e-5));
        };
        check(&h.editor);

        // Gravity gets a full step on the next frame and still loses.
        let report = h.frame();
        assert_eq!(report.physics_steps, 1);
        check(&h.editor);
        assert_eq!(h.editor.state.physics.linvel(rb.handle), Some(Vec3::ZERO));
    }

    #[test]
    fn test_field_and_gizmo_last_write_wins() {
        let mut h = Harness::new(empty_config());
        let b = h.add(Vec3::ZERO, 0.0);
        h.click(400.0, 300.0);

        h.ui.commit_field(TRANSLATION_LABEL, Vec3::new(1.0, 0.0, 0.0));
        h.ui.drag_gizmo_to(Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0)));
        h.frame();

        // The gizmo was drawn with the pose the fields had just written.
        let drawn = Mat4::from_cols_array(&h.ui.last_gizmo_matrix.unwrap());
        assert!(drawn.w_axis.truncate().abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));
        let pose = h.editor.state.registry.transform(b).unwrap();
        assert!(pose.position.abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-5));
    }

    #[test]
    fn test_selected_dynamic_body_is_held_against_gravity() {
        let mut h = Harness::new(empty_config());
        let held = h.add(Vec3::ZERO, 1.0);
        let free = h.add(Vec3::new(4.0, 0.0, 0.0), 1.0);
        h.click(400.0, 300.0);
        assert_eq!(h.editor.state.selected(), Some(held));
        // Both fell for one step before the pick landed.
        let grabbed_at = h.editor.state.registry.transform(held).unwrap().position;
        let free_start = h.editor.state.registry.transform(free).unwrap().position;

        for _ in 0..10 {
            h.frame();
        }
        let registry = &h.editor.state.registry;
        assert!(registry.transform(held).unwrap().position.abs_diff_eq(grabbed_at, 1e-5));
        assert!(registry.transform(free).unwrap().position.y < free_start.y);
    }

    #[test]
    fn test_removed_selection_is_reported_stale() {
        let mut h = Harness::new(empty_config());
        let b = h.add(Vec3::ZERO, 0.0);
        h.click(400.0, 300.0);

        let state = &mut h.editor.state;
        state.registry.remove(b, &mut state.physics).unwrap();
        let report = h.frame();
        assert_eq!(report.state, ManipulationState::Idle);
        assert!(report.events.contains(&EditorEvent::StaleSelection { entity: b }));
    }

    #[test]
    fn test_view_cube_turns_camera() {
        let mut h = Harness::new(empty_config());
        let mut side = Camera::default();
        side.look_at(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO);
        h.ui.turn_view_cube(side.view_matrix());
        h.frame();

        let camera = &h.editor.state.camera;
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 10.0));
        assert!(camera.orientation.dot(side.orientation).abs() > 0.9999);
    }

    #[test]
    fn test_frame_renders_both_passes() {
        let mut config = empty_config();
        config.scene.count = 4;
        let mut h = Harness::new(config);
        let report = h.frame();
        assert_eq!(report.physics_steps, 1);
        assert_eq!(report.render.depth_draws, 4);
        assert_eq!(report.render.lit_draws, 4);
        assert_eq!(h.backend.draw_count(), 8);
    }

    #[test]
    fn test_snapshot_and_shutdown() {
        let mut h = Harness::new(empty_config());
        let b = h.add(Vec3::ZERO, 0.0);
        h.click(400.0, 300.0);

        let snapshot = h.editor.snapshot();
        assert_eq!(snapshot.selected, Some(b.to_bits().get()));
        assert_eq!(snapshot.components.len(), 1);
        assert!(snapshot.components[0].manipulated);

        h.editor.shutdown();
        assert!(h.editor.state.registry.is_empty());
        assert_eq!(h.editor.state.physics.rigid_body_set.len(), 0);
        assert_eq!(h.editor.state.selected(), None);
    }
}
