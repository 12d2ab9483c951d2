use fusion_core::components::Camera;
use fusion_core::events::EventLog;

use crate::manipulation::ManipulationController;
use crate::physics::PhysicsWorld;
use crate::scene::SceneRegistry;
use crate::toolbar::Toolbar;

/// Everything the editor mutates from frame to frame. Passed around by
/// reference; there is no global editor state.
pub struct EditorSceneState {
    pub registry: SceneRegistry,
    pub physics: PhysicsWorld,
    pub controller: ManipulationController,
    pub toolbar: Toolbar,
    pub camera: Camera,
    pub events: EventLog,
}

impl EditorSceneState {
    pub fn new(
        registry: SceneRegistry,
        physics: PhysicsWorld,
        controller: ManipulationController,
        toolbar: Toolbar,
        camera: Camera,
    ) -> Self {
        Self {
            registry,
            physics,
            controller,
            toolbar,
            camera,
            events: EventLog::default(),
        }
    }

    pub fn selected(&self) -> Option<hecs::Entity> {
        self.controller.selected()
    }
}
