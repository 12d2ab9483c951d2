use fusion_core::components::{Camera, MeshHandle, Transform};
use fusion_core::events::{EditorEvent, EventLog};
use glam::Vec3;

use crate::input::{InputState, MouseButton};
use crate::physics::PhysicsWorld;
use crate::picking::{self, PickResult, Ray};
use crate::scene::{BodyParams, SceneRegistry};
use crate::ui::EditorUi;

/// Offset along the hit normal so a dropped object rests on the surface.
const SURFACE_OFFSET: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolbarItem {
    pub name: String,
    pub mesh: MeshHandle,
}

/// Drag-to-spawn palette.
pub struct Toolbar {
    items: Vec<ToolbarItem>,
    labels: Vec<String>,
    pub spawn_distance: f32,
    pub grid: f32,
    pub body: BodyParams,
    selected_item: Option<usize>,
    spawned: Option<hecs::Entity>,
}

impl Toolbar {
    pub fn new(items: Vec<ToolbarItem>, spawn_distance: f32, grid: f32, body: BodyParams) -> Self {
        let labels = items.iter().map(|item| item.name.clone()).collect();
        Self {
            items,
            labels,
            spawn_distance,
            grid,
            body,
            selected_item: None,
            spawned: None,
        }
    }

    pub fn items(&self) -> &[ToolbarItem] {
        &self.items
    }

    pub fn selected_item(&self) -> Option<usize> {
        self.selected_item
    }

    /// Component created by the gesture in progress.
    pub fn spawned(&self) -> Option<hecs::Entity> {
        self.spawned
    }

    /// Run one frame of the drag gesture. Returns the entity created this
    /// frame, if any.
    pub fn update(
        &mut self,
        ui: &mut dyn EditorUi,
        input: &InputState,
        camera: &Camera,
        registry: &mut SceneRegistry,
        physics: &mut PhysicsWorld,
        events: &mut EventLog,
    ) -> Option<hecs::Entity> {
        let hovered = ui.toolbar_item_hovered(&self.labels);
        if self.selected_item.is_none() {
            self.selected_item = hovered;
        }

        let dragging = input.is_dragging(MouseButton::Left);
        let item = match self.selected_item {
            Some(item) if dragging => item,
            _ => {
                if hovered.is_none() && !dragging {
                    self.selected_item = None;
                    self.spawned = None;
                }
                return None;
            }
        };

        let viewport = ui.viewport_rect();
        let cursor = viewport.to_local(input.cursor_position());
        let ray = picking::cursor_ray(cursor, viewport.size, &camera.projection_matrix(), &camera.view_matrix())?;
        let point = self.drop_point(&ray, camera.far, physics, registry);

        if let Some(entity) = self.spawned.filter(|&e| registry.contains(e)) {
            if let Err(e) = registry.apply_pose(entity, Transform::from_position(point), physics) {
                tracing::warn!("Failed to move dragged component: {}", e);
            }
            return None;
        }

        let mesh = self.items.get(item)?.mesh;
        match registry.add_instance(physics, mesh, Transform::from_position(point), self.body) {
            Ok(entity) => {
                tracing::info!("Spawned '{}' at {}", self.items[item].name, point);
                events.emit(EditorEvent::Spawned { entity, position: point });
                self.spawned = Some(entity);
                Some(entity)
            }
            Err(e) => {
                tracing::warn!("Failed to spawn '{}': {}", self.items[item].name, e);
                None
            }
        }
    }

    /// Where the cursor ray puts a dragged object, floored to the grid.
    pub fn drop_point(&self, ray: &Ray, max_distance: f32, physics: &PhysicsWorld, registry: &SceneRegistry) -> Vec3 {
        let raw = match picking::cast(ray, max_distance, physics, registry, self.spawned) {
            PickResult::Hit(hit) => hit.point + hit.normal * SURFACE_OFFSET,
            PickResult::Unowned { point, normal, .. } => point + normal * SURFACE_OFFSET,
            PickResult::Miss => ray.at(self.spawn_distance),
        };
        if self.grid > 0.0 {
            (raw / self.grid).floor() * self.grid
        } else {
            raw
        }
    }
}
