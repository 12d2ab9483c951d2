//! Mouse-ray picking against the physics world.
//!
//! Everything here is a pure read of the physics and scene state. What to do
//! with a hit is the manipulation controller's business.

use glam::{Mat4, Vec2, Vec3, Vec4};
use rapier3d::prelude::ColliderHandle;

use crate::physics::PhysicsWorld;
use crate::scene::SceneRegistry;

/// Screen-space rectangle of the viewport, in window pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub position: Vec2,
    pub size: Vec2,
}

impl ViewportRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            size: Vec2::new(width, height),
        }
    }

    /// Convert a window cursor position to viewport-local coordinates.
    pub fn to_local(&self, cursor: Vec2) -> Vec2 {
        cursor - self.position
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub entity: hecs::Entity,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickResult {
    /// The ray touched nothing.
    Miss,
    Hit(PickHit),
    /// A collider was hit but no live scene component owns its body.
    Unowned {
        collider: ColliderHandle,
        point: Vec3,
        normal: Vec3,
    },
}

impl PickResult {
    pub fn entity(&self) -> Option<hecs::Entity> {
        match self {
            PickResult::Hit(hit) => Some(hit.entity),
            _ => None,
        }
    }
}

/// World-space ray under a viewport-local cursor position. `None` when the
/// viewport is empty, the cursor is outside it, or the camera matrices
/// cannot be inverted.
pub fn cursor_ray(cursor: Vec2, viewport_size: Vec2, projection: &Mat4, view: &Mat4) -> Option<Ray> {
    if viewport_size.x <= 0.0 || viewport_size.y <= 0.0 {
        return None;
    }
    if cursor.x < 0.0 || cursor.y < 0.0 || cursor.x > viewport_size.x || cursor.y > viewport_size.y {
        return None;
    }
    // A perspective determinant shrinks with `near`; only a zero or a
    // non-finite inverse is singular.
    if projection.determinant() == 0.0 || view.determinant() == 0.0 {
        return None;
    }
    let inverse_projection = projection.inverse();
    let inverse_view = view.inverse();
    if !inverse_projection.is_finite() || !inverse_view.is_finite() {
        return None;
    }

    let ndc_x = (2.0 * cursor.x) / viewport_size.x - 1.0;
    let ndc_y = 1.0 - (2.0 * cursor.y) / viewport_size.y;

    let eye = inverse_projection * Vec4::new(ndc_x, ndc_y, -1.0, 1.0);
    let eye_direction = Vec4::new(eye.x, eye.y, -1.0, 0.0);

    let direction = (inverse_view * eye_direction).truncate();
    let origin = inverse_view.w_axis.truncate();

    if !direction.is_finite() || !origin.is_finite() {
        return None;
    }
    let direction = direction.normalize_or_zero();
    if direction == Vec3::ZERO {
        return None;
    }
    Some(Ray { origin, direction })
}

/// Nearest component under the cursor.
pub fn pick(
    cursor: Vec2,
    viewport_size: Vec2,
    projection: &Mat4,
    view: &Mat4,
    max_distance: f32,
    physics: &PhysicsWorld,
    registry: &SceneRegistry,
) -> PickResult {
    pick_excluding(cursor, viewport_size, projection, view, max_distance, physics, registry, None)
}

/// Like [`pick`], ignoring the body of `exclude`.
#[allow(clippy::too_many_arguments)]
pub fn pick_excluding(
    cursor: Vec2,
    viewport_size: Vec2,
    projection: &Mat4,
    view: &Mat4,
    max_distance: f32,
    physics: &PhysicsWorld,
    registry: &SceneRegistry,
    exclude: Option<hecs::Entity>,
) -> PickResult {
    let Some(ray) = cursor_ray(cursor, viewport_size, projection, view) else {
        tracing::debug!("pick: no usable ray for cursor {}", cursor);
        return PickResult::Miss;
    };
    cast(&ray, max_distance, physics, registry, exclude)
}

/// Resolve a world-space ray to a pick result.
pub fn cast(
    ray: &Ray,
    max_distance: f32,
    physics: &PhysicsWorld,
    registry: &SceneRegistry,
    exclude: Option<hecs::Entity>,
) -> PickResult {
    let exclude_body = exclude.and_then(|e| registry.body(e)).map(|rb| rb.handle);
    let Some(hit) = physics.raycast(ray.origin, ray.direction, max_distance, exclude_body) else {
        return PickResult::Miss;
    };

    let owner = hit
        .body
        .and_then(|body| physics.body_to_entity.get(&body).copied())
        .filter(|&entity| registry.contains(entity));

    match owner {
        Some(entity) => PickResult::Hit(PickHit {
            entity,
            point: hit.point,
            normal: hit.normal,
            distance: hit.distance,
        }),
        None => {
            tracing::warn!("pick: collider {:?} has no owning component", hit.collider);
            PickResult::Unowned {
                collider: hit.collider,
                point: hit.point,
                normal: hit.normal,
            }
        }
    }
}
