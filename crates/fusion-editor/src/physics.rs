use std::collections::HashMap;

use glam::{Quat, Vec3};
use rapier3d::na::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

/// Rigid body component attached to scene entities.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub handle: RigidBodyHandle,
    pub body_type: PhysicsBodyType,
}

/// Collider component attached to scene entities.
#[derive(Debug, Clone)]
pub struct Collider {
    pub handle: ColliderHandle,
    /// Bumped every time the collision shape is rebuilt.
    pub shape_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsBodyType {
    Dynamic,
    Static,
}

/// Nearest ray intersection reported by the query pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub collider: ColliderHandle,
    pub body: Option<RigidBodyHandle>,
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Central physics world state.
pub struct PhysicsWorld {
    pub gravity: Vec3,
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_params: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,

    // Mapping from Rapier body handles to scene entities
    pub body_to_entity: HashMap<RigidBodyHandle, hecs::Entity>,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_params: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            body_to_entity: HashMap::new(),
        }
    }

    /// Add a rigid body + collider owned by `entity`.
    ///
    /// A mass of zero (or less) creates a fixed body that only moves through
    /// [`PhysicsWorld::set_world_transform`].
    #[allow(clippy::too_many_arguments)]
    pub fn add_body(
        &mut self,
        entity: hecs::Entity,
        shape: SharedShape,
        mass: f32,
        rotation: Quat,
        position: Vec3,
        restitution: f32,
        friction: f32,
    ) -> (RigidBodyHandle, ColliderHandle, PhysicsBodyType) {
        let (builder, body_type) = if mass > 0.0 {
            (RigidBodyBuilder::dynamic(), PhysicsBodyType::Dynamic)
        } else {
            (RigidBodyBuilder::fixed(), PhysicsBodyType::Static)
        };
        let rb = builder.position(pose_to_isometry(position, rotation)).build();
        let rb_handle = self.rigid_body_set.insert(rb);

        let mut collider_builder = ColliderBuilder::new(shape)
            .restitution(restitution)
            .friction(friction);
        if mass > 0.0 {
            collider_builder = collider_builder.mass(mass);
        }
        let col_handle = self.collider_set.insert_with_parent(
            collider_builder.build(),
            rb_handle,
            &mut self.rigid_body_set,
        );

        self.body_to_entity.insert(rb_handle, entity);
        self.refresh_queries();

        (rb_handle, col_handle, body_type)
    }

    /// Step the physics simulation once.
    pub fn step(&mut self, dt: f32) {
        self.integration_params.dt = dt;
        let gravity = vector![self.gravity.x, self.gravity.y, self.gravity.z];

        self.physics_pipeline.step(
            &gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Rebuild the ray-query acceleration structure from current collider poses.
    pub fn refresh_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Current rigid pose of a body.
    pub fn body_pose(&self, rb_handle: RigidBodyHandle) -> Option<(Vec3, Quat)> {
        self.rigid_body_set
            .get(rb_handle)
            .map(|body| isometry_to_pose(body.position()))
    }

    pub fn linvel(&self, rb_handle: RigidBodyHandle) -> Option<Vec3> {
        self.rigid_body_set.get(rb_handle).map(|body| {
            let v = body.linvel();
            Vec3::new(v.x, v.y, v.z)
        })
    }

    pub fn angvel(&self, rb_handle: RigidBodyHandle) -> Option<Vec3> {
        self.rigid_body_set.get(rb_handle).map(|body| {
            let v = body.angvel();
            Vec3::new(v.x, v.y, v.z)
        })
    }

    /// Teleport a body. Writes the current position and the next (motion
    /// state) position so the solver does not interpolate back, then moves
    /// the attached colliders so ray queries see the new pose immediately.
    pub fn set_world_transform(&mut self, rb_handle: RigidBodyHandle, position: Vec3, rotation: Quat) {
        let iso = pose_to_isometry(position, rotation);
        let Some(body) = self.rigid_body_set.get_mut(rb_handle) else {
            tracing::warn!("set_world_transform: unknown body {:?}", rb_handle);
            return;
        };
        body.set_position(iso, true);
        body.set_next_kinematic_position(iso);

        let colliders: Vec<ColliderHandle> = body.colliders().to_vec();
        for col_handle in colliders {
            if let Some(collider) = self.collider_set.get_mut(col_handle) {
                let relative = collider
                    .position_wrt_parent()
                    .copied()
                    .unwrap_or_else(Isometry::identity);
                collider.set_position(iso * relative);
            }
        }
        self.refresh_queries();
    }

    /// Stop all linear and angular motion of a body.
    pub fn zero_velocity(&mut self, rb_handle: RigidBodyHandle) {
        if let Some(body) = self.rigid_body_set.get_mut(rb_handle) {
            body.set_linvel(vector![0.0, 0.0, 0.0], true);
            body.set_angvel(vector![0.0, 0.0, 0.0], true);
        }
    }

    /// Set the linear velocity of a rigid body.
    pub fn set_linvel(&mut self, rb_handle: RigidBodyHandle, velocity: Vec3) {
        if let Some(body) = self.rigid_body_set.get_mut(rb_handle) {
            body.set_linvel(vector![velocity.x, velocity.y, velocity.z], true);
        }
    }

    /// Swap the collision shape of a collider. Shapes are immutable, so a
    /// scale change always goes through a freshly built shape.
    pub fn replace_shape(&mut self, col_handle: ColliderHandle, shape: SharedShape) {
        if let Some(collider) = self.collider_set.get_mut(col_handle) {
            collider.set_shape(shape);
        }
        self.refresh_queries();
    }

    pub fn collider_shape(&self, col_handle: ColliderHandle) -> Option<&SharedShape> {
        self.collider_set.get(col_handle).map(|c| c.shared_shape())
    }

    /// Cast a ray and return the nearest hit, optionally ignoring one body.
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude_body: Option<RigidBodyHandle>,
    ) -> Option<RayHit> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }
        let ray = Ray::new(
            point![origin.x, origin.y, origin.z],
            vector![dir.x, dir.y, dir.z],
        );

        let filter = match exclude_body {
            Some(rb) => QueryFilter::default().exclude_rigid_body(rb),
            None => QueryFilter::default(),
        };

        let (handle, intersection) = self.query_pipeline.cast_ray_and_get_normal(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            max_distance,
            true,
            filter,
        )?;

        let toi = intersection.time_of_impact;
        Some(RayHit {
            collider: handle,
            body: self.collider_set.get(handle).and_then(|c| c.parent()),
            distance: toi,
            point: origin + dir * toi,
            normal: Vec3::new(
                intersection.normal.x,
                intersection.normal.y,
                intersection.normal.z,
            ),
        })
    }

    /// Remove a body and its colliders.
    pub fn remove_body(&mut self, rb_handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            rb_handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        self.body_to_entity.remove(&rb_handle);
        self.refresh_queries();
    }
}

/// Convex hull of `positions` scaled per axis. `None` for degenerate input
/// such as a zero scale component.
pub fn build_collision_shape(positions: &[Vec3], scale: Vec3) -> Option<SharedShape> {
    let points: Vec<Point<Real>> = positions
        .iter()
        .map(|p| {
            let s = *p * scale;
            point![s.x, s.y, s.z]
        })
        .collect();
    SharedShape::convex_hull(&points)
}

/// Rigid physics transform of a pose. Scale never crosses this boundary.
pub fn pose_to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry3::from_parts(
        Translation3::new(position.x, position.y, position.z),
        UnitQuaternion::from_quaternion(Quaternion::new(
            rotation.w, rotation.x, rotation.y, rotation.z,
        )),
    )
}

pub fn isometry_to_pose(iso: &Isometry<Real>) -> (Vec3, Quat) {
    let pos = iso.translation;
    let rot = iso.rotation;
    (
        Vec3::new(pos.x, pos.y, pos.z),
        Quat::from_xyzw(rot.i, rot.j, rot.k, rot.w).normalize(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_points() -> Vec<Vec3> {
        let mut points = Vec::new();
        for x in [-0.5, 0.5] {
            for y in [-0.5, 0.5] {
                for z in [-0.5, 0.5] {
                    points.push(Vec3::new(x, y, z));
                }
            }
        }
        points
    }

    fn cube_shape() -> SharedShape {
        build_collision_shape(&cube_points(), Vec3::ONE).unwrap()
    }

    #[test]
    fn test_physics_world_creation() {
        let pw = PhysicsWorld::new(Vec3::new(0.0, -9.81, 0.0));
        assert_eq!(pw.rigid_body_set.len(), 0);
        assert_eq!(pw.collider_set.len(), 0);
    }

    #[test]
    fn test_isometry_round_trip() {
        let position = Vec3::new(1.0, -2.0, 3.5);
        let rotation = Quat::from_rotation_x(0.4) * Quat::from_rotation_y(-1.1);
        let (p, r) = isometry_to_pose(&pose_to_isometry(position, rotation));
        assert!(p.abs_diff_eq(position, 1e-5));
        assert!(r.dot(rotation).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn test_add_static_body() {
        let mut world = hecs::World::new();
        let entity = world.spawn(());
        let mut pw = PhysicsWorld::new(Vec3::new(0.0, -9.81, 0.0));

        let (rb, _col, body_type) = pw.add_body(
            entity,
            cube_shape(),
            0.0,
            Quat::IDENTITY,
            Vec3::ZERO,
            1.0,
            0.5,
        );

        assert_eq!(body_type, PhysicsBodyType::Static);
        assert_eq!(pw.rigid_body_set.len(), 1);
        assert_eq!(pw.collider_set.len(), 1);
        assert_eq!(pw.body_to_entity[&rb], entity);
    }

    #[test]
    fn test_static_body_ignores_gravity() {
        let mut world = hecs::World::new();
        let entity = world.spawn(());
        let mut pw = PhysicsWorld::new(Vec3::new(0.0, -9.81, 0.0));
        let start = Vec3::new(2.0, 3.0, 4.0);
        let (rb, _, _) = pw.add_body(entity, cube_shape(), 0.0, Quat::IDENTITY, start, 1.0, 0.5);

        for _ in 0..10 {
            pw.step(1.0 / 60.0);
        }
        let (position, _) = pw.body_pose(rb).unwrap();
        assert_eq!(position, start);
    }

    #[test]
    fn test_dynamic_body_falls() {
        let mut world = hecs::World::new();
        let entity = world.spawn(());
        let mut pw = PhysicsWorld::new(Vec3::new(0.0, -9.81, 0.0));
        let (rb, _, body_type) =
            pw.add_body(entity, cube_shape(), 1.0, Quat::IDENTITY, Vec3::ZERO, 0.0, 0.5);
        assert_eq!(body_type, PhysicsBodyType::Dynamic);

        for _ in 0..10 {
            pw.step(1.0 / 60.0);
        }
        let (position, _) = pw.body_pose(rb).unwrap();
        assert!(position.y < 0.0);
    }

    #[test]
    fn test_set_world_transform_moves_body_and_ray_target() {
        let mut world = hecs::World::new();
        let entity = world.spawn(());
        let mut pw = PhysicsWorld::new(Vec3::ZERO);
        let (rb, _, _) = pw.add_body(entity, cube_shape(), 0.0, Quat::IDENTITY, Vec3::ZERO, 1.0, 0.5);

        pw.set_world_transform(rb, Vec3::new(5.0, 0.0, 0.0), Quat::IDENTITY);
        let (position, _) = pw.body_pose(rb).unwrap();
        assert_eq!(position, Vec3::new(5.0, 0.0, 0.0));

        let old = pw.raycast(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z, 100.0, None);
        assert!(old.is_none());
        let new = pw.raycast(Vec3::new(5.0, 0.0, 10.0), Vec3::NEG_Z, 100.0, None);
        assert_eq!(new.unwrap().body, Some(rb));
    }

    #[test]
    fn test_raycast() {
        let mut world = hecs::World::new();
        let entity = world.spawn(());
        let mut pw = PhysicsWorld::new(Vec3::new(0.0, -9.81, 0.0));

        let floor = build_collision_shape(&cube_points(), Vec3::new(20.0, 1.0, 20.0)).unwrap();
        pw.add_body(entity, floor, 0.0, Quat::IDENTITY, Vec3::new(0.0, -1.0, 0.0), 0.0, 0.5);

        let hit = pw
            .raycast(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -1.0, 0.0), 100.0, None)
            .unwrap();
        assert_eq!(pw.body_to_entity[&hit.body.unwrap()], entity);
        assert!((hit.distance - 5.5).abs() < 1e-3);
        assert!(hit.normal.abs_diff_eq(Vec3::Y, 1e-3));
        assert!(hit.point.abs_diff_eq(Vec3::new(0.0, -0.5, 0.0), 1e-3));
    }

    #[test]
    fn test_raycast_excluding_body() {
        let mut world = hecs::World::new();
        let near = world.spawn(());
        let far = world.spawn(());
        let mut pw = PhysicsWorld::new(Vec3::ZERO);
        let (near_rb, _, _) =
            pw.add_body(near, cube_shape(), 0.0, Quat::IDENTITY, Vec3::new(0.0, 0.0, 5.0), 1.0, 0.5);
        let (far_rb, _, _) =
            pw.add_body(far, cube_shape(), 0.0, Quat::IDENTITY, Vec3::ZERO, 1.0, 0.5);

        let origin = Vec3::new(0.0, 0.0, 10.0);
        let hit = pw.raycast(origin, Vec3::NEG_Z, 100.0, None).unwrap();
        assert_eq!(hit.body, Some(near_rb));
        let hit = pw.raycast(origin, Vec3::NEG_Z, 100.0, Some(near_rb)).unwrap();
        assert_eq!(hit.body, Some(far_rb));
    }

    #[test]
    fn test_degenerate_shape_is_rejected() {
        assert!(build_collision_shape(&cube_points(), Vec3::new(1.0, 0.0, 1.0)).is_none());
    }

    #[test]
    fn test_zero_velocity() {
        let mut world = hecs::World::new();
        let entity = world.spawn(());
        let mut pw = PhysicsWorld::new(Vec3::ZERO);
        let (rb, _, _) = pw.add_body(entity, cube_shape(), 1.0, Quat::IDENTITY, Vec3::ZERO, 0.0, 0.5);

        pw.set_linvel(rb, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(pw.linvel(rb), Some(Vec3::new(3.0, 0.0, 0.0)));
        pw.zero_velocity(rb);
        assert_eq!(pw.linvel(rb), Some(Vec3::ZERO));
        assert_eq!(pw.angvel(rb), Some(Vec3::ZERO));
    }
}
