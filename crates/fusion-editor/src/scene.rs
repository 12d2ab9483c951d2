use std::collections::BTreeMap;

use fusion_core::components::{Manipulated, MeshHandle, MeshInstance, Transform};
use glam::Vec3;
use rand::Rng;
use serde::Serialize;

use crate::mesh::MeshCache;
use crate::physics::{self, Collider, PhysicsBodyType, PhysicsWorld, RigidBody};

#[derive(Debug)]
pub enum SceneError {
    UnknownMesh(MeshHandle),
    DegenerateShape { scale: Vec3 },
    UnknownComponent(hecs::Entity),
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMesh(handle) => write!(f, "Mesh {:?} is not loaded", handle),
            Self::DegenerateShape { scale } => {
                write!(f, "Cannot build a collision hull at scale {}", scale)
            }
            Self::UnknownComponent(entity) => write!(f, "Scene component {:?} does not exist", entity),
        }
    }
}

impl std::error::Error for SceneError {}

/// Scale changes smaller than this keep the current collision hull. Matrix
/// decomposition of a pure rotation edit can move column lengths by an ulp.
const SCALE_EPSILON: f32 = 1e-5;

/// Physical parameters of a new component's body.
#[derive(Debug, Clone, Copy)]
pub struct BodyParams {
    pub mass: f32,
    pub restitution: f32,
    pub friction: f32,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            mass: 0.0,
            restitution: 1.0,
            friction: 0.5,
        }
    }
}

/// Outcome of writing a pose into a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseUpdate {
    pub shape_rebuilt: bool,
}

/// Parameters of the bulk initial spawn.
#[derive(Debug, Clone, Copy)]
pub struct ScatterParams {
    pub count: usize,
    /// Positions land on integer cells in `[-spread / 2, spread / 2)`.
    pub spread: i32,
    pub body: BodyParams,
}

/// Serializable view of one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSnapshot {
    pub id: u64,
    pub mesh: usize,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub manipulated: bool,
    pub dynamic: bool,
}

/// Owns every scene component: render pose, mesh instance, rigid body and
/// collision shape, plus the mesh -> instances grouping used for batching.
pub struct SceneRegistry {
    pub world: hecs::World,
    pub meshes: MeshCache,
    batches: BTreeMap<MeshHandle, Vec<hecs::Entity>>,
    next_shape_id: u64,
}

impl SceneRegistry {
    pub fn new(meshes: MeshCache) -> Self {
        Self {
            world: hecs::World::new(),
            meshes,
            batches: BTreeMap::new(),
            next_shape_id: 0,
        }
    }

    /// Create a component: mesh instance, convex hull scaled by the pose,
    /// and a rigid body at the pose's position and rotation.
    pub fn add_instance(
        &mut self,
        physics: &mut PhysicsWorld,
        mesh: MeshHandle,
        pose: Transform,
        body: BodyParams,
    ) -> Result<hecs::Entity, SceneError> {
        let mesh_data = self.meshes.get(mesh).ok_or(SceneError::UnknownMesh(mesh))?;
        let shape = physics::build_collision_shape(&mesh_data.positions, pose.scale)
            .ok_or(SceneError::DegenerateShape { scale: pose.scale })?;

        let entity = self.world.spawn((pose, MeshInstance { mesh }));
        let (rb_handle, col_handle, body_type) = physics.add_body(
            entity,
            shape,
            body.mass,
            pose.rotation,
            pose.position,
            body.restitution,
            body.friction,
        );

        let shape_id = self.allocate_shape_id();
        // The entity was spawned just above, insertion cannot fail.
        let _ = self.world.insert(
            entity,
            (
                RigidBody {
                    handle: rb_handle,
                    body_type,
                },
                Collider {
                    handle: col_handle,
                    shape_id,
                },
            ),
        );
        self.batches.entry(mesh).or_default().push(entity);

        tracing::debug!("Added component {:?} at {}", entity, pose.position);
        Ok(entity)
    }

    /// Bulk spawn for the initial scene.
    pub fn populate<R: Rng>(
        &mut self,
        physics: &mut PhysicsWorld,
        mesh: MeshHandle,
        params: &ScatterParams,
        rng: &mut R,
    ) -> Result<Vec<hecs::Entity>, SceneError> {
        let spread = params.spread.max(1);
        let mut spawned = Vec::with_capacity(params.count);
        for _ in 0..params.count {
            let mut cell = || (rng.gen_range(0..spread) - spread / 2) as f32;
            let position = Vec3::new(cell(), cell(), cell());
            let entity =
                self.add_instance(physics, mesh, Transform::from_position(position), params.body)?;
            spawned.push(entity);
        }
        tracing::info!("Populated scene with {} components", spawned.len());
        Ok(spawned)
    }

    /// Write a full pose into the render instance and the rigid body. The
    /// collision hull is rebuilt only when the scale changed.
    pub fn apply_pose(
        &mut self,
        entity: hecs::Entity,
        pose: Transform,
        physics: &mut PhysicsWorld,
    ) -> Result<PoseUpdate, SceneError> {
        let (old_scale, mesh, rb_handle, col_handle) = {
            let mut query = self
                .world
                .query_one::<(&Transform, &MeshInstance, &RigidBody, &Collider)>(entity)
                .map_err(|_| SceneError::UnknownComponent(entity))?;
            let (transform, instance, rb, col) =
                query.get().ok_or(SceneError::UnknownComponent(entity))?;
            (transform.scale, instance.mesh, rb.handle, col.handle)
        };

        if let Ok(mut transform) = self.world.get::<&mut Transform>(entity) {
            *transform = pose;
        }
        physics.set_world_transform(rb_handle, pose.position, pose.rotation);

        let mut shape_rebuilt = false;
        if !old_scale.abs_diff_eq(pose.scale, SCALE_EPSILON) {
            let shape = self
                .meshes
                .get(mesh)
                .and_then(|m| physics::build_collision_shape(&m.positions, pose.scale));
            match shape {
                Some(shape) => {
                    physics.replace_shape(col_handle, shape);
                    let shape_id = self.allocate_shape_id();
                    if let Ok(mut collider) = self.world.get::<&mut Collider>(entity) {
                        collider.shape_id = shape_id;
                    }
                    shape_rebuilt = true;
                }
                None => tracing::warn!(
                    "Keeping previous collision shape for {:?}: scale {} is degenerate",
                    entity,
                    pose.scale
                ),
            }
        }

        Ok(PoseUpdate { shape_rebuilt })
    }

    /// Copy body poses into render transforms for every component the
    /// editor is not holding. Scale is left alone.
    pub fn sync_from_physics(&mut self, physics: &PhysicsWorld) {
        for (_entity, (transform, rb, manipulated)) in self
            .world
            .query_mut::<(&mut Transform, &RigidBody, Option<&Manipulated>)>()
        {
            if manipulated.is_some() {
                continue;
            }
            if let Some((position, rotation)) = physics.body_pose(rb.handle) {
                transform.position = position;
                transform.rotation = rotation;
            }
        }
    }

    pub fn set_manipulated(&mut self, entity: hecs::Entity, manipulated: bool) {
        if manipulated {
            let _ = self.world.insert_one(entity, Manipulated);
        } else {
            let _ = self.world.remove_one::<Manipulated>(entity);
        }
    }

    pub fn is_manipulated(&self, entity: hecs::Entity) -> bool {
        self.world.get::<&Manipulated>(entity).is_ok()
    }

    pub fn manipulated_count(&self) -> usize {
        self.world.query::<&Manipulated>().iter().count()
    }

    pub fn contains(&self, entity: hecs::Entity) -> bool {
        self.world.contains(entity)
    }

    pub fn transform(&self, entity: hecs::Entity) -> Option<Transform> {
        self.world.get::<&Transform>(entity).ok().map(|t| *t)
    }

    pub fn body(&self, entity: hecs::Entity) -> Option<RigidBody> {
        self.world.get::<&RigidBody>(entity).ok().map(|rb| (*rb).clone())
    }

    pub fn collider(&self, entity: hecs::Entity) -> Option<Collider> {
        self.world.get::<&Collider>(entity).ok().map(|c| (*c).clone())
    }

    pub fn shape_id(&self, entity: hecs::Entity) -> Option<u64> {
        self.collider(entity).map(|c| c.shape_id)
    }

    pub fn mesh_of(&self, entity: hecs::Entity) -> Option<MeshHandle> {
        self.world.get::<&MeshInstance>(entity).ok().map(|m| m.mesh)
    }

    /// Instance transforms grouped by mesh, in mesh handle order.
    pub fn batches(&self) -> Vec<(MeshHandle, Vec<Transform>)> {
        self.batches
            .iter()
            .map(|(&mesh, entities)| {
                let transforms = entities
                    .iter()
                    .filter_map(|&e| self.transform(e))
                    .collect();
                (mesh, transforms)
            })
            .collect()
    }

    /// Destroy one component and its body.
    pub fn remove(&mut self, entity: hecs::Entity, physics: &mut PhysicsWorld) -> Result<(), SceneError> {
        let rb = self.body(entity).ok_or(SceneError::UnknownComponent(entity))?;
        let mesh = self.mesh_of(entity);
        physics.remove_body(rb.handle);
        let _ = self.world.despawn(entity);
        if let Some(list) = mesh.and_then(|m| self.batches.get_mut(&m)) {
            list.retain(|&e| e != entity);
        }
        Ok(())
    }

    /// Tear the whole scene down.
    pub fn clear(&mut self, physics: &mut PhysicsWorld) {
        let handles: Vec<_> = self
            .world
            .query::<&RigidBody>()
            .iter()
            .map(|(_, rb)| rb.handle)
            .collect();
        for handle in handles {
            physics.remove_body(handle);
        }
        self.world.clear();
        self.batches.clear();
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<ComponentSnapshot> {
        let mut out: Vec<ComponentSnapshot> = self
            .world
            .query::<(&Transform, &MeshInstance, &RigidBody, Option<&Manipulated>)>()
            .iter()
            .map(|(entity, (t, instance, rb, manipulated))| ComponentSnapshot {
                id: entity.to_bits().get(),
                mesh: instance.mesh.0,
                position: t.position.to_array(),
                rotation: t.rotation.to_array(),
                scale: t.scale.to_array(),
                manipulated: manipulated.is_some(),
                dynamic: rb.body_type == PhysicsBodyType::Dynamic,
            })
            .collect();
        out.sort_by_key(|c| c.id);
        out
    }

    fn allocate_shape_id(&mut self) -> u64 {
        self.next_shape_id += 1;
        self.next_shape_id
    }
}
