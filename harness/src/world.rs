//! A tiny deterministic entity world with point-mass 2D bodies.

use std::collections::BTreeMap;

use gameplay::{Body2D, BodyKind, EntityHandle, EntityWorld, Pose, PrefabId, PrefabSpec};
use glam::Vec2;
use log::trace;

/// A unit-mass 2D body integrated with explicit Euler steps.
#[derive(Debug, Clone, PartialEq)]
pub struct SimBody {
    pub position: Vec2,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub kind: BodyKind,
    pub simulated: bool,
    kinematic_target: Option<Vec2>,
}

impl SimBody {
    #[must_use]
    pub const fn new(position: Vec2, kind: BodyKind) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            kind,
            simulated: true,
            kinematic_target: None,
        }
    }

    fn step(&mut self, dt: f32) {
        if !self.simulated {
            return;
        }
        match self.kind {
            BodyKind::Dynamic => self.position += self.velocity * dt,
            BodyKind::Kinematic => {
                if let Some(target) = self.kinematic_target.take() {
                    if dt > 0.0 {
                        self.velocity = (target - self.position) / dt;
                    }
                    self.position = target;
                }
            }
        }
    }
}

impl Body2D for SimBody {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.kinematic_target = None;
    }

    fn linear_velocity(&self) -> Vec2 {
        self.velocity
    }

    fn set_linear_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    fn set_angular_velocity(&mut self, velocity: f32) {
        self.angular_velocity = velocity;
    }

    fn mass(&self) -> f32 {
        1.0
    }

    fn kind(&self) -> BodyKind {
        self.kind
    }

    fn set_kind(&mut self, kind: BodyKind) {
        self.kind = kind;
        self.kinematic_target = None;
    }

    fn move_position(&mut self, position: Vec2) {
        self.kinematic_target = Some(position);
    }

    fn is_simulated(&self) -> bool {
        self.simulated
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimEntity {
    pub prefab: PrefabId,
    pub name: String,
    pub pose: Pose,
    pub body: Option<SimBody>,
}

/// Entities keyed by handle. Handles are never reused.
#[derive(Debug, Default)]
pub struct SimWorld {
    next: u64,
    entities: BTreeMap<EntityHandle, SimEntity>,
    destroyed: usize,
}

impl SimWorld {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity outside of any prefab spawn, e.g. a level object.
    pub fn insert(&mut self, name: impl Into<String>, pose: Pose, body: Option<BodyKind>) -> EntityHandle {
        self.next += 1;
        let handle = EntityHandle(self.next);
        self.entities.insert(
            handle,
            SimEntity {
                prefab: PrefabId::default(),
                name: name.into(),
                pose,
                body: body.map(|kind| SimBody::new(pose.position.truncate(), kind)),
            },
        );
        handle
    }

    #[must_use]
    pub fn entity(&self, handle: EntityHandle) -> Option<&SimEntity> {
        self.entities.get(&handle)
    }

    pub fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut SimEntity> {
        self.entities.get_mut(&handle)
    }

    #[must_use]
    pub fn body(&self, handle: EntityHandle) -> Option<&SimBody> {
        self.entities.get(&handle)?.body.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Total entities destroyed over the world's lifetime.
    #[must_use]
    pub const fn destroyed_count(&self) -> usize {
        self.destroyed
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &SimEntity)> {
        self.entities.iter().map(|(handle, entity)| (*handle, entity))
    }

    /// Handles of every live instance of `prefab`, oldest first.
    #[must_use]
    pub fn instances_of(&self, prefab: PrefabId) -> Vec<EntityHandle> {
        self.iter()
            .filter(|(_, entity)| entity.prefab == prefab)
            .map(|(handle, _)| handle)
            .collect()
    }

    /// Advances every body and copies its position into the pose.
    pub fn step_physics(&mut self, dt: f32) {
        for entity in self.entities.values_mut() {
            if let Some(body) = entity.body.as_mut() {
                body.step(dt);
                entity.pose.position.x = body.position.x;
                entity.pose.position.y = body.position.y;
            }
        }
    }
}

impl EntityWorld for SimWorld {
    fn instantiate(&mut self, prefab: PrefabId, spec: &PrefabSpec, pose: Pose) -> Option<EntityHandle> {
        self.next += 1;
        let handle = EntityHandle(self.next);
        trace!("instantiate {prefab} '{}' as {}", spec.name, handle.raw());
        self.entities.insert(
            handle,
            SimEntity {
                prefab,
                name: spec.name.clone(),
                pose,
                body: spec.body.map(|kind| SimBody::new(pose.position.truncate(), kind)),
            },
        );
        Some(handle)
    }

    fn destroy(&mut self, entity: EntityHandle) -> bool {
        let existed = self.entities.remove(&entity).is_some();
        if existed {
            self.destroyed += 1;
        }
        existed
    }

    fn pose(&self, entity: EntityHandle) -> Option<Pose> {
        self.entities.get(&entity).map(|entity| entity.pose)
    }

    fn set_pose(&mut self, entity: EntityHandle, pose: Pose) {
        if let Some(entity) = self.entities.get_mut(&entity) {
            entity.pose = pose;
            if let Some(body) = entity.body.as_mut() {
                body.set_position(pose.position.truncate());
            }
        }
    }

    fn body_2d(&mut self, entity: EntityHandle) -> Option<&mut dyn Body2D> {
        self.entities
            .get_mut(&entity)?
            .body
            .as_mut()
            .map(|body| body as &mut dyn Body2D)
    }
}
