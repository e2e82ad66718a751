//! The seam between gameplay sync and the embedding application's world.

use glam::{Quat, Vec2, Vec3};

use crate::catalog::{PrefabId, PrefabSpec};
use crate::identity::EntityHandle;

/// World-space position and orientation of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self::new(Vec3::ZERO, Quat::IDENTITY);

    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// How the physics engine treats a 2D body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BodyKind {
    /// Simulated: forces, collisions and velocity integrate the body.
    #[default]
    Dynamic,
    /// Moved only through [`Body2D::move_position`].
    Kinematic,
}

/// A 2D rigid body owned by the world.
pub trait Body2D {
    fn position(&self) -> Vec2;

    /// Teleports the body.
    fn set_position(&mut self, position: Vec2);

    fn linear_velocity(&self) -> Vec2;

    fn set_linear_velocity(&mut self, velocity: Vec2);

    fn set_angular_velocity(&mut self, velocity: f32);

    fn mass(&self) -> f32;

    fn kind(&self) -> BodyKind;

    fn set_kind(&mut self, kind: BodyKind);

    /// Moves a kinematic body to `position` over the next physics step.
    fn move_position(&mut self, position: Vec2);

    /// `false` while the body is excluded from simulation.
    fn is_simulated(&self) -> bool;
}

/// The embedding application's entity store.
pub trait EntityWorld {
    /// Creates an instance of `prefab` at `pose`.
    fn instantiate(&mut self, prefab: PrefabId, spec: &PrefabSpec, pose: Pose) -> Option<EntityHandle>;

    /// Destroys an entity. Returns `false` if it did not exist.
    fn destroy(&mut self, entity: EntityHandle) -> bool;

    fn pose(&self, entity: EntityHandle) -> Option<Pose>;

    fn set_pose(&mut self, entity: EntityHandle, pose: Pose);

    /// The entity's 2D body, if it has one.
    fn body_2d(&mut self, entity: EntityHandle) -> Option<&mut dyn Body2D>;
}
