//! Pose replication with dirty-flag updates and exponential smoothing.

use glam::{Quat, Vec3};
use wire::TransformState;

use crate::authority::{Authority, LocalPeer};
use crate::identity::NetworkIdentity;
use crate::world::{BodyKind, EntityWorld};

/// Send and receive tuning for [`TransformSync`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransformSyncSettings {
    /// Seconds between send attempts.
    pub send_interval: f32,
    /// Minimum movement before position is resent.
    pub position_threshold: f32,
    /// Minimum rotation, in degrees, before rotation is resent.
    pub rotation_threshold_degrees: f32,
    pub sync_position: bool,
    pub sync_rotation: bool,
    /// Smoothing rate toward the last received pose; zero snaps.
    pub interpolation_speed: f32,
}

impl Default for TransformSyncSettings {
    fn default() -> Self {
        Self {
            send_interval: 0.05,
            position_threshold: 0.01,
            rotation_threshold_degrees: 0.5,
            sync_position: true,
            sync_rotation: true,
            interpolation_speed: 12.0,
        }
    }
}

impl TransformSyncSettings {
    /// Clamps negative tuning values to zero.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            send_interval: self.send_interval.max(0.0),
            position_threshold: self.position_threshold.max(0.0),
            rotation_threshold_degrees: self.rotation_threshold_degrees.max(0.0),
            interpolation_speed: self.interpolation_speed.max(0.0),
            ..self
        }
    }
}

/// Exponential smoothing factor for one step: `1 - e^(-speed * dt)`.
#[must_use]
pub fn smoothing_factor(speed: f32, dt: f32) -> f32 {
    if speed <= 0.0 {
        return 1.0;
    }
    1.0 - (-speed * dt).exp()
}

/// Replicates one entity's pose.
///
/// The authority holder samples the pose every `send_interval` and emits
/// only the components that moved past their thresholds. Everyone else
/// smooths toward the last received position and rotation, which are tracked
/// independently so a position-only update never disturbs rotation.
#[derive(Debug, Clone)]
pub struct TransformSync {
    identity: NetworkIdentity,
    authority: Authority,
    settings: TransformSyncSettings,
    send_timer: f32,
    last_sent_position: Vec3,
    last_sent_rotation: Quat,
    has_sent_once: bool,
    target_position: Option<Vec3>,
    target_rotation: Option<Quat>,
}

impl TransformSync {
    #[must_use]
    pub fn new(identity: NetworkIdentity, settings: TransformSyncSettings, authority: Authority) -> Self {
        Self {
            identity,
            authority,
            settings: settings.sanitized(),
            send_timer: 0.0,
            last_sent_position: Vec3::ZERO,
            last_sent_rotation: Quat::IDENTITY,
            has_sent_once: false,
            target_position: None,
            target_rotation: None,
        }
    }

    #[must_use]
    pub const fn identity(&self) -> NetworkIdentity {
        self.identity
    }

    #[must_use]
    pub const fn authority(&self) -> &Authority {
        &self.authority
    }

    #[must_use]
    pub const fn settings(&self) -> &TransformSyncSettings {
        &self.settings
    }

    #[must_use]
    pub const fn target_position(&self) -> Option<Vec3> {
        self.target_position
    }

    #[must_use]
    pub const fn target_rotation(&self) -> Option<Quat> {
        self.target_rotation
    }

    /// Replaces the authority. A mode change restarts the send cycle.
    pub fn set_authority(&mut self, authority: Authority) {
        if self.authority.mode != authority.mode {
            self.reset_send_state();
        }
        self.authority = authority;
    }

    pub fn set_settings(&mut self, settings: TransformSyncSettings) {
        self.settings = settings.sanitized();
        self.reset_send_state();
    }

    fn reset_send_state(&mut self) {
        self.send_timer = 0.0;
        self.has_sent_once = false;
    }

    fn is_ready(&self, peer: &LocalPeer) -> bool {
        peer.in_room && self.identity.id.is_valid()
    }

    /// Frame tick. Returns the update to broadcast, if one is due.
    pub fn frame(&mut self, peer: &LocalPeer, world: &mut dyn EntityWorld, dt: f32) -> Option<TransformState> {
        if !self.is_ready(peer) {
            return None;
        }
        if self.authority.is_local(peer) {
            self.send_timer += dt;
            if self.send_timer >= self.settings.send_interval {
                self.send_timer = 0.0;
                return self.sample(world);
            }
            return None;
        }
        self.interpolate(world, dt);
        None
    }

    /// Physics tick: drives a kinematic body toward the target position.
    pub fn physics(&mut self, peer: &LocalPeer, world: &mut dyn EntityWorld, dt: f32) {
        if !self.is_ready(peer) || self.authority.is_local(peer) {
            return;
        }
        let Some(target) = self.target_position else {
            return;
        };
        if !self.drives_body(world) {
            return;
        }
        let speed = self.settings.interpolation_speed;
        if let Some(body) = world.body_2d(self.identity.entity) {
            let target = target.truncate();
            let next = if speed <= 0.0 {
                target
            } else {
                body.position().lerp(target, smoothing_factor(speed, dt))
            };
            body.move_position(next);
        }
    }

    /// Stores an inbound update. Ignored while the local peer holds authority.
    pub fn apply_remote(&mut self, peer: &LocalPeer, state: &TransformState) -> bool {
        if !self.is_ready(peer) || self.authority.is_local(peer) {
            return false;
        }
        if let Some(position) = state.position {
            self.target_position = Some(position);
        }
        if let Some(rotation) = state.rotation {
            self.target_rotation = Some(rotation);
        }
        true
    }

    fn drives_body(&self, world: &mut dyn EntityWorld) -> bool {
        self.settings.sync_position
            && world
                .body_2d(self.identity.entity)
                .is_some_and(|body| body.is_simulated() && body.kind() == BodyKind::Kinematic)
    }

    fn sample(&mut self, world: &dyn EntityWorld) -> Option<TransformState> {
        let pose = world.pose(self.identity.entity)?;
        let threshold_sq = self.settings.position_threshold * self.settings.position_threshold;

        let position = (self.settings.sync_position
            && (!self.has_sent_once
                || pose.position.distance_squared(self.last_sent_position) >= threshold_sq))
            .then_some(pose.position);
        let rotation = (self.settings.sync_rotation
            && (!self.has_sent_once
                || pose.rotation.angle_between(self.last_sent_rotation).to_degrees()
                    >= self.settings.rotation_threshold_degrees))
            .then_some(pose.rotation);

        if position.is_none() && rotation.is_none() {
            return None;
        }
        if let Some(position) = position {
            self.last_sent_position = position;
        }
        if let Some(rotation) = rotation {
            self.last_sent_rotation = rotation;
        }
        self.has_sent_once = true;
        Some(TransformState {
            network_id: self.identity.id,
            position,
            rotation,
        })
    }

    fn interpolate(&self, world: &mut dyn EntityWorld, dt: f32) {
        if self.target_position.is_none() && self.target_rotation.is_none() {
            return;
        }
        let body_driven = self.drives_body(world);
        let Some(mut pose) = world.pose(self.identity.entity) else {
            return;
        };
        let speed = self.settings.interpolation_speed;
        let t = smoothing_factor(speed, dt);

        if self.settings.sync_position && !body_driven {
            if let Some(target) = self.target_position {
                pose.position = if speed <= 0.0 { target } else { pose.position.lerp(target, t) };
            }
        }
        if self.settings.sync_rotation {
            if let Some(target) = self.target_rotation {
                pose.rotation = if speed <= 0.0 { target } else { pose.rotation.slerp(target, t) };
            }
        }
        world.set_pose(self.identity.entity, pose);
    }
}
