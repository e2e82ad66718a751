//! 2D rigidbody replication with prediction and reconciliation.
//!
//! The authority holder sends sequenced position/velocity samples. Receivers
//! keep a predicted state that is extrapolated every physics tick and blended
//! toward the latest sample, then either drive the body as a kinematic proxy
//! or nudge a live dynamic body with a corrective velocity.

use glam::Vec2;
use wire::{AuthorityMode, Rigidbody2DState};

use crate::authority::{Authority, LocalPeer};
use crate::identity::NetworkIdentity;
use crate::world::{Body2D, BodyKind, EntityWorld};

/// Normalizing a vector shorter than this is skipped.
const MIN_DIRECTION_SQ: f32 = 1e-4;
/// Steps shorter than this do not clamp the correction to the remaining error.
const MIN_STEP_SECONDS: f32 = 1e-4;

/// Send, receive and reconciliation tuning for [`Rigidbody2DSync`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RigidbodySyncSettings {
    pub send_interval: f32,
    pub position_threshold: f32,
    pub velocity_threshold: f32,
    pub position_correction_speed: f32,
    pub velocity_correction_speed: f32,
    /// Advance the prediction by its velocity every tick.
    pub extrapolate: bool,
    /// Drive remote bodies kinematically instead of reconciling live physics.
    pub kinematic_proxy: bool,
    /// Upper bound on the corrective velocity; zero disables the bound.
    pub max_correction_speed: f32,
    /// Error beyond which a dynamic body is teleported; zero disables snapping.
    pub snap_distance: f32,
    /// Share of the correction kept perpendicular to the direction of travel.
    pub perpendicular_correction_scale: f32,
    /// Seconds of reduced correction after a local prediction.
    pub prediction_hold: f32,
    /// Correction scale at the start of a hold.
    pub prediction_hold_min_scale: f32,
}

impl Default for RigidbodySyncSettings {
    fn default() -> Self {
        Self {
            send_interval: 0.05,
            position_threshold: 0.01,
            velocity_threshold: 0.05,
            position_correction_speed: 20.0,
            velocity_correction_speed: 20.0,
            extrapolate: true,
            kinematic_proxy: true,
            max_correction_speed: 35.0,
            snap_distance: 0.75,
            perpendicular_correction_scale: 0.25,
            prediction_hold: 0.12,
            prediction_hold_min_scale: 0.25,
        }
    }
}

impl RigidbodySyncSettings {
    /// Clamps rates and distances to zero and scales to `0..=1`.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            send_interval: self.send_interval.max(0.0),
            position_threshold: self.position_threshold.max(0.0),
            velocity_threshold: self.velocity_threshold.max(0.0),
            position_correction_speed: self.position_correction_speed.max(0.0),
            velocity_correction_speed: self.velocity_correction_speed.max(0.0),
            max_correction_speed: self.max_correction_speed.max(0.0),
            snap_distance: self.snap_distance.max(0.0),
            perpendicular_correction_scale: self.perpendicular_correction_scale.clamp(0.0, 1.0),
            prediction_hold: self.prediction_hold.max(0.0),
            prediction_hold_min_scale: self.prediction_hold_min_scale.clamp(0.0, 1.0),
            ..self
        }
    }
}

/// Converts a correction rate into a per-step blend factor.
#[must_use]
pub fn damp_to_lerp(speed: f32, dt: f32) -> f32 {
    if speed <= 0.0 {
        return 1.0;
    }
    1.0 - (-speed * dt).exp()
}

/// What happened to an inbound sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Applied,
    /// Sequence did not advance past the last accepted sample.
    Stale,
    /// The local peer holds authority.
    IgnoredAuthority,
    /// Not in a room, or the identity has no valid id.
    NotReady,
}

/// A position/velocity pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodySample {
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, Copy, Default)]
struct Hold {
    remaining: f32,
    total: f32,
}

impl Hold {
    fn extend(&mut self, seconds: f32) {
        self.total = self.total.max(seconds);
        self.remaining = self.remaining.max(seconds);
    }

    fn is_active(&self) -> bool {
        self.remaining > 0.0
    }

    /// Counts down and returns the correction scale for this step.
    fn step(&mut self, dt: f32, min_scale: f32) -> f32 {
        self.remaining = (self.remaining - dt).max(0.0);
        let t = if self.total > 0.0 {
            (self.remaining / self.total).clamp(0.0, 1.0)
        } else {
            0.0
        };
        if self.remaining <= 0.0 {
            self.total = 0.0;
        }
        1.0 + (min_scale - 1.0) * t
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Replicates one entity's 2D body.
#[derive(Debug, Clone)]
pub struct Rigidbody2DSync {
    identity: NetworkIdentity,
    authority: Authority,
    settings: RigidbodySyncSettings,
    send_timer: f32,
    last_sent: BodySample,
    has_sent_once: bool,
    /// Wraps to `i32::MIN` after `i32::MAX` sends; receivers then treat every
    /// later sample as stale until their gate is reset.
    send_sequence: i32,
    last_received_sequence: Option<i32>,
    network: Option<BodySample>,
    predicted: Option<BodySample>,
    hold: Hold,
}

impl Rigidbody2DSync {
    #[must_use]
    pub fn new(identity: NetworkIdentity, settings: RigidbodySyncSettings, authority: Authority) -> Self {
        Self {
            identity,
            authority,
            settings: settings.sanitized(),
            send_timer: 0.0,
            last_sent: BodySample::default(),
            has_sent_once: false,
            send_sequence: 0,
            last_received_sequence: None,
            network: None,
            predicted: None,
            hold: Hold::default(),
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
    pub const fn settings(&self) -> &RigidbodySyncSettings {
        &self.settings
    }

    #[must_use]
    pub const fn send_sequence(&self) -> i32 {
        self.send_sequence
    }

    #[must_use]
    pub const fn last_received_sequence(&self) -> Option<i32> {
        self.last_received_sequence
    }

    /// Latest accepted authoritative sample.
    #[must_use]
    pub const fn network_state(&self) -> Option<BodySample> {
        self.network
    }

    #[must_use]
    pub const fn predicted_state(&self) -> Option<BodySample> {
        self.predicted
    }

    #[must_use]
    pub fn is_holding(&self) -> bool {
        self.hold.is_active()
    }

    /// Replaces the authority. A different mode or owner restarts the send
    /// cycle and the sequence gate: the new sender numbers from its own counter.
    pub fn set_authority(&mut self, authority: Authority) {
        if self.authority != authority {
            self.reset_send_state();
            self.reset_remote_state();
        }
        self.authority = authority;
    }

    /// Host migration hands host-driven bodies to a new sender.
    pub fn host_changed(&mut self) {
        if self.authority.mode == AuthorityMode::Host {
            self.reset_remote_state();
        }
    }

    /// Replaces the settings. Changed send tuning restarts the send cycle.
    pub fn set_settings(&mut self, settings: RigidbodySyncSettings) {
        let settings = settings.sanitized();
        let differs = |a: f32, b: f32| (a - b).abs() > f32::EPSILON;
        let send_changed = differs(settings.send_interval, self.settings.send_interval)
            || differs(settings.position_threshold, self.settings.position_threshold)
            || differs(settings.velocity_threshold, self.settings.velocity_threshold);
        self.settings = settings;
        if send_changed {
            self.reset_send_state();
        }
    }

    /// Forgets every received sample, prediction and hold.
    pub fn reset_remote_state(&mut self) {
        self.network = None;
        self.predicted = None;
        self.last_received_sequence = None;
        self.hold.clear();
    }

    fn reset_send_state(&mut self) {
        self.send_timer = 0.0;
        self.has_sent_once = false;
    }

    fn is_ready(&self, peer: &LocalPeer) -> bool {
        peer.in_room && self.identity.id.is_valid()
    }

    /// Accepts an authoritative sample if its sequence advances.
    ///
    /// The first accepted sample seeds the prediction and teleports the body.
    pub fn apply_remote(
        &mut self,
        peer: &LocalPeer,
        world: &mut dyn EntityWorld,
        state: &Rigidbody2DState,
    ) -> SampleOutcome {
        if !self.is_ready(peer) {
            return SampleOutcome::NotReady;
        }
        if self.authority.is_local(peer) {
            return SampleOutcome::IgnoredAuthority;
        }
        if self.last_received_sequence.is_some_and(|last| state.sequence <= last) {
            return SampleOutcome::Stale;
        }
        self.last_received_sequence = Some(state.sequence);
        let sample = BodySample {
            position: state.position,
            velocity: state.velocity,
        };
        self.network = Some(sample);

        if self.predicted.is_none() {
            self.predicted = Some(sample);
            if let Some(body) = world.body_2d(self.identity.entity) {
                body.set_position(sample.position);
                body.set_linear_velocity(if self.settings.kinematic_proxy {
                    Vec2::ZERO
                } else {
                    sample.velocity
                });
                body.set_angular_velocity(0.0);
            }
        }
        SampleOutcome::Applied
    }

    /// Physics tick. Returns the sample to broadcast, if one is due.
    pub fn physics(
        &mut self,
        peer: &LocalPeer,
        world: &mut dyn EntityWorld,
        dt: f32,
    ) -> Option<Rigidbody2DState> {
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
        self.reconcile(world, dt);
        None
    }

    /// Applies a locally predicted impulse and opens a prediction hold.
    pub fn add_predicted_impulse(&mut self, peer: &LocalPeer, world: &mut dyn EntityWorld, impulse: Vec2) {
        if self.authority.is_local(peer) {
            return;
        }
        let entity = self.identity.entity;
        let body = world.body_2d(entity).map(|body| (body.position(), body.mass()));
        let (position, mass) = body.unwrap_or_else(|| {
            let position = world.pose(entity).map_or(Vec2::ZERO, |pose| pose.position.truncate());
            (position, 1.0)
        });
        let mass = if mass > 0.0 { mass } else { 1.0 };

        let predicted = self.predicted.get_or_insert(BodySample {
            position,
            velocity: Vec2::ZERO,
        });
        predicted.velocity += impulse / mass;
        if self.settings.prediction_hold > 0.0 {
            self.hold.extend(self.settings.prediction_hold);
        }
    }

    /// Reports that local physics moved the body; opens the default hold.
    pub fn notify_local_predicted_physics(&mut self, peer: &LocalPeer, world: &mut dyn EntityWorld) {
        self.notify_local_predicted_physics_for(peer, world, self.settings.prediction_hold);
    }

    /// Reports that local physics moved the body; opens a hold of `seconds`.
    pub fn notify_local_predicted_physics_for(
        &mut self,
        peer: &LocalPeer,
        world: &mut dyn EntityWorld,
        seconds: f32,
    ) {
        if seconds <= 0.0 || self.authority.is_local(peer) {
            return;
        }
        let Some(body) = world.body_2d(self.identity.entity) else {
            return;
        };
        self.predicted = Some(BodySample {
            position: body.position(),
            velocity: body.linear_velocity(),
        });
        self.hold.extend(seconds);
    }

    fn sample(&mut self, world: &mut dyn EntityWorld) -> Option<Rigidbody2DState> {
        let body = world.body_2d(self.identity.entity)?;
        let current = BodySample {
            position: body.position(),
            velocity: body.linear_velocity(),
        };
        if !self.should_send(current) {
            return None;
        }
        self.last_sent = current;
        self.has_sent_once = true;
        self.send_sequence = self.send_sequence.wrapping_add(1);
        Some(Rigidbody2DState {
            network_id: self.identity.id,
            sequence: self.send_sequence,
            position: current.position,
            velocity: current.velocity,
        })
    }

    fn should_send(&self, current: BodySample) -> bool {
        if !self.has_sent_once {
            return true;
        }
        let position_sq = self.settings.position_threshold * self.settings.position_threshold;
        if current.position.distance_squared(self.last_sent.position) >= position_sq {
            return true;
        }
        let velocity_sq = self.settings.velocity_threshold * self.settings.velocity_threshold;
        current.velocity.distance_squared(self.last_sent.velocity) >= velocity_sq
    }

    fn reconcile(&mut self, world: &mut dyn EntityWorld, dt: f32) {
        let Some(network) = self.network else {
            return;
        };
        let Some(body) = world.body_2d(self.identity.entity) else {
            return;
        };

        let mut predicted = self.predicted.unwrap_or(network);
        if self.settings.extrapolate {
            predicted.position += predicted.velocity * dt;
        }

        let mut position_t = damp_to_lerp(self.settings.position_correction_speed, dt);
        let mut velocity_t = damp_to_lerp(self.settings.velocity_correction_speed, dt);
        if self.hold.is_active() {
            predicted = BodySample {
                position: body.position(),
                velocity: body.linear_velocity(),
            };
            let scale = self.hold.step(dt, self.settings.prediction_hold_min_scale);
            position_t *= scale;
            velocity_t *= scale;
        }

        predicted.position = predicted.position.lerp(network.position, position_t);
        predicted.velocity = predicted.velocity.lerp(network.velocity, velocity_t);
        self.predicted = Some(predicted);

        if self.settings.kinematic_proxy {
            if body.kind() != BodyKind::Kinematic {
                body.set_kind(BodyKind::Kinematic);
            }
            body.move_position(predicted.position);
            return;
        }
        if body.kind() != BodyKind::Dynamic {
            body.set_kind(BodyKind::Dynamic);
        }
        self.reconcile_dynamic(body, predicted, velocity_t, dt);
    }

    fn reconcile_dynamic(&mut self, body: &mut dyn Body2D, target: BodySample, velocity_t: f32, dt: f32) {
        let error = target.position - body.position();

        // A pending snap wins over an active hold.
        let snap = self.settings.snap_distance;
        if snap > 0.0 && error.length_squared() > snap * snap {
            body.set_position(target.position);
            body.set_linear_velocity(target.velocity);
            body.set_angular_velocity(0.0);
            self.hold.clear();
            return;
        }

        let mut correction = error * self.settings.position_correction_speed;
        let perpendicular_scale = self.settings.perpendicular_correction_scale;
        if perpendicular_scale < 1.0 && target.velocity.length_squared() > MIN_DIRECTION_SQ {
            let direction = target.velocity.normalize();
            let parallel = direction * correction.dot(direction);
            let perpendicular = correction - parallel;
            correction = parallel + perpendicular * perpendicular_scale;
        }
        if dt > MIN_STEP_SECONDS {
            correction = correction.clamp_length_max(error.length() / dt);
        }
        if self.settings.max_correction_speed > 0.0 {
            correction = correction.clamp_length_max(self.settings.max_correction_speed);
        }

        let desired = target.velocity + correction;
        body.set_linear_velocity(body.linear_velocity().lerp(desired, velocity_t));
    }
}

#[cfg(test)]
mod tests {
    use session::PlayerId;
    use wire::NetworkId;

    use super::*;
    use crate::catalog::{PrefabId, PrefabSpec};
    use crate::identity::EntityHandle;
    use crate::world::Pose;

    #[derive(Debug, Clone)]
    struct TestBody {
        position: Vec2,
        velocity: Vec2,
        angular: f32,
        kind: BodyKind,
        moved_to: Option<Vec2>,
        mass: f32,
    }

    impl Default for TestBody {
        fn default() -> Self {
            Self {
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                angular: 0.0,
                kind: BodyKind::Dynamic,
                moved_to: None,
                mass: 2.0,
            }
        }
    }

    impl Body2D for TestBody {
        fn position(&self) -> Vec2 {
            self.position
        }
        fn set_position(&mut self, position: Vec2) {
            self.position = position;
        }
        fn linear_velocity(&self) -> Vec2 {
            self.velocity
        }
        fn set_linear_velocity(&mut self, velocity: Vec2) {
            self.velocity = velocity;
        }
        fn set_angular_velocity(&mut self, velocity: f32) {
            self.angular = velocity;
        }
        fn mass(&self) -> f32 {
            self.mass
        }
        fn kind(&self) -> BodyKind {
            self.kind
        }
        fn set_kind(&mut self, kind: BodyKind) {
            self.kind = kind;
        }
        fn move_position(&mut self, position: Vec2) {
            self.moved_to = Some(position);
            self.position = position;
        }
        fn is_simulated(&self) -> bool {
            true
        }
    }

    /// A world holding exactly one body.
    #[derive(Default)]
    struct OneBody {
        body: TestBody,
    }

    impl EntityWorld for OneBody {
        fn instantiate(&mut self, _prefab: PrefabId, _spec: &PrefabSpec, _pose: Pose) -> Option<EntityHandle> {
            None
        }
        fn destroy(&mut self, _entity: EntityHandle) -> bool {
            false
        }
        fn pose(&self, _entity: EntityHandle) -> Option<Pose> {
            Some(Pose::at(self.body.position.extend(0.0)))
        }
        fn set_pose(&mut self, _entity: EntityHandle, pose: Pose) {
            self.body.position = pose.position.truncate();
        }
        fn body_2d(&mut self, _entity: EntityHandle) -> Option<&mut dyn Body2D> {
            Some(&mut self.body)
        }
    }

    fn remote_sync(settings: RigidbodySyncSettings) -> Rigidbody2DSync {
        Rigidbody2DSync::new(
            NetworkIdentity::spawned(NetworkId::new(3), EntityHandle(1)),
            settings,
            Authority::owner("a"),
        )
    }

    fn owner() -> LocalPeer {
        LocalPeer {
            in_room: true,
            is_host: false,
            player: Some(PlayerId::from("a")),
        }
    }

    fn observer() -> LocalPeer {
        LocalPeer {
            in_room: true,
            is_host: true,
            player: Some(PlayerId::from("h")),
        }
    }

    fn state(sequence: i32, position: Vec2, velocity: Vec2) -> Rigidbody2DState {
        Rigidbody2DState {
            network_id: NetworkId::new(3),
            sequence,
            position,
            velocity,
        }
    }

    fn dynamic() -> RigidbodySyncSettings {
        RigidbodySyncSettings {
            kinematic_proxy: false,
            ..RigidbodySyncSettings::default()
        }
    }

    #[test]
    fn owner_sends_with_increasing_sequence() {
        let mut sync = remote_sync(RigidbodySyncSettings::default());
        let mut world = OneBody::default();
        let first = sync.physics(&owner(), &mut world, 0.05).unwrap();
        assert_eq!(first.sequence, 1);

        world.body.position = Vec2::new(1.0, 0.0);
        let second = sync.physics(&owner(), &mut world, 0.05).unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.position, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn unchanged_body_is_not_resent() {
        let mut sync = remote_sync(RigidbodySyncSettings::default());
        let mut world = OneBody::default();
        assert!(sync.physics(&owner(), &mut world, 0.05).is_some());
        assert!(sync.physics(&owner(), &mut world, 0.05).is_none());

        world.body.velocity = Vec2::new(0.0, 1.0);
        assert!(sync.physics(&owner(), &mut world, 0.05).is_some());
    }

    #[test]
    fn stale_sequence_discarded() {
        let mut sync = remote_sync(RigidbodySyncSettings::default());
        let mut world = OneBody::default();
        let five = state(5, Vec2::new(5.0, 0.0), Vec2::ZERO);
        let three = state(3, Vec2::new(3.0, 0.0), Vec2::ZERO);

        assert_eq!(sync.apply_remote(&observer(), &mut world, &five), SampleOutcome::Applied);
        assert_eq!(sync.apply_remote(&observer(), &mut world, &three), SampleOutcome::Stale);
        assert_eq!(sync.apply_remote(&observer(), &mut world, &five), SampleOutcome::Stale);
        assert_eq!(sync.last_received_sequence(), Some(5));
        assert_eq!(sync.network_state().unwrap().position, Vec2::new(5.0, 0.0));
    }

    #[test]
    fn new_owner_restarts_sequence_gate() {
        let mut sync = remote_sync(RigidbodySyncSettings::default());
        let mut world = OneBody::default();
        let late = state(50, Vec2::new(49.0, 0.0), Vec2::ZERO);
        assert_eq!(sync.apply_remote(&observer(), &mut world, &late), SampleOutcome::Applied);

        sync.set_authority(Authority::owner("a"));
        assert_eq!(sync.last_received_sequence(), Some(50));

        sync.set_authority(Authority::owner("b"));
        assert_eq!(sync.last_received_sequence(), None);
        let first = state(1, Vec2::new(50.0, 0.0), Vec2::ZERO);
        assert_eq!(sync.apply_remote(&observer(), &mut world, &first), SampleOutcome::Applied);
        assert_eq!(sync.network_state().unwrap().position, Vec2::new(50.0, 0.0));
    }

    #[test]
    fn wrapped_sequence_waits_for_gate_reset() {
        let mut sync = remote_sync(RigidbodySyncSettings::default());
        let mut world = OneBody::default();
        let last = state(i32::MAX, Vec2::ZERO, Vec2::ZERO);
        let wrapped = state(i32::MAX.wrapping_add(1), Vec2::ONE, Vec2::ZERO);
        sync.apply_remote(&observer(), &mut world, &last);
        assert_eq!(sync.apply_remote(&observer(), &mut world, &wrapped), SampleOutcome::Stale);

        sync.reset_remote_state();
        assert_eq!(sync.apply_remote(&observer(), &mut world, &wrapped), SampleOutcome::Applied);
    }

    #[test]
    fn host_migration_restarts_host_driven_gates() {
        let bystander = LocalPeer {
            in_room: true,
            is_host: false,
            player: Some(PlayerId::from("c")),
        };
        let mut world = OneBody::default();
        let mut hosted = Rigidbody2DSync::new(
            NetworkIdentity::spawned(NetworkId::new(3), EntityHandle(1)),
            RigidbodySyncSettings::default(),
            Authority::host(),
        );
        hosted.apply_remote(&bystander, &mut world, &state(40, Vec2::ZERO, Vec2::ZERO));
        hosted.host_changed();
        assert_eq!(
            hosted.apply_remote(&bystander, &mut world, &state(1, Vec2::ONE, Vec2::ZERO)),
            SampleOutcome::Applied
        );

        let mut owned = remote_sync(RigidbodySyncSettings::default());
        owned.apply_remote(&bystander, &mut world, &state(40, Vec2::ZERO, Vec2::ZERO));
        owned.host_changed();
        assert_eq!(owned.last_received_sequence(), Some(40));
    }

    #[test]
    fn authority_ignores_samples() {
        let mut sync = remote_sync(RigidbodySyncSettings::default());
        let mut world = OneBody::default();
        let outcome = sync.apply_remote(&owner(), &mut world, &state(1, Vec2::ONE, Vec2::ZERO));
        assert_eq!(outcome, SampleOutcome::IgnoredAuthority);
        assert!(sync.network_state().is_none());
    }

    #[test]
    fn first_sample_seeds_body() {
        let mut sync = remote_sync(RigidbodySyncSettings::default());
        let mut world = OneBody::default();
        world.body.velocity = Vec2::new(9.0, 9.0);
        world.body.angular = 3.0;
        sync.apply_remote(&observer(), &mut world, &state(1, Vec2::new(2.0, 2.0), Vec2::X));
        assert_eq!(world.body.position, Vec2::new(2.0, 2.0));
        assert_eq!(world.body.velocity, Vec2::ZERO);
        assert!(world.body.angular.abs() < f32::EPSILON);

        let mut sync = remote_sync(dynamic());
        let mut world = OneBody::default();
        sync.apply_remote(&observer(), &mut world, &state(1, Vec2::ZERO, Vec2::X));
        assert_eq!(world.body.velocity, Vec2::X);
    }

    #[test]
    fn kinematic_proxy_moves_toward_sample() {
        let mut sync = remote_sync(RigidbodySyncSettings {
            extrapolate: false,
            ..RigidbodySyncSettings::default()
        });
        let mut world = OneBody::default();
        sync.apply_remote(&observer(), &mut world, &state(1, Vec2::ZERO, Vec2::ZERO));
        sync.apply_remote(&observer(), &mut world, &state(2, Vec2::new(1.0, 0.0), Vec2::ZERO));

        sync.physics(&observer(), &mut world, 0.02);
        assert_eq!(world.body.kind, BodyKind::Kinematic);
        let moved = world.body.moved_to.unwrap();
        assert!(moved.x > 0.0 && moved.x < 1.0);
    }

    #[test]
    fn zero_rates_correct_fully() {
        let mut sync = remote_sync(RigidbodySyncSettings {
            position_correction_speed: 0.0,
            velocity_correction_speed: 0.0,
            ..RigidbodySyncSettings::default()
        });
        let mut world = OneBody::default();
        sync.apply_remote(&observer(), &mut world, &state(1, Vec2::ZERO, Vec2::new(10.0, 0.0)));
        sync.physics(&observer(), &mut world, 0.1);
        assert_eq!(sync.predicted_state().unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn extrapolation_advances_prediction() {
        let mut sync = remote_sync(RigidbodySyncSettings {
            position_correction_speed: 1.0e-6,
            velocity_correction_speed: 1.0e-6,
            ..RigidbodySyncSettings::default()
        });
        let mut world = OneBody::default();
        sync.apply_remote(&observer(), &mut world, &state(1, Vec2::ZERO, Vec2::new(10.0, 0.0)));
        sync.physics(&observer(), &mut world, 0.1);
        let predicted = sync.predicted_state().unwrap().position;
        assert!((predicted.x - 1.0).abs() < 1.0e-3);
        assert_eq!(world.body.moved_to, Some(predicted));
    }

    #[test]
    fn dynamic_snap_beyond_distance() {
        let mut sync = remote_sync(dynamic());
        let mut world = OneBody::default();
        sync.apply_remote(&observer(), &mut world, &state(1, Vec2::ZERO, Vec2::ZERO));
        world.body.position = Vec2::new(-5.0, 0.0);
        world.body.angular = 2.0;

        sync.physics(&observer(), &mut world, 0.02);
        assert_eq!(world.body.kind, BodyKind::Dynamic);
        assert!(world.body.position.length() < 0.75);
        assert!(world.body.angular.abs() < f32::EPSILON);
    }

    #[test]
    fn snap_ends_active_hold() {
        let mut sync = remote_sync(dynamic());
        let mut world = OneBody::default();
        sync.apply_remote(&observer(), &mut world, &state(1, Vec2::ZERO, Vec2::ZERO));
        sync.apply_remote(&observer(), &mut world, &state(2, Vec2::new(50.0, 0.0), Vec2::ZERO));
        sync.notify_local_predicted_physics(&observer(), &mut world);
        assert!(sync.is_holding());

        sync.physics(&observer(), &mut world, 0.02);
        assert!(!sync.is_holding());
        assert!(world.body.position.x > 1.0);
    }

    #[test]
    fn dynamic_correction_is_clamped() {
        let mut sync = remote_sync(RigidbodySyncSettings {
            snap_distance: 0.0,
            extrapolate: false,
            ..dynamic()
        });
        let mut world = OneBody::default();
        sync.apply_remote(&observer(), &mut world, &state(1, Vec2::ZERO, Vec2::ZERO));
        sync.apply_remote(&observer(), &mut world, &state(2, Vec2::new(100.0, 0.0), Vec2::ZERO));
        sync.physics(&observer(), &mut world, 0.02);
        assert!(world.body.velocity.x > 0.0);
        assert!(world.body.velocity.length() <= 35.0 + 1e-3);
    }

    #[test]
    fn perpendicular_correction_attenuated() {
        let base = RigidbodySyncSettings {
            snap_distance: 0.0,
            extrapolate: false,
            max_correction_speed: 0.0,
            velocity_correction_speed: 0.0,
            ..dynamic()
        };
        let run = |scale: f32| {
            let mut sync = remote_sync(RigidbodySyncSettings {
                perpendicular_correction_scale: scale,
                ..base
            });
            let mut world = OneBody::default();
            sync.apply_remote(&observer(), &mut world, &state(1, Vec2::ZERO, Vec2::new(5.0, 0.0)));
            sync.apply_remote(&observer(), &mut world, &state(2, Vec2::new(0.0, 0.1), Vec2::new(5.0, 0.0)));
            world.body.position = Vec2::ZERO;
            sync.physics(&observer(), &mut world, 0.02);
            world.body.velocity.y
        };
        assert!(run(0.25) < run(1.0));
        assert!(run(0.25) > 0.0);
    }

    #[test]
    fn hold_scales_correction_and_expires() {
        let mut sync = remote_sync(RigidbodySyncSettings {
            snap_distance: 0.0,
            ..dynamic()
        });
        let mut world = OneBody::default();
        sync.apply_remote(&observer(), &mut world, &state(1, Vec2::ZERO, Vec2::ZERO));
        sync.notify_local_predicted_physics_for(&observer(), &mut world, 0.1);
        assert!(sync.is_holding());
        for _ in 0..6 {
            sync.physics(&observer(), &mut world, 0.02);
        }
        assert!(!sync.is_holding());
    }

    #[test]
    fn predicted_impulse_uses_mass() {
        let mut sync = remote_sync(RigidbodySyncSettings::default());
        let mut world = OneBody::default();
        sync.add_predicted_impulse(&observer(), &mut world, Vec2::new(4.0, 0.0));
        assert_eq!(sync.predicted_state().unwrap().velocity, Vec2::new(2.0, 0.0));
        assert!(sync.is_holding());

        let mut sync = remote_sync(RigidbodySyncSettings::default());
        sync.add_predicted_impulse(&owner(), &mut world, Vec2::new(4.0, 0.0));
        assert!(sync.predicted_state().is_none());
    }

    #[test]
    fn zero_hold_is_ignored() {
        let mut sync = remote_sync(RigidbodySyncSettings::default());
        let mut world = OneBody::default();
        sync.notify_local_predicted_physics_for(&observer(), &mut world, 0.0);
        assert!(!sync.is_holding());
    }

    #[test]
    fn damp_to_lerp_zero_speed_is_full() {
        assert!((damp_to_lerp(0.0, 0.02) - 1.0).abs() < f32::EPSILON);
        let t = damp_to_lerp(20.0, 0.02);
        assert!(t > 0.0 && t < 1.0);
    }

    #[test]
    fn settings_are_sanitized() {
        let settings = RigidbodySyncSettings {
            snap_distance: -1.0,
            perpendicular_correction_scale: 4.0,
            ..RigidbodySyncSettings::default()
        }
        .sanitized();
        assert!(settings.snap_distance.abs() < f32::EPSILON);
        assert!((settings.perpendicular_correction_scale - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_velocity_direction_is_safe() {
        let mut sync = remote_sync(RigidbodySyncSettings {
            snap_distance: 0.0,
            ..dynamic()
        });
        let mut world = OneBody::default();
        sync.apply_remote(&observer(), &mut world, &state(1, Vec2::ZERO, Vec2::ZERO));
        world.body.position = Vec2::new(0.0, 1.0e-6);
        sync.physics(&observer(), &mut world, 0.0);
        assert!(world.body.velocity.is_finite());
    }
}
