//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use glam::Vec2;
use session::{
    ConnectOptions, ConnectionState, NetworkMessage, PlayerId, PlayerInfo, QuickMatchOptions,
    RoomInfo, RoomOptions, RoomState, SendOptions, Session, Transport, TransportEvent,
};

use crate::catalog::{PrefabId, PrefabSpec};
use crate::identity::EntityHandle;
use crate::world::{Body2D, BodyKind, EntityWorld, Pose};

#[derive(Default)]
pub struct Wire {
    pub sent: Vec<(NetworkMessage, SendOptions)>,
    pub events: VecDeque<TransportEvent>,
    pub players: Vec<PlayerInfo>,
    pub room: RoomState,
}

/// A transport that records sends and replays scripted events.
pub struct StubTransport {
    local: PlayerId,
    wire: Rc<RefCell<Wire>>,
    players: Vec<PlayerInfo>,
}

impl Transport for StubTransport {
    fn connection_state(&self) -> ConnectionState {
        ConnectionState::Connected
    }
    fn room_state(&self) -> RoomState {
        self.wire.borrow().room
    }
    fn local_player_id(&self) -> Option<&PlayerId> {
        Some(&self.local)
    }
    fn local_player_name(&self) -> &str {
        self.local.as_str()
    }
    fn players(&self) -> &[PlayerInfo] {
        &self.players
    }
    fn connect(&mut self, _options: &ConnectOptions) {}
    fn disconnect(&mut self) {}
    fn create_room(&mut self, _options: &RoomOptions) {}
    fn join_room(&mut self, _room_code: &str) {}
    fn quick_match(&mut self, _options: &QuickMatchOptions) {}
    fn leave_room(&mut self) {}
    fn send(&mut self, message: NetworkMessage, options: &SendOptions) {
        self.wire.borrow_mut().sent.push((message, options.clone()));
    }
    fn poll_event(&mut self) -> Option<TransportEvent> {
        let mut wire = self.wire.borrow_mut();
        self.players.clone_from(&wire.players);
        wire.events.pop_front()
    }
}

/// A session already in room "TEST" as `local`, with `host` as host.
pub fn session_in_room(local: &str, host: &str, others: &[&str]) -> (Session, Rc<RefCell<Wire>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut players = vec![PlayerInfo::new(host, host).with_host(true)];
    if local != host {
        players.push(PlayerInfo::new(local, local));
    }
    players.extend(others.iter().map(|id| PlayerInfo::new(*id, *id)));

    let wire = Rc::new(RefCell::new(Wire {
        players: players.clone(),
        room: RoomState::InRoom,
        ..Wire::default()
    }));
    let transport = StubTransport {
        local: PlayerId::from(local),
        wire: Rc::clone(&wire),
        players,
    };
    let mut session = Session::new(Box::new(transport));
    wire.borrow_mut().events.push_back(TransportEvent::RoomJoined(RoomInfo {
        room_code: "TEST".to_owned(),
        ..RoomInfo::default()
    }));
    session.pump();
    session.take_events();
    (session, wire)
}

#[derive(Debug, Clone)]
pub struct StubBody {
    pub position: Vec2,
    pub velocity: Vec2,
    pub kind: BodyKind,
}

impl Body2D for StubBody {
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
    fn set_angular_velocity(&mut self, _velocity: f32) {}
    fn mass(&self) -> f32 {
        1.0
    }
    fn kind(&self) -> BodyKind {
        self.kind
    }
    fn set_kind(&mut self, kind: BodyKind) {
        self.kind = kind;
    }
    fn move_position(&mut self, position: Vec2) {
        self.position = position;
    }
    fn is_simulated(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct StubWorld {
    next: u64,
    pub poses: BTreeMap<EntityHandle, Pose>,
    pub prefabs: BTreeMap<EntityHandle, PrefabId>,
    pub bodies: BTreeMap<EntityHandle, StubBody>,
    pub destroyed: Vec<EntityHandle>,
    pub refuse: bool,
}

impl EntityWorld for StubWorld {
    fn instantiate(&mut self, prefab: PrefabId, spec: &PrefabSpec, pose: Pose) -> Option<EntityHandle> {
        if self.refuse {
            return None;
        }
        self.next += 1;
        let entity = EntityHandle(self.next);
        self.poses.insert(entity, pose);
        self.prefabs.insert(entity, prefab);
        if let Some(kind) = spec.body {
            self.bodies.insert(
                entity,
                StubBody {
                    position: pose.position.truncate(),
                    velocity: Vec2::ZERO,
                    kind,
                },
            );
        }
        Some(entity)
    }
    fn destroy(&mut self, entity: EntityHandle) -> bool {
        self.bodies.remove(&entity);
        self.prefabs.remove(&entity);
        let existed = self.poses.remove(&entity).is_some();
        if existed {
            self.destroyed.push(entity);
        }
        existed
    }
    fn pose(&self, entity: EntityHandle) -> Option<Pose> {
        self.poses.get(&entity).copied()
    }
    fn set_pose(&mut self, entity: EntityHandle, pose: Pose) {
        if let Some(slot) = self.poses.get_mut(&entity) {
            *slot = pose;
        }
    }
    fn body_2d(&mut self, entity: EntityHandle) -> Option<&mut dyn Body2D> {
        self.bodies.get_mut(&entity).map(|body| body as &mut dyn Body2D)
    }
}
