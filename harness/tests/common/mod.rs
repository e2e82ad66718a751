#![allow(dead_code)]

use app::{MultiplayerApp, MultiplayerConfig};
use gameplay::{
    BodyKind, PrefabCatalog, PrefabSpec, RigidbodySyncSettings, TransformSyncSettings,
};
use harness::{LoopbackHub, SimWorld};
use session::{ConnectOptions, RoomOptions};

pub type Peer = MultiplayerApp<SimWorld>;

pub const CRATE: i32 = 1;
pub const PLAYER: i32 = 2;
pub const BALL: i32 = 3;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn catalog() -> PrefabCatalog {
    PrefabCatalog::new()
        .with(CRATE, PrefabSpec::new("crate"))
        .with(
            PLAYER,
            PrefabSpec::new("player")
                .with_body(BodyKind::Kinematic)
                .with_transform_sync(TransformSyncSettings::default()),
        )
        .with(
            BALL,
            PrefabSpec::new("ball")
                .with_body(BodyKind::Dynamic)
                .with_rigidbody_sync(RigidbodySyncSettings::default()),
        )
}

/// A connected peer named `id`.
pub fn peer(hub: &LoopbackHub, id: &str) -> Peer {
    init_logger();
    let config = MultiplayerConfig {
        prefabs: catalog(),
        ..MultiplayerConfig::default()
    };
    let mut app = MultiplayerApp::builder(hub.transport(), SimWorld::new())
        .config(config)
        .build()
        .expect("valid config");
    app.connect(&ConnectOptions {
        player_name: id.to_uppercase(),
        user_id: id.to_owned(),
        ..ConnectOptions::default()
    });
    app.update(0.0);
    app
}

/// Ticks every peer until the hub has nothing left to deliver.
pub fn settle(hub: &LoopbackHub, peers: &mut [&mut Peer]) {
    for _ in 0..32 {
        for peer in peers.iter_mut() {
            peer.update(0.0);
        }
        if hub.pending_events() == 0 {
            return;
        }
    }
}

/// Host `h` in room `code` plus one joined client per id in `clients`.
pub fn room(hub: &LoopbackHub, code: &str, clients: &[&str]) -> (Peer, Vec<Peer>) {
    let mut host = peer(hub, "h");
    host.create_room(&RoomOptions {
        room_code: code.to_owned(),
        ..RoomOptions::default()
    });
    settle(hub, &mut [&mut host]);
    let mut others: Vec<Peer> = clients.iter().map(|id| peer(hub, id)).collect();
    for client in &mut others {
        client.join_room(code);
    }
    let mut all: Vec<&mut Peer> = std::iter::once(&mut host).chain(others.iter_mut()).collect();
    settle(hub, &mut all);
    (host, others)
}
