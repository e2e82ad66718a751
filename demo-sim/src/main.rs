use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use app::{MultiplayerApp, MultiplayerConfig};
use clap::Parser;
use gameplay::{
    Authority, BodyKind, EntityWorld, PrefabCatalog, PrefabId, PrefabSpec, RigidbodySyncSettings,
    SpawnRequest, TransformSyncSettings,
};
use glam::{Vec2, Vec3};
use harness::{LoopbackHub, SimWorld};
use log::{debug, info};
use serde::Serialize;
use session::{ConnectOptions, PlayerId, SessionState};
use wire::{AuthorityMode, NetworkId};

const AVATAR: PrefabId = PrefabId::new(2);
const BALL: PrefabId = PrefabId::new(3);
const ROOM_CODE: &str = "DEMO";
const ARENA_HALF_EXTENT: f32 = 10.0;

#[derive(Parser)]
#[command(
    name = "demo-sim",
    version,
    about = "Runs a host and several peers over the loopback hub and reports divergence"
)]
struct Cli {
    /// Number of peers joining the host.
    #[arg(long, default_value_t = 3)]
    peers: u32,
    /// Host-owned dynamic balls.
    #[arg(long, default_value_t = 4)]
    balls: u32,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 300)]
    ticks: u32,
    /// Fixed tick length in seconds.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,
    /// RNG seed for deterministic results.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Optional JSON config; must define the avatar (2) and ball (3) prefabs.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the summary here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Fail if the final divergence exceeds this distance.
    #[arg(long)]
    max_final_divergence: Option<f32>,
    /// Fail if the p95 per-tick divergence exceeds this distance.
    #[arg(long)]
    max_p95_divergence: Option<f32>,
}

struct Peer {
    id: PlayerId,
    app: MultiplayerApp<SimWorld>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let hub = LoopbackHub::new();
    let mut peers = join_room(&hub, &config, cli.peers)?;
    let mut rng = Rng::new(cli.seed);
    let entities = spawn_scene(&hub, &mut peers, cli.balls, &mut rng)?;
    info!(
        "room {ROOM_CODE}: {} peers, {} networked entities",
        peers.len(),
        entities.len()
    );

    let mut summary = Summary::new(&cli, peers.len(), entities.len());
    for tick in 1..=cli.ticks {
        drive_authorities(&mut peers, &entities, &mut rng, cli.dt);
        for peer in &mut peers {
            peer.app.update(cli.dt);
            peer.app.fixed_update(cli.dt);
            peer.app.world_mut().step_physics(cli.dt);
        }
        let divergence = measure_divergence(&peers, &entities);
        debug!("tick {tick}: divergence {divergence:.4}");
        summary.push_tick(divergence);
    }

    summary.finalize(hub.delivered_messages());
    write_summary(cli.out.as_deref(), &summary)?;
    summary.assert_budgets(cli.max_final_divergence, cli.max_p95_divergence)
}

fn default_config() -> MultiplayerConfig {
    let prefabs = PrefabCatalog::new()
        .with(
            AVATAR,
            PrefabSpec::new("avatar")
                .with_body(BodyKind::Kinematic)
                .with_transform_sync(TransformSyncSettings::default()),
        )
        .with(
            BALL,
            PrefabSpec::new("ball")
                .with_body(BodyKind::Dynamic)
                .with_rigidbody_sync(RigidbodySyncSettings::default()),
        );
    MultiplayerConfig {
        prefabs,
        ..MultiplayerConfig::default()
    }
}

fn load_config(path: Option<&Path>) -> Result<MultiplayerConfig> {
    let Some(path) = path else {
        return Ok(default_config());
    };
    let config = MultiplayerConfig::from_json_file(path)
        .with_context(|| format!("load config {}", path.display()))?;
    for prefab in [AVATAR, BALL] {
        if !config.prefabs.contains(prefab) {
            anyhow::bail!("config {} does not define {prefab}", path.display());
        }
    }
    Ok(config)
}

fn new_peer(hub: &LoopbackHub, config: &MultiplayerConfig, id: &str) -> Result<Peer> {
    let mut app = MultiplayerApp::builder(hub.transport(), SimWorld::new())
        .config(config.clone())
        .build()
        .context("build app")?;
    app.connect(&ConnectOptions {
        player_name: id.to_uppercase(),
        user_id: id.to_owned(),
        ..ConnectOptions::default()
    });
    Ok(Peer {
        id: PlayerId::from(id),
        app,
    })
}

/// Ticks every peer with a zero step until the hub is idle.
fn settle(hub: &LoopbackHub, peers: &mut [Peer]) {
    for _ in 0..64 {
        for peer in peers.iter_mut() {
            peer.app.update(0.0);
        }
        if hub.pending_events() == 0 {
            return;
        }
    }
}

fn join_room(hub: &LoopbackHub, config: &MultiplayerConfig, count: u32) -> Result<Vec<Peer>> {
    let mut peers = vec![new_peer(hub, config, "host")?];
    settle(hub, &mut peers);
    peers[0].app.create_configured_room(ROOM_CODE);
    settle(hub, &mut peers);

    for index in 1..=count {
        let mut peer = new_peer(hub, config, &format!("peer-{index}"))?;
        peer.app.update(0.0);
        peer.app.join_room(ROOM_CODE);
        peers.push(peer);
        settle(hub, &mut peers);
    }

    for peer in &peers {
        if peer.app.state() != SessionState::InRoom {
            anyhow::bail!("{} failed to join {ROOM_CODE}: {:?}", peer.id, peer.app.state());
        }
    }
    Ok(peers)
}

fn spawn_scene(hub: &LoopbackHub, peers: &mut [Peer], balls: u32, rng: &mut Rng) -> Result<Vec<NetworkId>> {
    let mut ids = Vec::new();
    let owners: Vec<PlayerId> = peers.iter().skip(1).map(|peer| peer.id.clone()).collect();
    let host = &mut peers[0].app;
    for owner in owners {
        let position = rng.point_in_arena();
        let identity = host
            .spawn_for_all(SpawnRequest::new(AVATAR, position).with_authority(Authority::owner(owner)))
            .context("spawn avatar")?;
        ids.push(identity.id);
    }
    for _ in 0..balls {
        let identity = host
            .spawn_for_all(SpawnRequest::new(BALL, rng.point_in_arena()))
            .context("spawn ball")?;
        let velocity = Vec2::new(rng.range_f32(-3.0, 3.0), rng.range_f32(-3.0, 3.0));
        if let Some(body) = host.world_mut().body_2d(identity.entity) {
            body.set_linear_velocity(velocity);
        }
        ids.push(identity.id);
    }
    settle(hub, peers);
    Ok(ids)
}

/// The peer that drives `id`, as recorded by the host.
fn authority_index(peers: &[Peer], id: NetworkId) -> Option<usize> {
    let record = peers[0].app.gameplay().spawner().record(id)?;
    match record.authority.mode {
        AuthorityMode::Host => Some(0),
        AuthorityMode::Owner => peers.iter().position(|peer| peer.id == record.authority.owner),
    }
}

fn position_on(peer: &Peer, id: NetworkId) -> Option<Vec3> {
    let identity = peer.app.gameplay().registry().lookup(id)?;
    peer.app.world().pose(identity.entity).map(|pose| pose.position)
}

fn drive_authorities(peers: &mut [Peer], entities: &[NetworkId], rng: &mut Rng, dt: f32) {
    for &id in entities {
        let Some(index) = authority_index(peers, id) else {
            continue;
        };
        let app = &mut peers[index].app;
        let Some(identity) = app.gameplay().registry().lookup(id) else {
            continue;
        };
        let world = app.world_mut();
        if let Some(body) = world.body_2d(identity.entity) {
            if body.kind() == BodyKind::Dynamic {
                bounce(body);
                continue;
            }
        }
        if let Some(mut pose) = world.pose(identity.entity) {
            let step = Vec3::new(rng.range_f32(-1.0, 1.0), rng.range_f32(-1.0, 1.0), 0.0) * 4.0 * dt;
            let bound = Vec3::splat(ARENA_HALF_EXTENT);
            pose.position = (pose.position + step).clamp(-bound, bound);
            world.set_pose(identity.entity, pose);
        }
    }
}

fn bounce(body: &mut dyn gameplay::Body2D) {
    let position = body.position();
    let mut velocity = body.linear_velocity();
    if position.x.abs() >= ARENA_HALF_EXTENT && position.x.signum() == velocity.x.signum() {
        velocity.x = -velocity.x;
    }
    if position.y.abs() >= ARENA_HALF_EXTENT && position.y.signum() == velocity.y.signum() {
        velocity.y = -velocity.y;
    }
    body.set_linear_velocity(velocity);
}

/// Largest distance between an entity on its authority and on any replica.
fn measure_divergence(peers: &[Peer], entities: &[NetworkId]) -> f32 {
    let mut worst = 0.0_f32;
    for &id in entities {
        let Some(index) = authority_index(peers, id) else {
            continue;
        };
        let Some(truth) = position_on(&peers[index], id) else {
            continue;
        };
        for (other, peer) in peers.iter().enumerate() {
            if other == index {
                continue;
            }
            if let Some(replica) = position_on(peer, id) {
                worst = worst.max(truth.distance(replica));
            }
        }
    }
    worst
}

fn write_summary(out: Option<&Path>, summary: &Summary) -> Result<()> {
    let contents = serde_json::to_string_pretty(summary).context("serialize summary")?;
    match out {
        Some(path) => fs::write(path, contents).with_context(|| format!("write {}", path.display())),
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

struct Rng {
    state: u64,
}

impl Rng {
    const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        (self.state >> 32) as u32
    }

    fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        let unit = f64::from(self.next_u32()) / f64::from(u32::MAX);
        min + (max - min) * unit as f32
    }

    fn point_in_arena(&mut self) -> Vec3 {
        let half = ARENA_HALF_EXTENT * 0.5;
        Vec3::new(self.range_f32(-half, half), self.range_f32(-half, half), 0.0)
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    peers: usize,
    entities: usize,
    ticks: u32,
    dt: f32,
    seed: u64,
    messages_delivered: u64,
    avg_divergence: f32,
    p95_divergence: f32,
    max_divergence: f32,
    final_divergence: f32,
    #[serde(skip)]
    samples: Vec<f32>,
}

impl Summary {
    fn new(cli: &Cli, peers: usize, entities: usize) -> Self {
        Self {
            peers,
            entities,
            ticks: cli.ticks,
            dt: cli.dt,
            seed: cli.seed,
            messages_delivered: 0,
            avg_divergence: 0.0,
            p95_divergence: 0.0,
            max_divergence: 0.0,
            final_divergence: 0.0,
            samples: Vec::new(),
        }
    }

    fn push_tick(&mut self, divergence: f32) {
        self.samples.push(divergence);
    }

    fn finalize(&mut self, messages_delivered: u64) {
        self.messages_delivered = messages_delivered;
        let Some(&last) = self.samples.last() else {
            return;
        };
        self.final_divergence = last;
        self.avg_divergence = self.samples.iter().sum::<f32>() / self.samples.len() as f32;
        let mut sorted = self.samples.clone();
        sorted.sort_unstable_by(f32::total_cmp);
        self.max_divergence = sorted[sorted.len() - 1];
        let idx = ((sorted.len() as f64) * 0.95).ceil() as usize;
        self.p95_divergence = sorted[idx.saturating_sub(1).min(sorted.len() - 1)];
    }

    fn assert_budgets(&self, max_final: Option<f32>, max_p95: Option<f32>) -> Result<()> {
        if let Some(max_final) = max_final {
            if self.final_divergence > max_final {
                anyhow::bail!(
                    "final divergence {:.4} exceeds budget {max_final}",
                    self.final_divergence
                );
            }
        }
        if let Some(max_p95) = max_p95 {
            if self.p95_divergence > max_p95 {
                anyhow::bail!(
                    "p95 divergence {:.4} exceeds budget {max_p95}",
                    self.p95_divergence
                );
            }
        }
        Ok(())
    }
}
