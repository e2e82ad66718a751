//! The application context: session, gameplay and world behind two ticks.

use gameplay::{
    Authority, CommandDelivery, CommandError, CommandRequest, EntityWorld, Gameplay, NetworkIdentity,
    SpawnError, SpawnRequest,
};
use log::{debug, error, info};
use session::{
    ConnectOptions, NetworkMessage, QuickMatchOptions, RoomOptions, SceneId, SceneLoader, Session,
    SessionEvent, SessionState, Transport, TransportError, TransportEvent,
};
use wire::ids::is_core_message;
use wire::NetworkId;

use crate::config::{ConfigError, MultiplayerConfig};
use crate::module::{AppContext, GameModule, InterceptorId, MessageInterceptor};

/// Builds a [`MultiplayerApp`].
pub struct MultiplayerAppBuilder<W> {
    transport: Box<dyn Transport>,
    world: W,
    config: MultiplayerConfig,
    scene_loader: Option<Box<dyn SceneLoader>>,
    module: Option<Box<dyn GameModule>>,
}

impl<W: EntityWorld> MultiplayerAppBuilder<W> {
    #[must_use]
    pub fn config(mut self, config: MultiplayerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn scene_loader(mut self, loader: impl SceneLoader + 'static) -> Self {
        self.scene_loader = Some(Box::new(loader));
        self
    }

    #[must_use]
    pub fn game_module(mut self, module: impl GameModule + 'static) -> Self {
        self.module = Some(Box::new(module));
        self
    }

    /// Validates the configuration and wires everything together.
    pub fn build(self) -> Result<MultiplayerApp<W>, ConfigError> {
        self.config.validate()?;
        let gameplay = Gameplay::new(self.config.prefabs.clone(), self.config.spawner);
        Ok(MultiplayerApp {
            session: Session::new(self.transport),
            gameplay,
            world: self.world,
            config: self.config,
            scene_loader: self.scene_loader,
            module: self.module,
            interceptors: Vec::new(),
            next_interceptor: 1,
            requested_scene: None,
        })
    }
}

/// Owns one session, its gameplay layer and the local entity world.
///
/// The embedding loop calls [`MultiplayerApp::update`] once per frame and
/// [`MultiplayerApp::fixed_update`] once per physics step.
pub struct MultiplayerApp<W> {
    session: Session,
    gameplay: Gameplay,
    world: W,
    config: MultiplayerConfig,
    scene_loader: Option<Box<dyn SceneLoader>>,
    module: Option<Box<dyn GameModule>>,
    interceptors: Vec<(InterceptorId, Box<dyn MessageInterceptor>)>,
    next_interceptor: u64,
    requested_scene: Option<SceneId>,
}

impl<W: std::fmt::Debug> std::fmt::Debug for MultiplayerApp<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplayerApp")
            .field("session", &self.session)
            .field("gameplay", &self.gameplay)
            .field("world", &self.world)
            .field("interceptors", &self.interceptors.len())
            .field("has_module", &self.module.is_some())
            .finish_non_exhaustive()
    }
}

impl<W: EntityWorld> MultiplayerApp<W> {
    pub fn builder(transport: impl Transport + 'static, world: W) -> MultiplayerAppBuilder<W> {
        MultiplayerAppBuilder {
            transport: Box::new(transport),
            world,
            config: MultiplayerConfig::default(),
            scene_loader: None,
            module: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.session.state()
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    #[must_use]
    pub const fn gameplay(&self) -> &Gameplay {
        &self.gameplay
    }

    pub fn gameplay_mut(&mut self) -> &mut Gameplay {
        &mut self.gameplay
    }

    #[must_use]
    pub const fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    #[must_use]
    pub const fn config(&self) -> &MultiplayerConfig {
        &self.config
    }

    /// Borrows session, gameplay and world together.
    pub fn context(&mut self) -> AppContext<'_> {
        AppContext {
            session: &mut self.session,
            gameplay: &mut self.gameplay,
            world: &mut self.world,
        }
    }

    /// The last scene a game start asked for when no loader is installed.
    pub fn take_requested_scene(&mut self) -> Option<SceneId> {
        self.requested_scene.take()
    }

    pub fn add_interceptor(&mut self, interceptor: impl MessageInterceptor + 'static) -> InterceptorId {
        let id = InterceptorId(self.next_interceptor);
        self.next_interceptor += 1;
        self.interceptors.push((id, Box::new(interceptor)));
        id
    }

    pub fn remove_interceptor(&mut self, id: InterceptorId) -> bool {
        let before = self.interceptors.len();
        self.interceptors.retain(|(existing, _)| *existing != id);
        self.interceptors.len() != before
    }

    pub fn connect(&mut self, options: &ConnectOptions) {
        self.session.connect(options);
    }

    pub fn disconnect(&mut self) {
        self.session.disconnect();
    }

    pub fn create_room(&mut self, options: &RoomOptions) {
        self.session.create_room(options);
    }

    /// Creates a room using the configured defaults.
    pub fn create_configured_room(&mut self, room_code: &str) {
        let options = self.config.create_room_options(room_code);
        self.session.create_room(&options);
    }

    pub fn join_room(&mut self, room_code: &str) {
        self.session.join_room(room_code);
    }

    pub fn quick_match(&mut self, options: &QuickMatchOptions) {
        self.session.quick_match(options);
    }

    pub fn leave_room(&mut self) {
        self.session.leave_room();
    }

    pub fn set_ready(&mut self, ready: bool) -> Result<(), TransportError> {
        self.session.set_ready(ready)
    }

    pub fn request_start(&mut self, scene: &SceneId) -> Result<(), TransportError> {
        self.session.request_start(scene)
    }

    /// Host only: starts the configured game scene.
    pub fn request_start_configured_game(&mut self) -> Result<(), TransportError> {
        if !self.config.game_scene.is_valid() {
            error!("no game scene configured");
            return Err(TransportError::invalid_state("No game scene configured."));
        }
        let scene = self.config.game_scene.clone();
        self.session.request_start(&scene)
    }

    pub fn mark_in_game(&mut self) -> Result<(), TransportError> {
        self.session.mark_in_game()
    }

    pub fn spawn_for_all(&mut self, request: SpawnRequest) -> Result<NetworkIdentity, SpawnError> {
        self.gameplay.spawn_for_all(&mut self.session, &mut self.world, request)
    }

    pub fn despawn_for_all(&mut self, id: NetworkId) -> Result<(), SpawnError> {
        self.gameplay.despawn_for_all(&mut self.session, &mut self.world, id)
    }

    pub fn set_ownership_for_all(&mut self, id: NetworkId, authority: Authority) -> Result<(), SpawnError> {
        self.gameplay
            .set_ownership_for_all(&mut self.session, &mut self.world, id, authority)
    }

    pub fn send_command(&mut self, request: CommandRequest<'_>) -> Result<CommandDelivery, CommandError> {
        self.gameplay.send_command(&mut self.session, &mut self.world, request)
    }

    /// Frame tick: drains the transport, routes everything, then runs the
    /// transform sync and the module's update.
    pub fn update(&mut self, dt: f32) {
        loop {
            // Sampled before polling: poll_event applies the event.
            let was_in_room = self.session.state().is_in_room();
            let Some(event) = self.session.poll_event() else {
                break;
            };
            if let TransportEvent::MessageReceived(message) = &event {
                self.route_message(message);
            }
            for session_event in self.session.take_events() {
                self.handle_session_event(&session_event);
            }
            if was_in_room && !self.session.state().is_in_room() {
                let destroyed = self.gameplay.on_room_left(&mut self.world);
                debug!("left room, destroyed {destroyed} spawned entities");
            }
        }
        // Local calls such as request_start publish outside of polling.
        for session_event in self.session.take_events() {
            self.handle_session_event(&session_event);
        }

        self.gameplay.frame(&mut self.session, &mut self.world, dt);
        if let Some(module) = self.module.as_mut() {
            let mut cx = AppContext {
                session: &mut self.session,
                gameplay: &mut self.gameplay,
                world: &mut self.world,
            };
            if let Err(err) = module.on_update(&mut cx, dt) {
                error!("game module update failed: {err:#}");
            }
        }
    }

    /// Physics tick: kinematic moves, reconciliation and body sends.
    pub fn fixed_update(&mut self, dt: f32) {
        self.gameplay.physics(&mut self.session, &mut self.world, dt);
        if let Some(module) = self.module.as_mut() {
            let mut cx = AppContext {
                session: &mut self.session,
                gameplay: &mut self.gameplay,
                world: &mut self.world,
            };
            if let Err(err) = module.on_fixed_update(&mut cx, dt) {
                error!("game module fixed update failed: {err:#}");
            }
        }
    }

    fn route_message(&mut self, message: &NetworkMessage) {
        if is_core_message(message.id) {
            return;
        }
        if self.gameplay.handle_message(&self.session, &mut self.world, message) {
            return;
        }

        let mut cx = AppContext {
            session: &mut self.session,
            gameplay: &mut self.gameplay,
            world: &mut self.world,
        };
        for (_, interceptor) in &mut self.interceptors {
            match interceptor.intercept(&mut cx, message) {
                Ok(true) => return,
                Ok(false) => {}
                Err(err) => error!("interceptor failed on message {}: {err:#}", message.id),
            }
        }
        if let Some(module) = self.module.as_mut() {
            if let Err(err) = module.on_message(&mut cx, message) {
                error!("game module failed on message {}: {err:#}", message.id);
            }
        }
    }

    fn handle_session_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::PlayerJoined(player) => {
                self.gameplay.on_player_joined(&mut self.session, &mut self.world, player);
                self.with_module(|module, cx| module.on_player_joined(cx, player));
            }
            SessionEvent::PlayerLeft(player) => {
                self.gameplay.on_player_left(&mut self.session, &mut self.world, player);
                self.with_module(|module, cx| module.on_player_left(cx, player));
            }
            SessionEvent::GameStartRequested(scene) => self.load_scene(scene),
            SessionEvent::Error(err) => error!("session error: {err}"),
            SessionEvent::StateChanged(state) => debug!("session state: {state:?}"),
            SessionEvent::PlayerReadyChanged { player, ready } => debug!("{player} ready: {ready}"),
        }
    }

    fn load_scene(&mut self, scene: &SceneId) {
        match self.scene_loader.as_mut() {
            Some(loader) => loader.load(scene),
            None => {
                let name = self.config.scenes.scene_name(scene).unwrap_or(scene.as_str());
                info!("game start requested for scene '{name}'");
                self.requested_scene = Some(scene.clone());
            }
        }
    }

    fn with_module(&mut self, f: impl FnOnce(&mut dyn GameModule, &mut AppContext<'_>) -> anyhow::Result<()>) {
        let Some(module) = self.module.as_mut() else {
            return;
        };
        let mut cx = AppContext {
            session: &mut self.session,
            gameplay: &mut self.gameplay,
            world: &mut self.world,
        };
        if let Err(err) = f(module.as_mut(), &mut cx) {
            error!("game module failed: {err:#}");
        }
    }
}
