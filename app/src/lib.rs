//! Application context for roomsync.
//!
//! [`MultiplayerApp`] owns a [`session::Session`], the [`gameplay::Gameplay`]
//! layer and the embedding game's [`gameplay::EntityWorld`], and drives all
//! three from two explicit ticks. Configuration is a single JSON document
//! ([`MultiplayerConfig`]) validated at startup.

mod app;
mod config;
mod module;
mod scenes;

pub use app::{MultiplayerApp, MultiplayerAppBuilder};
pub use config::{ConfigError, MultiplayerConfig};
pub use module::{AppContext, GameModule, InterceptorId, MessageInterceptor};
pub use scenes::{SceneCatalog, SceneEntry};
