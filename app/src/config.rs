//! Application configuration loaded from JSON.

use std::collections::BTreeSet;
use std::path::Path;

use gameplay::{PrefabCatalog, SpawnerConfig};
use serde::{Deserialize, Serialize};
use session::{RoomOptions, SceneId};
use thiserror::Error;

use crate::scenes::SceneCatalog;

const DEFAULT_MAX_PLAYERS: u8 = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("default_max_players must be at least 1")]
    InvalidMaxPlayers,

    #[error("scene '{id}' is listed more than once")]
    DuplicateScene { id: SceneId },

    #[error("scene '{id}' has no scene name")]
    BlankSceneName { id: SceneId },

    #[error("game scene '{id}' is not in the scene catalog")]
    UnknownGameScene { id: SceneId },
}

/// Everything the application needs before it can join a room.
///
/// Every field has a default, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplayerConfig {
    /// Scene ids and the names the scene loader resolves them to.
    pub scenes: SceneCatalog,
    /// Scene loaded by [`crate::MultiplayerApp::request_start_configured_game`].
    pub game_scene: SceneId,
    /// Room size used by [`MultiplayerConfig::create_room_options`].
    pub default_max_players: u8,
    pub prefabs: PrefabCatalog,
    pub spawner: SpawnerConfig,
}

impl Default for MultiplayerConfig {
    fn default() -> Self {
        Self {
            scenes: SceneCatalog::default(),
            game_scene: SceneId::default(),
            default_max_players: DEFAULT_MAX_PLAYERS,
            prefabs: PrefabCatalog::default(),
            spawner: SpawnerConfig::default(),
        }
    }
}

impl MultiplayerConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the cross-field rules serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_max_players == 0 {
            return Err(ConfigError::InvalidMaxPlayers);
        }
        let mut seen = BTreeSet::new();
        for entry in self.scenes.iter() {
            if !seen.insert(&entry.id) {
                return Err(ConfigError::DuplicateScene { id: entry.id.clone() });
            }
            if entry.scene_name.trim().is_empty() {
                return Err(ConfigError::BlankSceneName { id: entry.id.clone() });
            }
        }
        if self.game_scene.is_valid() && !self.scenes.is_empty() && !self.scenes.contains(&self.game_scene) {
            return Err(ConfigError::UnknownGameScene {
                id: self.game_scene.clone(),
            });
        }
        Ok(())
    }

    /// Options for a room created with this configuration's defaults.
    #[must_use]
    pub fn create_room_options(&self, room_code: impl Into<String>) -> RoomOptions {
        RoomOptions {
            room_code: room_code.into(),
            max_players: self.default_max_players,
            is_open: true,
            is_visible: true,
            ..RoomOptions::default()
        }
    }
}
