//! Scene ids mapped to loader-specific scene names.

use serde::{Deserialize, Serialize};
use session::SceneId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneEntry {
    pub id: SceneId,
    pub scene_name: String,
}

/// Ordered scene table. Lookups compare ids exactly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneCatalog {
    entries: Vec<SceneEntry>,
}

impl SceneCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, id: impl Into<SceneId>, scene_name: impl Into<String>) -> Self {
        self.entries.push(SceneEntry {
            id: id.into(),
            scene_name: scene_name.into(),
        });
        self
    }

    /// The scene name for `id`. Blank names resolve to `None`.
    #[must_use]
    pub fn scene_name(&self, id: &SceneId) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.id == *id)
            .map(|entry| entry.scene_name.as_str())
            .filter(|name| !name.is_empty())
    }

    #[must_use]
    pub fn contains(&self, id: &SceneId) -> bool {
        self.entries.iter().any(|entry| entry.id == *id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_entry_wins() {
        let catalog = SceneCatalog::new()
            .with("arena", "Arena01")
            .with("arena", "Arena02")
            .with("empty", "");
        assert_eq!(catalog.scene_name(&SceneId::from("arena")), Some("Arena01"));
        assert_eq!(catalog.scene_name(&SceneId::from("empty")), None);
        assert_eq!(catalog.scene_name(&SceneId::from("Arena")), None);
        assert!(catalog.contains(&SceneId::from("empty")));
    }
}
