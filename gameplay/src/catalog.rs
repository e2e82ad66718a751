//! Prefab catalog: which entity templates the spawner may instantiate.

use std::collections::BTreeMap;

use log::error;
use thiserror::Error;

use crate::rigidbody_sync::RigidbodySyncSettings;
use crate::transform_sync::TransformSyncSettings;
use crate::world::BodyKind;

/// Identifier of a spawnable prefab. Valid ids are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PrefabId(i32);

impl PrefabId {
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl From<i32> for PrefabId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for PrefabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "prefab {}", self.0)
    }
}

/// A spawnable template: optional body plus the sync components attached
/// to every instance.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PrefabSpec {
    pub name: String,
    pub body: Option<BodyKind>,
    pub transform: Option<TransformSyncSettings>,
    pub rigidbody: Option<RigidbodySyncSettings>,
}

impl PrefabSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_body(mut self, kind: BodyKind) -> Self {
        self.body = Some(kind);
        self
    }

    #[must_use]
    pub fn with_transform_sync(mut self, settings: TransformSyncSettings) -> Self {
        self.transform = Some(settings);
        self
    }

    #[must_use]
    pub fn with_rigidbody_sync(mut self, settings: RigidbodySyncSettings) -> Self {
        self.rigidbody = Some(settings);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{id} is not positive")]
    InvalidPrefabId { id: PrefabId },

    #[error("duplicate {id} ('{existing}' and '{rejected}')")]
    DuplicatePrefabId {
        id: PrefabId,
        existing: String,
        rejected: String,
    },
}

/// One catalog entry as it appears in configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrefabEntry {
    pub id: PrefabId,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub spec: PrefabSpec,
}

/// Positive prefab ids mapped to prefab specs.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<PrefabEntry>", into = "Vec<PrefabEntry>")
)]
pub struct PrefabCatalog {
    entries: BTreeMap<PrefabId, PrefabSpec>,
}

impl PrefabCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a prefab. The first entry for an id wins.
    pub fn insert(&mut self, id: PrefabId, spec: PrefabSpec) -> Result<(), CatalogError> {
        if !id.is_valid() {
            return Err(CatalogError::InvalidPrefabId { id });
        }
        if let Some(existing) = self.entries.get(&id) {
            let err = CatalogError::DuplicatePrefabId {
                id,
                existing: existing.name.clone(),
                rejected: spec.name,
            };
            error!("{err}");
            return Err(err);
        }
        self.entries.insert(id, spec);
        Ok(())
    }

    #[must_use]
    pub fn with(mut self, id: impl Into<PrefabId>, spec: PrefabSpec) -> Self {
        let _ = self.insert(id.into(), spec);
        self
    }

    #[must_use]
    pub fn get(&self, id: PrefabId) -> Option<&PrefabSpec> {
        self.entries.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: PrefabId) -> bool {
        self.entries.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrefabId, &PrefabSpec)> {
        self.entries.iter().map(|(id, spec)| (*id, spec))
    }
}

impl TryFrom<Vec<PrefabEntry>> for PrefabCatalog {
    type Error = CatalogError;

    fn try_from(entries: Vec<PrefabEntry>) -> Result<Self, Self::Error> {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.insert(entry.id, entry.spec)?;
        }
        Ok(catalog)
    }
}

impl From<PrefabCatalog> for Vec<PrefabEntry> {
    fn from(catalog: PrefabCatalog) -> Self {
        catalog
            .entries
            .into_iter()
            .map(|(id, spec)| PrefabEntry { id, spec })
            .collect()
    }
}
