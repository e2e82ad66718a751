//! Per-entity sync components keyed by network id.

use std::collections::BTreeMap;

use session::NetworkMessage;
use wire::ids::gameplay_ids;
use wire::{encode_rigidbody, encode_transform, NetworkId, Rigidbody2DState, TransformState};

use crate::authority::{Authority, LocalPeer};
use crate::identity::NetworkIdentity;
use crate::rigidbody_sync::{Rigidbody2DSync, RigidbodySyncSettings, SampleOutcome};
use crate::transform_sync::{TransformSync, TransformSyncSettings};
use crate::world::EntityWorld;

#[derive(Debug)]
struct SyncEntry {
    transform: Option<TransformSync>,
    rigidbody: Option<Rigidbody2DSync>,
}

/// The sync components attached to live entities.
///
/// Ticks iterate in network-id order so outbound traffic is deterministic.
#[derive(Debug, Default)]
pub struct SyncSet {
    entries: BTreeMap<NetworkId, SyncEntry>,
}

impl SyncSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches sync components to `identity`, replacing any already there.
    ///
    /// Returns `false` (and attaches nothing) when both settings are `None`.
    pub fn attach(
        &mut self,
        identity: NetworkIdentity,
        transform: Option<TransformSyncSettings>,
        rigidbody: Option<RigidbodySyncSettings>,
        authority: &Authority,
    ) -> bool {
        if transform.is_none() && rigidbody.is_none() {
            return false;
        }
        let entry = SyncEntry {
            transform: transform.map(|settings| TransformSync::new(identity, settings, authority.clone())),
            rigidbody: rigidbody.map(|settings| Rigidbody2DSync::new(identity, settings, authority.clone())),
        };
        self.entries.insert(identity.id, entry);
        true
    }

    pub fn detach(&mut self, id: NetworkId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Updates the authority of every component on `id`.
    pub fn set_authority(&mut self, id: NetworkId, authority: &Authority) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if let Some(sync) = entry.transform.as_mut() {
            sync.set_authority(authority.clone());
        }
        if let Some(sync) = entry.rigidbody.as_mut() {
            sync.set_authority(authority.clone());
        }
        true
    }

    /// Restarts the sequence gate on every host-driven rigidbody.
    pub fn host_changed(&mut self) {
        for sync in self.entries.values_mut().filter_map(|entry| entry.rigidbody.as_mut()) {
            sync.host_changed();
        }
    }

    #[must_use]
    pub fn contains(&self, id: NetworkId) -> bool {
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

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn transform(&self, id: NetworkId) -> Option<&TransformSync> {
        self.entries.get(&id)?.transform.as_ref()
    }

    pub fn transform_mut(&mut self, id: NetworkId) -> Option<&mut TransformSync> {
        self.entries.get_mut(&id)?.transform.as_mut()
    }

    #[must_use]
    pub fn rigidbody(&self, id: NetworkId) -> Option<&Rigidbody2DSync> {
        self.entries.get(&id)?.rigidbody.as_ref()
    }

    pub fn rigidbody_mut(&mut self, id: NetworkId) -> Option<&mut Rigidbody2DSync> {
        self.entries.get_mut(&id)?.rigidbody.as_mut()
    }

    /// Frame tick for every transform sync; returns the updates to send.
    pub fn frame(&mut self, peer: &LocalPeer, world: &mut dyn EntityWorld, dt: f32) -> Vec<NetworkMessage> {
        self.entries
            .values_mut()
            .filter_map(|entry| entry.transform.as_mut())
            .filter_map(|sync| sync.frame(peer, world, dt))
            .map(|state| transform_message(&state))
            .collect()
    }

    /// Physics tick for every component; returns the updates to send.
    pub fn physics(&mut self, peer: &LocalPeer, world: &mut dyn EntityWorld, dt: f32) -> Vec<NetworkMessage> {
        let mut outbound = Vec::new();
        for entry in self.entries.values_mut() {
            if let Some(sync) = entry.transform.as_mut() {
                sync.physics(peer, world, dt);
            }
            if let Some(state) = entry.rigidbody.as_mut().and_then(|sync| sync.physics(peer, world, dt)) {
                outbound.push(rigidbody_message(&state));
            }
        }
        outbound
    }

    /// Routes an inbound transform update. `false` if nothing accepted it.
    pub fn apply_transform(&mut self, peer: &LocalPeer, state: &TransformState) -> bool {
        self.transform_mut(state.network_id)
            .is_some_and(|sync| sync.apply_remote(peer, state))
    }

    /// Routes an inbound rigidbody sample. `None` if `id` has no rigidbody sync.
    pub fn apply_rigidbody(
        &mut self,
        peer: &LocalPeer,
        world: &mut dyn EntityWorld,
        state: &Rigidbody2DState,
    ) -> Option<SampleOutcome> {
        self.rigidbody_mut(state.network_id)
            .map(|sync| sync.apply_remote(peer, world, state))
    }
}

fn transform_message(state: &TransformState) -> NetworkMessage {
    NetworkMessage::new(gameplay_ids::TRANSFORM_STATE, encode_transform(state))
}

fn rigidbody_message(state: &Rigidbody2DState) -> NetworkMessage {
    NetworkMessage::new(gameplay_ids::RIGIDBODY_2D_STATE, encode_rigidbody(state))
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use session::PlayerId;
    use wire::decode_transform;

    use super::*;
    use crate::catalog::{PrefabId, PrefabSpec};
    use crate::identity::EntityHandle;
    use crate::world::{Body2D, Pose};

    struct Static(Pose);

    impl EntityWorld for Static {
        fn instantiate(&mut self, _prefab: PrefabId, _spec: &PrefabSpec, _pose: Pose) -> Option<EntityHandle> {
            None
        }
        fn destroy(&mut self, _entity: EntityHandle) -> bool {
            false
        }
        fn pose(&self, _entity: EntityHandle) -> Option<Pose> {
            Some(self.0)
        }
        fn set_pose(&mut self, _entity: EntityHandle, pose: Pose) {
            self.0 = pose;
        }
        fn body_2d(&mut self, _entity: EntityHandle) -> Option<&mut dyn Body2D> {
            None
        }
    }

    fn identity(id: i32) -> NetworkIdentity {
        NetworkIdentity::spawned(NetworkId::new(id), EntityHandle(u64::try_from(id).unwrap()))
    }

    fn host() -> LocalPeer {
        LocalPeer {
            in_room: true,
            is_host: true,
            player: Some(PlayerId::from("h")),
        }
    }

    #[test]
    fn attach_requires_a_component() {
        let mut syncs = SyncSet::new();
        assert!(!syncs.attach(identity(1), None, None, &Authority::host()));
        assert!(syncs.is_empty());
        assert!(syncs.attach(identity(1), Some(TransformSyncSettings::default()), None, &Authority::host()));
        assert!(syncs.transform(NetworkId::new(1)).is_some());
        assert!(syncs.rigidbody(NetworkId::new(1)).is_none());
    }

    #[test]
    fn frame_emits_messages_in_id_order() {
        let mut syncs = SyncSet::new();
        for id in [3, 1, 2] {
            syncs.attach(identity(id), Some(TransformSyncSettings::default()), None, &Authority::host());
        }
        let mut world = Static(Pose::at(Vec3::ONE));
        let messages = syncs.frame(&host(), &mut world, 0.05);
        let ids: Vec<i32> = messages
            .iter()
            .map(|message| decode_transform(&message.payload).unwrap().network_id.raw())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(messages.iter().all(|m| m.id == gameplay_ids::TRANSFORM_STATE));
    }

    #[test]
    fn set_authority_reaches_components() {
        let mut syncs = SyncSet::new();
        syncs.attach(
            identity(1),
            Some(TransformSyncSettings::default()),
            Some(RigidbodySyncSettings::default()),
            &Authority::host(),
        );
        assert!(syncs.set_authority(NetworkId::new(1), &Authority::owner("p")));
        assert_eq!(syncs.transform(NetworkId::new(1)).unwrap().authority(), &Authority::owner("p"));
        assert_eq!(syncs.rigidbody(NetworkId::new(1)).unwrap().authority(), &Authority::owner("p"));
        assert!(!syncs.set_authority(NetworkId::new(2), &Authority::host()));
    }

    #[test]
    fn unknown_ids_are_not_applied() {
        let mut syncs = SyncSet::new();
        let state = TransformState {
            network_id: NetworkId::new(9),
            position: Some(Vec3::ONE),
            rotation: None,
        };
        assert!(!syncs.apply_transform(&host(), &state));
    }
}
