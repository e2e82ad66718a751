//! Who drives an entity's state.

use session::{PlayerId, Session};
use wire::AuthorityMode;

/// Snapshot of the local peer's standing in the room, taken once per tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalPeer {
    pub in_room: bool,
    pub is_host: bool,
    pub player: Option<PlayerId>,
}

impl LocalPeer {
    #[must_use]
    pub fn of(session: &Session) -> Self {
        Self {
            in_room: session.is_in_room(),
            is_host: session.is_host(),
            player: session.local_player_id().cloned(),
        }
    }
}

/// Authority mode plus the owner it names in `Owner` mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Authority {
    pub mode: AuthorityMode,
    /// Empty for host-owned entities.
    pub owner: PlayerId,
}

impl Authority {
    #[must_use]
    pub const fn host() -> Self {
        Self {
            mode: AuthorityMode::Host,
            owner: PlayerId::none(),
        }
    }

    #[must_use]
    pub fn owner(player: impl Into<PlayerId>) -> Self {
        Self {
            mode: AuthorityMode::Owner,
            owner: player.into(),
        }
    }

    #[must_use]
    pub const fn new(mode: AuthorityMode, owner: PlayerId) -> Self {
        Self { mode, owner }
    }

    /// `true` if the local peer drives the entity.
    #[must_use]
    pub fn is_local(&self, peer: &LocalPeer) -> bool {
        match self.mode {
            AuthorityMode::Host => peer.is_host,
            AuthorityMode::Owner => peer
                .player
                .as_ref()
                .is_some_and(|local| !local.is_empty() && !self.owner.is_empty() && *local == self.owner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(is_host: bool, player: &str) -> LocalPeer {
        LocalPeer {
            in_room: true,
            is_host,
            player: Some(PlayerId::from(player)),
        }
    }

    #[test]
    fn host_mode_follows_host_flag() {
        assert!(Authority::host().is_local(&peer(true, "h")));
        assert!(!Authority::host().is_local(&peer(false, "c")));
    }

    #[test]
    fn owner_mode_matches_ids() {
        let authority = Authority::owner("c");
        assert!(authority.is_local(&peer(false, "c")));
        assert!(!authority.is_local(&peer(true, "h")));
    }

    #[test]
    fn empty_ids_never_own() {
        assert!(!Authority::owner("").is_local(&peer(false, "")));
        assert!(!Authority::owner("c").is_local(&LocalPeer::default()));
    }
}
