//! Network id allocation for spawned entities.

use wire::NetworkId;

const MAX_ATTEMPTS: usize = 1024;

/// Monotonic id counter with wraparound and a random fallback.
#[derive(Debug, Clone)]
pub struct NetworkIdAllocator {
    next: i32,
}

impl Default for NetworkIdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl NetworkIdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts counting at `next`. Non-positive values restart at 1.
    #[must_use]
    pub const fn starting_at(next: i32) -> Self {
        Self { next: if next > 0 { next } else { 1 } }
    }

    /// Returns the next id for which `in_use` is `false`.
    ///
    /// After 1024 taken ids in a row a random non-zero 31-bit id
    /// is returned without checking `in_use`.
    pub fn allocate(&mut self, mut in_use: impl FnMut(NetworkId) -> bool) -> NetworkId {
        for _ in 0..MAX_ATTEMPTS {
            let id = NetworkId::new(self.next);
            self.next = self.next.checked_add(1).unwrap_or(1);
            if !in_use(id) {
                return id;
            }
        }
        let fallback = (rand::random::<u32>() & 0x7fff_ffff) as i32;
        NetworkId::new(if fallback == 0 { 1 } else { fallback })
    }
}
