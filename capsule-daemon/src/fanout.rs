//! Deterministic-but-varied peer selection for the heartbeat fan-out
//! step: a pseudorandom shuffle seeded from local identity (so two runs
//! of the same daemon pick the same order) combined with a rotating
//! window (so consecutive ticks don't hammer the same peers).
//!
//! Grounded on `fastrand`'s use in `p2p/src/fsm/bfmgr.rs`'s peer retry
//! selection for seeded, reproducible randomness.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use capsule_common::Hash;

/// `fastrand::Rng`'s interior mutability isn't `Sync`; a heartbeat
/// scheduler running on its own thread still needs `FanoutSelector` to
/// live inside a `Daemon` shared via `Arc` with the listener thread, so
/// the generator is mutex-guarded.
pub struct FanoutSelector {
    rng: Mutex<fastrand::Rng>,
    rotation: AtomicUsize,
}

impl FanoutSelector {
    /// `seed` is normally the daemon's own identity, so its selection
    /// order is reproducible across restarts but distinct per daemon.
    pub fn new(seed: Hash) -> Self {
        let bytes = seed.as_bytes();
        let mut seed_bytes = [0u8; 8];
        seed_bytes.copy_from_slice(&bytes[..8]);
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(u64::from_le_bytes(seed_bytes))),
            rotation: AtomicUsize::new(0),
        }
    }

    /// Pick up to `fanout_degree` peers from `peers`, without
    /// replacement. Advances the rotation on every call so a sequence of
    /// calls with the same peer list eventually covers all of it.
    pub fn pick(&self, peers: &[Hash], fanout_degree: usize) -> Vec<Hash> {
        if peers.is_empty() || fanout_degree == 0 {
            return Vec::new();
        }
        let mut shuffled = peers.to_vec();
        self.rng.lock().unwrap().shuffle(&mut shuffled);

        let n = fanout_degree.min(shuffled.len());
        let start = self.rotation.fetch_add(n, Ordering::Relaxed) % shuffled.len();
        (0..n).map(|i| shuffled[(start + i) % shuffled.len()]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> Hash {
        Hash::from_bytes([n; 32])
    }

    #[test]
    fn empty_peer_list_picks_nothing() {
        let selector = FanoutSelector::new(h(1));
        assert!(selector.pick(&[], 3).is_empty());
    }

    #[test]
    fn never_picks_more_than_fanout_degree() {
        let selector = FanoutSelector::new(h(1));
        let peers: Vec<Hash> = (2..10).map(h).collect();
        assert_eq!(selector.pick(&peers, 3).len(), 3);
    }

    #[test]
    fn caps_at_peer_count_when_fanout_exceeds_it() {
        let selector = FanoutSelector::new(h(1));
        let peers = vec![h(2), h(3)];
        assert_eq!(selector.pick(&peers, 10).len(), 2);
    }

    #[test]
    fn same_seed_picks_the_same_first_round() {
        let peers: Vec<Hash> = (2..6).map(h).collect();
        let a = FanoutSelector::new(h(42));
        let b = FanoutSelector::new(h(42));
        assert_eq!(a.pick(&peers, 2), b.pick(&peers, 2));
    }

    #[test]
    fn rotation_advances_across_calls() {
        let selector = FanoutSelector::new(h(7));
        let peers: Vec<Hash> = (2..6).map(h).collect();
        let first = selector.pick(&peers, 2);
        let second = selector.pick(&peers, 2);
        assert_ne!(first, second, "rotation should move the window forward");
    }
}
