//! Concurrent per-peer map with safe lazy insertion: the outer map
//! supports concurrent reads, a miss takes the write path once, and
//! every state transition for one peer is then serialized through that
//! peer's own mutex. Distinct peers make progress in parallel.
//!
//! Grounded on `p2p/src/fsm/bfmgr.rs`'s `AddressBook<PeerId, Peer>`
//! per-peer map, generalized from a single `RwLock<HashMap<..>>` (which
//! the original double-checked-locking `initPeerIfNeeded` in
//! `graph_diff_policy.go` gets wrong — it can insert the same peer's
//! mutex twice under concurrent callers) to the `RwLock` outer map +
//! `Arc<Mutex<_>>` slot pattern below.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use capsule_common::Hash;
use capsule_graph::LogGraph;

/// Per-peer exchange bookkeeping: the state-machine position plus the
/// graph snapshot pinned for the exchange currently in flight, if any.
pub struct PeerSlot<E> {
    pub state: E,
    pub graph_in_use: Option<Arc<LogGraph>>,
}

impl<E: Default> Default for PeerSlot<E> {
    fn default() -> Self {
        Self {
            state: E::default(),
            graph_in_use: None,
        }
    }
}

/// A concurrent map from peer identity to its mutex-guarded slot.
pub struct PeerTable<E> {
    inner: RwLock<HashMap<Hash, Arc<Mutex<PeerSlot<E>>>>>,
}

impl<E> Default for PeerTable<E> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<E: Default> PeerTable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the slot for `peer`, inserting a fresh one if this is the
    /// first time we've heard of it. Never locks the slot itself —
    /// callers lock via [`PeerTable::with`].
    fn slot(&self, peer: Hash) -> Arc<Mutex<PeerSlot<E>>> {
        if let Some(slot) = self.inner.read().unwrap().get(&peer) {
            return slot.clone();
        }
        self.inner
            .write()
            .unwrap()
            .entry(peer)
            .or_insert_with(|| Arc::new(Mutex::new(PeerSlot::default())))
            .clone()
    }

    /// Lock `peer`'s slot for the duration of one state transition. The
    /// returned guard is held across the whole of `with`, so the whole
    /// transition runs atomically with respect to other callers touching
    /// the same peer.
    pub fn with<R>(&self, peer: Hash, with: impl FnOnce(&mut PeerSlot<E>) -> R) -> R {
        let slot = self.slot(peer);
        let mut guard: MutexGuard<'_, PeerSlot<E>> = slot.lock().unwrap();
        with(&mut guard)
    }
}
