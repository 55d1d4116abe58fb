//! Brute-force reconciliation: exchange full hash sets, ship the set
//! difference. Grounded on `policy/naive_policy.go` and
//! `policy/naive_util.go`.

use std::collections::HashSet;
use std::sync::Arc;

use capsule_common::{Error, Hash, Record};
use capsule_graph::GraphHandle;
use capsule_store::LogStore;

use crate::peer_table::PeerTable;

/// The three naive-protocol messages. Unlike the source's single struct
/// with five always-present-but-mostly-empty fields, each variant here
/// only carries what it actually needs.
#[derive(Debug, Clone, PartialEq)]
pub enum NaiveMessage {
    First {
        hashes_all: Vec<Hash>,
    },
    Second {
        hashes_they_want: Vec<Hash>,
        records_we_want: Vec<Record>,
    },
    Third {
        records_we_want: Vec<Record>,
    },
}

impl NaiveMessage {
    pub fn msg_num(&self) -> u8 {
        match self {
            NaiveMessage::First { .. } => 1,
            NaiveMessage::Second { .. } => 2,
            NaiveMessage::Third { .. } => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum NaiveState {
    #[default]
    Resting,
    InitHeartBeat,
    ReceiveHeartBeat,
}

/// Exchange the full set of locally known hashes with a peer and fill in
/// whatever each side is missing.
pub struct NaivePolicy<S> {
    store: Arc<S>,
    graph: GraphHandle,
    peers: PeerTable<NaiveState>,
}

impl<S: LogStore> NaivePolicy<S> {
    pub fn new(store: Arc<S>) -> Result<Self, Error> {
        let graph = capsule_graph::LogGraph::refresh(store.as_ref())?;
        Ok(Self {
            store,
            graph: GraphHandle::new(graph),
            peers: PeerTable::new(),
        })
    }

    /// Re-derive the graph from the store. Call after any out-of-band
    /// write (e.g. a local append) so the next heartbeat sees it.
    pub fn refresh_graph(&self) -> Result<(), Error> {
        self.graph.refresh(self.store.as_ref())
    }

    /// Start an exchange with `dest`, if one isn't already running. Pins
    /// the graph snapshot this exchange reasons over, same as
    /// [`crate::graph_diff::GraphDiffPolicy`].
    pub fn generate_message(&self, dest: Hash) -> Option<NaiveMessage> {
        self.peers.with(dest, |slot| {
            if slot.state != NaiveState::Resting {
                return None;
            }
            let snapshot = self.graph.snapshot();
            let hashes_all = snapshot.nodes().iter().copied().collect();
            slot.graph_in_use = Some(snapshot);
            slot.state = NaiveState::InitHeartBeat;
            Some(NaiveMessage::First { hashes_all })
        })
    }

    pub fn process_message(&self, src: Hash, msg: NaiveMessage) -> Result<Option<NaiveMessage>, Error> {
        self.peers.with(src, |slot| {
            let reply = match (slot.state, &msg) {
                (NaiveState::Resting, NaiveMessage::First { hashes_all }) => {
                    let snapshot = self.graph.snapshot();
                    let mine: Vec<Hash> = snapshot.nodes().iter().copied().collect();
                    slot.graph_in_use = Some(snapshot);
                    let (only_mine, only_theirs) = find_differences(&mine, hashes_all);
                    let records_we_want = self.store.read_records(&only_mine)?;
                    slot.state = NaiveState::ReceiveHeartBeat;
                    Some(NaiveMessage::Second {
                        hashes_they_want: only_theirs,
                        records_we_want,
                    })
                }
                (NaiveState::InitHeartBeat, NaiveMessage::Second { hashes_they_want, records_we_want }) => {
                    self.store.write_records(records_we_want)?;
                    let requested = self.store.read_records(hashes_they_want)?;
                    slot.state = NaiveState::Resting;
                    slot.graph_in_use = None;
                    Some(NaiveMessage::Third {
                        records_we_want: requested,
                    })
                }
                (NaiveState::ReceiveHeartBeat, NaiveMessage::Third { records_we_want }) => {
                    self.store.write_records(records_we_want)?;
                    slot.state = NaiveState::Resting;
                    slot.graph_in_use = None;
                    None
                }
                _ => {
                    log::warn!(
                        target: "capsule::policy::naive",
                        "peer {} sent msg_num={} while in state {:?}; resetting",
                        src.readable(),
                        msg.msg_num(),
                        slot.state,
                    );
                    slot.state = NaiveState::Resting;
                    slot.graph_in_use = None;
                    return Err(Error::InconsistentState);
                }
            };
            Ok(reply)
        })
    }
}

/// Set difference both ways: `(only in a, only in b)`. Both outputs are
/// duplicate-free regardless of duplicates in the inputs.
pub fn find_differences(a: &[Hash], b: &[Hash]) -> (Vec<Hash>, Vec<Hash>) {
    let a_set: HashSet<Hash> = a.iter().copied().collect();
    let b_set: HashSet<Hash> = b.iter().copied().collect();
    let only_a = a_set.difference(&b_set).copied().collect();
    let only_b = b_set.difference(&a_set).copied().collect();
    (only_a, only_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsule_store::MemoryStore;

    fn h(n: u8) -> Hash {
        Hash::from_bytes([n; 32])
    }

    fn record(hash: u8, prev: u8) -> Record {
        Record {
            hash: h(hash),
            rec_no: hash as i64,
            timestamp: 0,
            accuracy: 1.0,
            prev_hash: if prev == 0 { Hash::NULL } else { h(prev) },
            value: vec![hash],
            sig: vec![],
        }
    }

    #[test]
    fn find_differences_of_identical_sets_is_empty() {
        let hashes = vec![h(1), h(2), h(3)];
        let (a, b) = find_differences(&hashes, &hashes);
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn find_differences_deduplicates() {
        let a = vec![h(1), h(1), h(2)];
        let b = vec![h(2)];
        let (only_a, only_b) = find_differences(&a, &b);
        assert_eq!(only_a, vec![h(1)]);
        assert!(only_b.is_empty());
    }

    // S1: identical stores exchange three empty-delta messages, no writes.
    #[test]
    fn identical_stores_produce_empty_exchange() {
        let a_store = Arc::new(MemoryStore::new());
        let b_store = Arc::new(MemoryStore::new());
        for r in [record(1, 0), record(2, 1), record(3, 2)] {
            a_store.write_records(&[r.clone()]).unwrap();
            b_store.write_records(&[r]).unwrap();
        }
        let a = NaivePolicy::new(a_store.clone()).unwrap();
        let b = NaivePolicy::new(b_store.clone()).unwrap();

        let peer_a = h(0xA);
        let peer_b = h(0xB);

        let first = a.generate_message(peer_b).unwrap();
        assert_eq!(first.msg_num(), 1);

        let second = b.process_message(peer_a, first).unwrap().unwrap();
        match &second {
            NaiveMessage::Second { hashes_they_want, records_we_want } => {
                assert!(hashes_they_want.is_empty());
                assert!(records_we_want.is_empty());
            }
            _ => panic!("expected Second"),
        }

        let third = a.process_message(peer_b, second).unwrap().unwrap();
        match &third {
            NaiveMessage::Third { records_we_want } => assert!(records_we_want.is_empty()),
            _ => panic!("expected Third"),
        }

        assert!(b.process_message(peer_a, third).unwrap().is_none());
        assert_eq!(a_store.read_all_records().unwrap().len(), 3);
        assert_eq!(b_store.read_all_records().unwrap().len(), 3);
    }

    // S2: A has more records, B ends up with all of them, A is unchanged.
    #[test]
    fn a_with_more_records_fills_in_b() {
        let a_store = Arc::new(MemoryStore::new());
        let b_store = Arc::new(MemoryStore::new());
        let all = [record(1, 0), record(2, 1), record(3, 2), record(4, 3), record(5, 4)];
        a_store.write_records(&all).unwrap();
        b_store.write_records(&all[..2]).unwrap();

        let a = NaivePolicy::new(a_store.clone()).unwrap();
        let b = NaivePolicy::new(b_store.clone()).unwrap();
        let (peer_a, peer_b) = (h(0xA), h(0xB));

        let first = a.generate_message(peer_b).unwrap();
        let second = b.process_message(peer_a, first).unwrap().unwrap();
        if let NaiveMessage::Second { records_we_want, .. } = &second {
            assert_eq!(records_we_want.len(), 3);
        }
        let third = a.process_message(peer_b, second).unwrap().unwrap();
        if let NaiveMessage::Third { records_we_want } = &third {
            assert!(records_we_want.is_empty());
        }
        b.process_message(peer_a, third).unwrap();

        assert_eq!(a_store.read_all_records().unwrap().len(), 5);
        assert_eq!(b_store.read_all_records().unwrap().len(), 5);
    }

    // S3: symmetric difference, both sides converge.
    #[test]
    fn symmetric_difference_converges_both_sides() {
        let a_store = Arc::new(MemoryStore::new());
        let b_store = Arc::new(MemoryStore::new());
        a_store
            .write_records(&[record(1, 0), record(2, 1), record(3, 2)])
            .unwrap();
        b_store
            .write_records(&[record(1, 0), record(4, 1), record(5, 4)])
            .unwrap();

        let a = NaivePolicy::new(a_store.clone()).unwrap();
        let b = NaivePolicy::new(b_store.clone()).unwrap();
        let (peer_a, peer_b) = (h(0xA), h(0xB));

        let first = a.generate_message(peer_b).unwrap();
        let second = b.process_message(peer_a, first).unwrap().unwrap();
        let third = a.process_message(peer_b, second).unwrap().unwrap();
        b.process_message(peer_a, third).unwrap();

        assert_eq!(a_store.read_all_records().unwrap().len(), 5);
        assert_eq!(b_store.read_all_records().unwrap().len(), 5);
    }

    #[test]
    fn message_out_of_step_resets_to_resting_and_errors() {
        let store = Arc::new(MemoryStore::new());
        let policy = NaivePolicy::new(store).unwrap();
        let peer = h(0xA);

        let err = policy
            .process_message(peer, NaiveMessage::Third { records_we_want: vec![] })
            .unwrap_err();
        assert!(matches!(err, Error::InconsistentState));

        // state machine is back at Resting: a fresh First is accepted normally.
        let reply = policy
            .process_message(peer, NaiveMessage::First { hashes_all: vec![] })
            .unwrap();
        assert!(reply.is_some());
    }

    #[test]
    fn generate_message_is_skipped_mid_exchange() {
        let store = Arc::new(MemoryStore::new());
        let policy = NaivePolicy::new(store).unwrap();
        let peer = h(0xA);

        assert!(policy.generate_message(peer).is_some());
        assert!(policy.generate_message(peer).is_none(), "already InitHeartBeat");
    }
}
