//! Daemon wiring: identity, peer directory, one concrete [`Policy`], a
//! [`PeerTransport`], and the heartbeat scheduler that drives
//! `generate_message` on a fan-out of peers.
//!
//! Grounded on `nakamoto-node/src/lib.rs`'s `run()` — open storage,
//! build the initial in-memory index, start the background loop, then
//! block on the inbound handler — generalized from a single-protocol
//! reactor to a generic `Daemon<P>` over whichever `Policy` was chosen.

use std::sync::{Arc, Mutex};

use capsule_common::Hash;
use capsule_net::{Codec, Envelope, PeerTransport};
use capsule_policy::Policy;

use crate::fanout::FanoutSelector;
use crate::heartbeat::HeartbeatScheduler;

/// A running (or not-yet-started) replication daemon.
pub struct Daemon<P: Policy> {
    local_id: Hash,
    peers: Vec<Hash>,
    policy: Arc<P>,
    transport: Arc<dyn PeerTransport>,
    fanout: FanoutSelector,
    fanout_degree: usize,
    heartbeat_interval_ms: u64,
    heartbeat: Mutex<Option<HeartbeatScheduler>>,
}

impl<P> Daemon<P>
where
    P: Policy + Send + Sync + 'static,
    P::Message: Codec + Send + 'static,
{
    pub fn new(
        local_id: Hash,
        peers: Vec<Hash>,
        policy: Arc<P>,
        transport: Arc<dyn PeerTransport>,
        heartbeat_interval_ms: u64,
        fanout_degree: usize,
    ) -> Self {
        Self {
            fanout: FanoutSelector::new(local_id),
            local_id,
            peers,
            policy,
            transport,
            fanout_degree,
            heartbeat_interval_ms,
            heartbeat: Mutex::new(None),
        }
    }

    pub fn local_id(&self) -> Hash {
        self.local_id
    }

    /// Start the heartbeat loop on its own thread, then block serving
    /// inbound messages on the caller's thread. Returns only once the
    /// transport's inbound loop exits.
    pub fn run(self: &Arc<Self>) -> Result<(), capsule_common::Error> {
        let fanout_daemon = self.clone();
        let scheduler = HeartbeatScheduler::schedule(self.heartbeat_interval_ms, move || {
            fanout_daemon.fan_out();
        });
        *self.heartbeat.lock().unwrap() = Some(scheduler);

        let handler_policy = self.policy.clone();
        let handler: Box<dyn Fn(Hash, Envelope) -> Option<Envelope> + Send + Sync> =
            Box::new(move |src, envelope| Self::handle_inbound(&handler_policy, src, envelope));

        self.transport.listen_and_serve(handler)
    }

    fn handle_inbound(policy: &Arc<P>, src: Hash, envelope: Envelope) -> Option<Envelope> {
        let msg = match P::Message::decode(&envelope) {
            Ok(msg) => msg,
            Err(err) => {
                log::warn!(target: "capsule::daemon", "dropping malformed message from {}: {err}", src.readable());
                return None;
            }
        };

        match policy.process_message(src, msg) {
            Ok(Some(reply)) => match reply.encode() {
                Ok(envelope) => Some(envelope),
                Err(err) => {
                    log::warn!(target: "capsule::daemon", "failed to encode reply to {}: {err}", src.readable());
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                log::warn!(target: "capsule::daemon", "exchange with {} reset: {err}", src.readable());
                None
            }
        }
    }

    /// One heartbeat tick: pick peers, generate a message for each, send
    /// it. Peers whose state isn't idle are silently skipped.
    fn fan_out(&self) {
        for peer in self.fanout.pick(&self.peers, self.fanout_degree) {
            let Some(msg) = self.policy.generate_message(peer) else {
                continue;
            };
            let encoded = match msg.encode() {
                Ok(envelope) => envelope,
                Err(err) => {
                    log::warn!(target: "capsule::daemon", "failed to encode outbound message to {}: {err}", peer.readable());
                    continue;
                }
            };
            if let Err(err) = self.transport.send(peer, encoded) {
                log::warn!(target: "capsule::daemon", "send to {} failed: {err}", peer.readable());
            }
        }
    }
}
