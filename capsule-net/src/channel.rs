//! In-process transport over `crossbeam-channel`, standing in for the
//! out-of-scope wire transport (HTTP POST and a length-prefixed stream
//! are both plausible real backends; neither is implemented here). Used
//! by the daemon's own tests and by any harness that wants several
//! capsules talking without touching a socket.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use capsule_common::{Error, Hash};
use crossbeam_channel::{Receiver, Sender};

use crate::envelope::Envelope;
use crate::PeerTransport;

/// Shared registry of inboxes, one per registered peer identity.
#[derive(Default)]
pub struct ChannelHub {
    senders: RwLock<HashMap<Hash, Sender<(Hash, Envelope)>>>,
}

impl ChannelHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new endpoint under `id` and get back its transport.
    pub fn register(self: &Arc<Self>, id: Hash) -> ChannelTransport {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.senders.write().unwrap().insert(id, tx);
        ChannelTransport {
            id,
            hub: self.clone(),
            inbox: rx,
        }
    }
}

/// One endpoint's handle onto a [`ChannelHub`].
pub struct ChannelTransport {
    id: Hash,
    hub: Arc<ChannelHub>,
    inbox: Receiver<(Hash, Envelope)>,
}

impl PeerTransport for ChannelTransport {
    fn send(&self, dest: Hash, envelope: Envelope) -> Result<(), Error> {
        let senders = self.hub.senders.read().unwrap();
        let tx = senders
            .get(&dest)
            .ok_or_else(|| Error::TransportSend(format!("no registered peer {}", dest.readable())))?;
        tx.send((self.id, envelope))
            .map_err(|e| Error::TransportSend(e.to_string()))
    }

    fn broadcast(&self, envelope: Envelope) -> Result<(), Error> {
        let senders = self.hub.senders.read().unwrap();
        for (peer, tx) in senders.iter() {
            if *peer == self.id {
                continue;
            }
            // Best-effort: one dead peer doesn't abort the broadcast.
            let _ = tx.send((self.id, envelope.clone()));
        }
        Ok(())
    }

    fn listen_and_serve(
        &self,
        handler: Box<dyn Fn(Hash, Envelope) -> Option<Envelope> + Send + Sync>,
    ) -> Result<(), Error> {
        while let Ok((src, envelope)) = self.inbox.recv() {
            if let Some(reply) = handler(src, envelope) {
                self.send(src, reply)?;
            }
        }
        Ok(())
    }
}

impl ChannelTransport {
    /// Drain and handle every message currently queued, without
    /// blocking for more. Used by tests that drive an exchange
    /// step-by-step instead of running a background listener thread.
    pub fn serve_pending(
        &self,
        handler: impl Fn(Hash, Envelope) -> Option<Envelope>,
    ) -> Result<usize, Error> {
        let mut handled = 0;
        while let Ok((src, envelope)) = self.inbox.try_recv() {
            handled += 1;
            if let Some(reply) = handler(src, envelope) {
                self.send(src, reply)?;
            }
        }
        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> Hash {
        Hash::from_bytes([n; 32])
    }

    #[test]
    fn send_delivers_to_the_named_peer_only() {
        let hub = ChannelHub::new();
        let a = hub.register(h(1));
        let b = hub.register(h(2));
        let c = hub.register(h(3));

        a.send(h(2), Envelope { msg_type: 1, body: vec![0xAA] }).unwrap();

        assert_eq!(b.inbox.try_recv().unwrap().1.body, vec![0xAA]);
        assert!(c.inbox.try_recv().is_err());
    }

    #[test]
    fn send_to_unknown_peer_is_a_transport_error() {
        let hub = ChannelHub::new();
        let a = hub.register(h(1));
        let err = a.send(h(99), Envelope { msg_type: 1, body: vec![] }).unwrap_err();
        assert!(matches!(err, Error::TransportSend(_)));
    }

    #[test]
    fn broadcast_reaches_every_other_peer() {
        let hub = ChannelHub::new();
        let a = hub.register(h(1));
        let b = hub.register(h(2));
        let c = hub.register(h(3));

        a.broadcast(Envelope { msg_type: 1, body: vec![0x01] }).unwrap();

        assert!(b.inbox.try_recv().is_ok());
        assert!(c.inbox.try_recv().is_ok());
        assert!(a.inbox.try_recv().is_err());
    }

    #[test]
    fn serve_pending_invokes_handler_and_sends_reply() {
        let hub = ChannelHub::new();
        let a = hub.register(h(1));
        let b = hub.register(h(2));

        a.send(h(2), Envelope { msg_type: 1, body: vec![7] }).unwrap();
        let handled = b
            .serve_pending(|_src, envelope| Some(Envelope { msg_type: 2, body: envelope.body }))
            .unwrap();
        assert_eq!(handled, 1);

        let (src, reply) = a.inbox.try_recv().unwrap();
        assert_eq!(src, h(2));
        assert_eq!(reply.body, vec![7]);
    }
}
