//! Message transport contract and wire codecs.
//!
//! Grounded on `peers/replicate_mgr.go`'s `ReplicateNetworkMgr`
//! interface (`ListenAndServe`/`Send`/`Broadcast`), generalized to a
//! trait so the daemon can swap in any transport without caring whether
//! it's a socket or (as here) an in-process channel.

mod channel;
mod envelope;
pub mod graph_diff_codec;
pub mod naive_codec;

pub use channel::{ChannelHub, ChannelTransport};
pub use envelope::Envelope;

use capsule_common::{Error, Hash};
use capsule_policy::{GraphDiffMessage, NaiveMessage};

/// A policy's message type, paired with its wire codec. Lets the daemon
/// stay generic over which policy it was built with.
pub trait Codec: Sized {
    fn encode(&self) -> Result<Envelope, Error>;
    fn decode(envelope: &Envelope) -> Result<Self, Error>;
}

impl Codec for NaiveMessage {
    fn encode(&self) -> Result<Envelope, Error> {
        naive_codec::encode(self)
    }

    fn decode(envelope: &Envelope) -> Result<Self, Error> {
        naive_codec::decode(envelope)
    }
}

impl Codec for GraphDiffMessage {
    fn encode(&self) -> Result<Envelope, Error> {
        graph_diff_codec::encode(self)
    }

    fn decode(envelope: &Envelope) -> Result<Self, Error> {
        graph_diff_codec::decode(envelope)
    }
}

/// Per-destination unicast of one framed envelope, plus a blocking
/// inbound loop. One daemon holds exactly one `PeerTransport` impl.
pub trait PeerTransport: Send + Sync {
    /// Send `envelope` to `dest`.
    fn send(&self, dest: Hash, envelope: Envelope) -> Result<(), Error>;

    /// Send `envelope` to every other known peer, best-effort.
    fn broadcast(&self, envelope: Envelope) -> Result<(), Error>;

    /// Block, handing every inbound `(src, envelope)` to `handler` and
    /// sending back whatever reply it returns. Runs until the transport
    /// is closed.
    fn listen_and_serve(
        &self,
        handler: Box<dyn Fn(Hash, Envelope) -> Option<Envelope> + Send + Sync>,
    ) -> Result<(), Error>;
}
