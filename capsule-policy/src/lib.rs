//! Per-peer reconciliation policies. A policy owns its
//! own [`capsule_graph::GraphHandle`] and a concurrent per-peer state
//! table, and exposes the same two-method shape the daemon drives in its
//! heartbeat and inbound-message loops.

mod graph_diff;
mod naive;
mod peer_table;

pub use graph_diff::{GraphDiffMessage, GraphDiffPolicy};
pub use naive::{find_differences, NaiveMessage, NaivePolicy};

use capsule_common::{Error, Hash};

/// Common shape for [`NaivePolicy`] and [`GraphDiffPolicy`]: start an
/// exchange, or react to one message within an exchange already in
/// progress.
pub trait Policy {
    type Message;

    /// Start an exchange with `dest`. Returns `None` if one is already
    /// in flight (the peer isn't at its idle state).
    fn generate_message(&self, dest: Hash) -> Option<Self::Message>;

    /// React to an inbound message from `src`. Returns the reply to
    /// send back, if the protocol calls for one.
    fn process_message(&self, src: Hash, msg: Self::Message) -> Result<Option<Self::Message>, Error>;

    /// Re-derive the graph this policy reasons over from its store.
    fn refresh_graph(&self) -> Result<(), Error>;
}

impl<S: capsule_store::LogStore> Policy for NaivePolicy<S> {
    type Message = NaiveMessage;

    fn generate_message(&self, dest: Hash) -> Option<Self::Message> {
        NaivePolicy::generate_message(self, dest)
    }

    fn process_message(&self, src: Hash, msg: Self::Message) -> Result<Option<Self::Message>, Error> {
        NaivePolicy::process_message(self, src, msg)
    }

    fn refresh_graph(&self) -> Result<(), Error> {
        NaivePolicy::refresh_graph(self)
    }
}

impl<S: capsule_store::LogStore> Policy for GraphDiffPolicy<S> {
    type Message = GraphDiffMessage;

    fn generate_message(&self, dest: Hash) -> Option<Self::Message> {
        GraphDiffPolicy::generate_message(self, dest)
    }

    fn process_message(&self, src: Hash, msg: Self::Message) -> Result<Option<Self::Message>, Error> {
        GraphDiffPolicy::process_message(self, src, msg)
    }

    fn refresh_graph(&self) -> Result<(), Error> {
        GraphDiffPolicy::refresh_graph(self)
    }
}
