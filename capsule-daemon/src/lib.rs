//! Daemon wiring on top of `capsule-policy` and `capsule-net`: config,
//! heartbeat scheduling, fan-out peer selection, and the `Daemon<P>`
//! that ties a store-backed policy to a transport.

mod config;
mod daemon;
mod error;
mod fanout;
mod heartbeat;
mod store;

use std::sync::Arc;

use capsule_net::PeerTransport;
use capsule_policy::{GraphDiffPolicy, NaivePolicy};

pub use config::{Config, ProtocolChoice};
pub use daemon::Daemon;
pub use error::Error;
pub use fanout::FanoutSelector;
pub use heartbeat::HeartbeatScheduler;
pub use store::{open_store, AnyStore};

/// Open the configured store, build whichever policy `config.protocol`
/// names, and block serving heartbeats and inbound exchanges over
/// `transport`.
///
/// Mirrors `nakamoto-node`'s top-level `run()`: a single wiring function
/// a binary calls with its config and transport, rather than exposing
/// the individual pieces for every caller to assemble by hand.
pub fn run(config: Config, transport: Arc<dyn PeerTransport>) -> Result<(), Error> {
    log::info!(target: "capsule::daemon", "starting {} with {} peer(s)", config.local_id.readable(), config.peers.len());

    let store = Arc::new(open_store(&config)?);
    let peers: Vec<_> = config.peers.keys().copied().collect();

    match config.protocol {
        ProtocolChoice::Naive => {
            let policy = Arc::new(NaivePolicy::new(store)?);
            let daemon = Arc::new(Daemon::new(
                config.local_id,
                peers,
                policy,
                transport,
                config.heartbeat_interval_ms,
                config.fanout_degree,
            ));
            daemon.run()?;
        }
        ProtocolChoice::GraphDiff => {
            let policy = Arc::new(GraphDiffPolicy::new(store)?);
            let daemon = Arc::new(Daemon::new(
                config.local_id,
                peers,
                policy,
                transport,
                config.heartbeat_interval_ms,
                config.fanout_degree,
            ));
            daemon.run()?;
        }
    }
    Ok(())
}
