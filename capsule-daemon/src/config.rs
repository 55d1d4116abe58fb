//! Process surface: the daemon reads its listen address, store path,
//! local identity, and peer directory from configuration; nothing else
//! is consulted by the core.

use std::collections::HashMap;
use std::path::PathBuf;

use capsule_common::Hash;
use serde::Deserialize;

/// Which reconciliation protocol a daemon runs. Fixed for the lifetime
/// of a daemon: each daemon runs exactly one concrete `Policy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolChoice {
    Naive,
    GraphDiff,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// This daemon's own identity.
    pub local_id: Hash,
    /// Where to listen for inbound connections, e.g. `"0.0.0.0:4010"`.
    /// Unused by the in-process [`capsule_net::ChannelTransport`]; kept
    /// for a real socket transport to read.
    pub listen_addr: String,
    /// Sqlite file backing the store. `None` means in-memory.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// Peer directory: identity to transport URL.
    pub peers: HashMap<Hash, String>,
    pub protocol: ProtocolChoice,
    pub heartbeat_interval_ms: u64,
    pub fanout_degree: usize,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_config() {
        let text = r#"
            local_id = "0101010101010101010101010101010101010101010101010101010101010101"
            listen_addr = "127.0.0.1:4010"
            protocol = "graph_diff"
            heartbeat_interval_ms = 200
            fanout_degree = 3

            [peers]
            "0202020202020202020202020202020202020202020202020202020202020202" = "http://peer-b:4010"
        "#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.protocol, ProtocolChoice::GraphDiff);
        assert_eq!(config.fanout_degree, 3);
        assert_eq!(config.peers.len(), 1);
        assert!(config.store_path.is_none());
    }
}
