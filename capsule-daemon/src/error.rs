use thiserror::Error;

/// Errors that can stop a daemon from starting. Once running, failures
/// from individual exchanges never reach here — they're logged and the
/// affected peer is reset.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Core(#[from] capsule_common::Error),
    #[error("failed to open store: {0}")]
    Store(String),
}
