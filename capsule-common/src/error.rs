use thiserror::Error;

/// Error kinds shared across the replication core.
///
/// Propagation policy lives with each variant's call site, not here: a
/// `StorageIo` from a store read resets the peer that triggered it to its
/// idle state; a `Decode` or `InconsistentState` does the same without a
/// reply; `UnknownMsgType` is a protocol violation from a peer running a
/// different version and is fatal for that inbound message only.
#[derive(Debug, Error)]
pub enum Error {
    /// A database call failed.
    #[error("storage I/O error: {0}")]
    StorageIo(String),

    /// An inbound message or message section was malformed.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// A message's type didn't match the peer's current exchange state.
    #[error("inconsistent state: received unexpected message for current state")]
    InconsistentState,

    /// A message carried a type outside the known range for its protocol.
    #[error("unknown message type {0}")]
    UnknownMsgType(u8),

    /// Sending a reply to a peer failed.
    #[error("failed to send to peer: {0}")]
    TransportSend(String),
}
