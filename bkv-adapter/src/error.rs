//! Adapter error taxonomy.
//!
//! Synchronous-mode callers see these directly; deferred-mode callers see
//! them through the result slot of the command that failed.

use bkv_proto::FrameError;
use thiserror::Error;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors surfaced by the adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network or IO failure while talking to the store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RESP2 framing violation on the reply path.
    #[error("protocol error: {0}")]
    Protocol(#[from] FrameError),
    /// The store answered with an error reply.
    #[error("server error: {0}")]
    Server(String),
    /// Reply type did not match the issued command.
    #[error("unexpected reply")]
    UnexpectedReply,
    /// Address could not be normalized into a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Deferred result read before the continuation has run.
    #[error("deferred result not yet available")]
    Pending,
    /// The connection never became ready, or was lost before the command ran.
    #[error("connection never became ready or was lost")]
    Disconnected,
}
