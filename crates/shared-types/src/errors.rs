//! # Error Types
//!
//! Errors shared by everything that talks to a chain node.

use crate::location::Location;
use thiserror::Error;

/// Errors surfaced by a node RPC client.
///
/// Every variant except `Unavailable` is transient from the
/// coordinator's point of view: the owning task logs it and retries
/// under its backoff policy, or drops the event and waits for the next
/// one.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The transport could not be established or was lost.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A call exceeded its deadline.
    #[error("rpc call timed out after {timeout_secs}s")]
    Timeout {
        /// The deadline that expired.
        timeout_secs: u64,
    },

    /// The node answered with a JSON-RPC error.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// A subscription could not be established or was dropped.
    #[error("subscription failed: {0}")]
    Subscription(String),

    /// A payload could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// No client is registered for the addressed chain.
    #[error("no client available for {0}")]
    Unavailable(Location),
}

impl ClientError {
    /// Whether the caller may retry the operation.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }
}
