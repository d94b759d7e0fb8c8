//! Error types for the coordination services.

use shared_types::{ClientError, Location};
use thiserror::Error;

/// Result alias for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Errors raised by the coordination services.
///
/// Per-RPC failures are recovered inside the owning task and never
/// surface here; these variants cover structural conditions that abort
/// startup or a whole operation.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No chain client was configured at all.
    #[error("no chain clients configured; at least one URL is required")]
    NoClients,

    /// A location lies outside the configured topology.
    #[error("location {0} outside the configured topology")]
    InvalidLocation(Location),

    /// A client-level failure bubbled up from an operation that cannot
    /// proceed without the addressed chain.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The sealing engine rejected a header.
    #[error(transparent)]
    Seal(#[from] seal_engine::SealError),
}
