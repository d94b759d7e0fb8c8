//! Pure coordination logic: header merging, fan-out routing, backoff.

pub mod backoff;
pub mod fanout;
pub mod merge;

pub use backoff::RetryPolicy;
pub use fanout::{external_routes, head_broadcast_tiers, implied_child_tiers, sealed_targets};
pub use merge::CombinedState;
