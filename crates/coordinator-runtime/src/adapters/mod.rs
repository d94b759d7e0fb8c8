//! Port implementations connecting the coordinator to real nodes.

pub mod ws;

pub use ws::WsNodeClient;
