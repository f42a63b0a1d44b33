//! wrapnode: expose agent handlers as a web service.
//!
//! The framework lives in the `wrapnode-*` crates; this crate carries the
//! multi-agent demo that the `wrapnode` binary serves.

pub mod agents;

pub use agents::multi_agent_config;
pub use wrapnode_server as server;
