//! Wire types for the remote debugging protocol.
//!
//! This crate contains the serde-serializable types used to talk to the host
//! process of the remote application: target snapshots from the HTTP
//! discovery endpoint, the flat request/response/event message shapes carried
//! over the per-target WebSocket session, and evaluation results with
//! exception detail.
//!
//! Types in this crate are pure data with no behavior beyond
//! (de)serialization and a few cheap accessors. Higher-level APIs are built
//! on top of them in `pilot-core` and `pilot-runtime`.

pub mod eval;
pub mod message;
pub mod target;

pub use eval::*;
pub use message::*;
pub use target::*;
