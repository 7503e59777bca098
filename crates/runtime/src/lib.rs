//! Transport runtime for the control plane.
//!
//! Implements the `pilot` trait seams against a real host process:
//!
//! - **Discovery**: HTTP target listing, creation, close, and reachability
//! - **Session**: one WebSocket per attached target, with request/response
//!   correlation over sequential ids
//! - **Client**: [`CdpClient`], the concrete `Debugger`
//! - **Launcher**: [`HostLauncher`], spawning the host with its remote
//!   debugging flag
//!
//! Nothing in this crate knows about tab classification, completion
//! detection, or retries — those live in `pilot-core`, behind the traits
//! this crate implements.

pub mod client;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod launcher;

pub use client::CdpClient;
pub use connection::CdpSession;
pub use discovery::Discovery;
pub use error::{Error, Result};
pub use launcher::HostLauncher;
