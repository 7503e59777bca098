//! Control plane for driving a remote, UI-only chat application through the
//! debugging protocol exposed by its host process.
//!
//! The hard problems live in three components:
//!
//! - **Session** ([`session::Session`]): keeps one control connection usable
//!   across host restarts, tab churn, and transient protocol failures, via a
//!   cached health probe, bounded exponential backoff, and a retry wrapper
//!   with cold-start recovery.
//! - **Tab registry** ([`registry::TabRegistry`]): classifies every live tab
//!   as internal or external, infers purposes for the tabs the application
//!   opens on its own, and supplies the counts behind the "never close the
//!   last usable tab" contract.
//! - **Completion detector** ([`detector::CompletionDetector`]): infers task
//!   status purely from evolving page content, extracts and sanitizes the
//!   final response, and tracks text stability as the ultimate completion
//!   fallback.
//!
//! [`pilot::Pilot`] composes the three behind one facade. The transport and
//! the host-process launcher stay behind the [`debugger::Debugger`] and
//! [`debugger::Launcher`] traits; `pilot-runtime` provides the real
//! implementations and [`testing`] the in-memory fakes.
//!
//! All state is per-instance and in-memory. Operations against one session
//! are issued sequentially; a process that needs several sessions creates
//! several [`pilot::Pilot`] values.

pub mod clock;
pub mod config;
pub mod debugger;
pub mod detector;
pub mod error;
pub mod pilot;
pub mod poll;
pub mod probe;
pub mod registry;
pub mod rules;
pub mod session;
pub mod submit;
pub mod testing;

pub use clock::{Clock, TokioClock};
pub use config::Config;
pub use debugger::{Debugger, Launcher};
pub use detector::{AgentState, AgentStatus, CompletionDetector};
pub use error::{Error, Result};
pub use pilot::Pilot;
pub use registry::{TabContext, TabPurpose, TabRegistry};
pub use session::{ConnectionState, Session};
