//! Command surface for the control plane.
//!
//! Thin request/response glue: every subcommand builds the facade, calls
//! one method, and prints the result as JSON. Anything that looks like
//! logic belongs in `pilot-core`, not here.

pub mod cli;
pub mod commands;
pub mod logging;
