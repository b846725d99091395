//! devgrid-core — shared domain types for devgrid.
//!
//! Devices, device identifiers, container handles, and the slot
//! summary/patch shapes exchanged between the agent, the scheduler and
//! the request-facing API. Also hosts the `devgrid.toml` parser.

pub mod config;
pub mod types;

pub use config::DevgridConfig;
pub use types::*;
