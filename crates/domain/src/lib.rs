//! Shared domain types for Harbor: error taxonomy, configuration, and
//! structured trace events.

pub mod config;
pub mod error;
pub mod trace;
