//! CLI subcommand implementations.

pub mod auth;
pub mod config;
pub mod values;
