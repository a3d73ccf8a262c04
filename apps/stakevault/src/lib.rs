//! # stakevault
//!
//! Library half of the stakevault binary: the HTTP API, the CLI commands and
//! the TOML configuration, exposed for the integration tests.

pub mod api;
pub mod cli;
pub mod config;
