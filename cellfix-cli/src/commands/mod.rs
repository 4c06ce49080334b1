//! CLI command implementations.
//!
//! - [`config`] - Configuration management (get, set, list, path)
//! - [`lookup`] - One-shot online lookup
//! - [`run`] - Run the position provider

pub mod config;
pub mod lookup;
pub mod run;
