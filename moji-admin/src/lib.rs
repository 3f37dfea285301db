//! # Moji Admin Library
//!
//! Operator tooling for the Moji data store: migrations, owners, licenses,
//! seeding and invite links.
//!
//! ## Modules
//!
//! - `cli`: command-line definition
//! - `commands`: command execution against the record store
//! - `error`: error type and process exit codes

pub mod cli;
pub mod commands;
pub mod error;
