//! # Moji Shared Library
//!
//! The ownership-scoped record store behind Moji: workspaces owned by one
//! owner, each holding tasks, notes and pages, with soft delete, protected
//! fields, capacity caps and retry-on-commit persistence.
//!
//! ## Module Organization
//!
//! - `schema`: entity descriptors (fields, parent links, unique keys)
//! - `record`: the generic record and exact-match filters
//! - `backend`: persistence backends (in-memory and PostgreSQL)
//! - `store`: create/read/update/soft-delete/hard-delete for any entity
//! - `scope`: the ownership guard every workspace-scoped call goes through
//! - `quota`: capacity limits and checks
//! - `accounts`: owners, licenses and invite links
//! - `seed`: starter workspaces and content
//! - `models`: typed views and validated write inputs
//! - `config`: layered settings
//! - `db`: connection pool and migrations
//! - `error`: the typed outcome taxonomy

pub mod accounts;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod quota;
pub mod record;
pub mod schema;
pub mod scope;
pub mod seed;
pub mod store;

pub use error::{StoreError, StoreResult};

/// Current version of the Moji shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
