#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_async)]

//! swctl library — exposes core modules for use by the server binary and tests.
//!
//! This library re-exports the key building blocks:
//! - `registry` — concurrency-safe device store, id allocation, CRUD
//! - `sync` — reconciliation scheduler and per-device session brokering
//! - `client` — typed HTTP client for the switch management API
//! - `schema` — upload tokens, schema retrieval, archive extraction
//! - `auth` — API key authentication middleware
//! - `config` — configuration loading
//! - `routes` — REST API route handlers

pub mod auth;
pub mod client;
pub mod config;
pub mod registry;
pub mod routes;
pub mod schema;
pub mod state;
pub mod sync;

#[cfg(test)]
pub mod testutil;

// Re-export key types at crate root for convenience.
pub use auth::ApiKey;
pub use client::SwitchClient;
pub use config::Config;
pub use registry::DeviceRegistry;
pub use schema::SchemaManager;
pub use state::AppState;
pub use sync::session::SessionManager;
pub use sync::Reconciler;
