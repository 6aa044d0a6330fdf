//! Relay Core - transport-agnostic blueprint execution engine.
//!
//! This crate contains the blueprint model, the universal platform
//! integrator (discovery, auth, HTTP caller), the step interpreter and the
//! SQLite-backed stores it collaborates with. It has **no HTTP framework
//! dependency** by default, making it suitable for use in:
//!
//! - HTTP servers (via `relay-server`)
//! - CLI tools (via `relay-cli`)
//!
//! # Feature Flags
//!
//! - `axum` - Enables `IntoResponse` impl on `ServerError` for use in axum handlers.

pub mod blueprint;
pub mod config;
pub mod db;
pub mod error;
pub mod integration;
pub mod models;
pub mod state;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use config::EngineConfig;
pub use db::Database;
pub use error::{ExecutionError, ServerError};
pub use state::{AppState, AppStateInner};
