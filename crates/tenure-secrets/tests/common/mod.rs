//! Common test infrastructure for tenure-secrets tests
//!
//! # Usage
//!
//! In your test file, add:
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `fixtures`: Secret bodies, lease responses, and backend errors
//! - `mock_backend`: Scripted in-memory `SecretBackend` that records calls
//! - `event_log`: Listener that records every published lease event
//! - `mock_vault`: Wiremock setup helpers for the Vault HTTP API

// Not every test binary uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod event_log;
pub mod fixtures;
pub mod mock_backend;
pub mod mock_vault;

pub use event_log::*;
pub use fixtures::*;
pub use mock_backend::*;
pub use mock_vault::*;
