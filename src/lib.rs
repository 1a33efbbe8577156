//! Library crate for courtside-back, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Club store abstraction, entities and backends.
pub mod dao;
mod dto;
mod error;
/// HTTP route trees.
pub mod routes;
/// Panel, scoring, attribution and supporting services.
pub mod services;
/// Shared application state and live panel sessions.
pub mod state;
