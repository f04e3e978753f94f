//! # ar-api
//!
//! HTTP API for Alert Relay.
//!
//! Exposes receiver testing, status and configuration reload under
//! `/api/alertmanager`, plus health and Prometheus metrics.

pub mod dto;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{shutdown_signal, ApiServer, ApiServerConfig};
pub use state::AppState;
