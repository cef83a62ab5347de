//! # Storage Backend: Remote Write
//!
//! Pushes rendered time series to a storage backend using the Prometheus
//! remote write protocol.
//!

pub mod client;
pub mod config;
pub mod error;

pub use client::{encode, ClientMetrics, RemoteWriteClient};
pub use config::ClientConfig;
pub use error::{debug_error, debug_error_enabled, WriteError};
