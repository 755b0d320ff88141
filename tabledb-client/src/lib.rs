//! # tabledb-client
//!
//! Client driver for the tabledb table service.
//!
//! This crate provides:
//! - A transport-agnostic client that encodes requests with `tabledb-protocol`
//! - Serial version downgrade and retry when the service rejects a version
//! - Waiting for DDL operations to complete
//! - YAML and environment based configuration

pub mod client;
pub mod config;
pub mod error;
pub mod transport;

pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use transport::Transport;
