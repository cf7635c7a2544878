//! Error types for lifxctl

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Malformed MAC or IPv4 token
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// No gateway bulb answered discovery
    #[error("Could not discover a gateway bulb")]
    GatewayUnreachable,
    /// Named device could not be found through the gateway
    #[error("Bulb not found: {0}")]
    DeviceNotFound(String),
    /// Device discovery failed while resolving a target
    #[error("Target resolution failed: {0}")]
    Resolution(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// Output serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// Command name not known to the CLI
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl From<serde_json::Error> for LifxError {
    fn from(error: serde_json::Error) -> Self {
        LifxError::Serialization(error.to_string())
    }
}

pub type LifxResult<T> = Result<T, LifxError>;
