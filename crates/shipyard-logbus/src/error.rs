use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("bus is not configured")]
    NotConfigured,
    #[error("invalid bus configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to connect to bus: {0}")]
    Connect(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("publish was not acknowledged: {0}")]
    Ack(String),
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("bus connection is closed")]
    Closed,
}
