use std::sync::Arc;

use async_trait::async_trait;

use crate::{BusConfig, BusError, EventBus, NatsBus};

/// Establishes the bus a dispatch publishes to.
///
/// The dispatcher treats a failed connect as "run local-only", never as a task failure.
#[async_trait]
pub trait BusConnector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Arc<dyn EventBus>, BusError>;
}

#[async_trait]
impl BusConnector for BusConfig {
    async fn connect(&self) -> Result<Arc<dyn EventBus>, BusError> {
        let bus = NatsBus::connect(self).await?;
        Ok(Arc::new(bus))
    }
}

/// Connector handing out an already-built bus, e.g. a [`crate::MemoryBus`].
pub struct StaticConnector(pub Arc<dyn EventBus>);

#[async_trait]
impl BusConnector for StaticConnector {
    async fn connect(&self) -> Result<Arc<dyn EventBus>, BusError> {
        Ok(Arc::clone(&self.0))
    }
}

/// Connector that never connects; dispatches run local-only.
pub struct NoBus;

#[async_trait]
impl BusConnector for NoBus {
    async fn connect(&self) -> Result<Arc<dyn EventBus>, BusError> {
        Err(BusError::NotConfigured)
    }
}
