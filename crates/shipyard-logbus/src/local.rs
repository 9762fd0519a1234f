use async_trait::async_trait;
use shipyard_model::{LogEndEvent, LogEvent, LogStream};
use tracing::{info, warn};

use crate::{BusError, EventBus};

/// Local-only fallback that renders events through `tracing`.
///
/// Used when the real bus cannot be reached so output still lands in the worker's own log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBus;

impl LocalBus {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventBus for LocalBus {
    async fn publish_log(&self, event: &LogEvent) -> Result<(), BusError> {
        let line = event.message.trim_end_matches(['\r', '\n']);
        match event.stream {
            LogStream::Stdout => info!(
                target: "shipyard.output",
                phase = %event.phase,
                seq = event.sequence,
                "{line}"
            ),
            LogStream::Stderr => warn!(
                target: "shipyard.output",
                phase = %event.phase,
                seq = event.sequence,
                "{line}"
            ),
        }
        Ok(())
    }

    async fn publish_end(&self, event: &LogEndEvent) -> Result<(), BusError> {
        info!(
            target: "shipyard.output",
            deployment = %event.deployment_id,
            status = %event.status,
            "log stream complete"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
