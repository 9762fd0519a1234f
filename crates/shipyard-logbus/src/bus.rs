use async_trait::async_trait;
use shipyard_model::{LogEndEvent, LogEvent};

use crate::BusError;

/// Destination for build-log events.
///
/// Implementations must be safe to share between the stdout and stderr writers of one task.
#[async_trait]
pub trait EventBus: Send + Sync + 'static {
    /// Publish one line event; returns once the bus accepted it.
    async fn publish_log(&self, event: &LogEvent) -> Result<(), BusError>;

    /// Publish the end-of-stream marker.
    async fn publish_end(&self, event: &LogEndEvent) -> Result<(), BusError>;

    /// Flush outstanding data and stop accepting publishes.
    async fn close(&self) -> Result<(), BusError>;

    fn name(&self) -> &'static str;
}
