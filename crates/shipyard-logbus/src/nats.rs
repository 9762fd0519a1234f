use std::sync::atomic::{AtomicBool, Ordering};

use async_nats::{ConnectOptions, Event, ServerAddr, jetstream};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use shipyard_model::{LogEndEvent, LogEvent};
use tracing::{debug, info, instrument, warn};

use crate::{BusConfig, BusError, EventBus, Subjects};

/// Durable log bus backed by NATS JetStream.
///
/// A publish only succeeds once JetStream acknowledged the message.
pub struct NatsBus {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    subjects: Subjects,
    cfg: BusConfig,
    closed: AtomicBool,
}

impl NatsBus {
    #[instrument(level = "debug", skip(cfg), fields(servers = ?cfg.servers, prefix = %cfg.prefix))]
    pub async fn connect(cfg: &BusConfig) -> Result<Self, BusError> {
        cfg.validate()?;

        let servers = cfg
            .servers
            .iter()
            .map(|s| {
                s.parse::<ServerAddr>()
                    .map_err(|e| BusError::InvalidConfig(format!("server {s:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let delay = cfg.reconnect_delay;
        let options = match &cfg.nkey_seed {
            Some(seed) => ConnectOptions::with_nkey(seed.clone()),
            None => ConnectOptions::new(),
        }
        .name("shipyard-worker")
        .connection_timeout(cfg.connect_timeout)
        .max_reconnects(Some(cfg.max_reconnects))
        .reconnect_delay_callback(move |_attempts| delay)
        .event_callback(|event| async move {
            match event {
                Event::Disconnected => warn!(target: "shipyard.logbus", "bus connection lost"),
                Event::Connected => info!(target: "shipyard.logbus", "bus connection (re)established"),
                Event::Draining => debug!(target: "shipyard.logbus", "bus connection draining"),
                Event::Closed => debug!(target: "shipyard.logbus", "bus connection closed"),
                other => debug!(target: "shipyard.logbus", event = %other, "bus event"),
            }
        });

        let client = options
            .connect(servers.as_slice())
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        let jetstream = jetstream::new(client.clone());
        let subjects = Subjects::new(cfg.prefix.clone());

        if let Some(stream) = &cfg.stream {
            jetstream
                .get_or_create_stream(jetstream::stream::Config {
                    name: stream.clone(),
                    subjects: vec![subjects.wildcard()],
                    ..Default::default()
                })
                .await
                .map_err(|e| BusError::Connect(format!("stream {stream}: {e}")))?;
        }

        info!(target: "shipyard.logbus", "connected to log bus");
        Ok(Self {
            client,
            jetstream,
            subjects,
            cfg: cfg.clone(),
            closed: AtomicBool::new(false),
        })
    }

    async fn publish_json<T: Serialize>(&self, subject: String, value: &T) -> Result<(), BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        let payload = Bytes::from(serde_json::to_vec(value)?);

        let publish = async {
            let ack = self
                .jetstream
                .publish(subject, payload)
                .await
                .map_err(|e| BusError::Publish(e.to_string()))?;
            ack.await.map_err(|e| BusError::Ack(e.to_string()))?;
            Ok::<(), BusError>(())
        };
        tokio::time::timeout(self.cfg.publish_timeout, publish)
            .await
            .map_err(|_| BusError::Timeout(self.cfg.publish_timeout))??;

        if self.cfg.flush_after_publish {
            self.flush_best_effort().await;
        }
        Ok(())
    }

    /// The message is already acknowledged at this point, so a failed flush is only a warning.
    async fn flush_best_effort(&self) {
        if let Err(e) = self.client.flush().await {
            warn!(target: "shipyard.logbus", error = %e, "bus flush failed");
        }
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish_log(&self, event: &LogEvent) -> Result<(), BusError> {
        self.publish_json(self.subjects.log(&event.deployment_id), event)
            .await
    }

    async fn publish_end(&self, event: &LogEndEvent) -> Result<(), BusError> {
        self.publish_json(self.subjects.log_end(&event.deployment_id), event)
            .await
    }

    async fn close(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.client
            .flush()
            .await
            .map_err(|e| BusError::Publish(format!("final flush: {e}")))?;
        // Drain completes once the connection is shut down, not when the last handle drops.
        self.client
            .drain()
            .await
            .map_err(|e| BusError::Publish(format!("drain: {e}")))?;
        debug!(target: "shipyard.logbus", "bus flushed and closed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "nats"
    }
}
