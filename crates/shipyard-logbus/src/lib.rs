//! Build-log streaming: byte output in, sequenced and phase-tagged events out.
//!
//! ## Overview
//!
//! - [`LogWriter`] turns an arbitrary byte stream into one [`shipyard_model::LogEvent`] per line.
//! - [`EventBus`] is the publishing seam; [`NatsBus`] is the durable production implementation,
//!   [`MemoryBus`] records events in memory and [`LocalBus`] renders them through `tracing`.
//! - [`Subjects`] namespaces everything under a per-tenant prefix.

mod config;
pub use config::{BusConfig, ENV_BUS_NKEY_SEED, ENV_BUS_PREFIX, ENV_BUS_SERVERS, ENV_BUS_STREAM};

mod error;
pub use error::BusError;

mod subject;
pub use subject::{BUILD_LOG, BUILD_LOG_END, Subjects};

mod bus;
pub use bus::EventBus;

mod nats;
pub use nats::NatsBus;

mod memory;
pub use memory::MemoryBus;

mod writer;
pub use writer::LogWriter;

mod local;
pub use local::LocalBus;

mod connect;
pub use connect::{BusConnector, NoBus, StaticConnector};
