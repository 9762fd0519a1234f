//! Wiring of the process-wide pieces a dispatch needs.

use std::sync::Arc;

use shipyard_core::{HandlerRouter, Platform, PluginTable, plugin};
use shipyard_deploy::{HttpPlatform, LocalPlatform, PlatformConfig, register_handlers};
use shipyard_logbus::{BusConfig, BusConnector, NoBus};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::WorkerError;

/// Register the built-in plugins and freeze the table for the rest of the process.
pub fn install_plugins() -> Result<Arc<PluginTable>, WorkerError> {
    let mut table = PluginTable::new();
    shipyard_plugins::register_builtin(&mut table)?;
    let table = plugin::install(table)?;
    info!(
        target: "shipyard.worker",
        builders = ?table.builder_names().collect::<Vec<_>>(),
        registries = ?table.registry_names().collect::<Vec<_>>(),
        "plugins installed"
    );
    Ok(table)
}

pub fn platform(cfg: &PlatformConfig) -> Result<Arc<dyn Platform>, WorkerError> {
    if !cfg.is_configured() {
        warn!(target: "shipyard.worker", "no platform url configured, rollouts are only logged");
        return Ok(Arc::new(LocalPlatform));
    }
    cfg.validate()?;
    Ok(Arc::new(HttpPlatform::new(cfg)?))
}

pub fn router(plugins: Arc<PluginTable>, platform: Arc<dyn Platform>) -> HandlerRouter {
    let mut router = HandlerRouter::new();
    register_handlers(&mut router, plugins, platform);
    router
}

/// Bus connector for `cfg`; an unconfigured bus means local-only output.
pub fn connector(cfg: BusConfig) -> Result<Arc<dyn BusConnector>, WorkerError> {
    if !cfg.is_configured() {
        warn!(target: "shipyard.worker", "no bus servers configured, build logs stay local");
        return Ok(Arc::new(NoBus));
    }
    cfg.validate()?;
    Ok(Arc::new(cfg))
}

/// Token cancelled on SIGTERM or Ctrl-C.
pub fn shutdown_token() -> Result<CancellationToken, WorkerError> {
    let token = CancellationToken::new();

    #[cfg(unix)]
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    let trigger = token.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        tokio::select! {
            _ = term.recv() => info!(target: "shipyard.worker", "SIGTERM received"),
            _ = tokio::signal::ctrl_c() => info!(target: "shipyard.worker", "interrupt received"),
        }
        #[cfg(not(unix))]
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: "shipyard.worker", "interrupt received");
        }
        trigger.cancel();
    });
    Ok(token)
}

#[cfg(test)]
mod tests {
    use shipyard_model::TaskKind;

    use super::*;

    #[test]
    fn unconfigured_platform_is_local() {
        let cfg = PlatformConfig::from_lookup(|_| None);
        assert!(platform(&cfg).is_ok());
    }

    #[test]
    fn invalid_platform_url_is_rejected() {
        let cfg = PlatformConfig::from_lookup(|k| {
            (k == shipyard_deploy::ENV_PLATFORM_URL).then(|| "not a url".to_string())
        });
        assert!(matches!(platform(&cfg), Err(WorkerError::Platform(_))));
    }

    #[test]
    fn router_covers_every_kind() {
        let router = router(Arc::new(PluginTable::new()), Arc::new(LocalPlatform));
        for kind in [
            TaskKind::DeployRepository,
            TaskKind::RedeployRepository,
            TaskKind::DeployImage,
            TaskKind::DestroyJob,
        ] {
            assert!(router.pick(kind).is_some());
        }
    }

    #[test]
    fn bad_bus_prefix_is_rejected() {
        let cfg = BusConfig::from_lookup(|k| match k {
            shipyard_logbus::ENV_BUS_SERVERS => Some("nats://127.0.0.1:4222".into()),
            shipyard_logbus::ENV_BUS_PREFIX => Some("builds.*".into()),
            _ => None,
        });
        assert!(matches!(connector(cfg), Err(WorkerError::Bus(_))));
    }

    #[test]
    fn missing_bus_is_local_only() {
        assert!(connector(BusConfig::from_lookup(|_| None)).is_ok());
    }
}
