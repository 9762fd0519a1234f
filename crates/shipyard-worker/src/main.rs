//! Single-shot deployment worker.
//!
//! Reads one task from the environment, runs it under a deadline and exits with the dispatch
//! exit code (0 success, 1 runtime, 2 parse, 3 validation, 4 timeout).

mod bootstrap;
mod error;

use anyhow::Context;
use shipyard_core::{DispatchConfig, Dispatcher, ExitCode};
use shipyard_deploy::PlatformConfig;
use shipyard_logbus::BusConfig;
use shipyard_observe::{LoggerConfig, logger_init};
use tracing::{error, info};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match run().await {
        Ok(code) => code.into(),
        Err(e) => {
            // the logger may be the thing that failed
            eprintln!("error [startup]: {e:#}");
            error!(target: "shipyard.worker", "startup failed: {e:#}");
            ExitCode::RuntimeError.into()
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let log_cfg = LoggerConfig::from_env().map_err(error::WorkerError::from)?;
    logger_init(&log_cfg).map_err(error::WorkerError::from)?;

    let plugins = bootstrap::install_plugins()?;
    let platform = bootstrap::platform(&PlatformConfig::from_env())
        .context("platform configuration")?;
    let connector = bootstrap::connector(BusConfig::from_env()).context("bus configuration")?;
    let shutdown = bootstrap::shutdown_token()?;

    let cfg = DispatchConfig::from_env();
    info!(
        target: "shipyard.worker",
        deadline = ?cfg.deadline,
        grace = ?cfg.grace,
        workdir = %cfg.workdir.display(),
        "worker ready"
    );

    let dispatcher = Dispatcher::new(bootstrap::router(plugins, platform), connector)
        .with_config(cfg)
        .with_shutdown(shutdown);
    let code = dispatcher.run(|key| std::env::var(key).ok()).await;

    info!(target: "shipyard.worker", code = code.code(), "worker exiting");
    Ok(code)
}
