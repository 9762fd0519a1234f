//! Dispatch controller: one task per process, bounded by a deadline.
//!
//! [`Dispatcher::run`] parses the task, opens the log bus (falling back to local output), starts
//! the deadline monitor, runs the matching handler and maps the result to an [`ExitCode`].
//! Cleanup is identical on every path: both writers are closed, exactly one log-end event is
//! published, the bus is closed and the grace delay elapses.

mod config;
pub use config::{DispatchConfig, ENV_DEADLINE_SECS, ENV_GRACE_MS, ENV_WORKDIR};

mod exit;
pub use exit::ExitCode;

mod monitor;
use monitor::DeadlineMonitor;

use std::sync::Arc;

use shipyard_logbus::{BusConnector, EventBus, LocalBus, LogWriter};
use shipyard_model::{LogEndEvent, LogStream, ModelError, Task, TaskIds, TaskRequest};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::{ExecutionContext, HandlerError, HandlerOutcome, HandlerRouter, PluginError};

/// Fixed message for a task kind nobody handles.
pub const UNSUPPORTED_TASK: &str = "unsupported task type";

pub struct Dispatcher {
    router: Arc<HandlerRouter>,
    connector: Arc<dyn BusConnector>,
    cfg: DispatchConfig,
    shutdown: Option<CancellationToken>,
}

/// A failed dispatch: exit code plus the message reported on stderr.
struct Failure {
    code: ExitCode,
    message: String,
}

impl Failure {
    fn new(code: ExitCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ModelError> for Failure {
    fn from(e: ModelError) -> Self {
        let code = match e {
            ModelError::Parse(_) => ExitCode::ParseError,
            ModelError::Validation(_) => ExitCode::ValidationError,
        };
        Failure::new(code, e.to_string())
    }
}

impl From<HandlerError> for Failure {
    fn from(e: HandlerError) -> Self {
        let code = match e {
            HandlerError::Validation(_)
            | HandlerError::Plugin(
                PluginError::UnknownBuilder(_)
                | PluginError::UnknownRegistry(_)
                | PluginError::Config { .. },
            ) => ExitCode::ValidationError,
            _ => ExitCode::RuntimeError,
        };
        Failure::new(code, e.to_string())
    }
}

impl Dispatcher {
    pub fn new(router: HandlerRouter, connector: Arc<dyn BusConnector>) -> Self {
        Self {
            router: Arc::new(router),
            connector,
            cfg: DispatchConfig::default(),
            shutdown: None,
        }
    }

    pub fn with_config(mut self, cfg: DispatchConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Cancel the running task when `token` fires (e.g. on SIGTERM).
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    #[inline]
    pub fn config(&self) -> &DispatchConfig {
        &self.cfg
    }

    /// Parse the task from `lookup` and dispatch it.
    pub async fn run<F>(&self, lookup: F) -> ExitCode
    where
        F: Fn(&str) -> Option<String>,
    {
        match TaskRequest::from_lookup(lookup) {
            Ok(req) => self.dispatch(req).await,
            Err(e) => {
                let failure = Failure::from(e);
                error!(
                    target: "shipyard.dispatch",
                    phase = failure.code.phase(),
                    code = failure.code.code(),
                    "{}",
                    failure.message
                );
                tokio::time::sleep(self.cfg.grace).await;
                failure.code
            }
        }
    }

    /// Dispatch an already parsed request.
    #[instrument(
        level = "info",
        name = "dispatch",
        skip_all,
        fields(kind = %req.kind, deployment = %req.ids.deployment_id, job = %req.ids.job_id)
    )]
    pub async fn dispatch(&self, req: TaskRequest) -> ExitCode {
        let ids = req.ids.clone();

        let mut ctx = ExecutionContext::new(self.cfg.deadline).with_workdir(self.cfg.workdir.clone());
        if let Some(parent) = &self.shutdown {
            ctx = ctx.with_parent(parent);
        }

        let bus = self.open_bus().await;
        let stdout = Arc::new(LogWriter::new(Arc::clone(&bus), ids.clone(), LogStream::Stdout));
        let stderr = Arc::new(LogWriter::new(Arc::clone(&bus), ids.clone(), LogStream::Stderr));
        let ctx = ctx.with_writers(Arc::clone(&stdout), Arc::clone(&stderr));

        let monitor = DeadlineMonitor::spawn(&ctx);
        let result = self.execute(&ctx, req).await;
        // A result that only arrives after the deadline still counts as a timeout.
        let timed_out = monitor.stop().await || ctx.is_expired();

        let code = match result {
            Ok(outcome) if !timed_out => {
                info!(target: "shipyard.dispatch", summary = %outcome.summary, "task succeeded");
                ExitCode::Success
            }
            Err(failure) if !timed_out => {
                self.report(&ctx, &failure).await;
                failure.code
            }
            // The deadline wins over whatever the handler returned.
            _ => {
                self.report(&ctx, &Failure::new(ExitCode::Timeout, "deadline exceeded"))
                    .await;
                ExitCode::Timeout
            }
        };

        self.finish(&bus, &ids, &stdout, &stderr, code).await;
        code
    }

    async fn open_bus(&self) -> Arc<dyn EventBus> {
        match self.connector.connect().await {
            Ok(bus) => {
                info!(target: "shipyard.dispatch", bus = bus.name(), "log bus connected");
                bus
            }
            Err(e) => {
                warn!(target: "shipyard.dispatch", error = %e, "log bus unavailable, output stays local");
                Arc::new(LocalBus::new())
            }
        }
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        req: TaskRequest,
    ) -> Result<HandlerOutcome, Failure> {
        let Some(handler) = self.router.pick(req.kind).cloned() else {
            return Err(Failure::new(
                ExitCode::ValidationError,
                format!("{UNSUPPORTED_TASK}: {}", req.kind),
            ));
        };
        let task = Task::from_request(req)?;
        info!(target: "shipyard.dispatch", handler = handler.name(), "task accepted");

        let task_ctx = ctx.clone();
        let mut join = tokio::spawn(async move { handler.handle(&task_ctx, &task).await });

        tokio::select! {
            res = &mut join => match res {
                Ok(out) => out.map_err(Failure::from),
                Err(e) if e.is_panic() => Err(Failure::new(ExitCode::RuntimeError, "handler panicked")),
                Err(e) => Err(Failure::new(ExitCode::RuntimeError, format!("handler aborted: {e}"))),
            },
            _ = ctx.cancelled() => {
                // Give the handler the grace period to stop its own subprocesses.
                if tokio::time::timeout(self.cfg.grace, &mut join).await.is_err() {
                    join.abort();
                    let _ = join.await;
                }
                Err(Failure::new(ExitCode::RuntimeError, "task cancelled"))
            }
        }
    }

    async fn report(&self, ctx: &ExecutionContext, failure: &Failure) {
        error!(
            target: "shipyard.dispatch",
            phase = failure.code.phase(),
            code = failure.code.code(),
            "{}",
            failure.message
        );
        ctx.log_stderr(&format!("error [{}]: {}", failure.code.phase(), failure.message))
            .await;
    }

    async fn finish(
        &self,
        bus: &Arc<dyn EventBus>,
        ids: &TaskIds,
        stdout: &LogWriter,
        stderr: &LogWriter,
        code: ExitCode,
    ) {
        for writer in [stdout, stderr] {
            if let Err(e) = writer.close().await {
                warn!(target: "shipyard.dispatch", stream = %writer.stream().as_str(), error = %e, "failed to flush log writer");
            }
        }
        let end = LogEndEvent::new(ids, code.end_status());
        if let Err(e) = bus.publish_end(&end).await {
            warn!(target: "shipyard.dispatch", error = %e, "failed to publish log end event");
        }
        if let Err(e) = bus.close().await {
            warn!(target: "shipyard.dispatch", error = %e, "failed to close log bus");
        }
        info!(target: "shipyard.dispatch", exit = %code, "dispatch finished");
        tokio::time::sleep(self.cfg.grace).await;
    }
}
