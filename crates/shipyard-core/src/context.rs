//! Deadline-bound execution context handed to handlers and plugins.
//!
//! Cancellation is cooperative: nothing here kills work. Code that can block must either check
//! [`ExecutionContext::ensure_active`] before starting or race its future through
//! [`ExecutionContext::guard`].

use std::{future::Future, path::PathBuf, sync::Arc, time::Duration};

use shipyard_logbus::LogWriter;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::warn;

use crate::error::ContextError;

#[derive(Clone)]
pub struct ExecutionContext {
    deadline: Instant,
    cancel: CancellationToken,
    stdout: Option<Arc<LogWriter>>,
    stderr: Option<Arc<LogWriter>>,
    workdir: PathBuf,
}

impl ExecutionContext {
    /// Context whose deadline is `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline,
            cancel: CancellationToken::new(),
            stdout: None,
            stderr: None,
            workdir: std::env::temp_dir(),
        }
    }

    /// Tie cancellation to `parent`: cancelling the parent cancels this context.
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn with_writers(mut self, stdout: Arc<LogWriter>, stderr: Arc<LogWriter>) -> Self {
        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
        self
    }

    /// Scratch directory handlers may clone and build in.
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    #[inline]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[inline]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves once the context is cancelled (the deadline monitor cancels it on expiry).
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[inline]
    pub fn workdir(&self) -> &PathBuf {
        &self.workdir
    }

    pub fn stdout(&self) -> Option<&Arc<LogWriter>> {
        self.stdout.as_ref()
    }

    pub fn stderr(&self) -> Option<&Arc<LogWriter>> {
        self.stderr.as_ref()
    }

    /// Fail fast when the deadline passed or the context was cancelled.
    pub fn ensure_active(&self) -> Result<(), ContextError> {
        if self.is_expired() {
            return Err(ContextError::DeadlineExceeded);
        }
        if self.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        Ok(())
    }

    /// Run `fut` unless the context ends first.
    ///
    /// The deadline is observed directly, so this also works without a running monitor.
    pub async fn guard<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        self.ensure_active()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.interruption()),
            _ = tokio::time::sleep_until(self.deadline) => Err(ContextError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }

    fn interruption(&self) -> ContextError {
        if self.is_expired() {
            ContextError::DeadlineExceeded
        } else {
            ContextError::Cancelled
        }
    }

    /// Tag subsequent output of both streams with `phase`.
    pub async fn set_phase(&self, phase: &str) {
        for writer in [&self.stdout, &self.stderr].into_iter().flatten() {
            writer.set_phase(phase).await;
        }
    }

    /// Append one line to the stdout stream.
    pub async fn log_stdout(&self, line: &str) {
        if let Some(w) = &self.stdout {
            w.write(terminated(line).as_bytes()).await;
        }
    }

    /// Append one line to the stderr stream.
    pub async fn log_stderr(&self, line: &str) {
        match &self.stderr {
            Some(w) => {
                w.write(terminated(line).as_bytes()).await;
            }
            None => warn!(target: "shipyard.core", "{line}"),
        }
    }
}

fn terminated(line: &str) -> String {
    if line.ends_with('\n') {
        line.to_string()
    } else {
        format!("{line}\n")
    }
}

#[cfg(test)]
mod tests {
    use shipyard_logbus::MemoryBus;
    use shipyard_model::{LogStream, TaskIds};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expires_at_deadline() {
        let ctx = ExecutionContext::new(Duration::from_secs(10));
        assert!(ctx.ensure_active().is_ok());
        assert_eq!(ctx.remaining(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.ensure_active(), Err(ContextError::DeadlineExceeded));
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn guard_stops_pending_work_at_deadline() {
        let ctx = ExecutionContext::new(Duration::from_secs(5));
        let res = ctx.guard(std::future::pending::<()>()).await;
        assert_eq!(res, Err(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn guard_reports_cancellation() {
        let ctx = ExecutionContext::new(Duration::from_secs(60));
        let c = ctx.clone();
        tokio::spawn(async move { c.cancel() });
        let res = ctx.guard(std::future::pending::<()>()).await;
        assert_eq!(res, Err(ContextError::Cancelled));
        assert_eq!(ctx.ensure_active(), Err(ContextError::Cancelled));
    }

    #[tokio::test]
    async fn guard_passes_through_output() {
        let ctx = ExecutionContext::new(Duration::from_secs(60));
        assert_eq!(ctx.guard(async { 42 }).await, Ok(42));
    }

    #[tokio::test]
    async fn parent_token_cancels_context() {
        let parent = CancellationToken::new();
        let ctx = ExecutionContext::new(Duration::from_secs(60)).with_parent(&parent);
        parent.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn phase_and_lines_reach_both_writers() {
        let bus = Arc::new(MemoryBus::new());
        let ids = TaskIds::new("d", "j", "s", "o");
        let out = Arc::new(LogWriter::new(bus.clone(), ids.clone(), LogStream::Stdout));
        let err = Arc::new(LogWriter::new(bus.clone(), ids, LogStream::Stderr));
        let ctx = ExecutionContext::new(Duration::from_secs(60)).with_writers(out, err);

        ctx.set_phase("clone").await;
        ctx.log_stdout("cloning").await;
        ctx.log_stderr("warning: shallow\n").await;

        let logs = bus.logs();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|e| e.phase == "clone"));
        assert_eq!(logs[0].message, "cloning\n");
        assert_eq!(logs[1].stream, LogStream::Stderr);
        assert_eq!(logs[1].message, "warning: shallow\n");
    }
}
