use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::task::JoinHandle;
use tracing::warn;

use crate::ExecutionContext;

/// Watches a context's deadline; on expiry it records the timeout and cancels the context.
pub(crate) struct DeadlineMonitor {
    handle: JoinHandle<()>,
    timed_out: Arc<AtomicBool>,
}

impl DeadlineMonitor {
    pub(crate) fn spawn(ctx: &ExecutionContext) -> Self {
        let timed_out = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&timed_out);
        let token = ctx.token().clone();
        let deadline = ctx.deadline();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    flag.store(true, Ordering::SeqCst);
                    warn!(target: "shipyard.dispatch", "deadline exceeded, cancelling task");
                    token.cancel();
                }
                _ = token.cancelled() => {
                    if tokio::time::Instant::now() >= deadline {
                        flag.store(true, Ordering::SeqCst);
                    }
                }
            }
        });

        Self { handle, timed_out }
    }

    /// Stop watching and report whether the deadline fired.
    pub(crate) async fn stop(self) -> bool {
        self.handle.abort();
        let _ = self.handle.await;
        self.timed_out.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_on_deadline() {
        let ctx = ExecutionContext::new(Duration::from_millis(100));
        let monitor = DeadlineMonitor::spawn(&ctx);
        ctx.cancelled().await;
        assert!(ctx.is_expired());
        assert!(monitor.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn external_cancel_is_not_a_timeout() {
        let ctx = ExecutionContext::new(Duration::from_secs(60));
        let monitor = DeadlineMonitor::spawn(&ctx);
        ctx.cancel();
        tokio::task::yield_now().await;
        assert!(!monitor.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_early_leaves_context_alone() {
        let ctx = ExecutionContext::new(Duration::from_secs(60));
        let monitor = DeadlineMonitor::spawn(&ctx);
        assert!(!monitor.stop().await);
        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(!ctx.is_cancelled());
    }
}
