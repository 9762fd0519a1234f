use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use shipyard_model::{LogEndEvent, LogEvent};

use crate::{BusError, EventBus};

/// In-process bus that records every accepted event.
///
/// Used for local runs and as a test double; publishes can be made to fail on demand.
#[derive(Default)]
pub struct MemoryBus {
    logs: Mutex<Vec<LogEvent>>,
    ends: Mutex<Vec<LogEndEvent>>,
    failing: AtomicBool,
    closed: AtomicBool,
    attempts: AtomicUsize,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following publish fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Accepted line events in publish order.
    pub fn logs(&self) -> Vec<LogEvent> {
        lock(&self.logs).clone()
    }

    pub fn ends(&self) -> Vec<LogEndEvent> {
        lock(&self.ends).clone()
    }

    /// Publish calls made, accepted or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn admit(&self) -> Result<(), BusError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BusError::Publish("memory bus set to fail".into()));
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish_log(&self, event: &LogEvent) -> Result<(), BusError> {
        self.admit()?;
        lock(&self.logs).push(event.clone());
        Ok(())
    }

    async fn publish_end(&self, event: &LogEndEvent) -> Result<(), BusError> {
        self.admit()?;
        lock(&self.ends).push(event.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
