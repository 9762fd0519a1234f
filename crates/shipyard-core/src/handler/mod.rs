use std::sync::Arc;

use async_trait::async_trait;
use shipyard_model::{Reference, Task, TaskKind};
use tracing::trace;

use crate::{ExecutionContext, HandlerError};

/// What a finished handler reports back to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutcome {
    pub summary: String,
    pub reference: Option<Reference>,
}

impl HandlerOutcome {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// Executes one task kind.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn kind(&self) -> TaskKind;

    /// Drive `task` to completion. Every blocking step must observe `ctx`.
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        task: &Task,
    ) -> Result<HandlerOutcome, HandlerError>;
}

/// Kind → handler lookup. The first registered handler for a kind wins.
#[derive(Default)]
pub struct HandlerRouter {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerRouter {
    #[inline]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    #[inline]
    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        trace!(target: "shipyard.core", handler = handler.name(), kind = %handler.kind(), "handler registered");
        self.handlers.push(handler);
    }

    pub fn pick(&self, kind: TaskKind) -> Option<&Arc<dyn Handler>> {
        self.handlers.iter().find(|h| h.kind() == kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = TaskKind> + '_ {
        self.handlers.iter().map(|h| h.kind())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, TaskKind);

    #[async_trait]
    impl Handler for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn kind(&self) -> TaskKind {
            self.1
        }

        async fn handle(
            &self,
            _ctx: &ExecutionContext,
            _task: &Task,
        ) -> Result<HandlerOutcome, HandlerError> {
            Ok(HandlerOutcome::new(self.0))
        }
    }

    #[test]
    fn picks_first_handler_for_kind() {
        let mut r = HandlerRouter::new();
        assert!(r.is_empty());
        r.register(Arc::new(Named("image-a", TaskKind::DeployImage)));
        r.register(Arc::new(Named("image-b", TaskKind::DeployImage)));
        r.register(Arc::new(Named("destroy", TaskKind::DestroyJob)));

        assert_eq!(r.pick(TaskKind::DeployImage).unwrap().name(), "image-a");
        assert_eq!(r.pick(TaskKind::DestroyJob).unwrap().name(), "destroy");
        assert!(r.pick(TaskKind::DeployRepository).is_none());
        assert_eq!(r.kinds().count(), 3);
    }
}
