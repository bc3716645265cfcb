//! The middleware registry: an ordered, process-global list of stage
//! handlers, sorted by the stage each one relates to.
//!
//! Ordering is driven by `related_stage` rather than registration sequence,
//! since [`crate::controller::SessionController`] must walk middleware in
//! pipeline order regardless of how they were added.

use std::sync::Arc;

use async_trait::async_trait;
use morango_core::TransferStage;
use parking_lot::RwLock;

use crate::context::SessionContext;

/// One named stage handler: `(related_stage) -> StageTag` plus
/// `(context) -> Status`.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn related_stage(&self) -> TransferStage;
    fn name(&self) -> &'static str;

    /// Runs this middleware against `ctx`. Any error is treated by the
    /// controller as the session's `ERRORED` outcome -- it is never
    /// propagated back to the controller's caller.
    async fn invoke(&self, ctx: &dyn SessionContext) -> anyhow::Result<morango_core::TransferStatus>;
}

/// Ordered list of registered middleware, sorted by [`Middleware::related_stage`].
///
/// Registration is expected to complete before the first [`crate::controller::SessionController::proceed_to`]
/// call; the registry does not itself enforce that.
#[derive(Default)]
pub struct MiddlewareRegistry {
    entries: RwLock<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, middleware: Arc<dyn Middleware>) {
        let mut entries = self.entries.write();
        entries.push(middleware);
        entries.sort_by_key(Middleware::related_stage);
    }

    #[must_use]
    pub fn entries(&self) -> Vec<Arc<dyn Middleware>> {
        self.entries.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use morango_core::TransferStatus;

    use super::*;

    pub(super) struct StubMiddleware {
        pub(super) stage: TransferStage,
        pub(super) name: &'static str,
    }

    #[async_trait]
    impl Middleware for StubMiddleware {
        fn related_stage(&self) -> TransferStage {
            self.stage
        }

        fn name(&self) -> &'static str {
            self.name
        }

        async fn invoke(&self, _ctx: &dyn SessionContext) -> anyhow::Result<TransferStatus> {
            Ok(TransferStatus::Completed)
        }
    }

    #[test]
    fn register_keeps_entries_sorted_by_stage_regardless_of_registration_order() {
        let registry = MiddlewareRegistry::new();
        registry.register(Arc::new(StubMiddleware { stage: TransferStage::Cleanup, name: "cleanup" }));
        registry.register(Arc::new(StubMiddleware { stage: TransferStage::Initializing, name: "init" }));
        registry.register(Arc::new(StubMiddleware { stage: TransferStage::Queuing, name: "queue" }));

        let names: Vec<&'static str> = registry.entries().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["init", "queue", "cleanup"]);
    }
}
