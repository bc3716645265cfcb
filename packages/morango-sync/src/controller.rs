//! Session controller: walks a [`SessionContext`] through the
//! registered middleware up to a target stage, one stage transition at a
//! time, and records where it stopped.
//!
//! Progress is idempotent and forward-only: no retry of a stage whose
//! status is already `STARTED` or `ERRORED`, and exceptions are absorbed
//! into the context rather than propagated to the caller.

use std::time::Duration;

use morango_core::{Filter, InstanceRegistry, OperationEnvelope, StoreRecord, SyncRepository, TransferStage, TransferStatus};
use tracing::{error, instrument};

use crate::context::SessionContext;
use crate::middleware::MiddlewareRegistry;

/// Drives a [`SessionContext`] forward through a [`MiddlewareRegistry`].
pub struct SessionController {
    registry: MiddlewareRegistry,
}

impl SessionController {
    #[must_use]
    pub fn new(registry: MiddlewareRegistry) -> Self {
        Self { registry }
    }

    /// Runs middleware in stage order up to and including `target_stage`,
    /// stopping early on any non-`COMPLETED` result.
    ///
    /// Never panics and never propagates a middleware's error: a failure is
    /// captured on `ctx` via [`SessionContext::set_error`] and reported back
    /// as [`TransferStatus::Errored`].
    #[instrument(skip(self, ctx), fields(target_stage = ?target_stage))]
    pub async fn proceed_to(&self, ctx: &dyn SessionContext, target_stage: TransferStage) -> TransferStatus {
        if ctx.stage() > target_stage {
            return TransferStatus::Completed;
        }
        if matches!(ctx.stage_status(), TransferStatus::Started | TransferStatus::Errored) {
            return ctx.stage_status();
        }

        let mut last_status = TransferStatus::Completed;
        for middleware in self.registry.entries() {
            if middleware.related_stage() > target_stage {
                continue;
            }

            ctx.set_stage(middleware.related_stage());
            ctx.set_stage_status(TransferStatus::Pending);

            let status = match middleware.invoke(ctx).await {
                Ok(status) => status,
                Err(err) => {
                    error!(stage = middleware.name(), error = %err, "middleware failed");
                    ctx.set_error(Some(err.to_string()));
                    TransferStatus::Errored
                }
            };

            ctx.set_stage_status(status);
            last_status = status;
            if status != TransferStatus::Completed {
                return status;
            }
        }

        last_status
    }

    /// Calls [`Self::proceed_to`] repeatedly, sleeping `interval` between
    /// attempts, until the result lands in `{COMPLETED, ERRORED}`.
    pub async fn proceed_to_and_wait(&self, ctx: &dyn SessionContext, target_stage: TransferStage, interval: Duration) -> TransferStatus {
        loop {
            let status = self.proceed_to(ctx, target_stage).await;
            if status.is_finished() {
                return status;
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Runs the `SERIALIZING` stage's work outside of a transfer pipeline: the
/// app layer handed us one record it modified locally, and this stamps it
/// with a fresh instance/counter pair and persists it (`upsert_from_app`).
///
/// A convenience entry point apps call directly when they want to seal a
/// local write without driving a full transfer.
///
/// # Errors
///
/// This never fails itself; the `Result` exists so the envelope's error path
/// is exercised uniformly with every other operation it wraps.
pub async fn serialize_into_store(
    repository: &dyn SyncRepository,
    instance_registry: &InstanceRegistry,
    record: StoreRecord,
) -> anyhow::Result<StoreRecord> {
    OperationEnvelope::new("serializing into store", "serialized into store")
        .run(|| async { Ok::<_, anyhow::Error>(morango_core::upsert_from_app(repository, instance_registry, record)) })
        .await
}

/// Runs the `DESERIALIZING` stage's work outside of a transfer pipeline:
/// returns every Store row matching `profile`/`filter` that has no pending
/// local app-side edit (`dirty_bit` unset) for the app layer to apply to its
/// own models.
///
/// Writing the rows into app models is left to the caller -- this hands back
/// exactly the rows the app is responsible for applying.
///
/// # Errors
///
/// This never fails itself; see [`serialize_into_store`].
pub async fn deserialize_from_store(repository: &dyn SyncRepository, profile: &str, filter: &Filter) -> anyhow::Result<Vec<StoreRecord>> {
    OperationEnvelope::new("deserializing from store", "deserialized from store")
        .run(|| async {
            Ok::<_, anyhow::Error>(
                repository
                    .store_records_matching(profile, filter)
                    .into_iter()
                    .filter(|record| !record.dirty_bit)
                    .collect(),
            )
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::context::LocalSessionContext;
    use crate::middleware::Middleware;

    struct RecordingMiddleware {
        stage: TransferStage,
        calls: Arc<AtomicUsize>,
        result: TransferStatus,
    }

    #[async_trait]
    impl Middleware for RecordingMiddleware {
        fn related_stage(&self) -> TransferStage {
            self.stage
        }

        fn name(&self) -> &'static str {
            "recording"
        }

        async fn invoke(&self, _ctx: &dyn SessionContext) -> anyhow::Result<TransferStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result)
        }
    }

    struct FailingMiddleware {
        stage: TransferStage,
    }

    #[async_trait]
    impl Middleware for FailingMiddleware {
        fn related_stage(&self) -> TransferStage {
            self.stage
        }

        fn name(&self) -> &'static str {
            "failing"
        }

        async fn invoke(&self, _ctx: &dyn SessionContext) -> anyhow::Result<TransferStatus> {
            anyhow::bail!("boom")
        }
    }

    #[tokio::test]
    async fn proceed_to_runs_every_middleware_up_to_and_including_target() {
        let registry = MiddlewareRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register(Arc::new(RecordingMiddleware { stage: TransferStage::Serializing, calls: calls.clone(), result: TransferStatus::Completed }));
        registry.register(Arc::new(RecordingMiddleware { stage: TransferStage::Queuing, calls: calls.clone(), result: TransferStatus::Completed }));
        registry.register(Arc::new(RecordingMiddleware { stage: TransferStage::Transferring, calls: calls.clone(), result: TransferStatus::Completed }));

        let controller = SessionController::new(registry);
        let ctx = LocalSessionContext::new();
        let status = controller.proceed_to(&ctx, TransferStage::Queuing).await;

        assert_eq!(status, TransferStatus::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.stage(), TransferStage::Queuing);
    }

    #[tokio::test]
    async fn proceed_to_is_idempotent_once_past_the_target_stage() {
        let registry = MiddlewareRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register(Arc::new(RecordingMiddleware { stage: TransferStage::Cleanup, calls: calls.clone(), result: TransferStatus::Completed }));
        let controller = SessionController::new(registry);
        let ctx = LocalSessionContext::new();
        ctx.set_stage(TransferStage::Cleanup);

        let status = controller.proceed_to(&ctx, TransferStage::Queuing).await;
        assert_eq!(status, TransferStatus::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn proceed_to_stops_on_non_completed_result() {
        let registry = MiddlewareRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register(Arc::new(RecordingMiddleware { stage: TransferStage::Serializing, calls: calls.clone(), result: TransferStatus::Started }));
        registry.register(Arc::new(RecordingMiddleware { stage: TransferStage::Queuing, calls: calls.clone(), result: TransferStatus::Completed }));
        let controller = SessionController::new(registry);
        let ctx = LocalSessionContext::new();

        let status = controller.proceed_to(&ctx, TransferStage::Queuing).await;
        assert_eq!(status, TransferStatus::Started);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.stage_status(), TransferStatus::Started);
    }

    #[tokio::test]
    async fn proceed_to_does_not_reenter_a_started_stage() {
        let registry = MiddlewareRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register(Arc::new(RecordingMiddleware { stage: TransferStage::Serializing, calls: calls.clone(), result: TransferStatus::Completed }));
        let controller = SessionController::new(registry);
        let ctx = LocalSessionContext::new();
        ctx.set_stage_status(TransferStatus::Started);

        let status = controller.proceed_to(&ctx, TransferStage::Queuing).await;
        assert_eq!(status, TransferStatus::Started);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn middleware_error_is_captured_on_context_not_propagated() {
        let registry = MiddlewareRegistry::new();
        registry.register(Arc::new(FailingMiddleware { stage: TransferStage::Serializing }));
        let controller = SessionController::new(registry);
        let ctx = LocalSessionContext::new();

        let status = controller.proceed_to(&ctx, TransferStage::Queuing).await;
        assert_eq!(status, TransferStatus::Errored);
        assert_eq!(ctx.stage_status(), TransferStatus::Errored);
        assert!(ctx.error().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn proceed_to_and_wait_retries_until_finished() {
        let registry = MiddlewareRegistry::new();
        registry.register(Arc::new(FailingMiddleware { stage: TransferStage::Serializing }));
        let controller = SessionController::new(registry);
        let ctx = LocalSessionContext::new();

        let status = controller.proceed_to_and_wait(&ctx, TransferStage::Queuing, Duration::from_millis(1)).await;
        assert_eq!(status, TransferStatus::Errored);
    }

    #[tokio::test]
    async fn serialize_into_store_stamps_and_persists_a_local_write() {
        let repo = crate::storage::InMemoryRepository::new();
        let registry = InstanceRegistry::new(morango_core::InstanceId::new());
        let draft = morango_core::StoreRecord {
            id: "m1".to_string(),
            partition: "user1".to_string(),
            profile: "facilitydata".to_string(),
            serialized: "hello".to_string(),
            last_saved_instance: morango_core::InstanceId::new(),
            last_saved_counter: 0,
            conflicting_serialized_data: String::new(),
            deleted: false,
            hard_deleted: false,
            dirty_bit: true,
        };

        let saved = serialize_into_store(&repo, &registry, draft).await.unwrap();

        assert_eq!(saved.last_saved_counter, 1);
        assert!(!saved.dirty_bit);
        assert_eq!(repo.get_store_record("m1").unwrap().last_saved_counter, 1);
    }

    #[tokio::test]
    async fn deserialize_from_store_excludes_dirty_rows() {
        let repo = crate::storage::InMemoryRepository::new();
        let clean = morango_core::StoreRecord {
            id: "clean".to_string(),
            partition: "user1".to_string(),
            profile: "facilitydata".to_string(),
            serialized: "x".to_string(),
            last_saved_instance: morango_core::InstanceId::new(),
            last_saved_counter: 1,
            conflicting_serialized_data: String::new(),
            deleted: false,
            hard_deleted: false,
            dirty_bit: false,
        };
        let mut dirty = clean.clone();
        dirty.id = "dirty".to_string();
        dirty.dirty_bit = true;
        repo.put_store_record(clean);
        repo.put_store_record(dirty);

        let rows = deserialize_from_store(&repo, "facilitydata", &Filter::new(vec!["user1".to_string()])).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "clean");
    }
}
