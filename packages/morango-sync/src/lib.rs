//! Async execution engine for the Morango-style peer-to-peer sync protocol:
//! the session controller, its middleware registry and stage handlers, the
//! HTTP transport, and an in-memory storage backend suitable for tests and
//! single-node deployments.
//!
//! The pure synchronization algorithms (FSIC diffing, queue/dequeue, the
//! data model) live in [`morango_core`]; this crate wires them into a
//! runnable service.

pub mod config;
pub mod context;
pub mod controller;
pub mod middleware;
pub mod signals;
pub mod storage;
pub mod telemetry;
pub mod transport;

pub use config::{Cli, EngineConfig, NetworkConfig};
pub use context::{ContextWire, LocalSessionContext, NetworkSessionContext, SessionContext};
pub use controller::SessionController;
pub use middleware::{Middleware, MiddlewareRegistry};
pub use signals::{SignalPayload, SyncSignal, SyncSignalGroup, SyncSignalHandler, TransferClient};
pub use storage::{InMemoryRepository, InMemorySessionStore, SessionStore};
pub use transport::{HttpSyncConnection, NetworkSyncConnection, ServerState};

use std::sync::Arc;

use morango_core::{InstanceId, InstanceRegistry, SyncRepository};

use middleware::handlers::{CleanupMiddleware, DequeuingMiddleware, DeserializingMiddleware, QueuingMiddleware, SerializingMiddleware, TransferringMiddleware};

/// Wires up a [`MiddlewareRegistry`] with the full stock pipeline
/// (`Serializing -> Queuing -> Transferring -> Dequeuing -> Deserializing ->
/// Cleanup`) against one repository/session-store pair. Registration must
/// complete before any [`SessionController::proceed_to`] call runs against
/// the returned registry.
#[must_use]
pub fn default_middleware_registry(
    repository: Arc<dyn SyncRepository>,
    session_store: Arc<dyn SessionStore>,
    instance_registry: Arc<InstanceRegistry>,
    profile: impl Into<String>,
) -> MiddlewareRegistry {
    let registry = MiddlewareRegistry::new();
    registry.register(Arc::new(SerializingMiddleware));
    registry.register(Arc::new(QueuingMiddleware::new(repository.clone(), session_store.clone(), profile)));
    registry.register(Arc::new(TransferringMiddleware::new(repository.clone(), session_store.clone())));
    registry.register(Arc::new(DequeuingMiddleware::new(repository.clone(), session_store.clone(), instance_registry)));
    registry.register(Arc::new(DeserializingMiddleware));
    registry.register(Arc::new(CleanupMiddleware::new(repository, session_store)));
    registry
}
