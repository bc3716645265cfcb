//! In-memory reference storage: a [`SyncRepository`](morango_core::SyncRepository)
//! backend plus a small session table, both concurrent-safe so the same
//! instance can back an axum server handling multiple transfers at once.

pub mod memory;
pub mod session_store;

pub use memory::InMemoryRepository;
pub use session_store::{InMemorySessionStore, SessionStore};
