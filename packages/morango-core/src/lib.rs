//! Morango core -- instance/counter registry, store/RMC data model, the FSIC
//! engine, and the queue/dequeue merge algorithm.
//!
//! This crate has no async runtime dependency: it is the transport- and
//! storage-agnostic heart of the sync engine.
//!
//! - **Instance** ([`instance`]): process-wide `(instance_id, counter)` pair.
//! - **Store** ([`store`]): `StoreRecord`, `RecordMaxCounter`, `DatabaseMaxCounter`.
//! - **Filter** ([`filter`]): partition-prefix filter used to scope a transfer.
//! - **FSIC** ([`fsic`]): Filtered Set Instance Counter computation and diff.
//! - **Buffer** ([`buffer`]): transient per-transfer staging rows.
//! - **Repository** ([`repository`]): the storage-agnostic trait the merge
//!   algorithm is written against.
//! - **Merge** ([`merge`]): the queue-into-buffer and seven-step dequeue
//!   algorithms.
//! - **Session** ([`session`]): `SyncSession`, `TransferSession`, stage/status enums.
//! - **Wire** ([`wire`]): JSON wire objects for the HTTP transport.
//! - **Envelope** ([`envelope`]): timing/logging wrapper for fallible operations.
//! - **Error** ([`error`]): shared error kinds.

pub mod buffer;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod fsic;
pub mod instance;
pub mod merge;
pub mod repository;
pub mod session;
pub mod store;
pub mod wire;

pub use buffer::{BufferRecord, RecordMaxCounterBuffer};
pub use envelope::OperationEnvelope;
pub use error::{IntegrityError, MorangoError, ProtocolError};
pub use filter::Filter;
pub use fsic::{compute_fsic, diff_fsic, update_fsics_after_dequeue, Fsic};
pub use instance::{Counter, InstanceId, InstanceRegistry};
pub use merge::{dequeue_into_store, queue_into_buffer, DequeueReport, Disposition};
pub use repository::SyncRepository;
pub use session::{SyncSession, TransferSession, TransferStage, TransferStatus};
pub use store::{upsert_from_app, DatabaseMaxCounter, RecordMaxCounter, StoreRecord};
