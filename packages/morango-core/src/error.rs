//! Shared error kinds: integrity, protocol, and top-level error variants;
//! transport-specific and middleware-specific variants that wrap these
//! live in `morango-sync`.

use thiserror::Error;

/// Raised when integration breaches an invariant during dequeue (e.g. a
/// missing RMC row for `last_saved_instance`). The caller must abort the
/// transaction and preserve the Store unchanged.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("store record {store_record_id} has no RecordMaxCounter row for its winning instance {instance_id}")]
    MissingWinningRmc {
        store_record_id: String,
        instance_id: String,
    },
    #[error("buffer row {model_uuid} for transfer {transfer_session_id} has no RecordMaxCounterBuffer rows")]
    EmptyBufferRecord {
        transfer_session_id: String,
        model_uuid: String,
    },
    #[error("dequeue expected an existing store record {store_record_id} to merge a conflict into")]
    MissingStoreRecord { store_record_id: String },
}

/// Malformed wire payload or stage mismatch; fatal for the session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("expected transfer stage {expected:?}, got {actual:?}")]
    StageMismatch {
        expected: crate::session::TransferStage,
        actual: crate::session::TransferStage,
    },
    #[error("malformed wire payload: {0}")]
    Malformed(String),
    #[error("peer lacks required capability: {0}")]
    CapabilityMismatch(String),
}

/// Top-level error type for `morango-core` operations.
#[derive(Debug, Error)]
pub enum MorangoError {
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("attempted to overwrite write-once context field {field}")]
    ContextUpdate { field: &'static str },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_error_messages_name_the_offending_row() {
        let err = IntegrityError::MissingWinningRmc {
            store_record_id: "m1".to_string(),
            instance_id: "abc".to_string(),
        };
        assert!(err.to_string().contains("m1"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn context_update_error_names_field() {
        let err = MorangoError::ContextUpdate { field: "transfer_session" };
        assert!(err.to_string().contains("transfer_session"));
    }

    #[test]
    fn missing_store_record_names_the_row() {
        let err = IntegrityError::MissingStoreRecord { store_record_id: "m2".to_string() };
        assert!(err.to_string().contains("m2"));
    }
}
