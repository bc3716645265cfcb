//! `SyncSession` and `TransferSession` data types, and the stage/status enums
//! that drive the staged transfer state machine (Sections 3, 4.G, 6).

use serde::{Deserialize, Serialize};

use crate::filter::Filter;
use crate::fsic::Fsic;

/// Named points in the episode state machine, in their fixed pipeline order.
///
/// Ordering matters: [`SessionController::proceed_to`](../../morango_sync/struct.SessionController.html)
/// (in the `morango-sync` crate) compares stages with `<=`/`>` to decide
/// whether middleware has already run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    Initializing,
    Serializing,
    Queuing,
    Transferring,
    Dequeuing,
    Deserializing,
    Cleanup,
}

impl TransferStage {
    /// All stages in pipeline order.
    pub const ALL: [TransferStage; 7] = [
        TransferStage::Initializing,
        TransferStage::Serializing,
        TransferStage::Queuing,
        TransferStage::Transferring,
        TransferStage::Dequeuing,
        TransferStage::Deserializing,
        TransferStage::Cleanup,
    ];
}

/// Per-stage lifecycle label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Started,
    Completed,
    Errored,
}

impl TransferStatus {
    /// Whether this status is one of the "no more middleware will run
    /// without external intervention" terminal states.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Errored)
    }
}

/// Authenticated, long-lived channel between two peers.
///
/// Certificate issuance and the nonce challenge that produce this object
/// are handled elsewhere; this struct only carries what the transfer engine
/// needs once a session exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSession {
    pub id: String,
    pub profile: String,
    pub client_certificate: Option<String>,
    pub server_certificate: Option<String>,
    pub client_instance: String,
    pub server_instance: String,
    pub active: bool,
    pub last_activity_timestamp: String,
    pub server_info: serde_json::Value,
    pub client_info: serde_json::Value,
    pub connection_kind: String,
}

/// One directional sync episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSession {
    pub id: String,
    pub sync_session_id: String,
    /// `true` for a push (client -> server), `false` for a pull.
    pub push: bool,
    pub filter: Filter,
    pub client_fsic: Fsic,
    pub server_fsic: Fsic,
    pub records_total: u64,
    pub records_transferred: u64,
    pub transfer_stage: TransferStage,
    pub transfer_stage_status: TransferStatus,
    pub active: bool,
    pub last_activity_timestamp: String,
}

impl TransferSession {
    /// Whether `QUEUING` should run on this side: the side that is
    /// *sending* data (client for push, server for pull).
    #[must_use]
    pub fn is_sender(&self, is_server: bool) -> bool {
        self.push != is_server
    }

    /// Whether `DEQUEUING` should run on this side: the side that is
    /// *receiving* data, and only if there is anything to merge.
    #[must_use]
    pub fn is_receiver(&self, is_server: bool) -> bool {
        !self.is_sender(is_server) && self.records_transferred > 0
    }

    /// The FSIC this side contributes when computing what to queue: the
    /// client's FSIC for a push, the server's for a pull (the FSIC of the
    /// side doing the sending is what the recipient's floor is diffed
    /// against in [`crate::fsic::diff_fsic`]).
    #[must_use]
    pub fn sender_fsic(&self) -> &Fsic {
        if self.push { &self.client_fsic } else { &self.server_fsic }
    }

    #[must_use]
    pub fn recipient_fsic(&self) -> &Fsic {
        if self.push { &self.server_fsic } else { &self.client_fsic }
    }
}
