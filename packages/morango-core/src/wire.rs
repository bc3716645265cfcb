//! JSON wire objects exchanged over the HTTP transport.
//!
//! Field names here are authoritative: they are the contract between this
//! implementation and any peer, so renaming a field is a protocol break.

use serde::{Deserialize, Serialize};

use crate::instance::{Counter, InstanceId};

/// One entry of the `rmcb_list` carried alongside a buffered record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmcbWireEntry {
    pub instance_id: InstanceId,
    pub counter: Counter,
}

/// One element of a buffer transfer chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferWireRecord {
    pub model_uuid: String,
    pub serialized: String,
    pub deleted: bool,
    pub hard_deleted: bool,
    pub last_saved_instance: InstanceId,
    pub last_saved_counter: Counter,
    pub model_name: String,
    pub profile: String,
    pub partition: String,
    pub source_id: String,
    pub conflicting_serialized_data: String,
    pub rmcb_list: Vec<RmcbWireEntry>,
}

/// The fixed set of capability strings this implementation understands,
/// used to intersect against a peer's advertised set on receipt.
pub const CAPABILITIES: &[&str] = &["gzip", "fsic-v2", "async-dequeue"];

/// Intersects `peer_capabilities` with [`CAPABILITIES`], preserving the
/// order `CAPABILITIES` lists them in.
#[must_use]
pub fn intersect_capabilities<S: AsRef<str>>(peer_capabilities: &[S]) -> Vec<String> {
    CAPABILITIES
        .iter()
        .filter(|cap| peer_capabilities.iter().any(|p| p.as_ref() == **cap))
        .map(ToString::to_string)
        .collect()
}
