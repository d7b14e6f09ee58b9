use thiserror::Error;

use crate::{transport::TransportError, types::ParticipantId, wire::WireError};

/// Non-fatal diagnostics surfaced from an update cycle.
///
/// Nothing in the manager is fatal: every failure degrades to skipping the
/// smallest unit of work. These are returned so the host can observe what
/// was skipped or dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaError {
    /// A transport send failed; the corresponding command bit stays cleared
    #[error("Transport send failed: {0}")]
    Transport(#[from] TransportError),

    /// An inbound record was malformed
    #[error("Wire decode failed: {0}")]
    Wire(#[from] WireError),

    /// An inbound record referenced a NetworkId that never resolved within
    /// the retry budget and was dropped
    #[error("Dropped inbound record from {sender:?}: NetworkId {network_id} unresolved after {retries} retries")]
    UnresolvedNetworkId {
        sender: ParticipantId,
        network_id: u32,
        retries: u8,
    },
}
