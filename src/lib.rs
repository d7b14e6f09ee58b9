//! # Replica Manager
//! Coordinates replication of game objects across connected participants,
//! atop a reliable-datagram transport.
//!
//! The manager tracks, per (object, participant) pair, whether the remote end
//! has the object, whether it is in scope, and what work is still pending.
//! User commands (construct, scope, serialize) are queued, deduplicated and
//! merged so they can be issued in any order, even before network ids exist,
//! and are applied during a single-threaded update cycle that enforces
//! dependency ordering and per-object cancellation.
//!
//! The manager never owns object memory: user objects implement [`Replica`]
//! and are resolved through a user-supplied [`ReplicaWorld`]. Wire bytes go
//! out through the narrow [`Transport`] interface.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod config;
mod error;
mod manager;
mod replica;
mod transport;
mod types;
mod wire;

pub use config::ReplicaManagerConfig;
pub use error::ReplicaError;
pub use manager::{
    command_queue::{CommandBits, CommandQueue},
    participant::RemoteObject,
    registry::{InterfaceMask, RegisteredReplica},
    ReplicaManager,
};
pub use replica::{ConstructionReceipt, Replica, ReplicaWorld};
pub use transport::{Reliability, Transport, TransportError};
pub use types::{GameTime, NetworkId, ParticipantId, ReplicaHandle};
pub use wire::{ByteReader, ByteWriter, RecordTag, WireError, WireRecord};
