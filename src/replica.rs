use crate::{
    types::{GameTime, NetworkId, ParticipantId, ReplicaHandle},
    wire::{ByteReader, ByteWriter},
};

/// Capability interface of a user-owned replicated object.
///
/// The manager invokes these according to the object's interface mask. A
/// `send_*` or `serialize` call that returns `false` cancels that one pending
/// bit for that one participant; the rest of the queued record survives. This
/// is the mechanism for per-object, per-participant replication policy.
pub trait Replica {
    /// The wire identifier for this object, once assigned. Commands issued
    /// before assignment stay queued and retry on later update cycles.
    fn network_id(&self) -> Option<NetworkId>;

    /// Write whatever the remote end needs to create this object.
    /// Return `false` to cancel construction for this participant.
    fn send_construction(
        &mut self,
        writer: &mut ByteWriter,
        now: GameTime,
        target: ParticipantId,
    ) -> bool;

    /// Write destruction data. Return `false` to suppress the wire record;
    /// the participant's mirror entry is removed either way.
    fn send_destruction(&mut self, writer: &mut ByteWriter, target: ParticipantId) -> bool;

    fn receive_destruction(&mut self, reader: &mut ByteReader, sender: ParticipantId);

    /// Return `false` to cancel the scope change for this participant.
    fn send_scope_change(
        &mut self,
        writer: &mut ByteWriter,
        in_scope: bool,
        target: ParticipantId,
    ) -> bool;

    /// Returns the new scope the remote end reports for its object.
    fn receive_scope_change(&mut self, reader: &mut ByteReader, sender: ParticipantId) -> bool;

    /// Push current state. Only invoked when the object is constructed and in
    /// scope for `target`. Return `false` to skip this push.
    fn serialize(&mut self, writer: &mut ByteWriter, target: ParticipantId) -> bool;

    /// Apply a received state push. Returns whether local state changed.
    fn deserialize(&mut self, reader: &mut ByteReader, sender: ParticipantId) -> bool;
}

/// Outcome of a construction request from a remote participant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConstructionReceipt {
    /// The object was created (or located) and registered under this handle.
    Accept(ReplicaHandle),
    /// The request is refused; the record is dropped.
    Reject,
    /// The request cannot be satisfied yet (e.g. it depends on an object that
    /// has not arrived). The record is retained and retried next update,
    /// within a bounded budget.
    Defer,
}

/// Resolves handles to live objects and hosts the construction factory.
///
/// The manager holds only weak handles; it never owns object memory. The
/// receive-construction capability lives here rather than on [`Replica`]
/// because the target object does not exist until the world creates it.
pub trait ReplicaWorld {
    fn replica(&mut self, handle: ReplicaHandle) -> Option<&mut dyn Replica>;

    /// A remote participant asks us to create an object. On `Accept`, the
    /// manager references the returned handle and records the carried
    /// NetworkId, and serialize/scope traffic back to the sender is unlocked.
    fn receive_construction(
        &mut self,
        reader: &mut ByteReader,
        timestamp: Option<GameTime>,
        network_id: Option<NetworkId>,
        sender: ParticipantId,
    ) -> ConstructionReceipt;

    /// Append payload to the download-complete message sent to `target`.
    /// The message is sent whether or not anything is written.
    fn send_download_complete(
        &mut self,
        _writer: &mut ByteWriter,
        _now: GameTime,
        _target: ParticipantId,
    ) -> bool {
        false
    }

    /// `sender` finished its first full push of constructions to us.
    fn receive_download_complete(&mut self, _reader: &mut ByteReader, _sender: ParticipantId) {}
}
