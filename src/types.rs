/// Milliseconds on the host's clock. Supplied by the host on every update;
/// the manager never reads a clock itself.
pub type GameTime = u32;

// ReplicaHandle
//
// Opaque identity of a user-owned object. The manager never owns the object's
// memory; the handle must be dereferenced before the owner destroys it.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub struct ReplicaHandle(u64);

impl ReplicaHandle {
    pub fn from_u64(value: u64) -> Self {
        ReplicaHandle(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

// NetworkId
//
// Externally-assigned stable identifier used on the wire. A handle may have no
// NetworkId at the moment a command is issued; resolution is lazy.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct NetworkId(u32);

impl NetworkId {
    pub fn from_u32(value: u32) -> Self {
        NetworkId(value)
    }

    pub fn to_u32(&self) -> u32 {
        self.0
    }
}

// ParticipantId
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub struct ParticipantId(u64);

impl ParticipantId {
    pub fn from_u64(value: u64) -> Self {
        ParticipantId(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}
