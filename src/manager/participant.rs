use std::collections::{HashMap, VecDeque};

use crate::{
    manager::command_queue::CommandQueue,
    types::{GameTime, ReplicaHandle},
    wire::WireRecord,
};

/// Mirror entry: one object the remote participant is believed to possess.
///
/// An entry exists iff a construction for the handle was dispatched to this
/// participant (explicitly or implicitly); it gates scope and serialize
/// traffic.
#[derive(Copy, Clone, Debug)]
pub struct RemoteObject {
    pub in_scope: bool,
    pub last_send_time: GameTime,
}

/// One decoded inbound record awaiting the update cycle.
pub struct ReceivedCommand {
    pub record: WireRecord,
    pub retries: u8,
}

// Participant
//
// One remote peer engaged in replication: the mirror of what it holds, the
// queue of outbound intentions, and the FIFO of inbound records. Torn down
// as a unit on disconnect or explicit removal.
pub struct Participant {
    /// True until the first full drain of construction work, after which the
    /// download-complete message goes out.
    pub download_complete_pending: bool,
    pub commands: CommandQueue,
    pub received: VecDeque<ReceivedCommand>,
    mirror: HashMap<ReplicaHandle, RemoteObject>,
}

impl Participant {
    pub fn new() -> Self {
        Self {
            download_complete_pending: true,
            commands: CommandQueue::new(),
            received: VecDeque::new(),
            mirror: HashMap::new(),
        }
    }

    pub fn mirror_entry(&self, handle: &ReplicaHandle) -> Option<&RemoteObject> {
        self.mirror.get(handle)
    }

    pub fn mirror_entry_mut(&mut self, handle: &ReplicaHandle) -> Option<&mut RemoteObject> {
        self.mirror.get_mut(handle)
    }

    pub fn has_mirror_entry(&self, handle: &ReplicaHandle) -> bool {
        self.mirror.contains_key(handle)
    }

    pub fn insert_mirror_entry(&mut self, handle: ReplicaHandle, entry: RemoteObject) {
        self.mirror.insert(handle, entry);
    }

    pub fn remove_mirror_entry(&mut self, handle: &ReplicaHandle) -> Option<RemoteObject> {
        self.mirror.remove(handle)
    }

    /// Drop every trace of a handle: its queued record and its mirror entry.
    pub fn purge_handle(&mut self, handle: &ReplicaHandle) {
        self.commands.remove(handle);
        self.mirror.remove(handle);
    }
}

impl Default for Participant {
    fn default() -> Self {
        Self::new()
    }
}
