// Shared fixtures for integration tests: a scriptable replica, a world that
// owns them, and a transport that records (and can refuse) every send.

// each test binary uses a different subset of these
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use replica_manager::{
    ByteReader, ByteWriter, ConstructionReceipt, GameTime, NetworkId, ParticipantId, Reliability,
    Replica, ReplicaHandle, ReplicaWorld, Transport, TransportError, WireRecord,
};

pub fn handle(value: u64) -> ReplicaHandle {
    ReplicaHandle::from_u64(value)
}

pub fn pid(value: u64) -> ParticipantId {
    ParticipantId::from_u64(value)
}

// TestReplica

pub struct TestReplica {
    pub network_id: Option<NetworkId>,
    pub state: u32,

    pub decline_construction: bool,
    pub decline_destruction: bool,
    pub decline_scope_change: bool,
    pub decline_serialize: bool,

    pub send_construction_calls: u32,
    pub send_destruction_calls: u32,
    pub send_scope_change_calls: Vec<bool>,
    pub serialize_calls: u32,
    pub receive_destruction_calls: u32,
    pub receive_scope_change_calls: Vec<bool>,
    pub deserialize_calls: u32,
}

impl TestReplica {
    pub fn new(network_id: Option<u32>) -> Self {
        Self {
            network_id: network_id.map(NetworkId::from_u32),
            state: 0,
            decline_construction: false,
            decline_destruction: false,
            decline_scope_change: false,
            decline_serialize: false,
            send_construction_calls: 0,
            send_destruction_calls: 0,
            send_scope_change_calls: Vec::new(),
            serialize_calls: 0,
            receive_destruction_calls: 0,
            receive_scope_change_calls: Vec::new(),
            deserialize_calls: 0,
        }
    }
}

impl Replica for TestReplica {
    fn network_id(&self) -> Option<NetworkId> {
        self.network_id
    }

    fn send_construction(
        &mut self,
        writer: &mut ByteWriter,
        _now: GameTime,
        _target: ParticipantId,
    ) -> bool {
        self.send_construction_calls += 1;
        if self.decline_construction {
            return false;
        }
        writer.write_u32(self.state);
        true
    }

    fn send_destruction(&mut self, writer: &mut ByteWriter, _target: ParticipantId) -> bool {
        self.send_destruction_calls += 1;
        if self.decline_destruction {
            return false;
        }
        writer.write_u8(1);
        true
    }

    fn receive_destruction(&mut self, _reader: &mut ByteReader, _sender: ParticipantId) {
        self.receive_destruction_calls += 1;
    }

    fn send_scope_change(
        &mut self,
        writer: &mut ByteWriter,
        in_scope: bool,
        _target: ParticipantId,
    ) -> bool {
        self.send_scope_change_calls.push(in_scope);
        if self.decline_scope_change {
            return false;
        }
        writer.write_u8(in_scope as u8);
        true
    }

    fn receive_scope_change(&mut self, reader: &mut ByteReader, _sender: ParticipantId) -> bool {
        let in_scope = reader.read_u8().unwrap_or(0) != 0;
        self.receive_scope_change_calls.push(in_scope);
        in_scope
    }

    fn serialize(&mut self, writer: &mut ByteWriter, _target: ParticipantId) -> bool {
        self.serialize_calls += 1;
        if self.decline_serialize {
            return false;
        }
        writer.write_u32(self.state);
        true
    }

    fn deserialize(&mut self, reader: &mut ByteReader, _sender: ParticipantId) -> bool {
        self.deserialize_calls += 1;
        let Ok(value) = reader.read_u32() else {
            return false;
        };
        let changed = self.state != value;
        self.state = value;
        changed
    }
}

// TestWorld

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConstructionMode {
    Accept,
    Reject,
    Defer,
}

pub struct TestWorld {
    pub replicas: HashMap<ReplicaHandle, TestReplica>,
    pub construction_mode: ConstructionMode,
    /// When set, accepted constructions bind to this existing replica
    /// instead of spawning a fresh one.
    pub accept_with: Option<ReplicaHandle>,
    next_spawn: u64,

    pub receive_construction_calls: u32,
    pub accepted: Vec<ReplicaHandle>,
    pub download_completes_received: Vec<ParticipantId>,
    pub download_complete_payload: Vec<u8>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            replicas: HashMap::new(),
            construction_mode: ConstructionMode::Accept,
            accept_with: None,
            next_spawn: 1000,
            receive_construction_calls: 0,
            accepted: Vec::new(),
            download_completes_received: Vec::new(),
            download_complete_payload: Vec::new(),
        }
    }

    pub fn spawn(&mut self, handle_value: u64, network_id: Option<u32>) -> ReplicaHandle {
        let handle = handle(handle_value);
        self.replicas.insert(handle, TestReplica::new(network_id));
        handle
    }

    pub fn assign_network_id(&mut self, handle: ReplicaHandle, network_id: u32) {
        self.replicas
            .get_mut(&handle)
            .expect("unknown test replica")
            .network_id = Some(NetworkId::from_u32(network_id));
    }

    pub fn replica_ref(&self, handle: &ReplicaHandle) -> &TestReplica {
        self.replicas.get(handle).expect("unknown test replica")
    }

    pub fn replica_mut(&mut self, handle: &ReplicaHandle) -> &mut TestReplica {
        self.replicas.get_mut(handle).expect("unknown test replica")
    }
}

impl ReplicaWorld for TestWorld {
    fn replica(&mut self, handle: ReplicaHandle) -> Option<&mut dyn Replica> {
        self.replicas
            .get_mut(&handle)
            .map(|replica| replica as &mut dyn Replica)
    }

    fn receive_construction(
        &mut self,
        _reader: &mut ByteReader,
        _timestamp: Option<GameTime>,
        network_id: Option<NetworkId>,
        _sender: ParticipantId,
    ) -> ConstructionReceipt {
        self.receive_construction_calls += 1;
        match self.construction_mode {
            ConstructionMode::Accept => {
                let handle = if let Some(existing) = self.accept_with {
                    existing
                } else {
                    let handle = handle(self.next_spawn);
                    self.next_spawn += 1;
                    let mut replica = TestReplica::new(None);
                    replica.network_id = network_id;
                    self.replicas.insert(handle, replica);
                    handle
                };
                self.accepted.push(handle);
                ConstructionReceipt::Accept(handle)
            }
            ConstructionMode::Reject => ConstructionReceipt::Reject,
            ConstructionMode::Defer => ConstructionReceipt::Defer,
        }
    }

    fn send_download_complete(
        &mut self,
        writer: &mut ByteWriter,
        _now: GameTime,
        _target: ParticipantId,
    ) -> bool {
        if self.download_complete_payload.is_empty() {
            return false;
        }
        writer.write_bytes(&self.download_complete_payload);
        true
    }

    fn receive_download_complete(&mut self, _reader: &mut ByteReader, sender: ParticipantId) {
        self.download_completes_received.push(sender);
    }
}

// RecordingTransport

pub struct SentMessage {
    pub channel: u8,
    pub reliability: Reliability,
    pub target: ParticipantId,
    pub record: WireRecord,
    pub payload: Vec<u8>,
}

pub struct RecordingTransport {
    pub sent: Vec<SentMessage>,
    pub fail_all: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            fail_all: false,
        }
    }

    pub fn records_to(&self, target: ParticipantId) -> Vec<&WireRecord> {
        self.sent
            .iter()
            .filter(|message| message.target == target)
            .map(|message| &message.record)
            .collect()
    }

    pub fn tags_to(&self, target: ParticipantId) -> Vec<replica_manager::RecordTag> {
        self.records_to(target)
            .iter()
            .map(|record| record.tag)
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }

    /// Drain everything addressed to `target`, as raw payloads ready to be
    /// fed into another manager's `receive`.
    pub fn drain_to(&mut self, target: ParticipantId) -> VecDeque<Vec<u8>> {
        let mut drained = VecDeque::new();
        let mut kept = Vec::new();
        for message in self.sent.drain(..) {
            if message.target == target {
                drained.push_back(message.payload);
            } else {
                kept.push(message);
            }
        }
        self.sent = kept;
        drained
    }
}

impl Transport for RecordingTransport {
    fn send(
        &mut self,
        channel: u8,
        reliability: Reliability,
        payload: &[u8],
        target: ParticipantId,
    ) -> Result<(), TransportError> {
        if self.fail_all {
            return Err(TransportError::SendFailed {
                target,
                reason: "test transport refusing all sends".to_string(),
            });
        }
        let record = WireRecord::read(payload).expect("transport given an undecodable record");
        self.sent.push(SentMessage {
            channel,
            reliability,
            target,
            record,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
