pub mod command_queue;
pub mod participant;
pub mod registry;

mod update;

use std::collections::BTreeMap;

use log::warn;

use crate::{
    config::ReplicaManagerConfig,
    error::ReplicaError,
    manager::{
        command_queue::CommandBits,
        participant::Participant,
        registry::{InterfaceMask, ReplicaRegistry},
    },
    replica::ReplicaWorld,
    transport::{Reliability, Transport},
    types::{GameTime, ParticipantId, ReplicaHandle},
    wire::{ByteWriter, RecordTag, WireError, WireRecord},
};

/// Coordinates replication of user-owned objects across a set of remote
/// participants.
///
/// For each (local object, participant) pair the manager tracks whether the
/// remote end has the object, whether it is in scope, and what pending work
/// must still be transmitted. User commands are queued, merged and re-ordered
/// so they may be issued before the necessary identifiers exist; everything
/// is applied during [`update`](ReplicaManager::update).
///
/// All state mutation happens on the host's update thread. A transport that
/// delivers packets from another thread must marshal them onto that thread
/// before calling [`receive`](ReplicaManager::receive).
pub struct ReplicaManager {
    registry: ReplicaRegistry,
    participants: BTreeMap<ParticipantId, Participant>,

    auto_participate_new_connections: bool,
    auto_construct_to_new_participants: bool,
    default_scope: bool,
    send_channel: u8,
    unknown_id_retry_budget: u8,
}

impl ReplicaManager {
    pub fn new(config: ReplicaManagerConfig) -> Self {
        Self {
            registry: ReplicaRegistry::new(),
            participants: BTreeMap::new(),
            auto_participate_new_connections: config.auto_participate_new_connections,
            auto_construct_to_new_participants: config.auto_construct_to_new_participants,
            default_scope: config.default_scope,
            send_channel: config.send_channel,
            unknown_id_retry_budget: config.unknown_id_retry_budget,
        }
    }

    // Configuration

    /// Whether new transport connections become participants automatically.
    /// Connections that already exist when this is enabled are not added.
    pub fn set_auto_participate_new_connections(&mut self, auto_add: bool) {
        self.auto_participate_new_connections = auto_add;
    }

    /// Whether every registered object is queued for construction when a
    /// participant is added. Has no effect on existing participants.
    pub fn set_auto_construct_to_new_participants(&mut self, auto_construct: bool) {
        self.auto_construct_to_new_participants = auto_construct;
    }

    /// Scope given to newly constructed mirror entries. Existing entries are
    /// not affected.
    pub fn set_default_scope(&mut self, default_scope: bool) {
        self.default_scope = default_scope;
    }

    /// Transport channel used for every send from this manager.
    pub fn set_send_channel(&mut self, channel: u8) {
        self.send_channel = channel;
    }

    // Participants

    /// Engage a remote peer. Idempotent. Only participants receive records
    /// from us and only their records are accepted.
    pub fn add_participant(&mut self, participant_id: ParticipantId) {
        if self.participants.contains_key(&participant_id) {
            return;
        }
        self.participants.insert(participant_id, Participant::new());

        if self.auto_construct_to_new_participants {
            let handles: Vec<ReplicaHandle> = self.registry.handles().collect();
            let bits = self.construction_bits();
            if let Some(participant) = self.participants.get_mut(&participant_id) {
                for handle in handles {
                    participant.commands.enqueue(handle, bits);
                }
            }
        }
    }

    /// Disengage a remote peer, dropping its mirror, command queue and
    /// received queue. No further records are produced for or accepted from
    /// it. Returns whether the participant was present.
    pub fn remove_participant(&mut self, participant_id: &ParticipantId) -> bool {
        self.participants.remove(participant_id).is_some()
    }

    pub fn has_participant(&self, participant_id: &ParticipantId) -> bool {
        self.participants.contains_key(participant_id)
    }

    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.participants.keys().copied().collect()
    }

    // Registry

    /// Track an object so commands referencing it are honored. Construct,
    /// scope and serialize commands do this implicitly. Idempotent.
    pub fn reference(&mut self, handle: ReplicaHandle) {
        self.registry.reference(handle);
    }

    /// Stop tracking an object, locally removing every queued command and
    /// mirror entry naming it across all participants. No records are sent.
    /// Must be called before the owner destroys the object.
    pub fn dereference(&mut self, handle: ReplicaHandle) {
        if !self.registry.dereference(&handle) {
            return;
        }
        for participant in self.participants.values_mut() {
            participant.purge_handle(&handle);
        }
    }

    pub fn replica_count(&self) -> usize {
        self.registry.count()
    }

    /// Registered handle at `index`, ordered by handle. Stable between
    /// registry mutations; useful for bulk operations.
    pub fn replica_at(&self, index: usize) -> Option<ReplicaHandle> {
        self.registry.at(index)
    }

    /// Allow the given capability calls on this object. Ignored when the
    /// handle is not registered.
    pub fn enable_interfaces(&mut self, handle: &ReplicaHandle, mask: InterfaceMask) {
        if let Some(record) = self.registry.get_mut(handle) {
            record.allowed_interfaces.insert(mask);
        }
    }

    /// Forbid the given capability calls on this object. Ignored when the
    /// handle is not registered.
    pub fn disable_interfaces(&mut self, handle: &ReplicaHandle, mask: InterfaceMask) {
        if let Some(record) = self.registry.get_mut(handle) {
            record.allowed_interfaces.remove(mask);
        }
    }

    /// Replace the object's capability mask outright. Ignored when the
    /// handle is not registered.
    pub fn set_interface_mask(&mut self, handle: &ReplicaHandle, mask: InterfaceMask) {
        if let Some(record) = self.registry.get_mut(handle) {
            record.allowed_interfaces = mask;
        }
    }

    /// Last update-cycle time at which a deserialize of this object reported
    /// a state change.
    pub fn last_state_change(&self, handle: &ReplicaHandle) -> Option<GameTime> {
        self.registry.get(handle)?.last_deserialize_changed
    }

    // Commands
    //
    // `target`/`broadcast` addressing: broadcast with no target reaches every
    // participant; broadcast with a target reaches every participant except
    // that one; no broadcast reaches exactly the target.

    /// Signal that the object should be created on the addressed
    /// participants. Nothing is sent until the next update cycle, and nothing
    /// is sent at all until the object has a NetworkId. Duplicate
    /// constructions to a participant that already has the object are
    /// dropped.
    pub fn construct(
        &mut self,
        handle: ReplicaHandle,
        target: Option<ParticipantId>,
        broadcast: bool,
    ) {
        self.registry.reference(handle);
        let bits = self.construction_bits();
        self.enqueue_for_targets(handle, target, broadcast, bits);
    }

    /// Change the object's visibility for the addressed participants.
    /// In-scope objects receive serialize traffic; out-of-scope objects are
    /// hidden without being destroyed.
    pub fn set_scope(
        &mut self,
        handle: ReplicaHandle,
        in_scope: bool,
        target: Option<ParticipantId>,
        broadcast: bool,
    ) {
        self.registry.reference(handle);
        let bits = if in_scope {
            CommandBits::SCOPE_TRUE
        } else {
            CommandBits::SCOPE_FALSE
        };
        self.enqueue_for_targets(handle, target, broadcast, bits);
    }

    /// Signal that the object's state changed and should be pushed to the
    /// addressed participants on the next update cycle.
    pub fn signal_serialize(
        &mut self,
        handle: ReplicaHandle,
        target: Option<ParticipantId>,
        broadcast: bool,
    ) {
        self.registry.reference(handle);
        self.enqueue_for_targets(handle, target, broadcast, CommandBits::SERIALIZE);
    }

    /// Announce destruction of the object to the addressed participants.
    ///
    /// Applied immediately, not queued: all pending work for the pair is
    /// cancelled first. Where a mirror entry exists, the object's
    /// `send_destruction` runs and a destruction record goes out. Ignored for
    /// unregistered handles; nothing is deleted locally either way (pair
    /// with [`dereference`](ReplicaManager::dereference) before destroying
    /// the object).
    pub fn destruct(
        &mut self,
        world: &mut dyn ReplicaWorld,
        transport: &mut dyn Transport,
        handle: ReplicaHandle,
        target: Option<ParticipantId>,
        broadcast: bool,
    ) -> Vec<ReplicaError> {
        let mut errors = Vec::new();
        if !self.registry.contains(&handle) {
            return errors;
        }

        for participant_id in self.resolve_targets(target, broadcast) {
            let had_mirror_entry = {
                let Some(participant) = self.participants.get_mut(&participant_id) else {
                    continue;
                };
                participant.commands.remove(&handle);
                participant.remove_mirror_entry(&handle).is_some()
            };
            // never constructed there: cancel silently
            if !had_mirror_entry {
                continue;
            }
            if !self.interface_allowed(&handle, InterfaceMask::SEND_DESTRUCTION) {
                continue;
            }
            let Some(replica) = world.replica(handle) else {
                warn!(
                    "destruct: world cannot resolve handle {:?}; skipping send",
                    handle
                );
                continue;
            };
            let Some(network_id) = replica.network_id() else {
                continue;
            };
            let mut writer = ByteWriter::new();
            if replica.send_destruction(&mut writer, participant_id) {
                let record =
                    WireRecord::new(RecordTag::Destruct, Some(network_id), writer.to_bytes());
                self.send_record(
                    transport,
                    &record,
                    Reliability::ReliableOrdered,
                    participant_id,
                    &mut errors,
                );
            }
        }
        errors
    }

    // Queries

    /// Whether the participant is believed to have received a construction
    /// of this object.
    pub fn is_constructed(&self, handle: &ReplicaHandle, participant_id: &ParticipantId) -> bool {
        self.participants
            .get(participant_id)
            .map(|participant| participant.has_mirror_entry(handle))
            .unwrap_or(false)
    }

    /// Whether the object is in scope for the participant. False when not
    /// constructed there.
    pub fn is_in_scope(&self, handle: &ReplicaHandle, participant_id: &ParticipantId) -> bool {
        self.participants
            .get(participant_id)
            .and_then(|participant| participant.mirror_entry(handle))
            .map(|entry| entry.in_scope)
            .unwrap_or(false)
    }

    // Transport lifecycle

    /// A new transport-level connection appeared.
    pub fn on_connect(&mut self, participant_id: ParticipantId) {
        if self.auto_participate_new_connections {
            self.add_participant(participant_id);
        }
    }

    /// A connection closed or was lost. The participant's pending work is
    /// discarded without producing any records or callbacks.
    pub fn on_disconnect(&mut self, participant_id: &ParticipantId) {
        self.remove_participant(participant_id);
    }

    /// Decode one inbound message and queue it for the next update cycle.
    /// Returns `Ok(false)` when the sender is not a participant, in which
    /// case the message was not consumed.
    pub fn receive(&mut self, sender: ParticipantId, payload: &[u8]) -> Result<bool, WireError> {
        if !self.participants.contains_key(&sender) {
            return Ok(false);
        }
        let record = WireRecord::read(payload)?;
        if let Some(participant) = self.participants.get_mut(&sender) {
            participant
                .received
                .push_back(participant::ReceivedCommand { record, retries: 0 });
        }
        Ok(true)
    }

    // Internal

    fn construction_bits(&self) -> CommandBits {
        let mut bits = CommandBits::EXPLICIT_CONSTRUCT;
        if self.default_scope {
            bits.insert(CommandBits::SCOPE_TRUE | CommandBits::SERIALIZE);
        }
        bits
    }

    fn resolve_targets(
        &self,
        target: Option<ParticipantId>,
        broadcast: bool,
    ) -> Vec<ParticipantId> {
        if broadcast {
            self.participants
                .keys()
                .copied()
                .filter(|participant_id| Some(*participant_id) != target)
                .collect()
        } else {
            target
                .filter(|participant_id| self.participants.contains_key(participant_id))
                .into_iter()
                .collect()
        }
    }

    fn enqueue_for_targets(
        &mut self,
        handle: ReplicaHandle,
        target: Option<ParticipantId>,
        broadcast: bool,
        bits: CommandBits,
    ) {
        for participant_id in self.resolve_targets(target, broadcast) {
            if let Some(participant) = self.participants.get_mut(&participant_id) {
                participant.commands.enqueue(handle, bits);
            }
        }
    }

    pub(crate) fn interface_allowed(&self, handle: &ReplicaHandle, mask: InterfaceMask) -> bool {
        self.registry
            .get(handle)
            .map(|record| record.allowed_interfaces.contains(mask))
            .unwrap_or(false)
    }

    pub(crate) fn send_record(
        &self,
        transport: &mut dyn Transport,
        record: &WireRecord,
        reliability: Reliability,
        target: ParticipantId,
        errors: &mut Vec<ReplicaError>,
    ) {
        let payload = record.write();
        if let Err(error) = transport.send(self.send_channel, reliability, &payload, target) {
            warn!(
                "send of {:?} record to {:?} failed: {}",
                record.tag, target, error
            );
            errors.push(ReplicaError::Transport(error));
        }
    }
}

impl Default for ReplicaManager {
    fn default() -> Self {
        Self::new(ReplicaManagerConfig::default())
    }
}
