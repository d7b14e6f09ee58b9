// The update cycle. Single-threaded and cooperative: inbound records are
// drained first, then each participant's command queue is walked in table
// order, then download-complete notifications go out. Any work that cannot
// proceed yet stays queued for a later cycle; the engine never blocks.

use log::warn;

use crate::{
    error::ReplicaError,
    manager::{
        command_queue::CommandBits,
        participant::RemoteObject,
        registry::InterfaceMask,
        ReplicaManager,
    },
    replica::{ConstructionReceipt, ReplicaWorld},
    transport::{Reliability, Transport},
    types::{GameTime, NetworkId, ParticipantId, ReplicaHandle},
    wire::{ByteReader, ByteWriter, RecordTag, WireRecord},
};

enum InboundOutcome {
    /// The record was fully handled (or intentionally dropped).
    Done,
    /// The record depends on something that has not arrived; retain it and
    /// stop draining this participant for now.
    Defer,
}

impl ReplicaManager {
    /// Run one update cycle.
    ///
    /// Invoke once per host update. Returns non-fatal diagnostics: transport
    /// send failures and inbound records dropped after exhausting their
    /// retry budget. The corresponding work is already skipped; nothing here
    /// requires action for the manager to stay consistent.
    pub fn update(
        &mut self,
        world: &mut dyn ReplicaWorld,
        transport: &mut dyn Transport,
        now: GameTime,
    ) -> Vec<ReplicaError> {
        let mut errors = Vec::new();
        self.process_received(world, now, &mut errors);
        self.dispatch_pending(world, transport, now, &mut errors);
        self.flush_download_complete(world, transport, now, &mut errors);
        errors
    }

    // Inbound

    fn process_received(
        &mut self,
        world: &mut dyn ReplicaWorld,
        now: GameTime,
        errors: &mut Vec<ReplicaError>,
    ) {
        let participant_ids: Vec<ParticipantId> = self.participants.keys().copied().collect();
        for participant_id in participant_ids {
            loop {
                let Some(mut command) = self
                    .participants
                    .get_mut(&participant_id)
                    .and_then(|participant| participant.received.pop_front())
                else {
                    break;
                };

                match self.process_received_record(world, participant_id, &command.record, now) {
                    InboundOutcome::Done => {}
                    InboundOutcome::Defer => {
                        command.retries += 1;
                        if command.retries >= self.unknown_id_retry_budget {
                            let network_id = command
                                .record
                                .network_id
                                .map(|id| id.to_u32())
                                .unwrap_or(0);
                            warn!(
                                "dropping {:?} record from {:?}: NetworkId {} unresolved after {} retries",
                                command.record.tag, participant_id, network_id, command.retries
                            );
                            errors.push(ReplicaError::UnresolvedNetworkId {
                                sender: participant_id,
                                network_id,
                                retries: command.retries,
                            });
                            continue;
                        }
                        if let Some(participant) = self.participants.get_mut(&participant_id) {
                            participant.received.push_front(command);
                        }
                        // stop for now; later records may depend on this one
                        break;
                    }
                }
            }
        }
    }

    fn process_received_record(
        &mut self,
        world: &mut dyn ReplicaWorld,
        sender: ParticipantId,
        record: &WireRecord,
        now: GameTime,
    ) -> InboundOutcome {
        match record.tag {
            RecordTag::Construct => {
                if let Some(network_id) = record.network_id {
                    if self.resolve_network_id(world, network_id).is_some() {
                        // we already have an object under this id; duplicate
                        // constructions are dropped
                        return InboundOutcome::Done;
                    }
                }
                let mut reader = ByteReader::new(&record.payload);
                match world.receive_construction(
                    &mut reader,
                    record.timestamp,
                    record.network_id,
                    sender,
                ) {
                    ConstructionReceipt::Accept(handle) => {
                        // a pre-registered object may have inbound
                        // construction locked out; refuse the attachment
                        if self.registry.contains(&handle)
                            && !self
                                .interface_allowed(&handle, InterfaceMask::RECEIVE_CONSTRUCTION)
                        {
                            warn!(
                                "dropping construction from {:?}: receive-construction disabled for {:?}",
                                sender, handle
                            );
                            return InboundOutcome::Done;
                        }
                        self.registry.reference(handle);
                        if let Some(network_id) = record.network_id {
                            self.registry.cache_network_id(network_id, handle);
                        }
                        // the sender holds the object; open its mirror entry
                        // without echoing a construction back
                        if let Some(participant) = self.participants.get_mut(&sender) {
                            participant
                                .commands
                                .enqueue(handle, CommandBits::IMPLICIT_CONSTRUCT);
                        }
                        InboundOutcome::Done
                    }
                    ConstructionReceipt::Reject => InboundOutcome::Done,
                    ConstructionReceipt::Defer => InboundOutcome::Defer,
                }
            }
            RecordTag::Destruct => {
                let Some(network_id) = record.network_id else {
                    warn!("destruction record from {:?} carries no NetworkId", sender);
                    return InboundOutcome::Done;
                };
                let Some(handle) = self.resolve_network_id(world, network_id) else {
                    return InboundOutcome::Defer;
                };
                if self.interface_allowed(&handle, InterfaceMask::RECEIVE_DESTRUCTION) {
                    if let Some(replica) = world.replica(handle) {
                        let mut reader = ByteReader::new(&record.payload);
                        replica.receive_destruction(&mut reader, sender);
                    }
                }
                // the sender no longer holds the object
                if let Some(participant) = self.participants.get_mut(&sender) {
                    participant.purge_handle(&handle);
                }
                InboundOutcome::Done
            }
            RecordTag::ScopeChange => {
                let Some(network_id) = record.network_id else {
                    warn!("scope-change record from {:?} carries no NetworkId", sender);
                    return InboundOutcome::Done;
                };
                let Some(handle) = self.resolve_network_id(world, network_id) else {
                    return InboundOutcome::Defer;
                };
                if self.interface_allowed(&handle, InterfaceMask::RECEIVE_SCOPE_CHANGE) {
                    if let Some(replica) = world.replica(handle) {
                        let mut reader = ByteReader::new(&record.payload);
                        replica.receive_scope_change(&mut reader, sender);
                    }
                }
                InboundOutcome::Done
            }
            RecordTag::Serialize => {
                let Some(network_id) = record.network_id else {
                    warn!("serialize record from {:?} carries no NetworkId", sender);
                    return InboundOutcome::Done;
                };
                let Some(handle) = self.resolve_network_id(world, network_id) else {
                    return InboundOutcome::Defer;
                };
                if self.interface_allowed(&handle, InterfaceMask::DESERIALIZE) {
                    if let Some(replica) = world.replica(handle) {
                        let mut reader = ByteReader::new(&record.payload);
                        if replica.deserialize(&mut reader, sender) {
                            if let Some(registered) = self.registry.get_mut(&handle) {
                                registered.last_deserialize_changed = Some(now);
                            }
                        }
                    }
                }
                InboundOutcome::Done
            }
            RecordTag::DownloadComplete => {
                let mut reader = ByteReader::new(&record.payload);
                world.receive_download_complete(&mut reader, sender);
                InboundOutcome::Done
            }
        }
    }

    /// NetworkId -> handle, via the registry cache with a lazy fallback scan.
    /// Ids are assigned by the host after registration, so the cache fills
    /// as ids are observed.
    fn resolve_network_id(
        &mut self,
        world: &mut dyn ReplicaWorld,
        network_id: NetworkId,
    ) -> Option<ReplicaHandle> {
        if let Some(handle) = self.registry.resolve_cached(network_id) {
            return Some(handle);
        }
        let handles: Vec<ReplicaHandle> = self.registry.handles().collect();
        for handle in handles {
            let Some(replica) = world.replica(handle) else {
                continue;
            };
            let Some(found) = replica.network_id() else {
                continue;
            };
            self.registry.cache_network_id(found, handle);
            if found == network_id {
                return Some(handle);
            }
        }
        None
    }

    // Outbound

    fn dispatch_pending(
        &mut self,
        world: &mut dyn ReplicaWorld,
        transport: &mut dyn Transport,
        now: GameTime,
        errors: &mut Vec<ReplicaError>,
    ) {
        let participant_ids: Vec<ParticipantId> = self.participants.keys().copied().collect();
        for participant_id in participant_ids {
            let records = {
                let Some(participant) = self.participants.get_mut(&participant_id) else {
                    continue;
                };
                participant.commands.take_records()
            };

            let mut survivors = Vec::new();
            for (handle, bits) in records {
                let remaining =
                    self.dispatch_record(world, transport, now, participant_id, handle, bits, errors);
                if !remaining.is_empty() {
                    survivors.push((handle, remaining));
                }
            }

            if let Some(participant) = self.participants.get_mut(&participant_id) {
                participant.commands.restore(survivors);
            }
        }
    }

    /// Apply one queued record. Sub-order is fixed: construct, then scope
    /// change, then serialize. Returns the bits that must stay queued.
    fn dispatch_record(
        &mut self,
        world: &mut dyn ReplicaWorld,
        transport: &mut dyn Transport,
        now: GameTime,
        participant_id: ParticipantId,
        handle: ReplicaHandle,
        mut bits: CommandBits,
        errors: &mut Vec<ReplicaError>,
    ) -> CommandBits {
        // resolve identity first; without a NetworkId nothing in this record
        // can be addressed on the wire, so the whole record waits
        let Some(replica) = world.replica(handle) else {
            warn!(
                "world cannot resolve handle {:?}; dropping its queued record",
                handle
            );
            return CommandBits::none();
        };
        let Some(network_id) = replica.network_id() else {
            return bits;
        };
        self.registry.cache_network_id(network_id, handle);

        // construction
        if bits.has_construction() {
            let already_constructed = self
                .participants
                .get(&participant_id)
                .map(|participant| participant.has_mirror_entry(&handle))
                .unwrap_or(false);

            let explicit = bits.contains(CommandBits::EXPLICIT_CONSTRUCT);
            bits.remove(CommandBits::EXPLICIT_CONSTRUCT | CommandBits::IMPLICIT_CONSTRUCT);

            if already_constructed {
                // duplicate; the remote end has it
            } else if explicit {
                if self.interface_allowed(&handle, InterfaceMask::SEND_CONSTRUCTION) {
                    let mut writer = ByteWriter::new();
                    if replica.send_construction(&mut writer, now, participant_id) {
                        let record = WireRecord::new(
                            RecordTag::Construct,
                            Some(network_id),
                            writer.to_bytes(),
                        )
                        .with_timestamp(now);
                        self.send_record(
                            transport,
                            &record,
                            Reliability::ReliableOrdered,
                            participant_id,
                            errors,
                        );
                        let in_scope = self.default_scope;
                        if let Some(participant) = self.participants.get_mut(&participant_id) {
                            participant.insert_mirror_entry(
                                handle,
                                RemoteObject {
                                    in_scope,
                                    last_send_time: now,
                                },
                            );
                        }
                    }
                    // declined: only this bit is cancelled; scope and
                    // serialize bits wait below for a later construction
                }
            } else {
                // implicit: the remote end already has the object
                if let Some(participant) = self.participants.get_mut(&participant_id) {
                    participant.insert_mirror_entry(
                        handle,
                        RemoteObject {
                            in_scope: false,
                            last_send_time: now,
                        },
                    );
                }
            }
        }

        // scope change
        if let Some(target_scope) = bits.scope_target() {
            let current_scope = self
                .participants
                .get(&participant_id)
                .and_then(|participant| participant.mirror_entry(&handle))
                .map(|entry| entry.in_scope);

            match current_scope {
                None => {
                    // no construction has reached this participant yet; the
                    // bits stay queued until one does
                }
                Some(current) if current == target_scope => {
                    // redundant; nothing to announce
                    bits.remove(CommandBits::SCOPE_TRUE | CommandBits::SCOPE_FALSE);
                }
                Some(_) => {
                    bits.remove(CommandBits::SCOPE_TRUE | CommandBits::SCOPE_FALSE);
                    if self.interface_allowed(&handle, InterfaceMask::SEND_SCOPE_CHANGE) {
                        let mut writer = ByteWriter::new();
                        if replica.send_scope_change(&mut writer, target_scope, participant_id) {
                            let record = WireRecord::new(
                                RecordTag::ScopeChange,
                                Some(network_id),
                                writer.to_bytes(),
                            );
                            self.send_record(
                                transport,
                                &record,
                                Reliability::ReliableOrdered,
                                participant_id,
                                errors,
                            );
                            if let Some(entry) = self
                                .participants
                                .get_mut(&participant_id)
                                .and_then(|participant| participant.mirror_entry_mut(&handle))
                            {
                                entry.in_scope = target_scope;
                            }
                            if target_scope {
                                // freshly visible: follow with a state push
                                bits.insert(CommandBits::SERIALIZE);
                            }
                        }
                    }
                }
            }
        }

        // serialize
        if bits.contains(CommandBits::SERIALIZE) {
            let in_scope = self
                .participants
                .get(&participant_id)
                .and_then(|participant| participant.mirror_entry(&handle))
                .map(|entry| entry.in_scope)
                .unwrap_or(false);

            // hidden or not yet constructed: the push stays queued until the
            // object is visible there
            if in_scope {
                bits.remove(CommandBits::SERIALIZE);
                if self.interface_allowed(&handle, InterfaceMask::SERIALIZE) {
                    let mut writer = ByteWriter::new();
                    if replica.serialize(&mut writer, participant_id) {
                        let record = WireRecord::new(
                            RecordTag::Serialize,
                            Some(network_id),
                            writer.to_bytes(),
                        );
                        self.send_record(
                            transport,
                            &record,
                            Reliability::UnreliableSequenced,
                            participant_id,
                            errors,
                        );
                        if let Some(entry) = self
                            .participants
                            .get_mut(&participant_id)
                            .and_then(|participant| participant.mirror_entry_mut(&handle))
                        {
                            entry.last_send_time = now;
                        }
                    }
                }
            }
        }

        bits
    }

    // Download complete

    fn flush_download_complete(
        &mut self,
        world: &mut dyn ReplicaWorld,
        transport: &mut dyn Transport,
        now: GameTime,
        errors: &mut Vec<ReplicaError>,
    ) {
        let participant_ids: Vec<ParticipantId> = self.participants.keys().copied().collect();
        for participant_id in participant_ids {
            let ready = {
                let Some(participant) = self.participants.get(&participant_id) else {
                    continue;
                };
                participant.download_complete_pending
                    && !participant.commands.has_construction_work()
            };
            if !ready {
                continue;
            }
            if let Some(participant) = self.participants.get_mut(&participant_id) {
                participant.download_complete_pending = false;
            }

            // sent even when the callback appends nothing
            let mut writer = ByteWriter::new();
            world.send_download_complete(&mut writer, now, participant_id);
            let record = WireRecord::new(RecordTag::DownloadComplete, None, writer.to_bytes());
            self.send_record(
                transport,
                &record,
                Reliability::ReliableOrdered,
                participant_id,
                errors,
            );
        }
    }
}
