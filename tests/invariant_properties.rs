// Structural invariants of the command queue and the manager, checked over
// random operation sequences.

mod helpers;

use std::collections::HashSet;

use proptest::prelude::*;

use helpers::{handle, pid, RecordingTransport, TestWorld};
use replica_manager::{
    CommandBits, CommandQueue, ReplicaManager, ReplicaManagerConfig,
};

#[test]
fn mirror_entries_appear_only_after_a_dispatched_construction() {
    let mut world = TestWorld::new();
    let mut transport = RecordingTransport::new();
    let mut manager = ReplicaManager::new(ReplicaManagerConfig::default());

    let replica = world.spawn(1, Some(7));
    manager.add_participant(pid(1));
    manager.construct(replica, Some(pid(1)), false);

    // queued, not dispatched
    assert!(!manager.is_constructed(&replica, &pid(1)));

    manager.update(&mut world, &mut transport, 10);
    assert!(manager.is_constructed(&replica, &pid(1)));
}

#[test]
fn dereference_leaves_no_trace_in_any_participant() {
    let mut world = TestWorld::new();
    let mut transport = RecordingTransport::new();
    let mut manager = ReplicaManager::new(ReplicaManagerConfig::default());

    let replica = world.spawn(1, Some(7));
    manager.add_participant(pid(1));
    manager.add_participant(pid(2));
    manager.construct(replica, Some(pid(1)), false);
    manager.update(&mut world, &mut transport, 10);
    manager.signal_serialize(replica, None, true);
    transport.clear();

    manager.dereference(replica);

    for participant in [pid(1), pid(2)] {
        assert!(!manager.is_constructed(&replica, &participant));
        assert!(!manager.is_in_scope(&replica, &participant));
    }
    manager.update(&mut world, &mut transport, 20);
    assert!(transport.sent.is_empty());

    // a fresh reference starts clean
    manager.reference(replica);
    manager.update(&mut world, &mut transport, 30);
    assert!(transport.sent.is_empty());
}

#[test]
fn removed_participants_are_never_addressed_again() {
    let mut world = TestWorld::new();
    let mut transport = RecordingTransport::new();
    let mut manager = ReplicaManager::new(ReplicaManagerConfig::default());

    let replica = world.spawn(1, Some(7));
    manager.add_participant(pid(1));
    manager.construct(replica, Some(pid(1)), false);
    manager.remove_participant(&pid(1));

    assert!(manager.participant_ids().is_empty());

    manager.construct(replica, None, true);
    manager.update(&mut world, &mut transport, 10);
    assert!(transport.sent.is_empty());
}

#[test]
fn dispatch_order_holds_across_cycles() {
    let mut world = TestWorld::new();
    let mut transport = RecordingTransport::new();
    let mut manager = ReplicaManager::new(ReplicaManagerConfig::default());

    let replica = world.spawn(1, None);
    manager.add_participant(pid(1));
    manager.set_scope(replica, true, Some(pid(1)), false);
    manager.construct(replica, Some(pid(1)), false);

    // identity unresolved: the record waits whole
    manager.update(&mut world, &mut transport, 10);
    assert!(transport.sent.is_empty());

    world.assign_network_id(replica, 42);
    manager.update(&mut world, &mut transport, 20);

    let tags = transport.tags_to(pid(1));
    use replica_manager::RecordTag::*;
    assert_eq!(tags, vec![Construct, ScopeChange, Serialize, DownloadComplete]);
}

// Command-queue structure under arbitrary operation sequences

#[derive(Clone, Debug)]
enum QueueOp {
    Construct,
    Implicit,
    ScopeTrue,
    ScopeFalse,
    Serialize,
    Remove,
}

fn queue_op_strategy() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        Just(QueueOp::Construct),
        Just(QueueOp::Implicit),
        Just(QueueOp::ScopeTrue),
        Just(QueueOp::ScopeFalse),
        Just(QueueOp::Serialize),
        Just(QueueOp::Remove),
    ]
}

proptest! {
    #[test]
    fn queue_structure_survives_any_operation_order(
        ops in prop::collection::vec((0u64..5, queue_op_strategy()), 0..200)
    ) {
        let mut queue = CommandQueue::new();

        for (handle_value, op) in ops {
            let target = handle(handle_value);
            match op {
                QueueOp::Construct => queue.enqueue(target, CommandBits::EXPLICIT_CONSTRUCT),
                QueueOp::Implicit => queue.enqueue(target, CommandBits::IMPLICIT_CONSTRUCT),
                QueueOp::ScopeTrue => queue.enqueue(target, CommandBits::SCOPE_TRUE),
                QueueOp::ScopeFalse => queue.enqueue(target, CommandBits::SCOPE_FALSE),
                QueueOp::Serialize => queue.enqueue(target, CommandBits::SERIALIZE),
                QueueOp::Remove => {
                    queue.remove(&target);
                }
            }

            // at most one record per handle
            let mut seen = HashSet::new();
            for (queued, bits) in queue.iter() {
                prop_assert!(seen.insert(*queued), "duplicate record for {:?}", queued);
                // opposing scope bits never coexist
                prop_assert!(
                    !(bits.contains(CommandBits::SCOPE_TRUE)
                        && bits.contains(CommandBits::SCOPE_FALSE))
                );
                // an explicit construction absorbs the implicit one
                prop_assert!(
                    !(bits.contains(CommandBits::EXPLICIT_CONSTRUCT)
                        && bits.contains(CommandBits::IMPLICIT_CONSTRUCT))
                );
                // records only exist while they carry work
                prop_assert!(!bits.is_empty());
            }
        }
    }

    #[test]
    fn manager_settles_after_one_cycle(
        ops in prop::collection::vec((0u64..3, 0u8..4, prop::bool::ANY), 0..60)
    ) {
        let mut world = TestWorld::new();
        let mut transport = RecordingTransport::new();
        let mut manager = ReplicaManager::new(ReplicaManagerConfig::default());

        manager.add_participant(pid(1));
        manager.add_participant(pid(2));
        for value in 0..3u64 {
            world.spawn(value, Some(value as u32 + 100));
        }

        for (handle_value, op, flag) in ops {
            let target = handle(handle_value);
            match op {
                0 => manager.construct(target, Some(pid(1)), flag),
                1 => manager.set_scope(target, flag, Some(pid(1)), false),
                2 => manager.signal_serialize(target, Some(pid(2)), flag),
                _ => manager.dereference(target),
            }
        }

        // every id is resolvable, so one cycle services everything it can;
        // bits still waiting on a construction or scope emit nothing
        manager.update(&mut world, &mut transport, 10);
        transport.clear();

        let errors = manager.update(&mut world, &mut transport, 20);
        prop_assert!(transport.sent.is_empty(), "second cycle should be silent");
        prop_assert!(errors.is_empty());
    }
}
