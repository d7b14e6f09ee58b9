use std::collections::{BTreeMap, HashMap};

use crate::types::{GameTime, NetworkId, ReplicaHandle};

// InterfaceMask
//
// Which capability methods may be invoked for an object. All enabled by
// default; disabling receive interfaces is useful against unauthorized sends.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InterfaceMask(u8);

impl InterfaceMask {
    pub const SEND_CONSTRUCTION: InterfaceMask = InterfaceMask(1 << 0);
    pub const RECEIVE_CONSTRUCTION: InterfaceMask = InterfaceMask(1 << 1);
    pub const SEND_DESTRUCTION: InterfaceMask = InterfaceMask(1 << 2);
    pub const RECEIVE_DESTRUCTION: InterfaceMask = InterfaceMask(1 << 3);
    pub const SEND_SCOPE_CHANGE: InterfaceMask = InterfaceMask(1 << 4);
    pub const RECEIVE_SCOPE_CHANGE: InterfaceMask = InterfaceMask(1 << 5);
    pub const SERIALIZE: InterfaceMask = InterfaceMask(1 << 6);
    pub const DESERIALIZE: InterfaceMask = InterfaceMask(1 << 7);

    pub fn all() -> Self {
        InterfaceMask(0xFF)
    }

    pub fn none() -> Self {
        InterfaceMask(0)
    }

    pub fn contains(&self, mask: InterfaceMask) -> bool {
        self.0 & mask.0 == mask.0
    }

    pub fn insert(&mut self, mask: InterfaceMask) {
        self.0 |= mask.0;
    }

    pub fn remove(&mut self, mask: InterfaceMask) {
        self.0 &= !mask.0;
    }
}

impl std::ops::BitOr for InterfaceMask {
    type Output = InterfaceMask;

    fn bitor(self, rhs: InterfaceMask) -> InterfaceMask {
        InterfaceMask(self.0 | rhs.0)
    }
}

impl Default for InterfaceMask {
    fn default() -> Self {
        Self::all()
    }
}

/// Per-object record in the global registry.
pub struct RegisteredReplica {
    pub allowed_interfaces: InterfaceMask,
    /// Last time a deserialize of this object reported a state change.
    pub last_deserialize_changed: Option<GameTime>,
}

impl RegisteredReplica {
    fn new() -> Self {
        Self {
            allowed_interfaces: InterfaceMask::all(),
            last_deserialize_changed: None,
        }
    }
}

// ReplicaRegistry
//
// Global table of locally-known objects, ordered by handle so indexed
// iteration is stable within an update cycle. Also caches NetworkId lookups:
// ids are assigned by the host at its leisure, so the cache fills lazily as
// ids are observed during dispatch and inbound resolution.
pub struct ReplicaRegistry {
    replicas: BTreeMap<ReplicaHandle, RegisteredReplica>,
    network_ids: HashMap<NetworkId, ReplicaHandle>,
}

impl ReplicaRegistry {
    pub fn new() -> Self {
        Self {
            replicas: BTreeMap::new(),
            network_ids: HashMap::new(),
        }
    }

    /// Returns whether the handle was newly inserted. Duplicate calls are
    /// safe and are simply ignored.
    pub fn reference(&mut self, handle: ReplicaHandle) -> bool {
        if self.replicas.contains_key(&handle) {
            return false;
        }
        self.replicas.insert(handle, RegisteredReplica::new());
        true
    }

    /// Removes the handle and any cached NetworkId pointing at it. Returns
    /// whether the handle was present.
    pub fn dereference(&mut self, handle: &ReplicaHandle) -> bool {
        if self.replicas.remove(handle).is_none() {
            return false;
        }
        self.network_ids.retain(|_, cached| cached != handle);
        true
    }

    pub fn contains(&self, handle: &ReplicaHandle) -> bool {
        self.replicas.contains_key(handle)
    }

    pub fn count(&self) -> usize {
        self.replicas.len()
    }

    /// Stable indexed access, for bulk operations over all registered
    /// objects. Ordered by handle.
    pub fn at(&self, index: usize) -> Option<ReplicaHandle> {
        self.replicas.keys().nth(index).copied()
    }

    pub fn get(&self, handle: &ReplicaHandle) -> Option<&RegisteredReplica> {
        self.replicas.get(handle)
    }

    pub fn get_mut(&mut self, handle: &ReplicaHandle) -> Option<&mut RegisteredReplica> {
        self.replicas.get_mut(handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = ReplicaHandle> + '_ {
        self.replicas.keys().copied()
    }

    pub fn resolve_cached(&self, network_id: NetworkId) -> Option<ReplicaHandle> {
        self.network_ids.get(&network_id).copied()
    }

    pub fn cache_network_id(&mut self, network_id: NetworkId, handle: ReplicaHandle) {
        self.network_ids.insert(network_id, handle);
    }
}
