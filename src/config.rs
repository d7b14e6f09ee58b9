/// Runtime knobs for a [`ReplicaManager`](crate::ReplicaManager) instance.
///
/// Every field can also be changed after construction through the matching
/// setter; the setters only affect subsequent events, never retroactively
/// (enabling auto-participation does not add already-connected peers).
#[derive(Clone, Debug)]
pub struct ReplicaManagerConfig {
    /// Add a participant for every new transport connection.
    pub auto_participate_new_connections: bool,
    /// On participant add, queue a construction of every registered replica.
    pub auto_construct_to_new_participants: bool,
    /// Scope assigned to newly constructed mirror entries. When true, a
    /// construction also queues a scope-true and an initial state push.
    pub default_scope: bool,
    /// Transport channel used for every send from this manager.
    pub send_channel: u8,
    /// How many update cycles an inbound record referencing an unknown
    /// NetworkId is retried before it is dropped with a diagnostic.
    pub unknown_id_retry_budget: u8,
}

impl Default for ReplicaManagerConfig {
    fn default() -> Self {
        Self {
            auto_participate_new_connections: false,
            auto_construct_to_new_participants: false,
            default_scope: false,
            send_channel: 0,
            unknown_id_retry_budget: 64,
        }
    }
}
