//! the callback interface the embedding provides to the sync engine.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// the initial manifests for a newly discovered peer.
#[derive(Debug, Clone, Default)]
pub struct PeerManifests {
    /// what we advertise to the peer.
    pub local_state: BTreeMap<String, String>,

    /// what we believe the peer advertises to us.
    pub remote_state: BTreeMap<String, String>,
}

/// a pulled unit of peer state.
#[derive(Debug, Clone)]
pub struct StateChange {
    /// the payload's content hash.
    pub hash: String,

    /// the payload, as json.
    pub data: Value,
}

/// a locally served unit of state.
#[derive(Debug, Clone)]
pub struct StatePayload {
    /// the payload's content hash.
    pub hash: String,

    /// the payload, as json.
    pub data: Value,
}

/// callbacks the sync engine makes into its embedding.
///
/// one implementation is registered per peer class; the sync bridge
/// provides the backbone and member implementations.
#[async_trait]
pub trait PeerEvents: Send + Sync {
    /// a heartbeat arrived from a peer the engine has never seen. the
    /// implementation loads the peer's row and returns its initial
    /// manifests.
    async fn on_new_peer(&self, peer_id: &str) -> Result<PeerManifests>;

    /// a heartbeat arrived from a known peer.
    async fn on_ping(&self, peer_id: &str) -> Result<()>;

    /// a unit of the peer's state changed. `None` means the peer deleted
    /// the key.
    async fn on_state_change(
        &self,
        peer_id: &str,
        key: &str,
        change: Option<StateChange>,
    ) -> Result<()>;

    /// the peer pulled a unit of our state.
    async fn on_state_request(&self, peer_id: &str, key: &str) -> Result<StatePayload>;
}
