//! state-sync engine.
//!
//! maintains an eventually consistent view of each peer's state via
//! manifest reconciliation: peers advertise `state key -> content hash`
//! manifests in heartbeats, and the engine pulls the bytes for keys whose
//! hash disagrees. payloads are never stored here; only hashes.

mod engine;
mod events;

pub use engine::{ConnectionKey, SyncEngine};
pub use events::{PeerEvents, PeerManifests, StateChange, StatePayload};
