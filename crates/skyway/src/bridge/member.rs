//! peer-event handling for member-site routers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use skyway_db::ops;
use skyway_render::hash_of_string_map;
use skyway_types::{EdgeLinkId, Lifecycle, MemberId, StateKey};

use crate::bridge::SyncBridge;
use crate::error::{Error, Result};
use crate::sync::{PeerEvents, PeerManifests, StateChange, StatePayload};

/// [`PeerEvents`] for peers of class `member`.
pub struct MemberEvents {
    bridge: Arc<SyncBridge>,
}

impl MemberEvents {
    pub(crate) fn new(bridge: Arc<SyncBridge>) -> Self {
        Self { bridge }
    }

    fn parse_member_id(peer_id: &str) -> Result<MemberId> {
        peer_id
            .parse::<i64>()
            .map(MemberId)
            .map_err(|_| Error::Validation(format!("malformed member id {peer_id:?}")))
    }

    /// the edge-link descriptor, when its access point is reachable.
    async fn edge_descriptor(
        &self,
        edge_id: EdgeLinkId,
    ) -> Result<Option<BTreeMap<String, String>>> {
        let db = &self.bridge.db;
        let Some(edge) = ops::get_edge_link(db.conn(), edge_id).await? else {
            return Ok(None);
        };
        let Some(ap) = ops::get_access_point(db.conn(), edge.access_point).await? else {
            return Ok(None);
        };
        let (Some(host), Some(port)) = (ap.hostname, ap.port) else {
            return Ok(None);
        };
        let mut descriptor = BTreeMap::new();
        // edge links always carry unit cost
        descriptor.insert("cost".to_string(), "1".to_string());
        descriptor.insert("host".to_string(), host);
        descriptor.insert("port".to_string(), port);
        Ok(Some(descriptor))
    }
}

#[async_trait]
impl PeerEvents for MemberEvents {
    async fn on_new_peer(&self, peer_id: &str) -> Result<PeerManifests> {
        let member_id = Self::parse_member_id(peer_id)?;
        let db = &self.bridge.db;

        let txn = db.begin().await?;
        let member = ops::get_member(&txn, member_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("member site {member_id}")))?;
        if member.lifecycle == Lifecycle::Ready {
            info!(member = %member_id, "member site is live; promoting to active");
            ops::set_member_active(&txn, member_id).await?;
        } else {
            ops::touch_member_heartbeat(&txn, member_id).await?;
        }
        txn.commit().await.map_err(skyway_db::Error::from)?;

        let mut local_state = BTreeMap::new();
        if let Some(certificate) = member.certificate {
            let (hash, _) = self.bridge.secret_payload(certificate).await?;
            local_state.insert(StateKey::TlsSite(member_id.0).to_string(), hash);
        }
        for edge in ops::list_edge_links_for_invitation(db.conn(), member.invitation).await? {
            if let Some(descriptor) = self.edge_descriptor(edge.id).await? {
                local_state.insert(
                    StateKey::Link(edge.id.0).to_string(),
                    hash_of_string_map(&descriptor),
                );
            }
        }
        // application configuration deployed to this member
        for (key, (hash, _)) in self.bridge.compose.app_state_for_member(member_id) {
            local_state.insert(key, hash);
        }

        Ok(PeerManifests {
            local_state,
            remote_state: BTreeMap::new(),
        })
    }

    async fn on_ping(&self, peer_id: &str) -> Result<()> {
        let member_id = Self::parse_member_id(peer_id)?;
        ops::touch_member_heartbeat(self.bridge.db.conn(), member_id).await?;
        Ok(())
    }

    async fn on_state_change(
        &self,
        _peer_id: &str,
        _key: &str,
        _change: Option<StateChange>,
    ) -> Result<()> {
        // member state advertisements are advisory
        Ok(())
    }

    async fn on_state_request(&self, peer_id: &str, key: &str) -> Result<StatePayload> {
        let member_id = Self::parse_member_id(peer_id)?;
        let db = &self.bridge.db;

        if let Ok(parsed) = key.parse::<StateKey>() {
            match parsed {
                StateKey::TlsSite(id) => {
                    let member = ops::get_member(db.conn(), MemberId(id))
                        .await?
                        .ok_or_else(|| Error::NotFound(format!("member site {id}")))?;
                    let certificate = member.certificate.ok_or_else(|| {
                        Error::NotFound(format!("member {id} has no credential"))
                    })?;
                    let (hash, data) = self.bridge.secret_payload(certificate).await?;
                    return Ok(StatePayload {
                        hash,
                        data: SyncBridge::string_map_value(&data),
                    });
                }
                StateKey::Link(id) => {
                    let descriptor = self
                        .edge_descriptor(EdgeLinkId(id))
                        .await?
                        .ok_or_else(|| Error::NotFound(format!("edge link {id}")))?;
                    return Ok(StatePayload {
                        hash: hash_of_string_map(&descriptor),
                        data: SyncBridge::string_map_value(&descriptor),
                    });
                }
                _ => {}
            }
        }

        // anything else is application state from the compose engine
        match self.bridge.compose.app_state_entry(member_id, key) {
            Some((hash, data)) => Ok(StatePayload { hash, data }),
            None => Err(Error::NotFound(format!("state key {key:?}"))),
        }
    }
}
