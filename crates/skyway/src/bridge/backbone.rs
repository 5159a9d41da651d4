//! peer-event handling for backbone (interior-site) routers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use skyway_db::ops;
use skyway_render::hash_of_string_map;
use skyway_types::{Lifecycle, SiteId, StateKey};

use crate::bridge::SyncBridge;
use crate::deploy_state;
use crate::error::{Error, Result};
use crate::sync::{PeerEvents, PeerManifests, StateChange, StatePayload};

/// [`PeerEvents`] for peers of class `backbone`.
pub struct BackboneEvents {
    bridge: Arc<SyncBridge>,
}

impl BackboneEvents {
    pub(crate) fn new(bridge: Arc<SyncBridge>) -> Self {
        Self { bridge }
    }

    fn parse_site_id(peer_id: &str) -> Result<SiteId> {
        peer_id
            .parse::<i64>()
            .map(SiteId)
            .map_err(|_| Error::Validation(format!("malformed site id {peer_id:?}")))
    }

    /// the full local manifest advertised to one interior site.
    async fn local_manifest(&self, site_id: SiteId) -> Result<BTreeMap<String, String>> {
        let db = &self.bridge.db;
        let mut manifest = BTreeMap::new();

        let site = ops::get_site(db.conn(), site_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("interior site {site_id}")))?;

        if let Some(certificate) = site.certificate {
            let (hash, _) = self.bridge.secret_payload(certificate).await?;
            manifest.insert(StateKey::TlsSite(site_id.0).to_string(), hash);
        }

        for ap in ops::list_access_points_for_site(db.conn(), site_id).await? {
            if ap.lifecycle == Lifecycle::Ready
                && let Some(certificate) = ap.certificate
            {
                let (hash, _) = self.bridge.secret_payload(certificate).await?;
                manifest.insert(StateKey::TlsServer(ap.id).to_string(), hash);
            }
            let descriptor = SyncBridge::access_descriptor(&ap);
            manifest.insert(
                StateKey::Access(ap.id).to_string(),
                hash_of_string_map(&descriptor),
            );
        }

        for link in ops::list_links_from_site(db.conn(), site_id).await? {
            if let Some(descriptor) = self.bridge.link_descriptor(&link).await? {
                manifest.insert(
                    StateKey::Link(link.id.0).to_string(),
                    hash_of_string_map(&descriptor),
                );
            }
        }

        Ok(manifest)
    }
}

#[async_trait]
impl PeerEvents for BackboneEvents {
    async fn on_new_peer(&self, peer_id: &str) -> Result<PeerManifests> {
        let site_id = Self::parse_site_id(peer_id)?;
        let db = &self.bridge.db;

        // lifecycle transition and heartbeat stamp commit together
        let txn = db.begin().await?;
        let site = ops::get_site(&txn, site_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("interior site {site_id}")))?;
        if site.lifecycle == Lifecycle::Ready {
            info!(site = %site_id, "interior site is live; promoting to active");
            ops::set_site_active(&txn, site_id).await?;
            deploy_state::site_lifecycle_changed(&txn, site_id).await?;
        } else {
            ops::touch_site_heartbeat(&txn, site_id).await?;
        }
        txn.commit().await.map_err(skyway_db::Error::from)?;

        let local_state = self.local_manifest(site_id).await?;

        // the router reports each ready access point's runtime ingress
        let mut remote_state = BTreeMap::new();
        for ap in ops::list_access_points_for_site(db.conn(), site_id).await? {
            if ap.lifecycle == Lifecycle::Ready {
                remote_state.insert(StateKey::AccessStatus(ap.id).to_string(), String::new());
            }
        }

        Ok(PeerManifests {
            local_state,
            remote_state,
        })
    }

    async fn on_ping(&self, peer_id: &str) -> Result<()> {
        let site_id = Self::parse_site_id(peer_id)?;
        ops::touch_site_heartbeat(self.bridge.db.conn(), site_id).await?;
        Ok(())
    }

    async fn on_state_change(
        &self,
        peer_id: &str,
        key: &str,
        change: Option<StateChange>,
    ) -> Result<()> {
        // only runtime ingress reports are acted on; everything else the
        // router advertises is advisory
        let Ok(StateKey::AccessStatus(ap_id)) = key.parse() else {
            return Ok(());
        };
        let Some(change) = change else {
            return Ok(());
        };

        let db = &self.bridge.db;
        let Some(ap) = ops::get_access_point(db.conn(), ap_id).await? else {
            return Ok(());
        };
        if ap.lifecycle != Lifecycle::Partial {
            return Ok(());
        }

        let host = change.data.get("host").and_then(|v| v.as_str());
        let port = change.data.get("port").and_then(|v| v.as_str());
        let (Some(host), Some(port)) = (host, port) else {
            debug!(access_point = %ap_id, "ingress report without host/port; ignored");
            return Ok(());
        };

        let txn = db.begin().await?;
        let promoted = ops::promote_access_point(&txn, ap_id, host, port).await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;
        if promoted {
            info!(access_point = %ap_id, site = %peer_id, host, port,
                  "access point ingress discovered; queued for credentials");
        }
        Ok(())
    }

    async fn on_state_request(&self, _peer_id: &str, key: &str) -> Result<StatePayload> {
        let db = &self.bridge.db;
        let parsed: StateKey = key
            .parse()
            .map_err(|_| Error::NotFound(format!("state key {key:?}")))?;

        match parsed {
            StateKey::TlsSite(id) => {
                let site = ops::get_site(db.conn(), SiteId(id))
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("interior site {id}")))?;
                let certificate = site
                    .certificate
                    .ok_or_else(|| Error::NotFound(format!("site {id} has no credential")))?;
                let (hash, data) = self.bridge.secret_payload(certificate).await?;
                Ok(StatePayload {
                    hash,
                    data: SyncBridge::string_map_value(&data),
                })
            }
            StateKey::TlsServer(ap_id) => {
                let ap = ops::get_access_point(db.conn(), ap_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("access point {ap_id}")))?;
                let certificate = ap.certificate.ok_or_else(|| {
                    Error::NotFound(format!("access point {ap_id} has no credential"))
                })?;
                let (hash, data) = self.bridge.secret_payload(certificate).await?;
                Ok(StatePayload {
                    hash,
                    data: SyncBridge::string_map_value(&data),
                })
            }
            StateKey::Access(ap_id) => {
                let ap = ops::get_access_point(db.conn(), ap_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("access point {ap_id}")))?;
                let descriptor = SyncBridge::access_descriptor(&ap);
                Ok(StatePayload {
                    hash: hash_of_string_map(&descriptor),
                    data: SyncBridge::string_map_value(&descriptor),
                })
            }
            StateKey::Link(id) => {
                let link = ops::get_inter_router_link(db.conn(), skyway_types::LinkId(id))
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("link {id}")))?;
                let descriptor = self
                    .bridge
                    .link_descriptor(&link)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("link {id} has no ingress yet")))?;
                Ok(StatePayload {
                    hash: hash_of_string_map(&descriptor),
                    data: SyncBridge::string_map_value(&descriptor),
                })
            }
            _ => Err(Error::NotFound(format!("state key {key:?}"))),
        }
    }
}
