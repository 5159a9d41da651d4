//! sync bridge: binds the state-sync engine to database rows.
//!
//! the engine's callbacks are implemented once per peer class (backbone
//! routers and member sites) and dispatched by the class carried in each
//! heartbeat. push paths let database mutations recompute one affected
//! hash and force an immediate heartbeat to the peer that owns it.

mod backbone;
mod member;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use skyway_db::{SkywayDb, ops};
use skyway_render::hash_of_string_map;
use skyway_types::{
    AccessPointId, BackboneAccessPoint, CertificateId, InterRouterLink, Lifecycle, MemberId,
    PeerClass, SiteId, StateKey,
};

use crate::cluster::Cluster;
use crate::compose::ComposeEngine;
use crate::error::{Error, Result};
use crate::sync::SyncEngine;

pub use backbone::BackboneEvents;
pub use member::MemberEvents;

/// the bridge between the sync engine and the database.
pub struct SyncBridge {
    pub(crate) db: SkywayDb,
    pub(crate) cluster: Arc<dyn Cluster>,
    pub(crate) engine: SyncEngine,
    pub(crate) compose: Arc<ComposeEngine>,
}

impl SyncBridge {
    /// create the bridge and register its class handlers on the engine.
    pub fn new(
        db: SkywayDb,
        cluster: Arc<dyn Cluster>,
        engine: SyncEngine,
        compose: Arc<ComposeEngine>,
    ) -> Arc<Self> {
        let bridge = Arc::new(Self {
            db,
            cluster,
            engine,
            compose,
        });
        bridge.engine.set_handler(
            PeerClass::Backbone,
            Arc::new(BackboneEvents::new(bridge.clone())),
        );
        bridge.engine.set_handler(
            PeerClass::Member,
            Arc::new(MemberEvents::new(bridge.clone())),
        );
        bridge
    }

    /// the hash and data of the cluster secret behind a certificate.
    pub(crate) async fn secret_payload(
        &self,
        certificate: CertificateId,
    ) -> Result<(String, BTreeMap<String, String>)> {
        let cert = ops::get_tls_certificate(self.db.conn(), certificate)
            .await?
            .ok_or_else(|| Error::NotFound(format!("certificate {certificate}")))?;
        let secret = self
            .cluster
            .load_secret(&cert.object_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("secret {}", cert.object_name)))?;
        Ok((hash_of_string_map(&secret.data), secret.data))
    }

    /// the `access-*` descriptor for an access point.
    pub(crate) fn access_descriptor(ap: &BackboneAccessPoint) -> BTreeMap<String, String> {
        let mut descriptor = BTreeMap::new();
        descriptor.insert("kind".to_string(), ap.kind.as_str().to_string());
        if let Some(bind_host) = &ap.bind_host {
            descriptor.insert("bindhost".to_string(), bind_host.clone());
        }
        descriptor
    }

    /// the `link-*` descriptor for an inter-router link, when its target
    /// access point has a known ingress.
    pub(crate) async fn link_descriptor(
        &self,
        link: &InterRouterLink,
    ) -> Result<Option<BTreeMap<String, String>>> {
        let Some(ap) = ops::get_access_point(self.db.conn(), link.access_point).await? else {
            return Ok(None);
        };
        if ap.lifecycle != Lifecycle::Ready {
            return Ok(None);
        }
        let (Some(host), Some(port)) = (ap.hostname, ap.port) else {
            return Ok(None);
        };
        let mut descriptor = BTreeMap::new();
        descriptor.insert("cost".to_string(), link.cost.to_string());
        descriptor.insert("host".to_string(), host);
        descriptor.insert("port".to_string(), port);
        Ok(Some(descriptor))
    }

    /// map-to-json helper for state payloads.
    pub(crate) fn string_map_value(map: &BTreeMap<String, String>) -> Value {
        Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    // ─── push paths ──────────────────────────────────────────────────────

    /// a site's client credential changed: refresh its `tls-site` hash.
    pub async fn site_certificate_changed(&self, site_id: SiteId) {
        let result = async {
            let site = ops::get_site(self.db.conn(), site_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("interior site {site_id}")))?;
            let Some(certificate) = site.certificate else {
                return Ok(());
            };
            let (hash, _) = self.secret_payload(certificate).await?;
            self.engine
                .update_local_state(
                    PeerClass::Backbone,
                    &site_id.to_string(),
                    &StateKey::TlsSite(site_id.0).to_string(),
                    Some(hash),
                )
                .await;
            Ok::<(), Error>(())
        }
        .await;
        if let Err(e) = result {
            warn!(site = %site_id, error = %e, "site certificate push failed");
        }
    }

    /// an access point's server credential changed: refresh its
    /// `tls-server` hash on the owning site's manifest.
    pub async fn access_certificate_changed(&self, ap_id: AccessPointId) {
        let result = async {
            let ap = ops::get_access_point(self.db.conn(), ap_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("access point {ap_id}")))?;
            let Some(certificate) = ap.certificate else {
                return Ok(());
            };
            let (hash, _) = self.secret_payload(certificate).await?;
            self.engine
                .update_local_state(
                    PeerClass::Backbone,
                    &ap.site.to_string(),
                    &StateKey::TlsServer(ap_id).to_string(),
                    Some(hash),
                )
                .await;
            Ok::<(), Error>(())
        }
        .await;
        if let Err(e) = result {
            warn!(access_point = %ap_id, error = %e, "access certificate push failed");
        }
    }

    /// an access point's host/port changed: refresh the link hash of
    /// every site that links into it.
    pub async fn site_ingress_changed(&self, ap_id: AccessPointId) {
        let result = async {
            let Some(ap) = ops::get_access_point(self.db.conn(), ap_id).await? else {
                return Ok(());
            };
            for link in ops::list_links_into_site(self.db.conn(), ap.site).await? {
                if link.access_point != ap_id {
                    continue;
                }
                self.push_link(&link).await?;
            }
            Ok::<(), Error>(())
        }
        .await;
        if let Err(e) = result {
            warn!(access_point = %ap_id, error = %e, "ingress push failed");
        }
    }

    /// a link was added or its cost changed: refresh its hash on the
    /// connecting site's manifest.
    pub async fn link_changed(&self, link: &InterRouterLink) {
        if let Err(e) = self.push_link(link).await {
            warn!(link = %link.id, error = %e, "link push failed");
        }
    }

    /// a link was deleted: drop its key from the connecting site's
    /// manifest.
    pub async fn link_deleted(&self, link: &InterRouterLink) {
        self.engine
            .update_local_state(
                PeerClass::Backbone,
                &link.connecting_site.to_string(),
                &StateKey::Link(link.id.0).to_string(),
                None,
            )
            .await;
    }

    async fn push_link(&self, link: &InterRouterLink) -> Result<()> {
        let Some(descriptor) = self.link_descriptor(link).await? else {
            return Ok(());
        };
        self.engine
            .update_local_state(
                PeerClass::Backbone,
                &link.connecting_site.to_string(),
                &StateKey::Link(link.id.0).to_string(),
                Some(hash_of_string_map(&descriptor)),
            )
            .await;
        Ok(())
    }

    /// an application deploy refreshed a member's configuration: push the
    /// new application-state hashes.
    pub async fn member_app_state_changed(&self, member_id: MemberId) {
        for (key, (hash, _)) in self.compose.app_state_for_member(member_id) {
            self.engine
                .update_local_state(
                    PeerClass::Member,
                    &member_id.to_string(),
                    &key,
                    Some(hash),
                )
                .await;
        }
    }

    /// hook for ingress availability announcements.
    ///
    /// TODO(schema): the upstream design references a hash-set
    /// recomputation here whose inputs are not part of this schema;
    /// decide whether active backbone sites need a recompute pass once
    /// stale-peer tracking lands.
    pub fn new_ingress_available(&self) {}
}
