//! admin operations.
//!
//! the library surface the external REST collaborator calls. every
//! mutation validates its inputs, runs in a transaction that rolls back
//! on any error path, re-evaluates deployment state where the data model
//! requires it, and notifies the sync bridge after commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::info;

use skyway_db::{SkywayDb, ops};
use skyway_types::{
    AccessPointId, AccessPointKind, ApplicationNetwork, Backbone, BackboneAccessPoint, BackboneId,
    EdgeLink, EdgeLinkId, InterRouterLink, InvitationId, LinkId, MemberInvitation, SiteId, VanId,
};

use crate::bridge::SyncBridge;
use crate::compose::ComposeEngine;
use crate::deploy_state;
use crate::error::{Error, Result};

/// the admin operations handle.
pub struct Admin {
    db: SkywayDb,
    bridge: Option<Arc<SyncBridge>>,
}

impl Admin {
    /// create an admin handle without push notifications.
    pub fn new(db: SkywayDb) -> Self {
        Self { db, bridge: None }
    }

    /// attach the sync bridge so mutations push state updates to live
    /// peers.
    pub fn with_bridge(mut self, bridge: Arc<SyncBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    fn require_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        Ok(())
    }

    /// create a backbone.
    pub async fn create_backbone(&self, name: &str, management: bool) -> Result<Backbone> {
        Self::require_name(name)?;
        let txn = self.db.begin().await?;
        if management {
            let existing = ops::list_backbones(&txn).await?;
            if existing.iter().any(|b| b.management) {
                return Err(Error::Conflict(
                    "a management backbone already exists".to_string(),
                ));
            }
        }
        let mut backbone = Backbone::new(name.to_string());
        backbone.management = management;
        let backbone = ops::insert_backbone(&txn, &backbone).await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;
        info!(backbone = %backbone.id, name, "backbone created");
        Ok(backbone)
    }

    /// delete a backbone. refused while it still has sites.
    pub async fn delete_backbone(&self, id: BackboneId) -> Result<()> {
        let txn = self.db.begin().await?;
        ops::delete_backbone(&txn, id).await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;
        Ok(())
    }

    /// create an interior site on a backbone.
    pub async fn create_site(
        &self,
        backbone: BackboneId,
        name: &str,
        platform: &str,
    ) -> Result<skyway_types::InteriorSite> {
        Self::require_name(name)?;
        platform
            .parse::<skyway_render::Platform>()
            .map_err(Error::Validation)?;

        let txn = self.db.begin().await?;
        ops::get_backbone(&txn, backbone)
            .await?
            .ok_or_else(|| Error::NotFound(format!("backbone {backbone}")))?;
        let site = ops::insert_site(
            &txn,
            &skyway_types::InteriorSite::new(name.to_string(), backbone, platform.to_string()),
        )
        .await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;
        info!(site = %site.id, name, "interior site created");
        Ok(site)
    }

    /// delete an interior site.
    pub async fn delete_site(&self, id: SiteId) -> Result<()> {
        let txn = self.db.begin().await?;
        ops::get_site(&txn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("interior site {id}")))?;
        ops::delete_site(&txn, id).await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;
        Ok(())
    }

    /// create an access point on a site. starts `partial` until its
    /// host/port are known.
    pub async fn create_access_point(
        &self,
        site: SiteId,
        name: &str,
        kind: AccessPointKind,
    ) -> Result<BackboneAccessPoint> {
        Self::require_name(name)?;
        let txn = self.db.begin().await?;
        ops::get_site(&txn, site)
            .await?
            .ok_or_else(|| Error::NotFound(format!("interior site {site}")))?;
        let ap = ops::insert_access_point(
            &txn,
            &BackboneAccessPoint::new(name.to_string(), site, kind),
        )
        .await?;
        if kind == AccessPointKind::Manage {
            deploy_state::manage_access_changed(&txn, site).await?;
        }
        txn.commit().await.map_err(skyway_db::Error::from)?;
        info!(access_point = %ap.id, site = %site, kind = %kind, "access point created");
        Ok(ap)
    }

    /// delete an access point. the backbone-link manager drops any
    /// session through it on its next reconcile cycle.
    pub async fn delete_access_point(&self, id: AccessPointId) -> Result<()> {
        let txn = self.db.begin().await?;
        let ap = ops::get_access_point(&txn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("access point {id}")))?;
        ops::delete_access_point(&txn, id).await?;
        if ap.kind == AccessPointKind::Manage {
            deploy_state::manage_access_changed(&txn, ap.site).await?;
        }
        txn.commit().await.map_err(skyway_db::Error::from)?;
        Ok(())
    }

    /// supply an access point's externally reachable host and port,
    /// promoting it from `partial` to `new`. returns whether the
    /// promotion happened (false when the access point is past
    /// `partial`; re-issuing on later ingress changes is out of scope).
    pub async fn set_ingress(&self, id: AccessPointId, host: &str, port: &str) -> Result<bool> {
        if host.is_empty() || port.is_empty() {
            return Err(Error::Validation("host and port are required".to_string()));
        }
        let txn = self.db.begin().await?;
        ops::get_access_point(&txn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("access point {id}")))?;
        let promoted = ops::promote_access_point(&txn, id, host, port).await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;

        if let Some(bridge) = &self.bridge {
            bridge.site_ingress_changed(id).await;
            bridge.new_ingress_available();
        }
        Ok(promoted)
    }

    /// create an inter-router link from a site to a `peer`-kind access
    /// point on another site of the same backbone.
    pub async fn create_inter_router_link(
        &self,
        connecting_site: SiteId,
        access_point: AccessPointId,
        cost: i64,
    ) -> Result<InterRouterLink> {
        let txn = self.db.begin().await?;
        let ap = ops::get_access_point(&txn, access_point)
            .await?
            .ok_or_else(|| Error::NotFound(format!("access point {access_point}")))?;
        if ap.kind != AccessPointKind::Peer {
            return Err(Error::Validation(format!(
                "inter-router links require a peer access point, not {}",
                ap.kind
            )));
        }
        let source = ops::get_site(&txn, connecting_site)
            .await?
            .ok_or_else(|| Error::NotFound(format!("interior site {connecting_site}")))?;
        let target = ops::get_site(&txn, ap.site)
            .await?
            .ok_or_else(|| Error::NotFound(format!("interior site {}", ap.site)))?;
        if source.backbone != target.backbone {
            return Err(Error::Validation(
                "inter-router links must stay within one backbone".to_string(),
            ));
        }

        let link = ops::insert_inter_router_link(
            &txn,
            &InterRouterLink {
                id: LinkId(0),
                access_point,
                connecting_site,
                cost,
            },
        )
        .await?;
        deploy_state::link_changed(&txn, connecting_site).await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;

        if let Some(bridge) = &self.bridge {
            bridge.link_changed(&link).await;
        }
        info!(link = %link.id, from = %connecting_site, to = %access_point, "inter-router link created");
        Ok(link)
    }

    /// delete an inter-router link.
    pub async fn delete_inter_router_link(&self, id: LinkId) -> Result<()> {
        let txn = self.db.begin().await?;
        let link = ops::get_inter_router_link(&txn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("link {id}")))?;
        ops::delete_inter_router_link(&txn, id).await?;
        deploy_state::link_changed(&txn, link.connecting_site).await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;

        if let Some(bridge) = &self.bridge {
            bridge.link_deleted(&link).await;
        }
        Ok(())
    }

    /// create an application network on a backbone.
    pub async fn create_van(&self, backbone: BackboneId, name: &str) -> Result<ApplicationNetwork> {
        Self::require_name(name)?;
        let txn = self.db.begin().await?;
        ops::get_backbone(&txn, backbone)
            .await?
            .ok_or_else(|| Error::NotFound(format!("backbone {backbone}")))?;
        let van_id = format!("van-{:08x}", rand::rng().random::<u32>());
        let van = ops::insert_van(
            &txn,
            &ApplicationNetwork::new(name.to_string(), van_id, backbone),
        )
        .await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;
        info!(van = %van.id, name, "application network created");
        Ok(van)
    }

    /// delete an application network. refused while member sites remain.
    pub async fn delete_van(&self, id: VanId) -> Result<()> {
        let txn = self.db.begin().await?;
        ops::delete_van(&txn, id).await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;
        Ok(())
    }

    /// create a member invitation and its edge links.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_invitation(
        &self,
        van: VanId,
        name: &str,
        claim_access: AccessPointId,
        member_access: &[(AccessPointId, i64)],
        deadline: Option<DateTime<Utc>>,
        member_classes: Vec<String>,
        instance_limit: Option<i64>,
        member_name_prefix: Option<String>,
    ) -> Result<(MemberInvitation, Vec<EdgeLink>)> {
        Self::require_name(name)?;
        let txn = self.db.begin().await?;
        ops::get_van(&txn, van)
            .await?
            .ok_or_else(|| Error::NotFound(format!("application network {van}")))?;

        let claim_ap = ops::get_access_point(&txn, claim_access)
            .await?
            .ok_or_else(|| Error::NotFound(format!("access point {claim_access}")))?;
        if claim_ap.kind != AccessPointKind::Claim {
            return Err(Error::Validation(format!(
                "invitations are redeemed through a claim access point, not {}",
                claim_ap.kind
            )));
        }

        let mut invitation = MemberInvitation::new(name.to_string(), van, claim_access);
        invitation.deadline = deadline;
        invitation.member_classes = member_classes;
        invitation.instance_limit = instance_limit;
        invitation.member_name_prefix = member_name_prefix;
        let invitation = ops::insert_invitation(&txn, &invitation).await?;

        let mut edge_links = Vec::new();
        for (access_point, priority) in member_access {
            let ap = ops::get_access_point(&txn, *access_point)
                .await?
                .ok_or_else(|| Error::NotFound(format!("access point {access_point}")))?;
            if ap.kind != AccessPointKind::Member {
                return Err(Error::Validation(format!(
                    "edge links require a member access point, not {}",
                    ap.kind
                )));
            }
            let edge = ops::insert_edge_link(
                &txn,
                &EdgeLink {
                    id: EdgeLinkId(0),
                    access_point: *access_point,
                    invitation: invitation.id,
                    priority: *priority,
                },
            )
            .await?;
            edge_links.push(edge);
        }

        txn.commit().await.map_err(skyway_db::Error::from)?;
        info!(invitation = %invitation.id, name, edges = edge_links.len(), "invitation created");
        Ok((invitation, edge_links))
    }

    /// delete an invitation.
    pub async fn delete_invitation(&self, id: InvitationId) -> Result<()> {
        let txn = self.db.begin().await?;
        ops::get_invitation(&txn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("invitation {id}")))?;
        ops::delete_invitation(&txn, id).await?;
        txn.commit().await.map_err(skyway_db::Error::from)?;
        Ok(())
    }

    /// deploy an application to a VAN and push the refreshed application
    /// state to every affected live member.
    pub async fn deploy_application(
        &self,
        compose: &ComposeEngine,
        application: skyway_types::ApplicationId,
        van: VanId,
    ) -> Result<Vec<skyway_types::MemberId>> {
        ops::get_van(self.db.conn(), van)
            .await?
            .ok_or_else(|| Error::NotFound(format!("application network {van}")))?;

        let affected = compose.deploy_application(application, van).await?;
        if let Some(bridge) = &self.bridge {
            for member in &affected {
                bridge.member_app_state_changed(*member).await;
            }
        }
        Ok(affected)
    }
}
