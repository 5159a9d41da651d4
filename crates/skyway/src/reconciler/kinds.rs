//! per-kind reconciler steps: pick one `new` row, queue a certificate
//! request for it, and advance the row to `skx_cr_created`, all in one
//! transaction.

use sea_orm::ConnectionTrait;

use skyway_db::{SkywayDb, ops};
use skyway_types::{CertRequestKind, CertificateId, CertificateRequest, Lifecycle};

use crate::error::{Error, Result};

/// the entity kinds the certificate reconcilers drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedKind {
    /// the management controller's client credential.
    Controller,
    /// backbone certificate authorities.
    Backbone,
    /// interior-site client credentials.
    Site,
    /// access-point server credentials.
    AccessPoint,
    /// VAN certificate authorities.
    Van,
    /// network credentials for external VAN onboarding.
    NetworkCredential,
    /// invitation claim credentials.
    Invitation,
    /// member-site client credentials.
    Member,
}

impl ManagedKind {
    /// every managed kind, one reconciler loop each.
    pub const ALL: [ManagedKind; 8] = [
        ManagedKind::Controller,
        ManagedKind::Backbone,
        ManagedKind::Site,
        ManagedKind::AccessPoint,
        ManagedKind::Van,
        ManagedKind::NetworkCredential,
        ManagedKind::Invitation,
        ManagedKind::Member,
    ];

    /// loop name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ManagedKind::Controller => "controller",
            ManagedKind::Backbone => "backbone",
            ManagedKind::Site => "site",
            ManagedKind::AccessPoint => "access-point",
            ManagedKind::Van => "van",
            ManagedKind::NetworkCredential => "network-credential",
            ManagedKind::Invitation => "invitation",
            ManagedKind::Member => "member",
        }
    }
}

/// queue a certificate request, honoring any duration override from the
/// configuration table.
async fn queue_request<C: ConnectionTrait>(
    conn: &C,
    kind: CertRequestKind,
    target_id: i64,
    issuer: Option<CertificateId>,
) -> Result<()> {
    let mut request = CertificateRequest::new(kind, target_id, issuer);
    let key = if kind.is_ca() {
        "ca-duration-days"
    } else {
        "cert-duration-days"
    };
    if let Some(days) = ops::get_config_value(conn, key)
        .await?
        .and_then(|v| v.parse().ok())
    {
        request.duration_days = days;
    }
    ops::insert_certificate_request(conn, &request).await?;
    Ok(())
}

/// advance at most one row of the given kind. returns whether progress
/// was made, so the caller can reschedule immediately.
pub async fn advance_one(db: &SkywayDb, kind: ManagedKind) -> Result<bool> {
    let txn = db.begin().await?;

    match kind {
        ManagedKind::Controller => {
            let Some(row) = ops::pick_new_controller(&txn).await? else {
                return Ok(false);
            };
            queue_request(&txn, CertRequestKind::ManagementController, row.id.0, None).await?;
            ops::set_controller_lifecycle(&txn, row.id, Lifecycle::CertRequestCreated).await?;
        }
        ManagedKind::Backbone => {
            let Some(row) = ops::pick_new_backbone(&txn).await? else {
                return Ok(false);
            };
            queue_request(&txn, CertRequestKind::BackboneCa, row.id.0, None).await?;
            ops::set_backbone_lifecycle(&txn, row.id, Lifecycle::CertRequestCreated).await?;
        }
        ManagedKind::Site => {
            let Some(row) = ops::pick_new_site(&txn).await? else {
                return Ok(false);
            };
            let issuer = backbone_ca(&txn, row.backbone).await?;
            queue_request(&txn, CertRequestKind::InteriorSite, row.id.0, Some(issuer)).await?;
            ops::set_site_lifecycle(&txn, row.id, Lifecycle::CertRequestCreated).await?;
        }
        ManagedKind::AccessPoint => {
            let Some(row) = ops::pick_new_access_point(&txn).await? else {
                return Ok(false);
            };
            let site = ops::get_site(&txn, row.site)
                .await?
                .ok_or_else(|| Error::NotFound(format!("interior site {}", row.site)))?;
            let issuer = backbone_ca(&txn, site.backbone).await?;
            queue_request(&txn, CertRequestKind::AccessPoint, row.id.0, Some(issuer)).await?;
            ops::set_access_point_lifecycle(&txn, row.id, Lifecycle::CertRequestCreated).await?;
        }
        ManagedKind::Van => {
            let Some(row) = ops::pick_new_van(&txn).await? else {
                return Ok(false);
            };
            let issuer = backbone_ca(&txn, row.backbone).await?;
            queue_request(&txn, CertRequestKind::VanCa, row.id.0, Some(issuer)).await?;
            ops::set_van_lifecycle(&txn, row.id, Lifecycle::CertRequestCreated).await?;
        }
        ManagedKind::NetworkCredential => {
            let Some(row) = ops::pick_new_network_credential(&txn).await? else {
                return Ok(false);
            };
            let issuer = van_ca(&txn, row.van).await?;
            queue_request(&txn, CertRequestKind::NetworkCredential, row.id.0, Some(issuer)).await?;
            ops::set_network_credential_lifecycle(&txn, row.id, Lifecycle::CertRequestCreated)
                .await?;
        }
        ManagedKind::Invitation => {
            let Some(row) = ops::pick_new_invitation(&txn).await? else {
                return Ok(false);
            };
            let issuer = van_ca(&txn, row.van).await?;
            queue_request(&txn, CertRequestKind::MemberClaim, row.id.0, Some(issuer)).await?;
            ops::set_invitation_lifecycle(&txn, row.id, Lifecycle::CertRequestCreated).await?;
        }
        ManagedKind::Member => {
            let Some(row) = ops::pick_new_member(&txn).await? else {
                return Ok(false);
            };
            let issuer = van_ca(&txn, row.van).await?;
            queue_request(&txn, CertRequestKind::MemberSite, row.id.0, Some(issuer)).await?;
            ops::set_member_lifecycle(&txn, row.id, Lifecycle::CertRequestCreated).await?;
        }
    }

    txn.commit().await.map_err(skyway_db::Error::from)?;
    Ok(true)
}

/// the CA credential of a ready backbone.
async fn backbone_ca<C: ConnectionTrait>(
    conn: &C,
    backbone_id: skyway_types::BackboneId,
) -> Result<CertificateId> {
    let backbone = ops::get_backbone(conn, backbone_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("backbone {backbone_id}")))?;
    backbone
        .certificate
        .ok_or_else(|| Error::Internal(format!("ready backbone {backbone_id} has no CA")))
}

/// the CA credential of a ready VAN.
async fn van_ca<C: ConnectionTrait>(
    conn: &C,
    van_id: skyway_types::VanId,
) -> Result<CertificateId> {
    let van = ops::get_van(conn, van_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("application network {van_id}")))?;
    van.certificate
        .ok_or_else(|| Error::Internal(format!("ready application network {van_id} has no CA")))
}
