//! finalization: an issued secret arrives and its owning entity becomes
//! `ready`.

use chrono::Utc;
use tracing::{debug, info};

use skyway_db::{SkywayDb, ops};
use skyway_types::{
    AccessPointId, BackboneId, CertRequestId, CertRequestKind, CertificateId, ControllerId,
    CredentialId, InvitationId, MemberId, SiteId, TlsCertificate, VanId,
};

use crate::bridge::SyncBridge;
use crate::claim::ClaimServer;
use crate::cluster::{ANN_ISSUERLINK, Cluster, ClusterObject};
use crate::deploy_state;
use crate::error::{Error, Result};

/// resolve the certificate request named by an issued secret's
/// `skx-dblink` annotation: record the certificate, mark the owner ready,
/// and delete the request. notifications to the sync bridge and the claim
/// server fire only after the transaction commits.
pub async fn handle_issued_secret(
    db: &SkywayDb,
    cluster: &dyn Cluster,
    bridge: &SyncBridge,
    claim: &ClaimServer,
    secret: ClusterObject,
) -> Result<()> {
    let request_id: i64 = secret
        .annotations
        .get(crate::cluster::ANN_DBLINK)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::Validation("secret carries a malformed skx-dblink".to_string()))?;

    // expiration and renewal come from the certificate object's status
    let cert_object = cluster.load_certificate(&secret.name).await?;
    let expiration = cert_object.as_ref().and_then(ClusterObject::status_not_after);
    let renewal_time = cert_object
        .as_ref()
        .and_then(ClusterObject::status_renewal_time);

    let signed_by = match secret.annotations.get(ANN_ISSUERLINK).map(String::as_str) {
        None | Some("root") => None,
        Some(other) => Some(CertificateId(other.parse().map_err(|_| {
            Error::Validation(format!("malformed skx-issuerlink: {other:?}"))
        })?)),
    };

    let txn = db.begin().await?;

    // the request row may already be resolved (duplicate watch event)
    let Some(request) = ops::get_certificate_request(&txn, CertRequestId(request_id)).await? else {
        debug!(request_id, "secret for an already-resolved request; ignoring");
        return Ok(());
    };

    let certificate = ops::insert_tls_certificate(
        &txn,
        &TlsCertificate {
            id: CertificateId(0),
            object_name: secret.name.clone(),
            is_ca: request.kind.is_ca(),
            signed_by,
            expiration,
            renewal_time,
            created_at: Utc::now(),
        },
    )
    .await?;

    match request.kind {
        CertRequestKind::ManagementController => {
            ops::finalize_controller(&txn, ControllerId(request.target_id), certificate.id).await?;
        }
        CertRequestKind::BackboneCa => {
            ops::finalize_backbone(&txn, BackboneId(request.target_id), certificate.id).await?;
        }
        CertRequestKind::InteriorSite => {
            let site_id = SiteId(request.target_id);
            ops::finalize_site(&txn, site_id, certificate.id).await?;
            // the site just became ready; its deployment state may change
            deploy_state::site_lifecycle_changed(&txn, site_id).await?;
        }
        CertRequestKind::AccessPoint => {
            ops::finalize_access_point(&txn, AccessPointId(request.target_id), certificate.id)
                .await?;
        }
        CertRequestKind::VanCa => {
            ops::finalize_van(&txn, VanId(request.target_id), certificate.id).await?;
        }
        CertRequestKind::NetworkCredential => {
            ops::finalize_network_credential(&txn, CredentialId(request.target_id), certificate.id)
                .await?;
        }
        CertRequestKind::MemberClaim => {
            ops::finalize_invitation(&txn, InvitationId(request.target_id), certificate.id).await?;
        }
        CertRequestKind::MemberSite => {
            ops::finalize_member(&txn, MemberId(request.target_id), certificate.id).await?;
        }
    }

    ops::delete_certificate_request(&txn, request.id).await?;
    txn.commit().await.map_err(skyway_db::Error::from)?;

    info!(kind = %request.kind, target_id = request.target_id, secret = %secret.name,
          "credential finalized");

    // a CA credential becomes usable as an issuer
    if request.kind.is_ca() {
        cluster
            .apply_object(ClusterObject::issuer(&secret.name, &secret.name))
            .await?;
    }

    // post-commit notifications
    match request.kind {
        CertRequestKind::InteriorSite => {
            bridge
                .site_certificate_changed(SiteId(request.target_id))
                .await;
        }
        CertRequestKind::AccessPoint => {
            bridge
                .access_certificate_changed(AccessPointId(request.target_id))
                .await;
        }
        CertRequestKind::MemberSite => {
            claim.complete_member(MemberId(request.target_id)).await?;
        }
        _ => {}
    }

    Ok(())
}

/// refresh stored expiration/renewal times as the issuer rotates a
/// certificate object.
pub async fn refresh_certificate_times(db: &SkywayDb, object: &ClusterObject) -> Result<()> {
    let Some(existing) =
        ops::get_tls_certificate_by_object_name(db.conn(), &object.name).await?
    else {
        return Ok(());
    };
    let expiration = object.status_not_after();
    let renewal_time = object.status_renewal_time();
    if expiration == existing.expiration && renewal_time == existing.renewal_time {
        return Ok(());
    }
    ops::refresh_tls_certificate_times(db.conn(), existing.id, expiration, renewal_time).await?;
    Ok(())
}
