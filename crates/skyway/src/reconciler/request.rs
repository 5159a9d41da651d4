//! the certificate-request loop: turn queued requests into cluster
//! certificate objects.

use std::collections::BTreeMap;

use skyway_db::{SkywayDb, ops};
use skyway_types::CertRequestKind;

use crate::cluster::{ANN_DBLINK, ANN_ISSUERLINK, Cluster, ClusterObject, ROOT_ISSUER};
use crate::error::{Error, Result};
use crate::reconciler::object_name;

/// pop the oldest processable request, create its certificate object, and
/// mark it `cm_cert_created`. returns whether progress was made.
pub async fn process_one_request(db: &SkywayDb, cluster: &dyn Cluster) -> Result<bool> {
    let txn = db.begin().await?;

    let Some(request) = ops::pick_oldest_new_request(&txn).await? else {
        return Ok(false);
    };

    let name = object_name(request.kind, request.target_id);

    // access points get their hostname as a dns name on the server cert
    let dns_names = if request.kind == CertRequestKind::AccessPoint {
        let ap = ops::get_access_point(&txn, skyway_types::AccessPointId(request.target_id))
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("access point {}", request.target_id))
            })?;
        ap.hostname.into_iter().collect()
    } else {
        Vec::new()
    };

    let (issuer_name, issuer_link) = match request.issuer {
        None => (ROOT_ISSUER.to_string(), "root".to_string()),
        Some(cert_id) => {
            let issuer = ops::get_tls_certificate(&txn, cert_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("issuer certificate {cert_id}")))?;
            (issuer.object_name, cert_id.0.to_string())
        }
    };

    let mut annotations = BTreeMap::new();
    annotations.insert(ANN_DBLINK.to_string(), request.id.0.to_string());
    annotations.insert(ANN_ISSUERLINK.to_string(), issuer_link);

    cluster
        .apply_object(ClusterObject::certificate(
            &name,
            request.duration_days,
            dns_names,
            request.kind.is_ca(),
            &issuer_name,
            annotations,
        ))
        .await?;

    ops::set_request_cert_created(&txn, request.id).await?;
    txn.commit().await.map_err(skyway_db::Error::from)?;
    Ok(true)
}
