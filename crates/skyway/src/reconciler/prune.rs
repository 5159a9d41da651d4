//! pruning sweeps.
//!
//! the first sweep deletes controlled cluster objects whose database
//! reference has vanished; the second deletes certificate rows no managed
//! entity references, depth first so leaf CAs are freed last.

use tracing::info;

use skyway_db::{SkywayDb, ops};
use skyway_types::CertRequestId;

use crate::cluster::{ANN_CONTROLLED, ANN_DBLINK, Cluster, KIND_CERTIFICATE, KIND_ISSUER, KIND_SECRET};
use crate::error::Result;

/// delete controlled issuers, certificates, and secrets that no
/// `TlsCertificate` row references. objects still carrying a pending
/// request link are left for finalization.
pub async fn prune_cluster_objects(db: &SkywayDb, cluster: &dyn Cluster) -> Result<()> {
    for kind in [KIND_ISSUER, KIND_CERTIFICATE, KIND_SECRET] {
        for object in cluster.list_objects(kind).await? {
            if object.annotations.get(ANN_CONTROLLED).map(String::as_str) != Some("true") {
                continue;
            }

            // an outstanding request still owns this object
            if let Some(link) = object.annotations.get(ANN_DBLINK)
                && let Ok(request_id) = link.parse::<i64>()
                && ops::get_certificate_request(db.conn(), CertRequestId(request_id))
                    .await?
                    .is_some()
            {
                continue;
            }

            if ops::get_tls_certificate_by_object_name(db.conn(), &object.name)
                .await?
                .is_none()
            {
                info!(kind, name = %object.name, "pruning orphaned cluster object");
                cluster.delete_object(kind, &object.name).await?;
            }
        }
    }
    Ok(())
}

/// delete certificate rows referenced by nothing. removing a child frees
/// its CA on a later pass of the loop, so CAs go last.
pub async fn prune_certificate_rows(db: &SkywayDb) -> Result<()> {
    loop {
        let txn = db.begin().await?;
        let referenced = ops::list_referenced_certificate_ids(&txn).await?;
        let unreferenced: Vec<_> = ops::list_tls_certificates(&txn)
            .await?
            .into_iter()
            .filter(|cert| !referenced.contains(&cert.id.0))
            .collect();
        if unreferenced.is_empty() {
            return Ok(());
        }
        for cert in &unreferenced {
            info!(certificate = %cert.id, object = %cert.object_name,
                  "pruning unreferenced certificate row");
            ops::delete_tls_certificate(&txn, cert.id).await?;
        }
        txn.commit().await.map_err(skyway_db::Error::from)?;
    }
}
