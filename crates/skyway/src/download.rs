//! site download bundles.
//!
//! assembles the deployable YAML bundle for an interior site from its
//! database rows and cluster secrets, in the fixed document order the
//! render crate enforces. served to operators by the HTTP collaborator.

use skyway_db::{SkywayDb, ops};
use skyway_render::{
    AccessPointParams, BundleParams, LinkParams, Platform, RouterMode, SecretParams, SiteIdentity,
    site_bundle,
};
use skyway_types::{DeploymentState, Lifecycle, SiteId, StateKey};

use crate::cluster::Cluster;
use crate::error::{Error, Result};

/// render the download bundle for an interior site.
///
/// the site must have its credentials issued. `ready-bootstrap` sites
/// additionally get their access-point server secrets, since no deployed
/// neighbor will serve them over the fabric.
pub async fn interior_site_bundle(
    db: &SkywayDb,
    cluster: &dyn Cluster,
    site_id: SiteId,
) -> Result<String> {
    let site = ops::get_site(db.conn(), site_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("interior site {site_id}")))?;
    if !site.lifecycle.is_provisioned() {
        return Err(Error::Validation(format!(
            "site {site_id} credentials are not issued yet"
        )));
    }
    let platform: Platform = site.platform.parse().map_err(Error::Validation)?;

    let identity = SiteIdentity {
        name: site.name.clone(),
        id: site_id.to_string(),
        mode: RouterMode::Interior,
        platform,
        network_id: None,
        tenant_id: None,
    };

    let site_secret = secret_params(
        db,
        cluster,
        site.certificate
            .ok_or_else(|| Error::Internal(format!("provisioned site {site_id} has no credential")))?,
        StateKey::TlsSite(site_id.0).to_string(),
        Some("site".to_string()),
    )
    .await?;

    let mut links = Vec::new();
    for link in ops::list_links_from_site(db.conn(), site_id).await? {
        let Some(ap) = ops::get_access_point(db.conn(), link.access_point).await? else {
            continue;
        };
        let (Some(host), Some(port)) = (ap.hostname, ap.port) else {
            continue;
        };
        links.push(LinkParams {
            id: link.id.to_string(),
            host,
            port,
            cost: link.cost.to_string(),
        });
    }

    let access_points = ops::list_access_points_for_site(db.conn(), site_id).await?;
    let ap_params: Vec<AccessPointParams> = access_points
        .iter()
        .map(|ap| AccessPointParams {
            id: ap.id.to_string(),
            kind: ap.kind.as_str().to_string(),
            bind_host: ap.bind_host.clone(),
        })
        .collect();

    // bootstrap sites carry their server credentials in the bundle
    let mut access_point_secrets = Vec::new();
    if site.deployment_state == DeploymentState::ReadyBootstrap {
        for ap in &access_points {
            if ap.lifecycle != Lifecycle::Ready {
                continue;
            }
            let Some(certificate) = ap.certificate else {
                continue;
            };
            access_point_secrets.push(
                secret_params(
                    db,
                    cluster,
                    certificate,
                    StateKey::TlsServer(ap.id).to_string(),
                    Some("accesspoint".to_string()),
                )
                .await?,
            );
        }
    }

    Ok(site_bundle(&BundleParams {
        site: identity,
        site_secret,
        links,
        access_points: ap_params,
        access_point_secrets,
    })?)
}

async fn secret_params(
    db: &SkywayDb,
    cluster: &dyn Cluster,
    certificate: skyway_types::CertificateId,
    state_key: String,
    inject: Option<String>,
) -> Result<SecretParams> {
    let cert = ops::get_tls_certificate(db.conn(), certificate)
        .await?
        .ok_or_else(|| Error::NotFound(format!("certificate {certificate}")))?;
    let secret = cluster
        .load_secret(&cert.object_name)
        .await?
        .ok_or_else(|| Error::Cluster(format!("secret {} missing", cert.object_name)))?;
    Ok(SecretParams {
        name: cert.object_name,
        state_hash: skyway_render::hash_of_string_map(&secret.data),
        state_key,
        inject,
        data: secret.data,
    })
}
