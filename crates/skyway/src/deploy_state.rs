//! deployment-state evaluator.
//!
//! decides when an interior site is deployable, and how. evaluated inside
//! the caller's transaction so the decision and the triggering mutation
//! commit together. rules, in order:
//!
//! 1. an `active` site is `deployed`
//! 2. a `ready` site with a link into an already deployed site is
//!    `ready-automatic`
//! 3. a `ready` site with a `manage` access point is `ready-bootstrap`
//! 4. anything else is `not-ready`

use sea_orm::ConnectionTrait;
use tracing::debug;

use skyway_db::ops;
use skyway_types::{AccessPointKind, DeploymentState, Lifecycle, SiteId};

use crate::error::{Error, Result};

/// evaluate one site and persist the result if it changed.
pub async fn evaluate_site<C: ConnectionTrait>(conn: &C, site_id: SiteId) -> Result<DeploymentState> {
    let site = ops::get_site(conn, site_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("interior site {site_id}")))?;

    let state = if site.lifecycle == Lifecycle::Active {
        DeploymentState::Deployed
    } else if site.lifecycle == Lifecycle::Ready {
        if links_to_deployed_site(conn, site_id).await? {
            DeploymentState::ReadyAutomatic
        } else if has_manage_access(conn, site_id).await? {
            DeploymentState::ReadyBootstrap
        } else {
            DeploymentState::NotReady
        }
    } else {
        DeploymentState::NotReady
    };

    // suppress no-op writes
    if state != site.deployment_state {
        debug!(site = %site_id, from = %site.deployment_state, to = %state,
               "deployment state changed");
        ops::set_site_deployment_state(conn, site_id, state).await?;
    }
    Ok(state)
}

/// true when any of the site's outgoing links targets a deployed site.
async fn links_to_deployed_site<C: ConnectionTrait>(conn: &C, site_id: SiteId) -> Result<bool> {
    for link in ops::list_links_from_site(conn, site_id).await? {
        let Some(ap) = ops::get_access_point(conn, link.access_point).await? else {
            continue;
        };
        let Some(target) = ops::get_site(conn, ap.site).await? else {
            continue;
        };
        if target.deployment_state == DeploymentState::Deployed {
            return Ok(true);
        }
    }
    Ok(false)
}

/// true when the site carries a `manage`-kind access point.
async fn has_manage_access<C: ConnectionTrait>(conn: &C, site_id: SiteId) -> Result<bool> {
    let access_points = ops::list_access_points_for_site(conn, site_id).await?;
    Ok(access_points
        .iter()
        .any(|ap| ap.kind == AccessPointKind::Manage))
}

/// re-evaluate after a site's lifecycle changed. when the site becomes
/// `deployed`, every site with a link into it is re-evaluated too, since
/// those sites may now be `ready-automatic`.
pub async fn site_lifecycle_changed<C: ConnectionTrait>(conn: &C, site_id: SiteId) -> Result<()> {
    let state = evaluate_site(conn, site_id).await?;
    if state == DeploymentState::Deployed {
        for link in ops::list_links_into_site(conn, site_id).await? {
            evaluate_site(conn, link.connecting_site).await?;
        }
    }
    Ok(())
}

/// re-evaluate after a link was added or removed on a connecting site.
pub async fn link_changed<C: ConnectionTrait>(conn: &C, connecting_site: SiteId) -> Result<()> {
    evaluate_site(conn, connecting_site).await?;
    Ok(())
}

/// re-evaluate after a `manage` access point was added or removed.
pub async fn manage_access_changed<C: ConnectionTrait>(conn: &C, site_id: SiteId) -> Result<()> {
    evaluate_site(conn, site_id).await?;
    Ok(())
}
