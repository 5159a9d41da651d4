//! inter-router link and edge-link operations.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use skyway_types::{EdgeLink, EdgeLinkId, InterRouterLink, InvitationId, LinkId, SiteId};

use crate::Result;
use crate::entity::{access_point, edge_link, inter_router_link};

/// insert an inter-router link. returns the stored row with its assigned id.
pub async fn insert_inter_router_link<C: ConnectionTrait>(
    conn: &C,
    row: &InterRouterLink,
) -> Result<InterRouterLink> {
    let model: inter_router_link::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    Ok(result.into())
}

/// get an inter-router link by id.
pub async fn get_inter_router_link<C: ConnectionTrait>(
    conn: &C,
    id: LinkId,
) -> Result<Option<InterRouterLink>> {
    let model = inter_router_link::Entity::find_by_id(id.0).one(conn).await?;
    Ok(model.map(Into::into))
}

/// list the links a site initiates.
pub async fn list_links_from_site<C: ConnectionTrait>(
    conn: &C,
    site_id: SiteId,
) -> Result<Vec<InterRouterLink>> {
    let models = inter_router_link::Entity::find()
        .filter(inter_router_link::Column::ConnectingSiteId.eq(site_id.0))
        .all(conn)
        .await?;
    Ok(models.into_iter().map(Into::into).collect())
}

/// list the links that terminate on one of a site's access points.
pub async fn list_links_into_site<C: ConnectionTrait>(
    conn: &C,
    site_id: SiteId,
) -> Result<Vec<InterRouterLink>> {
    let ap_ids: Vec<i64> = access_point::Entity::find()
        .filter(access_point::Column::SiteId.eq(site_id.0))
        .all(conn)
        .await?
        .into_iter()
        .map(|ap| ap.id)
        .collect();
    if ap_ids.is_empty() {
        return Ok(Vec::new());
    }

    let models = inter_router_link::Entity::find()
        .filter(inter_router_link::Column::AccessPointId.is_in(ap_ids))
        .all(conn)
        .await?;
    Ok(models.into_iter().map(Into::into).collect())
}

/// delete an inter-router link.
pub async fn delete_inter_router_link<C: ConnectionTrait>(conn: &C, id: LinkId) -> Result<()> {
    inter_router_link::Entity::delete_by_id(id.0)
        .exec(conn)
        .await?;
    Ok(())
}

/// insert an edge link. returns the stored row with its assigned id.
pub async fn insert_edge_link<C: ConnectionTrait>(conn: &C, row: &EdgeLink) -> Result<EdgeLink> {
    let model: edge_link::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    Ok(result.into())
}

/// get an edge link by id.
pub async fn get_edge_link<C: ConnectionTrait>(conn: &C, id: EdgeLinkId) -> Result<Option<EdgeLink>> {
    let model = edge_link::Entity::find_by_id(id.0).one(conn).await?;
    Ok(model.map(Into::into))
}

/// list an invitation's edge links in priority order.
pub async fn list_edge_links_for_invitation<C: ConnectionTrait>(
    conn: &C,
    invitation_id: InvitationId,
) -> Result<Vec<EdgeLink>> {
    let models = edge_link::Entity::find()
        .filter(edge_link::Column::InvitationId.eq(invitation_id.0))
        .order_by_asc(edge_link::Column::Priority)
        .all(conn)
        .await?;
    Ok(models.into_iter().map(Into::into).collect())
}

/// delete an edge link.
pub async fn delete_edge_link<C: ConnectionTrait>(conn: &C, id: EdgeLinkId) -> Result<()> {
    edge_link::Entity::delete_by_id(id.0).exec(conn).await?;
    Ok(())
}
