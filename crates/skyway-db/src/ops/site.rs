//! interior-site operations.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter,
    QuerySelect, RelationTrait,
};

use skyway_types::{BackboneId, CertificateId, DeploymentState, InteriorSite, Lifecycle, SiteId};

use crate::Result;
use crate::entity::{backbone, interior_site};

/// insert an interior-site row. returns the stored row with its assigned id.
pub async fn insert_site<C: ConnectionTrait>(conn: &C, row: &InteriorSite) -> Result<InteriorSite> {
    let model: interior_site::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get a site by id.
pub async fn get_site<C: ConnectionTrait>(conn: &C, id: SiteId) -> Result<Option<InteriorSite>> {
    let model = interior_site::Entity::find_by_id(id.0).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// list all sites of one backbone.
pub async fn list_sites<C: ConnectionTrait>(
    conn: &C,
    backbone_id: BackboneId,
) -> Result<Vec<InteriorSite>> {
    let models = interior_site::Entity::find()
        .filter(interior_site::Column::BackboneId.eq(backbone_id.0))
        .all(conn)
        .await?;
    models.into_iter().map(TryInto::try_into).collect()
}

/// delete a site.
pub async fn delete_site<C: ConnectionTrait>(conn: &C, id: SiteId) -> Result<()> {
    interior_site::Entity::delete_by_id(id.0).exec(conn).await?;
    Ok(())
}

/// select one site awaiting a certificate request whose backbone is ready.
pub async fn pick_new_site<C: ConnectionTrait>(conn: &C) -> Result<Option<InteriorSite>> {
    let model = interior_site::Entity::find()
        .filter(interior_site::Column::Lifecycle.eq(Lifecycle::New.as_str()))
        .join(JoinType::InnerJoin, interior_site::Relation::Backbone.def())
        .filter(backbone::Column::Lifecycle.eq(Lifecycle::Ready.as_str()))
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// advance a site's lifecycle.
pub async fn set_site_lifecycle<C: ConnectionTrait>(
    conn: &C,
    id: SiteId,
    lifecycle: Lifecycle,
) -> Result<()> {
    interior_site::Entity::update_many()
        .col_expr(
            interior_site::Column::Lifecycle,
            Expr::value(lifecycle.as_str()),
        )
        .filter(interior_site::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// mark a site ready with its issued client certificate.
pub async fn finalize_site<C: ConnectionTrait>(
    conn: &C,
    id: SiteId,
    certificate: CertificateId,
) -> Result<()> {
    interior_site::Entity::update_many()
        .col_expr(
            interior_site::Column::Lifecycle,
            Expr::value(Lifecycle::Ready.as_str()),
        )
        .col_expr(
            interior_site::Column::CertificateId,
            Expr::value(certificate.0),
        )
        .filter(interior_site::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// write a site's deployment state.
pub async fn set_site_deployment_state<C: ConnectionTrait>(
    conn: &C,
    id: SiteId,
    state: DeploymentState,
) -> Result<()> {
    interior_site::Entity::update_many()
        .col_expr(
            interior_site::Column::DeploymentState,
            Expr::value(state.as_str()),
        )
        .filter(interior_site::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// promote a ready site to active on its first heartbeat.
pub async fn set_site_active<C: ConnectionTrait>(conn: &C, id: SiteId) -> Result<()> {
    let now = Utc::now();
    interior_site::Entity::update_many()
        .col_expr(
            interior_site::Column::Lifecycle,
            Expr::value(Lifecycle::Active.as_str()),
        )
        .col_expr(interior_site::Column::FirstActiveTime, Expr::value(now))
        .col_expr(interior_site::Column::LastHeartbeat, Expr::value(now))
        .filter(interior_site::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// update a site's last-heartbeat timestamp.
pub async fn touch_site_heartbeat<C: ConnectionTrait>(conn: &C, id: SiteId) -> Result<()> {
    interior_site::Entity::update_many()
        .col_expr(interior_site::Column::LastHeartbeat, Expr::value(Utc::now()))
        .filter(interior_site::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}
