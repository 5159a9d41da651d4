//! access-point operations.

use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use skyway_types::{
    AccessPointId, AccessPointKind, BackboneAccessPoint, BackboneId, CertificateId, Lifecycle,
    SiteId,
};

use crate::Result;
use crate::entity::{access_point, backbone, interior_site};

/// insert an access-point row. returns the stored row with its assigned id.
pub async fn insert_access_point<C: ConnectionTrait>(
    conn: &C,
    row: &BackboneAccessPoint,
) -> Result<BackboneAccessPoint> {
    let model: access_point::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get an access point by id.
pub async fn get_access_point<C: ConnectionTrait>(
    conn: &C,
    id: AccessPointId,
) -> Result<Option<BackboneAccessPoint>> {
    let model = access_point::Entity::find_by_id(id.0).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// list the access points of one site.
pub async fn list_access_points_for_site<C: ConnectionTrait>(
    conn: &C,
    site_id: SiteId,
) -> Result<Vec<BackboneAccessPoint>> {
    let models = access_point::Entity::find()
        .filter(access_point::Column::SiteId.eq(site_id.0))
        .all(conn)
        .await?;
    models.into_iter().map(TryInto::try_into).collect()
}

/// delete an access point.
pub async fn delete_access_point<C: ConnectionTrait>(conn: &C, id: AccessPointId) -> Result<()> {
    access_point::Entity::delete_by_id(id.0).exec(conn).await?;
    Ok(())
}

/// select one `new` access point whose backbone is ready.
pub async fn pick_new_access_point<C: ConnectionTrait>(
    conn: &C,
) -> Result<Option<BackboneAccessPoint>> {
    // candidate set is small: resolve the backbone lifecycle in a second query
    let candidates = access_point::Entity::find()
        .filter(access_point::Column::Lifecycle.eq(Lifecycle::New.as_str()))
        .find_also_related(interior_site::Entity)
        .all(conn)
        .await?;

    for (ap, site) in candidates {
        let Some(site) = site else { continue };
        let ready = backbone::Entity::find_by_id(site.backbone_id)
            .filter(backbone::Column::Lifecycle.eq(Lifecycle::Ready.as_str()))
            .one(conn)
            .await?
            .is_some();
        if ready {
            return ap.try_into().map(Some);
        }
    }
    Ok(None)
}

/// list every ready `manage`-kind access point on a ready backbone,
/// paired with its backbone id. at most one row per backbone is returned.
pub async fn list_ready_manage_access_points<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<(BackboneAccessPoint, BackboneId)>> {
    let rows = access_point::Entity::find()
        .filter(access_point::Column::Kind.eq(AccessPointKind::Manage.as_str()))
        .filter(access_point::Column::Lifecycle.eq(Lifecycle::Ready.as_str()))
        .find_also_related(interior_site::Entity)
        .all(conn)
        .await?;

    let mut result: Vec<(BackboneAccessPoint, BackboneId)> = Vec::new();
    for (ap, site) in rows {
        let Some(site) = site else { continue };
        let backbone_ready = backbone::Entity::find_by_id(site.backbone_id)
            .filter(backbone::Column::Lifecycle.eq(Lifecycle::Ready.as_str()))
            .one(conn)
            .await?
            .is_some();
        if !backbone_ready {
            continue;
        }
        let backbone_id = BackboneId(site.backbone_id);
        if result.iter().any(|(_, b)| *b == backbone_id) {
            continue;
        }
        result.push((ap.try_into()?, backbone_id));
    }
    Ok(result)
}

/// advance an access point's lifecycle.
pub async fn set_access_point_lifecycle<C: ConnectionTrait>(
    conn: &C,
    id: AccessPointId,
    lifecycle: Lifecycle,
) -> Result<()> {
    access_point::Entity::update_many()
        .col_expr(
            access_point::Column::Lifecycle,
            Expr::value(lifecycle.as_str()),
        )
        .filter(access_point::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// mark an access point ready with its issued server certificate.
pub async fn finalize_access_point<C: ConnectionTrait>(
    conn: &C,
    id: AccessPointId,
    certificate: CertificateId,
) -> Result<()> {
    access_point::Entity::update_many()
        .col_expr(
            access_point::Column::Lifecycle,
            Expr::value(Lifecycle::Ready.as_str()),
        )
        .col_expr(
            access_point::Column::CertificateId,
            Expr::value(certificate.0),
        )
        .filter(access_point::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// record an access point's host/port and promote it from `partial` to
/// `new`. a no-op for access points past `partial`.
pub async fn promote_access_point<C: ConnectionTrait>(
    conn: &C,
    id: AccessPointId,
    hostname: &str,
    port: &str,
) -> Result<bool> {
    let result = access_point::Entity::update_many()
        .col_expr(access_point::Column::Hostname, Expr::value(hostname))
        .col_expr(access_point::Column::Port, Expr::value(port))
        .col_expr(
            access_point::Column::Lifecycle,
            Expr::value(Lifecycle::New.as_str()),
        )
        .filter(access_point::Column::Id.eq(id.0))
        .filter(access_point::Column::Lifecycle.eq(Lifecycle::Partial.as_str()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}
