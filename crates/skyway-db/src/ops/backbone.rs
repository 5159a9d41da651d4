//! backbone operations.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
};

use skyway_types::{Backbone, BackboneId, CertificateId, Lifecycle};

use crate::entity::{backbone, interior_site};
use crate::{Error, Result};

/// insert a backbone row. returns the stored row with its assigned id.
pub async fn insert_backbone<C: ConnectionTrait>(conn: &C, row: &Backbone) -> Result<Backbone> {
    let model: backbone::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get a backbone by id.
pub async fn get_backbone<C: ConnectionTrait>(
    conn: &C,
    id: BackboneId,
) -> Result<Option<Backbone>> {
    let model = backbone::Entity::find_by_id(id.0).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// list all backbones.
pub async fn list_backbones<C: ConnectionTrait>(conn: &C) -> Result<Vec<Backbone>> {
    let models = backbone::Entity::find().all(conn).await?;
    models.into_iter().map(TryInto::try_into).collect()
}

/// delete a backbone. fails with [`Error::Conflict`] while sites remain.
pub async fn delete_backbone<C: ConnectionTrait>(conn: &C, id: BackboneId) -> Result<()> {
    let sites = interior_site::Entity::find()
        .filter(interior_site::Column::BackboneId.eq(id.0))
        .count(conn)
        .await?;
    if sites > 0 {
        return Err(Error::Conflict(format!(
            "backbone {id} still has {sites} sites"
        )));
    }
    backbone::Entity::delete_by_id(id.0).exec(conn).await?;
    Ok(())
}

/// select one backbone awaiting a certificate request.
pub async fn pick_new_backbone<C: ConnectionTrait>(conn: &C) -> Result<Option<Backbone>> {
    let model = backbone::Entity::find()
        .filter(backbone::Column::Lifecycle.eq(Lifecycle::New.as_str()))
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// advance a backbone's lifecycle.
pub async fn set_backbone_lifecycle<C: ConnectionTrait>(
    conn: &C,
    id: BackboneId,
    lifecycle: Lifecycle,
) -> Result<()> {
    backbone::Entity::update_many()
        .col_expr(backbone::Column::Lifecycle, Expr::value(lifecycle.as_str()))
        .filter(backbone::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// mark a backbone ready with its issued CA certificate.
pub async fn finalize_backbone<C: ConnectionTrait>(
    conn: &C,
    id: BackboneId,
    certificate: CertificateId,
) -> Result<()> {
    backbone::Entity::update_many()
        .col_expr(
            backbone::Column::Lifecycle,
            Expr::value(Lifecycle::Ready.as_str()),
        )
        .col_expr(backbone::Column::CertificateId, Expr::value(certificate.0))
        .filter(backbone::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}
