//! management-controller operations.

use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use skyway_types::{CertificateId, ControllerId, Lifecycle, ManagementController};

use crate::Result;
use crate::entity::management_controller as controller;

/// insert a controller row. returns the stored row with its assigned id.
pub async fn insert_controller<C: ConnectionTrait>(
    conn: &C,
    row: &ManagementController,
) -> Result<ManagementController> {
    let model: controller::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get a controller by id.
pub async fn get_controller<C: ConnectionTrait>(
    conn: &C,
    id: ControllerId,
) -> Result<Option<ManagementController>> {
    let model = controller::Entity::find_by_id(id.0).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// get a controller by name.
pub async fn get_controller_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<ManagementController>> {
    let model = controller::Entity::find()
        .filter(controller::Column::Name.eq(name))
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// select one controller awaiting a certificate request.
pub async fn pick_new_controller<C: ConnectionTrait>(
    conn: &C,
) -> Result<Option<ManagementController>> {
    let model = controller::Entity::find()
        .filter(controller::Column::Lifecycle.eq(Lifecycle::New.as_str()))
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// advance a controller's lifecycle.
pub async fn set_controller_lifecycle<C: ConnectionTrait>(
    conn: &C,
    id: ControllerId,
    lifecycle: Lifecycle,
) -> Result<()> {
    controller::Entity::update_many()
        .col_expr(
            controller::Column::Lifecycle,
            Expr::value(lifecycle.as_str()),
        )
        .filter(controller::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// mark a controller ready with its issued certificate.
pub async fn finalize_controller<C: ConnectionTrait>(
    conn: &C,
    id: ControllerId,
    certificate: CertificateId,
) -> Result<()> {
    controller::Entity::update_many()
        .col_expr(
            controller::Column::Lifecycle,
            Expr::value(Lifecycle::Ready.as_str()),
        )
        .col_expr(
            controller::Column::CertificateId,
            Expr::value(certificate.0),
        )
        .filter(controller::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}
