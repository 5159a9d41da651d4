//! application-network and network-credential operations.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QuerySelect, RelationTrait,
};

use skyway_types::{
    ApplicationNetwork, BackboneId, CertificateId, CredentialId, Lifecycle, NetworkCredential,
    VanId,
};

use crate::entity::{application_network, backbone, member_site, network_credential};
use crate::{Error, Result};

/// insert a VAN row. returns the stored row with its assigned id.
pub async fn insert_van<C: ConnectionTrait>(
    conn: &C,
    row: &ApplicationNetwork,
) -> Result<ApplicationNetwork> {
    let model: application_network::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get a VAN by id.
pub async fn get_van<C: ConnectionTrait>(conn: &C, id: VanId) -> Result<Option<ApplicationNetwork>> {
    let model = application_network::Entity::find_by_id(id.0).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// list the VANs layered on one backbone.
pub async fn list_vans<C: ConnectionTrait>(
    conn: &C,
    backbone_id: BackboneId,
) -> Result<Vec<ApplicationNetwork>> {
    let models = application_network::Entity::find()
        .filter(application_network::Column::BackboneId.eq(backbone_id.0))
        .all(conn)
        .await?;
    models.into_iter().map(TryInto::try_into).collect()
}

/// delete a VAN. fails with [`Error::Conflict`] while member sites remain.
pub async fn delete_van<C: ConnectionTrait>(conn: &C, id: VanId) -> Result<()> {
    let members = member_site::Entity::find()
        .filter(member_site::Column::VanId.eq(id.0))
        .count(conn)
        .await?;
    if members > 0 {
        return Err(Error::Conflict(format!(
            "application network {id} still has {members} member sites"
        )));
    }
    application_network::Entity::delete_by_id(id.0)
        .exec(conn)
        .await?;
    Ok(())
}

/// select one VAN awaiting a certificate request whose backbone is ready.
pub async fn pick_new_van<C: ConnectionTrait>(conn: &C) -> Result<Option<ApplicationNetwork>> {
    let model = application_network::Entity::find()
        .filter(application_network::Column::Lifecycle.eq(Lifecycle::New.as_str()))
        .join(
            JoinType::InnerJoin,
            application_network::Relation::Backbone.def(),
        )
        .filter(backbone::Column::Lifecycle.eq(Lifecycle::Ready.as_str()))
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// advance a VAN's lifecycle.
pub async fn set_van_lifecycle<C: ConnectionTrait>(
    conn: &C,
    id: VanId,
    lifecycle: Lifecycle,
) -> Result<()> {
    application_network::Entity::update_many()
        .col_expr(
            application_network::Column::Lifecycle,
            Expr::value(lifecycle.as_str()),
        )
        .filter(application_network::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// mark a VAN ready with its issued CA certificate.
pub async fn finalize_van<C: ConnectionTrait>(
    conn: &C,
    id: VanId,
    certificate: CertificateId,
) -> Result<()> {
    application_network::Entity::update_many()
        .col_expr(
            application_network::Column::Lifecycle,
            Expr::value(Lifecycle::Ready.as_str()),
        )
        .col_expr(
            application_network::Column::CertificateId,
            Expr::value(certificate.0),
        )
        .filter(application_network::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// record whether the VAN's addresses are observed on the router network.
pub async fn set_van_connected<C: ConnectionTrait>(
    conn: &C,
    id: VanId,
    connected: bool,
) -> Result<()> {
    application_network::Entity::update_many()
        .col_expr(application_network::Column::Connected, Expr::value(connected))
        .filter(application_network::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// insert a network credential. returns the stored row with its assigned id.
pub async fn insert_network_credential<C: ConnectionTrait>(
    conn: &C,
    row: &NetworkCredential,
) -> Result<NetworkCredential> {
    let model: network_credential::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get a network credential by id.
pub async fn get_network_credential<C: ConnectionTrait>(
    conn: &C,
    id: CredentialId,
) -> Result<Option<NetworkCredential>> {
    let model = network_credential::Entity::find_by_id(id.0).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// select one network credential awaiting a certificate request whose VAN
/// is ready.
pub async fn pick_new_network_credential<C: ConnectionTrait>(
    conn: &C,
) -> Result<Option<NetworkCredential>> {
    let model = network_credential::Entity::find()
        .filter(network_credential::Column::Lifecycle.eq(Lifecycle::New.as_str()))
        .join(JoinType::InnerJoin, network_credential::Relation::Van.def())
        .filter(application_network::Column::Lifecycle.eq(Lifecycle::Ready.as_str()))
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// advance a network credential's lifecycle.
pub async fn set_network_credential_lifecycle<C: ConnectionTrait>(
    conn: &C,
    id: CredentialId,
    lifecycle: Lifecycle,
) -> Result<()> {
    network_credential::Entity::update_many()
        .col_expr(
            network_credential::Column::Lifecycle,
            Expr::value(lifecycle.as_str()),
        )
        .filter(network_credential::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// mark a network credential ready with its issued certificate.
pub async fn finalize_network_credential<C: ConnectionTrait>(
    conn: &C,
    id: CredentialId,
    certificate: CertificateId,
) -> Result<()> {
    network_credential::Entity::update_many()
        .col_expr(
            network_credential::Column::Lifecycle,
            Expr::value(Lifecycle::Ready.as_str()),
        )
        .col_expr(
            network_credential::Column::CertificateId,
            Expr::value(certificate.0),
        )
        .filter(network_credential::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}
