//! member-site operations.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter,
    QuerySelect, RelationTrait,
};

use skyway_types::{CertificateId, Lifecycle, MemberId, MemberSite, VanId};

use crate::Result;
use crate::entity::{application_network, member_site};

/// insert a member-site row. returns the stored row with its assigned id.
pub async fn insert_member<C: ConnectionTrait>(conn: &C, row: &MemberSite) -> Result<MemberSite> {
    let model: member_site::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get a member site by id.
pub async fn get_member<C: ConnectionTrait>(conn: &C, id: MemberId) -> Result<Option<MemberSite>> {
    let model = member_site::Entity::find_by_id(id.0).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// list a VAN's member sites.
pub async fn list_members_for_van<C: ConnectionTrait>(
    conn: &C,
    van_id: VanId,
) -> Result<Vec<MemberSite>> {
    let models = member_site::Entity::find()
        .filter(member_site::Column::VanId.eq(van_id.0))
        .all(conn)
        .await?;
    models.into_iter().map(TryInto::try_into).collect()
}

/// delete a member site.
pub async fn delete_member<C: ConnectionTrait>(conn: &C, id: MemberId) -> Result<()> {
    member_site::Entity::delete_by_id(id.0).exec(conn).await?;
    Ok(())
}

/// select one member site awaiting a certificate whose VAN is ready.
pub async fn pick_new_member<C: ConnectionTrait>(conn: &C) -> Result<Option<MemberSite>> {
    let model = member_site::Entity::find()
        .filter(member_site::Column::Lifecycle.eq(Lifecycle::New.as_str()))
        .join(JoinType::InnerJoin, member_site::Relation::Van.def())
        .filter(application_network::Column::Lifecycle.eq(Lifecycle::Ready.as_str()))
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// advance a member site's lifecycle.
pub async fn set_member_lifecycle<C: ConnectionTrait>(
    conn: &C,
    id: MemberId,
    lifecycle: Lifecycle,
) -> Result<()> {
    member_site::Entity::update_many()
        .col_expr(
            member_site::Column::Lifecycle,
            Expr::value(lifecycle.as_str()),
        )
        .filter(member_site::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// mark a member site ready with its issued client certificate.
pub async fn finalize_member<C: ConnectionTrait>(
    conn: &C,
    id: MemberId,
    certificate: CertificateId,
) -> Result<()> {
    member_site::Entity::update_many()
        .col_expr(
            member_site::Column::Lifecycle,
            Expr::value(Lifecycle::Ready.as_str()),
        )
        .col_expr(member_site::Column::CertificateId, Expr::value(certificate.0))
        .filter(member_site::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// promote a ready member to active on its first heartbeat.
pub async fn set_member_active<C: ConnectionTrait>(conn: &C, id: MemberId) -> Result<()> {
    let now = Utc::now();
    member_site::Entity::update_many()
        .col_expr(
            member_site::Column::Lifecycle,
            Expr::value(Lifecycle::Active.as_str()),
        )
        .col_expr(member_site::Column::FirstActiveTime, Expr::value(now))
        .col_expr(member_site::Column::LastHeartbeat, Expr::value(now))
        .filter(member_site::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// update a member site's last-heartbeat timestamp.
pub async fn touch_member_heartbeat<C: ConnectionTrait>(conn: &C, id: MemberId) -> Result<()> {
    member_site::Entity::update_many()
        .col_expr(member_site::Column::LastHeartbeat, Expr::value(Utc::now()))
        .filter(member_site::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}
