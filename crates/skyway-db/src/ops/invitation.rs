//! member-invitation operations.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter,
    QuerySelect, RelationTrait,
};

use skyway_types::{CertificateId, InvitationId, Lifecycle, MemberInvitation, VanId};

use crate::Result;
use crate::entity::{application_network, member_invitation};

/// insert an invitation row. returns the stored row with its assigned id.
pub async fn insert_invitation<C: ConnectionTrait>(
    conn: &C,
    row: &MemberInvitation,
) -> Result<MemberInvitation> {
    let model: member_invitation::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get an invitation by id.
pub async fn get_invitation<C: ConnectionTrait>(
    conn: &C,
    id: InvitationId,
) -> Result<Option<MemberInvitation>> {
    let model = member_invitation::Entity::find_by_id(id.0).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// get an invitation by its claim token.
pub async fn get_invitation_by_token<C: ConnectionTrait>(
    conn: &C,
    token: &str,
) -> Result<Option<MemberInvitation>> {
    let model = member_invitation::Entity::find()
        .filter(member_invitation::Column::ClaimToken.eq(token))
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// list a VAN's invitations.
pub async fn list_invitations<C: ConnectionTrait>(
    conn: &C,
    van_id: VanId,
) -> Result<Vec<MemberInvitation>> {
    let models = member_invitation::Entity::find()
        .filter(member_invitation::Column::VanId.eq(van_id.0))
        .all(conn)
        .await?;
    models.into_iter().map(TryInto::try_into).collect()
}

/// delete an invitation.
pub async fn delete_invitation<C: ConnectionTrait>(conn: &C, id: InvitationId) -> Result<()> {
    member_invitation::Entity::delete_by_id(id.0).exec(conn).await?;
    Ok(())
}

/// select one invitation awaiting its claim credential whose VAN is ready.
pub async fn pick_new_invitation<C: ConnectionTrait>(
    conn: &C,
) -> Result<Option<MemberInvitation>> {
    let model = member_invitation::Entity::find()
        .filter(member_invitation::Column::Lifecycle.eq(Lifecycle::New.as_str()))
        .join(JoinType::InnerJoin, member_invitation::Relation::Van.def())
        .filter(application_network::Column::Lifecycle.eq(Lifecycle::Ready.as_str()))
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// advance an invitation's lifecycle.
pub async fn set_invitation_lifecycle<C: ConnectionTrait>(
    conn: &C,
    id: InvitationId,
    lifecycle: Lifecycle,
) -> Result<()> {
    member_invitation::Entity::update_many()
        .col_expr(
            member_invitation::Column::Lifecycle,
            Expr::value(lifecycle.as_str()),
        )
        .filter(member_invitation::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// mark an invitation ready with its issued claim credential.
pub async fn finalize_invitation<C: ConnectionTrait>(
    conn: &C,
    id: InvitationId,
    certificate: CertificateId,
) -> Result<()> {
    member_invitation::Entity::update_many()
        .col_expr(
            member_invitation::Column::Lifecycle,
            Expr::value(Lifecycle::Ready.as_str()),
        )
        .col_expr(
            member_invitation::Column::CertificateId,
            Expr::value(certificate.0),
        )
        .filter(member_invitation::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// record an invitation's redeemed-instance count.
pub async fn set_invitation_instance_count<C: ConnectionTrait>(
    conn: &C,
    id: InvitationId,
    count: i64,
) -> Result<()> {
    member_invitation::Entity::update_many()
        .col_expr(member_invitation::Column::InstanceCount, Expr::value(count))
        .filter(member_invitation::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}
