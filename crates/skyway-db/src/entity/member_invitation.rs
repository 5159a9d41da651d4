//! member-invitation entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{AccessPointId, CertificateId, ClaimToken, InvitationId, MemberInvitation, VanId};

/// member-invitation database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "member_invitations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub van_id: i64,
    pub lifecycle: String,
    pub certificate_id: Option<i64>,
    pub claim_access_id: i64,
    pub claim_token: String,
    pub deadline: Option<DateTime<Utc>>,
    /// json-serialized vec<string>
    #[sea_orm(column_type = "Text")]
    pub member_classes: String,
    pub instance_limit: Option<i64>,
    pub instance_count: i64,
    pub member_name_prefix: Option<String>,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::application_network::Entity",
        from = "Column::VanId",
        to = "super::application_network::Column::Id"
    )]
    Van,
    #[sea_orm(has_many = "super::edge_link::Entity")]
    EdgeLinks,
    #[sea_orm(has_many = "super::member_site::Entity")]
    MemberSites,
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for MemberInvitation {
    type Error = crate::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let member_classes: Vec<String> = serde_json::from_str(&model.member_classes)?;
        let claim_token = ClaimToken::new(model.claim_token)
            .map_err(|e| crate::Error::InvalidData(e.to_string()))?;

        Ok(MemberInvitation {
            id: InvitationId(model.id),
            name: model.name,
            van: VanId(model.van_id),
            lifecycle: model.lifecycle.parse()?,
            certificate: model.certificate_id.map(CertificateId),
            claim_access: AccessPointId(model.claim_access_id),
            claim_token,
            deadline: model.deadline,
            member_classes,
            instance_limit: model.instance_limit,
            instance_count: model.instance_count,
            member_name_prefix: model.member_name_prefix,
            failure: model.failure,
            created_at: model.created_at,
        })
    }
}

impl From<&MemberInvitation> for ActiveModel {
    fn from(invitation: &MemberInvitation) -> Self {
        let member_classes = serde_json::to_string(&invitation.member_classes)
            .unwrap_or_else(|_| "[]".to_string());

        ActiveModel {
            id: if invitation.id.0 == 0 {
                NotSet
            } else {
                Set(invitation.id.0)
            },
            name: Set(invitation.name.clone()),
            van_id: Set(invitation.van.0),
            lifecycle: Set(invitation.lifecycle.as_str().to_string()),
            certificate_id: Set(invitation.certificate.map(|c| c.0)),
            claim_access_id: Set(invitation.claim_access.0),
            claim_token: Set(invitation.claim_token.as_str().to_string()),
            deadline: Set(invitation.deadline),
            member_classes: Set(member_classes),
            instance_limit: Set(invitation.instance_limit),
            instance_count: Set(invitation.instance_count),
            member_name_prefix: Set(invitation.member_name_prefix.clone()),
            failure: Set(invitation.failure.clone()),
            created_at: Set(invitation.created_at),
        }
    }
}
