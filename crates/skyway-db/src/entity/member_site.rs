//! member-site entity for database storage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{CertificateId, InvitationId, MemberId, MemberSite, VanId};

/// member-site database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "member_sites")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub van_id: i64,
    pub invitation_id: i64,
    pub lifecycle: String,
    pub certificate_id: Option<i64>,
    /// json-serialized vec<string>
    #[sea_orm(column_type = "Text")]
    pub site_classes: String,
    /// json-serialized map of template metadata
    #[sea_orm(column_type = "Text")]
    pub metadata: String,
    pub first_active_time: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
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
    #[sea_orm(
        belongs_to = "super::member_invitation::Entity",
        from = "Column::InvitationId",
        to = "super::member_invitation::Column::Id"
    )]
    Invitation,
}

impl Related<super::application_network::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Van.def()
    }
}

impl Related<super::member_invitation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invitation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for MemberSite {
    type Error = crate::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let site_classes: Vec<String> = serde_json::from_str(&model.site_classes)?;
        let metadata: BTreeMap<String, serde_json::Value> = serde_json::from_str(&model.metadata)?;

        Ok(MemberSite {
            id: MemberId(model.id),
            name: model.name,
            van: VanId(model.van_id),
            invitation: InvitationId(model.invitation_id),
            lifecycle: model.lifecycle.parse()?,
            certificate: model.certificate_id.map(CertificateId),
            site_classes,
            metadata,
            first_active_time: model.first_active_time,
            last_heartbeat: model.last_heartbeat,
            failure: model.failure,
            created_at: model.created_at,
        })
    }
}

impl From<&MemberSite> for ActiveModel {
    fn from(member: &MemberSite) -> Self {
        let site_classes =
            serde_json::to_string(&member.site_classes).unwrap_or_else(|_| "[]".to_string());
        let metadata = serde_json::to_string(&member.metadata).unwrap_or_else(|_| "{}".to_string());

        ActiveModel {
            id: if member.id.0 == 0 {
                NotSet
            } else {
                Set(member.id.0)
            },
            name: Set(member.name.clone()),
            van_id: Set(member.van.0),
            invitation_id: Set(member.invitation.0),
            lifecycle: Set(member.lifecycle.as_str().to_string()),
            certificate_id: Set(member.certificate.map(|c| c.0)),
            site_classes: Set(site_classes),
            metadata: Set(metadata),
            first_active_time: Set(member.first_active_time),
            last_heartbeat: Set(member.last_heartbeat),
            failure: Set(member.failure.clone()),
            created_at: Set(member.created_at),
        }
    }
}
