//! edge-link entity for database storage.

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{AccessPointId, EdgeLink, EdgeLinkId, InvitationId};

/// edge-link database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "edge_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub access_point_id: i64,
    pub invitation_id: i64,
    pub priority: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::access_point::Entity",
        from = "Column::AccessPointId",
        to = "super::access_point::Column::Id"
    )]
    AccessPoint,
    #[sea_orm(
        belongs_to = "super::member_invitation::Entity",
        from = "Column::InvitationId",
        to = "super::member_invitation::Column::Id"
    )]
    Invitation,
}

impl Related<super::member_invitation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invitation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for EdgeLink {
    fn from(model: Model) -> Self {
        EdgeLink {
            id: EdgeLinkId(model.id),
            access_point: AccessPointId(model.access_point_id),
            invitation: InvitationId(model.invitation_id),
            priority: model.priority,
        }
    }
}

impl From<&EdgeLink> for ActiveModel {
    fn from(link: &EdgeLink) -> Self {
        ActiveModel {
            id: if link.id.0 == 0 { NotSet } else { Set(link.id.0) },
            access_point_id: Set(link.access_point.0),
            invitation_id: Set(link.invitation.0),
            priority: Set(link.priority),
        }
    }
}
