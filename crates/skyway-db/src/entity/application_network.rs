//! application-network (VAN) entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{ApplicationNetwork, BackboneId, CertificateId, VanId};

/// application-network database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "application_networks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub van_id: String,
    pub backbone_id: i64,
    pub lifecycle: String,
    pub certificate_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub connected: bool,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::backbone::Entity",
        from = "Column::BackboneId",
        to = "super::backbone::Column::Id"
    )]
    Backbone,
    #[sea_orm(has_many = "super::member_site::Entity")]
    MemberSites,
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ApplicationNetwork {
    type Error = crate::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(ApplicationNetwork {
            id: VanId(model.id),
            name: model.name,
            van_id: model.van_id,
            backbone: BackboneId(model.backbone_id),
            lifecycle: model.lifecycle.parse()?,
            certificate: model.certificate_id.map(CertificateId),
            start_time: model.start_time,
            end_time: model.end_time,
            connected: model.connected,
            failure: model.failure,
            created_at: model.created_at,
        })
    }
}

impl From<&ApplicationNetwork> for ActiveModel {
    fn from(van: &ApplicationNetwork) -> Self {
        ActiveModel {
            id: if van.id.0 == 0 { NotSet } else { Set(van.id.0) },
            name: Set(van.name.clone()),
            van_id: Set(van.van_id.clone()),
            backbone_id: Set(van.backbone.0),
            lifecycle: Set(van.lifecycle.as_str().to_string()),
            certificate_id: Set(van.certificate.map(|c| c.0)),
            start_time: Set(van.start_time),
            end_time: Set(van.end_time),
            connected: Set(van.connected),
            failure: Set(van.failure.clone()),
            created_at: Set(van.created_at),
        }
    }
}
