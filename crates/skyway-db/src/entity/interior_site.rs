//! interior-site entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{BackboneId, CertificateId, InteriorSite, SiteId};

/// interior-site database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "interior_sites")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub backbone_id: i64,
    pub lifecycle: String,
    pub certificate_id: Option<i64>,
    pub deployment_state: String,
    pub platform: String,
    pub first_active_time: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
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
    #[sea_orm(has_many = "super::access_point::Entity")]
    AccessPoints,
}

impl Related<super::backbone::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Backbone.def()
    }
}

impl Related<super::access_point::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccessPoints.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for InteriorSite {
    type Error = crate::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(InteriorSite {
            id: SiteId(model.id),
            name: model.name,
            backbone: BackboneId(model.backbone_id),
            lifecycle: model.lifecycle.parse()?,
            certificate: model.certificate_id.map(CertificateId),
            deployment_state: model.deployment_state.parse()?,
            platform: model.platform,
            first_active_time: model.first_active_time,
            last_heartbeat: model.last_heartbeat,
            failure: model.failure,
            created_at: model.created_at,
        })
    }
}

impl From<&InteriorSite> for ActiveModel {
    fn from(site: &InteriorSite) -> Self {
        ActiveModel {
            id: if site.id.0 == 0 { NotSet } else { Set(site.id.0) },
            name: Set(site.name.clone()),
            backbone_id: Set(site.backbone.0),
            lifecycle: Set(site.lifecycle.as_str().to_string()),
            certificate_id: Set(site.certificate.map(|c| c.0)),
            deployment_state: Set(site.deployment_state.as_str().to_string()),
            platform: Set(site.platform.clone()),
            first_active_time: Set(site.first_active_time),
            last_heartbeat: Set(site.last_heartbeat),
            failure: Set(site.failure.clone()),
            created_at: Set(site.created_at),
        }
    }
}
