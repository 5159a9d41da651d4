//! backbone entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{Backbone, BackboneId, CertificateId};

/// backbone database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "backbones")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub lifecycle: String,
    pub management: bool,
    pub certificate_id: Option<i64>,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::interior_site::Entity")]
    InteriorSites,
}

impl Related<super::interior_site::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InteriorSites.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Backbone {
    type Error = crate::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Backbone {
            id: BackboneId(model.id),
            name: model.name,
            lifecycle: model.lifecycle.parse()?,
            management: model.management,
            certificate: model.certificate_id.map(CertificateId),
            failure: model.failure,
            created_at: model.created_at,
        })
    }
}

impl From<&Backbone> for ActiveModel {
    fn from(backbone: &Backbone) -> Self {
        ActiveModel {
            id: if backbone.id.0 == 0 {
                NotSet
            } else {
                Set(backbone.id.0)
            },
            name: Set(backbone.name.clone()),
            lifecycle: Set(backbone.lifecycle.as_str().to_string()),
            management: Set(backbone.management),
            certificate_id: Set(backbone.certificate.map(|c| c.0)),
            failure: Set(backbone.failure.clone()),
            created_at: Set(backbone.created_at),
        }
    }
}
