//! backbone access-point entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{AccessPointId, BackboneAccessPoint, CertificateId, SiteId};

/// access-point database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "backbone_access_points")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub site_id: i64,
    pub kind: String,
    pub lifecycle: String,
    pub certificate_id: Option<i64>,
    pub hostname: Option<String>,
    pub port: Option<String>,
    pub bind_host: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::interior_site::Entity",
        from = "Column::SiteId",
        to = "super::interior_site::Column::Id"
    )]
    Site,
}

impl Related<super::interior_site::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Site.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for BackboneAccessPoint {
    type Error = crate::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(BackboneAccessPoint {
            id: AccessPointId(model.id),
            name: model.name,
            site: SiteId(model.site_id),
            kind: model.kind.parse()?,
            lifecycle: model.lifecycle.parse()?,
            certificate: model.certificate_id.map(CertificateId),
            hostname: model.hostname,
            port: model.port,
            bind_host: model.bind_host,
            created_at: model.created_at,
        })
    }
}

impl From<&BackboneAccessPoint> for ActiveModel {
    fn from(ap: &BackboneAccessPoint) -> Self {
        ActiveModel {
            id: if ap.id.0 == 0 { NotSet } else { Set(ap.id.0) },
            name: Set(ap.name.clone()),
            site_id: Set(ap.site.0),
            kind: Set(ap.kind.as_str().to_string()),
            lifecycle: Set(ap.lifecycle.as_str().to_string()),
            certificate_id: Set(ap.certificate.map(|c| c.0)),
            hostname: Set(ap.hostname.clone()),
            port: Set(ap.port.clone()),
            bind_host: Set(ap.bind_host.clone()),
            created_at: Set(ap.created_at),
        }
    }
}
