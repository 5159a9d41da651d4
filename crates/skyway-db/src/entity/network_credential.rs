//! network-credential entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{CertificateId, CredentialId, NetworkCredential, VanId};

/// network-credential database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "network_credentials")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub van_id: i64,
    pub lifecycle: String,
    pub certificate_id: Option<i64>,
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
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for NetworkCredential {
    type Error = crate::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(NetworkCredential {
            id: CredentialId(model.id),
            name: model.name,
            van: VanId(model.van_id),
            lifecycle: model.lifecycle.parse()?,
            certificate: model.certificate_id.map(CertificateId),
            created_at: model.created_at,
        })
    }
}

impl From<&NetworkCredential> for ActiveModel {
    fn from(credential: &NetworkCredential) -> Self {
        ActiveModel {
            id: if credential.id.0 == 0 {
                NotSet
            } else {
                Set(credential.id.0)
            },
            name: Set(credential.name.clone()),
            van_id: Set(credential.van.0),
            lifecycle: Set(credential.lifecycle.as_str().to_string()),
            certificate_id: Set(credential.certificate.map(|c| c.0)),
            created_at: Set(credential.created_at),
        }
    }
}
