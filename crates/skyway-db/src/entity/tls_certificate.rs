//! tls-certificate entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{CertificateId, TlsCertificate};

/// tls-certificate database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tls_certificates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub object_name: String,
    pub is_ca: bool,
    /// parent CA; null means the external root issuer signed directly.
    pub signed_by: Option<i64>,
    pub expiration: Option<DateTime<Utc>>,
    pub renewal_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for TlsCertificate {
    fn from(model: Model) -> Self {
        TlsCertificate {
            id: CertificateId(model.id),
            object_name: model.object_name,
            is_ca: model.is_ca,
            signed_by: model.signed_by.map(CertificateId),
            expiration: model.expiration,
            renewal_time: model.renewal_time,
            created_at: model.created_at,
        }
    }
}

impl From<&TlsCertificate> for ActiveModel {
    fn from(cert: &TlsCertificate) -> Self {
        ActiveModel {
            id: if cert.id.0 == 0 { NotSet } else { Set(cert.id.0) },
            object_name: Set(cert.object_name.clone()),
            is_ca: Set(cert.is_ca),
            signed_by: Set(cert.signed_by.map(|c| c.0)),
            expiration: Set(cert.expiration),
            renewal_time: Set(cert.renewal_time),
            created_at: Set(cert.created_at),
        }
    }
}
