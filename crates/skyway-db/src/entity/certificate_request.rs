//! certificate-request entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{CertRequestId, CertificateId, CertificateRequest};

/// certificate-request database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "certificate_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub kind: String,
    pub lifecycle: String,
    /// the target entity's row id, interpreted per kind.
    pub target_id: i64,
    pub issuer_id: Option<i64>,
    pub duration_days: i64,
    pub request_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for CertificateRequest {
    type Error = crate::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(CertificateRequest {
            id: CertRequestId(model.id),
            kind: model.kind.parse()?,
            lifecycle: model.lifecycle.parse()?,
            target_id: model.target_id,
            issuer: model.issuer_id.map(CertificateId),
            duration_days: model.duration_days,
            request_time: model.request_time,
            created_at: model.created_at,
        })
    }
}

impl From<&CertificateRequest> for ActiveModel {
    fn from(request: &CertificateRequest) -> Self {
        ActiveModel {
            id: if request.id.0 == 0 {
                NotSet
            } else {
                Set(request.id.0)
            },
            kind: Set(request.kind.as_str().to_string()),
            lifecycle: Set(request.lifecycle.as_str().to_string()),
            target_id: Set(request.target_id),
            issuer_id: Set(request.issuer.map(|c| c.0)),
            duration_days: Set(request.duration_days),
            request_time: Set(request.request_time),
            created_at: Set(request.created_at),
        }
    }
}
