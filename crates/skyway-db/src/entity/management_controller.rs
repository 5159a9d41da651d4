//! management-controller entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{CertificateId, ControllerId, ManagementController};

/// management-controller database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "management_controllers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub lifecycle: String,
    pub certificate_id: Option<i64>,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ManagementController {
    type Error = crate::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(ManagementController {
            id: ControllerId(model.id),
            name: model.name,
            lifecycle: model.lifecycle.parse()?,
            certificate: model.certificate_id.map(CertificateId),
            failure: model.failure,
            created_at: model.created_at,
        })
    }
}

impl From<&ManagementController> for ActiveModel {
    fn from(controller: &ManagementController) -> Self {
        ActiveModel {
            id: if controller.id.0 == 0 {
                NotSet
            } else {
                Set(controller.id.0)
            },
            name: Set(controller.name.clone()),
            lifecycle: Set(controller.lifecycle.as_str().to_string()),
            certificate_id: Set(controller.certificate.map(|c| c.0)),
            failure: Set(controller.failure.clone()),
            created_at: Set(controller.created_at),
        }
    }
}
