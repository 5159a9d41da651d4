//! deployed-application entity: an application rolled out to a VAN.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// deployed-application database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "deployed_applications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: i64,
    pub van_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::application::Entity",
        from = "Column::ApplicationId",
        to = "super::application::Column::Id"
    )]
    Application,
    #[sea_orm(
        belongs_to = "super::application_network::Entity",
        from = "Column::VanId",
        to = "super::application_network::Column::Id"
    )]
    Van,
}

impl ActiveModelBehavior for ActiveModel {}
