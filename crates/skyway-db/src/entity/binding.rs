//! binding entity: a north/south pairing of two instance interfaces.

use sea_orm::entity::prelude::*;

/// binding database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "bindings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: i64,
    /// interface role shared by both ends.
    pub role: String,
    pub north_instance_id: i64,
    pub north_interface: String,
    pub south_instance_id: i64,
    pub south_interface: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::application::Entity",
        from = "Column::ApplicationId",
        to = "super::application::Column::Id"
    )]
    Application,
}

impl ActiveModelBehavior for ActiveModel {}
