//! instance-block entity: the instantiation of a library block within an
//! application.

use sea_orm::entity::prelude::*;

/// instance-block database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "instance_blocks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: i64,
    /// slash-separated instance path from the application root.
    pub path: String,
    pub library_block_id: i64,
    /// json-serialized configuration overlay.
    #[sea_orm(column_type = "Text")]
    pub config: String,
    /// set during derivative generation for independently allocated blocks.
    pub allocate_to_site: bool,
    /// json-serialized site classes this instance deploys to.
    #[sea_orm(column_type = "Text")]
    pub site_classes: String,
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
        belongs_to = "super::library_block::Entity",
        from = "Column::LibraryBlockId",
        to = "super::library_block::Column::Id"
    )]
    LibraryBlock,
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Application.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
