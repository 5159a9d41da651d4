//! block-type entity: the typing rules for library blocks.

use sea_orm::entity::prelude::*;

/// block-type database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "block_types")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    /// whether blocks of this type may declare north-polarity interfaces.
    pub allow_north: bool,
    /// whether blocks of this type may declare south-polarity interfaces.
    pub allow_south: bool,
    /// allocation mode: "independent" or "none".
    pub allocation: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
