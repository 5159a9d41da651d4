//! application entity: a declarative composition of library blocks.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// application database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "applications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// root library-block name.
    pub root_block: String,
    /// lifecycle: "new", "built", "build-warnings", "build-errors",
    /// "deployed", "deploy-errors".
    pub lifecycle: String,
    /// json-serialized build/deploy log lines.
    #[sea_orm(column_type = "Text")]
    pub build_log: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::instance_block::Entity")]
    InstanceBlocks,
}

impl ActiveModelBehavior for ActiveModel {}
