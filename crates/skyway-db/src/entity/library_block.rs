//! library-block entity: one revision of a named application block.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// library-block database model.
///
/// `interfaces` and `body` are json documents whose shape the compose
/// engine owns: interfaces map names to `{polarity, role, maxBindings?}`,
/// and the body is either a list of templates (simple) or a map of child
/// references plus bindings (composite).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "library_blocks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub revision: i64,
    pub block_type: String,
    /// json-serialized interface declarations
    #[sea_orm(column_type = "Text")]
    pub interfaces: String,
    /// json-serialized block body
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
