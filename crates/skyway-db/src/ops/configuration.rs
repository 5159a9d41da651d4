//! controller-wide configuration values.

use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use crate::Result;
use crate::entity::configuration;

/// read one configuration value.
pub async fn get_config_value<C: ConnectionTrait>(conn: &C, key: &str) -> Result<Option<String>> {
    let model = configuration::Entity::find_by_id(key).one(conn).await?;
    Ok(model.map(|m| m.value))
}

/// write one configuration value, inserting or updating.
pub async fn set_config_value<C: ConnectionTrait>(conn: &C, key: &str, value: &str) -> Result<()> {
    let updated = configuration::Entity::update_many()
        .col_expr(configuration::Column::Value, Expr::value(value))
        .filter(configuration::Column::Key.eq(key))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        let model = configuration::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
        };
        model.insert(conn).await?;
    }
    Ok(())
}
