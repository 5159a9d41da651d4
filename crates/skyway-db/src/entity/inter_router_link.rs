//! inter-router link entity for database storage.

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use skyway_types::{AccessPointId, InterRouterLink, LinkId, SiteId};

/// inter-router link database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "inter_router_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub access_point_id: i64,
    pub connecting_site_id: i64,
    pub cost: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::access_point::Entity",
        from = "Column::AccessPointId",
        to = "super::access_point::Column::Id"
    )]
    AccessPoint,
    #[sea_orm(
        belongs_to = "super::interior_site::Entity",
        from = "Column::ConnectingSiteId",
        to = "super::interior_site::Column::Id"
    )]
    ConnectingSite,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for InterRouterLink {
    fn from(model: Model) -> Self {
        InterRouterLink {
            id: LinkId(model.id),
            access_point: AccessPointId(model.access_point_id),
            connecting_site: SiteId(model.connecting_site_id),
            cost: model.cost,
        }
    }
}

impl From<&InterRouterLink> for ActiveModel {
    fn from(link: &InterRouterLink) -> Self {
        ActiveModel {
            id: if link.id.0 == 0 { NotSet } else { Set(link.id.0) },
            access_point_id: Set(link.access_point.0),
            connecting_site_id: Set(link.connecting_site.0),
            cost: Set(link.cost),
        }
    }
}
