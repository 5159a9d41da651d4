//! application-composition operations.
//!
//! the compose engine owns the json shapes stored in `interfaces`, `body`,
//! and `config`; this module stores and retrieves them as [`serde_json::Value`].

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::Value;

use skyway_types::{ApplicationId, InstanceId, MemberId, VanId};

use crate::Result;
use crate::entity::{
    application, binding, block_type, deployed_application, instance_block, library_block,
    site_data, target_platform,
};

/// one row of the block-types table.
#[derive(Debug, Clone)]
pub struct BlockTypeRow {
    /// type name ("component", "connector", ...).
    pub name: String,
    /// whether blocks of this type may declare north interfaces.
    pub allow_north: bool,
    /// whether blocks of this type may declare south interfaces.
    pub allow_south: bool,
    /// allocation mode: "independent" or "none".
    pub allocation: String,
}

/// get one block type by name.
pub async fn get_block_type<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<BlockTypeRow>> {
    let model = block_type::Entity::find_by_id(name).one(conn).await?;
    Ok(model.map(|m| BlockTypeRow {
        name: m.name,
        allow_north: m.allow_north,
        allow_south: m.allow_south,
        allocation: m.allocation,
    }))
}

/// one row of the target-platforms table.
#[derive(Debug, Clone)]
pub struct TargetPlatformRow {
    /// platform name.
    pub name: String,
    /// whether the platform runs the dataplane sidecar.
    pub dataplane: bool,
}

/// list the known target platforms.
pub async fn list_target_platforms<C: ConnectionTrait>(conn: &C) -> Result<Vec<TargetPlatformRow>> {
    let models = target_platform::Entity::find().all(conn).await?;
    Ok(models
        .into_iter()
        .map(|m| TargetPlatformRow {
            name: m.name,
            dataplane: m.dataplane,
        })
        .collect())
}

/// one revision of a library block.
#[derive(Debug, Clone)]
pub struct LibraryBlockRow {
    /// row id.
    pub id: i64,
    /// block name.
    pub name: String,
    /// revision number; (name, revision) is unique.
    pub revision: i64,
    /// block type name.
    pub block_type: String,
    /// interface declarations, as json.
    pub interfaces: Value,
    /// block body (simple template list or composite children), as json.
    pub body: Value,
    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<library_block::Model> for LibraryBlockRow {
    type Error = crate::Error;

    fn try_from(model: library_block::Model) -> Result<Self> {
        Ok(LibraryBlockRow {
            id: model.id,
            name: model.name,
            revision: model.revision,
            block_type: model.block_type,
            interfaces: serde_json::from_str(&model.interfaces)?,
            body: serde_json::from_str(&model.body)?,
            created_at: model.created_at,
        })
    }
}

/// insert a library-block revision.
pub async fn insert_library_block<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    revision: i64,
    block_type: &str,
    interfaces: &Value,
    body: &Value,
) -> Result<LibraryBlockRow> {
    let model = library_block::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        revision: Set(revision),
        block_type: Set(block_type.to_string()),
        interfaces: Set(interfaces.to_string()),
        body: Set(body.to_string()),
        created_at: Set(Utc::now()),
    };
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get a library block by row id.
pub async fn get_library_block<C: ConnectionTrait>(
    conn: &C,
    id: i64,
) -> Result<Option<LibraryBlockRow>> {
    let model = library_block::Entity::find_by_id(id).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// get the latest revision of a named library block.
pub async fn get_library_block_latest<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<LibraryBlockRow>> {
    let model = library_block::Entity::find()
        .filter(library_block::Column::Name.eq(name))
        .order_by_desc(library_block::Column::Revision)
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// one application row.
#[derive(Debug, Clone)]
pub struct ApplicationRow {
    /// row id.
    pub id: ApplicationId,
    /// application name.
    pub name: String,
    /// root library-block name.
    pub root_block: String,
    /// lifecycle string ("new", "built", "build-warnings", ...).
    pub lifecycle: String,
    /// build/deploy log lines.
    pub build_log: Vec<String>,
    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<application::Model> for ApplicationRow {
    type Error = crate::Error;

    fn try_from(model: application::Model) -> Result<Self> {
        Ok(ApplicationRow {
            id: ApplicationId(model.id),
            name: model.name,
            root_block: model.root_block,
            lifecycle: model.lifecycle,
            build_log: serde_json::from_str(&model.build_log)?,
            created_at: model.created_at,
        })
    }
}

/// insert an application.
pub async fn insert_application<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    root_block: &str,
) -> Result<ApplicationRow> {
    let model = application::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        root_block: Set(root_block.to_string()),
        lifecycle: Set("new".to_string()),
        build_log: Set("[]".to_string()),
        created_at: Set(Utc::now()),
    };
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get an application by id.
pub async fn get_application<C: ConnectionTrait>(
    conn: &C,
    id: ApplicationId,
) -> Result<Option<ApplicationRow>> {
    let model = application::Entity::find_by_id(id.0).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// delete an application and its derived rows.
pub async fn delete_application<C: ConnectionTrait>(conn: &C, id: ApplicationId) -> Result<()> {
    application::Entity::delete_by_id(id.0).exec(conn).await?;
    Ok(())
}

/// record an application's build/deploy outcome.
pub async fn set_application_outcome<C: ConnectionTrait>(
    conn: &C,
    id: ApplicationId,
    lifecycle: &str,
    log: &[String],
) -> Result<()> {
    let log_json = serde_json::to_string(log).unwrap_or_else(|_| "[]".to_string());
    application::Entity::update_many()
        .col_expr(application::Column::Lifecycle, Expr::value(lifecycle))
        .col_expr(application::Column::BuildLog, Expr::value(log_json))
        .filter(application::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// one instance-block row.
#[derive(Debug, Clone)]
pub struct InstanceRow {
    /// row id.
    pub id: InstanceId,
    /// owning application.
    pub application: ApplicationId,
    /// slash-separated path from the application root.
    pub path: String,
    /// the instantiated library-block row id.
    pub library_block: i64,
    /// configuration overlay, as json.
    pub config: Value,
    /// whether derivative generation allocated this instance to sites.
    pub allocate_to_site: bool,
    /// site classes the instance deploys to.
    pub site_classes: Vec<String>,
}

impl TryFrom<instance_block::Model> for InstanceRow {
    type Error = crate::Error;

    fn try_from(model: instance_block::Model) -> Result<Self> {
        Ok(InstanceRow {
            id: InstanceId(model.id),
            application: ApplicationId(model.application_id),
            path: model.path,
            library_block: model.library_block_id,
            config: serde_json::from_str(&model.config)?,
            allocate_to_site: model.allocate_to_site,
            site_classes: serde_json::from_str(&model.site_classes)?,
        })
    }
}

/// insert an instance block.
pub async fn insert_instance<C: ConnectionTrait>(
    conn: &C,
    application: ApplicationId,
    path: &str,
    library_block: i64,
    config: &Value,
) -> Result<InstanceRow> {
    let model = instance_block::ActiveModel {
        id: NotSet,
        application_id: Set(application.0),
        path: Set(path.to_string()),
        library_block_id: Set(library_block),
        config: Set(config.to_string()),
        allocate_to_site: Set(false),
        site_classes: Set("[]".to_string()),
    };
    let result = model.insert(conn).await?;
    result.try_into()
}

/// list an application's instance blocks.
pub async fn list_instances<C: ConnectionTrait>(
    conn: &C,
    application: ApplicationId,
) -> Result<Vec<InstanceRow>> {
    let models = instance_block::Entity::find()
        .filter(instance_block::Column::ApplicationId.eq(application.0))
        .order_by_asc(instance_block::Column::Path)
        .all(conn)
        .await?;
    models.into_iter().map(TryInto::try_into).collect()
}

/// record derivative allocation for an instance.
pub async fn set_instance_allocation<C: ConnectionTrait>(
    conn: &C,
    id: InstanceId,
    allocate_to_site: bool,
    site_classes: &[String],
) -> Result<()> {
    let classes_json = serde_json::to_string(site_classes).unwrap_or_else(|_| "[]".to_string());
    instance_block::Entity::update_many()
        .col_expr(
            instance_block::Column::AllocateToSite,
            Expr::value(allocate_to_site),
        )
        .col_expr(instance_block::Column::SiteClasses, Expr::value(classes_json))
        .filter(instance_block::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// one binding row.
#[derive(Debug, Clone)]
pub struct BindingRow {
    /// row id.
    pub id: i64,
    /// owning application.
    pub application: ApplicationId,
    /// interface role shared by both ends.
    pub role: String,
    /// the north instance.
    pub north_instance: InstanceId,
    /// the north interface name.
    pub north_interface: String,
    /// the south instance.
    pub south_instance: InstanceId,
    /// the south interface name.
    pub south_interface: String,
}

impl From<binding::Model> for BindingRow {
    fn from(model: binding::Model) -> Self {
        BindingRow {
            id: model.id,
            application: ApplicationId(model.application_id),
            role: model.role,
            north_instance: InstanceId(model.north_instance_id),
            north_interface: model.north_interface,
            south_instance: InstanceId(model.south_instance_id),
            south_interface: model.south_interface,
        }
    }
}

/// insert a binding.
pub async fn insert_binding<C: ConnectionTrait>(
    conn: &C,
    application: ApplicationId,
    role: &str,
    north_instance: InstanceId,
    north_interface: &str,
    south_instance: InstanceId,
    south_interface: &str,
) -> Result<BindingRow> {
    let model = binding::ActiveModel {
        id: NotSet,
        application_id: Set(application.0),
        role: Set(role.to_string()),
        north_instance_id: Set(north_instance.0),
        north_interface: Set(north_interface.to_string()),
        south_instance_id: Set(south_instance.0),
        south_interface: Set(south_interface.to_string()),
    };
    let result = model.insert(conn).await?;
    Ok(result.into())
}

/// list an application's bindings.
pub async fn list_bindings<C: ConnectionTrait>(
    conn: &C,
    application: ApplicationId,
) -> Result<Vec<BindingRow>> {
    let models = binding::Entity::find()
        .filter(binding::Column::ApplicationId.eq(application.0))
        .all(conn)
        .await?;
    Ok(models.into_iter().map(Into::into).collect())
}

/// record a deployment of an application to a VAN.
pub async fn insert_deployed_application<C: ConnectionTrait>(
    conn: &C,
    application: ApplicationId,
    van: VanId,
) -> Result<()> {
    let model = deployed_application::ActiveModel {
        id: NotSet,
        application_id: Set(application.0),
        van_id: Set(van.0),
        created_at: Set(Utc::now()),
    };
    model.insert(conn).await?;
    Ok(())
}

/// one site-data row.
#[derive(Debug, Clone)]
pub struct SiteDataRow {
    /// row id.
    pub id: i64,
    /// the member site the data is for.
    pub member: MemberId,
    /// the application that produced it.
    pub application: ApplicationId,
    /// concatenated yaml configuration.
    pub data: String,
    /// content hash of `data`.
    pub hash: String,
}

impl From<site_data::Model> for SiteDataRow {
    fn from(model: site_data::Model) -> Self {
        SiteDataRow {
            id: model.id,
            member: MemberId(model.member_id),
            application: ApplicationId(model.application_id),
            data: model.data,
            hash: model.hash,
        }
    }
}

/// replace a member's site data for one application.
pub async fn replace_site_data<C: ConnectionTrait>(
    conn: &C,
    member: MemberId,
    application: ApplicationId,
    data: &str,
    hash: &str,
) -> Result<SiteDataRow> {
    site_data::Entity::delete_many()
        .filter(site_data::Column::MemberId.eq(member.0))
        .filter(site_data::Column::ApplicationId.eq(application.0))
        .exec(conn)
        .await?;

    let model = site_data::ActiveModel {
        id: NotSet,
        member_id: Set(member.0),
        application_id: Set(application.0),
        data: Set(data.to_string()),
        hash: Set(hash.to_string()),
        created_at: Set(Utc::now()),
    };
    let result = model.insert(conn).await?;
    Ok(result.into())
}

/// list a member's site data rows.
pub async fn list_site_data_for_member<C: ConnectionTrait>(
    conn: &C,
    member: MemberId,
) -> Result<Vec<SiteDataRow>> {
    let models = site_data::Entity::find()
        .filter(site_data::Column::MemberId.eq(member.0))
        .all(conn)
        .await?;
    Ok(models.into_iter().map(Into::into).collect())
}

/// list every site-data row produced by one application.
pub async fn list_site_data_for_application<C: ConnectionTrait>(
    conn: &C,
    application: ApplicationId,
) -> Result<Vec<SiteDataRow>> {
    let models = site_data::Entity::find()
        .filter(site_data::Column::ApplicationId.eq(application.0))
        .all(conn)
        .await?;
    Ok(models.into_iter().map(Into::into).collect())
}
