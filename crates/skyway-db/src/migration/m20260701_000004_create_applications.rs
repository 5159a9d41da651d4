//! create application-composition tables and seed the static typing rows.

use sea_orm_migration::prelude::*;

use super::m20260701_000003_create_vans::{ApplicationNetworks, MemberSites};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TargetPlatforms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TargetPlatforms::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TargetPlatforms::Dataplane)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BlockTypes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BlockTypes::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BlockTypes::AllowNorth).boolean().not_null())
                    .col(ColumnDef::new(BlockTypes::AllowSouth).boolean().not_null())
                    .col(ColumnDef::new(BlockTypes::Allocation).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InterfaceRoles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InterfaceRoles::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LibraryBlocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LibraryBlocks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LibraryBlocks::Name).string().not_null())
                    .col(
                        ColumnDef::new(LibraryBlocks::Revision)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(LibraryBlocks::BlockType).string().not_null())
                    .col(
                        ColumnDef::new(LibraryBlocks::Interfaces)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(LibraryBlocks::Body)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(LibraryBlocks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_library_blocks_block_type")
                            .from(LibraryBlocks::Table, LibraryBlocks::BlockType)
                            .to(BlockTypes::Table, BlockTypes::Name),
                    )
                    .to_owned(),
            )
            .await?;

        // (name, revision) identifies one revision of a block
        manager
            .create_index(
                Index::create()
                    .name("idx_library_blocks_name_revision")
                    .table(LibraryBlocks::Table)
                    .col(LibraryBlocks::Name)
                    .col(LibraryBlocks::Revision)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Applications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Applications::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Applications::Name).string().not_null())
                    .col(ColumnDef::new(Applications::RootBlock).string().not_null())
                    .col(
                        ColumnDef::new(Applications::Lifecycle)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .col(
                        ColumnDef::new(Applications::BuildLog)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Applications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InstanceBlocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InstanceBlocks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InstanceBlocks::ApplicationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InstanceBlocks::Path).string().not_null())
                    .col(
                        ColumnDef::new(InstanceBlocks::LibraryBlockId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstanceBlocks::Config)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(InstanceBlocks::AllocateToSite)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(InstanceBlocks::SiteClasses)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_instance_blocks_application")
                            .from(InstanceBlocks::Table, InstanceBlocks::ApplicationId)
                            .to(Applications::Table, Applications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_instance_blocks_library_block")
                            .from(InstanceBlocks::Table, InstanceBlocks::LibraryBlockId)
                            .to(LibraryBlocks::Table, LibraryBlocks::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_instance_blocks_application_path")
                    .table(InstanceBlocks::Table)
                    .col(InstanceBlocks::ApplicationId)
                    .col(InstanceBlocks::Path)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Bindings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bindings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Bindings::ApplicationId).big_integer().not_null())
                    .col(ColumnDef::new(Bindings::Role).string().not_null())
                    .col(
                        ColumnDef::new(Bindings::NorthInstanceId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Bindings::NorthInterface).string().not_null())
                    .col(
                        ColumnDef::new(Bindings::SouthInstanceId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Bindings::SouthInterface).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bindings_application")
                            .from(Bindings::Table, Bindings::ApplicationId)
                            .to(Applications::Table, Applications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DeployedApplications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeployedApplications::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeployedApplications::ApplicationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeployedApplications::VanId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeployedApplications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deployed_applications_application")
                            .from(
                                DeployedApplications::Table,
                                DeployedApplications::ApplicationId,
                            )
                            .to(Applications::Table, Applications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deployed_applications_van")
                            .from(DeployedApplications::Table, DeployedApplications::VanId)
                            .to(ApplicationNetworks::Table, ApplicationNetworks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SiteData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SiteData::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SiteData::MemberId).big_integer().not_null())
                    .col(
                        ColumnDef::new(SiteData::ApplicationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SiteData::Data).text().not_null())
                    .col(ColumnDef::new(SiteData::Hash).string().not_null())
                    .col(
                        ColumnDef::new(SiteData::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_site_data_member")
                            .from(SiteData::Table, SiteData::MemberId)
                            .to(MemberSites::Table, MemberSites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_site_data_application")
                            .from(SiteData::Table, SiteData::ApplicationId)
                            .to(Applications::Table, Applications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // seed the static typing tables
        for (name, dataplane) in [("kube", true), ("docker", false), ("podman", false)] {
            manager
                .exec_stmt(
                    Query::insert()
                        .into_table(TargetPlatforms::Table)
                        .columns([TargetPlatforms::Name, TargetPlatforms::Dataplane])
                        .values_panic([name.into(), dataplane.into()])
                        .to_owned(),
                )
                .await?;
        }

        for (name, north, south, allocation) in [
            ("component", true, false, "independent"),
            ("connector", true, true, "none"),
            ("toplevel", false, false, "none"),
            ("mixed", true, true, "independent"),
            ("ingress", false, true, "none"),
            ("egress", true, false, "none"),
        ] {
            manager
                .exec_stmt(
                    Query::insert()
                        .into_table(BlockTypes::Table)
                        .columns([
                            BlockTypes::Name,
                            BlockTypes::AllowNorth,
                            BlockTypes::AllowSouth,
                            BlockTypes::Allocation,
                        ])
                        .values_panic([name.into(), north.into(), south.into(), allocation.into()])
                        .to_owned(),
                )
                .await?;
        }

        for role in ["api", "network", "data"] {
            manager
                .exec_stmt(
                    Query::insert()
                        .into_table(InterfaceRoles::Table)
                        .columns([InterfaceRoles::Name])
                        .values_panic([role.into()])
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SiteData::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DeployedApplications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bindings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InstanceBlocks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Applications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LibraryBlocks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InterfaceRoles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BlockTypes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TargetPlatforms::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TargetPlatforms {
    Table,
    Name,
    Dataplane,
}

#[derive(DeriveIden)]
enum BlockTypes {
    Table,
    Name,
    AllowNorth,
    AllowSouth,
    Allocation,
}

#[derive(DeriveIden)]
enum InterfaceRoles {
    Table,
    Name,
}

#[derive(DeriveIden)]
enum LibraryBlocks {
    Table,
    Id,
    Name,
    Revision,
    BlockType,
    Interfaces,
    Body,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Applications {
    Table,
    Id,
    Name,
    RootBlock,
    Lifecycle,
    BuildLog,
    CreatedAt,
}

#[derive(DeriveIden)]
enum InstanceBlocks {
    Table,
    Id,
    ApplicationId,
    Path,
    LibraryBlockId,
    Config,
    AllocateToSite,
    SiteClasses,
}

#[derive(DeriveIden)]
enum Bindings {
    Table,
    Id,
    ApplicationId,
    Role,
    NorthInstanceId,
    NorthInterface,
    SouthInstanceId,
    SouthInterface,
}

#[derive(DeriveIden)]
enum DeployedApplications {
    Table,
    Id,
    ApplicationId,
    VanId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SiteData {
    Table,
    Id,
    MemberId,
    ApplicationId,
    Data,
    Hash,
    CreatedAt,
}
