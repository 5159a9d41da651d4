//! create backbone tables: management controllers, backbones, interior
//! sites, access points, and inter-router links.

use sea_orm_migration::prelude::*;

use super::m20260701_000001_create_credentials::TlsCertificates;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ManagementControllers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ManagementControllers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ManagementControllers::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ManagementControllers::Lifecycle)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .col(ColumnDef::new(ManagementControllers::CertificateId).big_integer())
                    .col(ColumnDef::new(ManagementControllers::Failure).string())
                    .col(
                        ColumnDef::new(ManagementControllers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_management_controllers_certificate")
                            .from(
                                ManagementControllers::Table,
                                ManagementControllers::CertificateId,
                            )
                            .to(TlsCertificates::Table, TlsCertificates::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Backbones::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Backbones::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Backbones::Name).string().not_null())
                    .col(
                        ColumnDef::new(Backbones::Lifecycle)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .col(
                        ColumnDef::new(Backbones::Management)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Backbones::CertificateId).big_integer())
                    .col(ColumnDef::new(Backbones::Failure).string())
                    .col(
                        ColumnDef::new(Backbones::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_backbones_certificate")
                            .from(Backbones::Table, Backbones::CertificateId)
                            .to(TlsCertificates::Table, TlsCertificates::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InteriorSites::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InteriorSites::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InteriorSites::Name).string().not_null())
                    .col(
                        ColumnDef::new(InteriorSites::BackboneId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InteriorSites::Lifecycle)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .col(ColumnDef::new(InteriorSites::CertificateId).big_integer())
                    .col(
                        ColumnDef::new(InteriorSites::DeploymentState)
                            .string()
                            .not_null()
                            .default("not-ready"),
                    )
                    .col(
                        ColumnDef::new(InteriorSites::Platform)
                            .string()
                            .not_null()
                            .default("kube"),
                    )
                    .col(ColumnDef::new(InteriorSites::FirstActiveTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(InteriorSites::LastHeartbeat).timestamp_with_time_zone())
                    .col(ColumnDef::new(InteriorSites::Failure).string())
                    .col(
                        ColumnDef::new(InteriorSites::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_interior_sites_backbone")
                            .from(InteriorSites::Table, InteriorSites::BackboneId)
                            .to(Backbones::Table, Backbones::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_interior_sites_certificate")
                            .from(InteriorSites::Table, InteriorSites::CertificateId)
                            .to(TlsCertificates::Table, TlsCertificates::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_interior_sites_backbone_id")
                    .table(InteriorSites::Table)
                    .col(InteriorSites::BackboneId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BackboneAccessPoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BackboneAccessPoints::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BackboneAccessPoints::Name).string().not_null())
                    .col(
                        ColumnDef::new(BackboneAccessPoints::SiteId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BackboneAccessPoints::Kind).string().not_null())
                    .col(
                        ColumnDef::new(BackboneAccessPoints::Lifecycle)
                            .string()
                            .not_null()
                            .default("partial"),
                    )
                    .col(ColumnDef::new(BackboneAccessPoints::CertificateId).big_integer())
                    .col(ColumnDef::new(BackboneAccessPoints::Hostname).string())
                    .col(ColumnDef::new(BackboneAccessPoints::Port).string())
                    .col(ColumnDef::new(BackboneAccessPoints::BindHost).string())
                    .col(
                        ColumnDef::new(BackboneAccessPoints::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_backbone_access_points_site")
                            .from(BackboneAccessPoints::Table, BackboneAccessPoints::SiteId)
                            .to(InteriorSites::Table, InteriorSites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_backbone_access_points_certificate")
                            .from(
                                BackboneAccessPoints::Table,
                                BackboneAccessPoints::CertificateId,
                            )
                            .to(TlsCertificates::Table, TlsCertificates::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_backbone_access_points_site_id")
                    .table(BackboneAccessPoints::Table)
                    .col(BackboneAccessPoints::SiteId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InterRouterLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InterRouterLinks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InterRouterLinks::AccessPointId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InterRouterLinks::ConnectingSiteId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InterRouterLinks::Cost)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inter_router_links_access_point")
                            .from(InterRouterLinks::Table, InterRouterLinks::AccessPointId)
                            .to(BackboneAccessPoints::Table, BackboneAccessPoints::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inter_router_links_connecting_site")
                            .from(InterRouterLinks::Table, InterRouterLinks::ConnectingSiteId)
                            .to(InteriorSites::Table, InteriorSites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InterRouterLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BackboneAccessPoints::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InteriorSites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Backbones::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ManagementControllers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ManagementControllers {
    Table,
    Id,
    Name,
    Lifecycle,
    CertificateId,
    Failure,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Backbones {
    Table,
    Id,
    Name,
    Lifecycle,
    Management,
    CertificateId,
    Failure,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum InteriorSites {
    Table,
    Id,
    Name,
    BackboneId,
    Lifecycle,
    CertificateId,
    DeploymentState,
    Platform,
    FirstActiveTime,
    LastHeartbeat,
    Failure,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum BackboneAccessPoints {
    Table,
    Id,
    Name,
    SiteId,
    Kind,
    Lifecycle,
    CertificateId,
    Hostname,
    Port,
    BindHost,
    CreatedAt,
}

#[derive(DeriveIden)]
enum InterRouterLinks {
    Table,
    Id,
    AccessPointId,
    ConnectingSiteId,
    Cost,
}
