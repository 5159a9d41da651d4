//! create VAN tables: application networks, network credentials, member
//! invitations, edge links, and member sites.

use sea_orm_migration::prelude::*;

use super::m20260701_000001_create_credentials::TlsCertificates;
use super::m20260701_000002_create_backbones::{BackboneAccessPoints, Backbones};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApplicationNetworks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApplicationNetworks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApplicationNetworks::Name).string().not_null())
                    .col(
                        ColumnDef::new(ApplicationNetworks::VanId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApplicationNetworks::BackboneId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApplicationNetworks::Lifecycle)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .col(ColumnDef::new(ApplicationNetworks::CertificateId).big_integer())
                    .col(
                        ColumnDef::new(ApplicationNetworks::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApplicationNetworks::EndTime).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ApplicationNetworks::Connected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ApplicationNetworks::Failure).string())
                    .col(
                        ColumnDef::new(ApplicationNetworks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_application_networks_backbone")
                            .from(ApplicationNetworks::Table, ApplicationNetworks::BackboneId)
                            .to(Backbones::Table, Backbones::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_application_networks_certificate")
                            .from(
                                ApplicationNetworks::Table,
                                ApplicationNetworks::CertificateId,
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
                    .table(NetworkCredentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NetworkCredentials::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NetworkCredentials::Name).string().not_null())
                    .col(
                        ColumnDef::new(NetworkCredentials::VanId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NetworkCredentials::Lifecycle)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .col(ColumnDef::new(NetworkCredentials::CertificateId).big_integer())
                    .col(
                        ColumnDef::new(NetworkCredentials::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_network_credentials_van")
                            .from(NetworkCredentials::Table, NetworkCredentials::VanId)
                            .to(ApplicationNetworks::Table, ApplicationNetworks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MemberInvitations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MemberInvitations::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MemberInvitations::Name).string().not_null())
                    .col(
                        ColumnDef::new(MemberInvitations::VanId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemberInvitations::Lifecycle)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .col(ColumnDef::new(MemberInvitations::CertificateId).big_integer())
                    .col(
                        ColumnDef::new(MemberInvitations::ClaimAccessId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemberInvitations::ClaimToken)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(MemberInvitations::Deadline).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(MemberInvitations::MemberClasses)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(MemberInvitations::InstanceLimit).big_integer())
                    .col(
                        ColumnDef::new(MemberInvitations::InstanceCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(MemberInvitations::MemberNamePrefix).string())
                    .col(ColumnDef::new(MemberInvitations::Failure).string())
                    .col(
                        ColumnDef::new(MemberInvitations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_member_invitations_van")
                            .from(MemberInvitations::Table, MemberInvitations::VanId)
                            .to(ApplicationNetworks::Table, ApplicationNetworks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_member_invitations_claim_access")
                            .from(MemberInvitations::Table, MemberInvitations::ClaimAccessId)
                            .to(BackboneAccessPoints::Table, BackboneAccessPoints::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EdgeLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EdgeLinks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EdgeLinks::AccessPointId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EdgeLinks::InvitationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EdgeLinks::Priority)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_edge_links_access_point")
                            .from(EdgeLinks::Table, EdgeLinks::AccessPointId)
                            .to(BackboneAccessPoints::Table, BackboneAccessPoints::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_edge_links_invitation")
                            .from(EdgeLinks::Table, EdgeLinks::InvitationId)
                            .to(MemberInvitations::Table, MemberInvitations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MemberSites::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MemberSites::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MemberSites::Name).string().not_null())
                    .col(ColumnDef::new(MemberSites::VanId).big_integer().not_null())
                    .col(
                        ColumnDef::new(MemberSites::InvitationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemberSites::Lifecycle)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .col(ColumnDef::new(MemberSites::CertificateId).big_integer())
                    .col(
                        ColumnDef::new(MemberSites::SiteClasses)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(MemberSites::Metadata)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(ColumnDef::new(MemberSites::FirstActiveTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(MemberSites::LastHeartbeat).timestamp_with_time_zone())
                    .col(ColumnDef::new(MemberSites::Failure).string())
                    .col(
                        ColumnDef::new(MemberSites::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_member_sites_van")
                            .from(MemberSites::Table, MemberSites::VanId)
                            .to(ApplicationNetworks::Table, ApplicationNetworks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_member_sites_invitation")
                            .from(MemberSites::Table, MemberSites::InvitationId)
                            .to(MemberInvitations::Table, MemberInvitations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_member_sites_van_id")
                    .table(MemberSites::Table)
                    .col(MemberSites::VanId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MemberSites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EdgeLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MemberInvitations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NetworkCredentials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApplicationNetworks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ApplicationNetworks {
    Table,
    Id,
    Name,
    VanId,
    BackboneId,
    Lifecycle,
    CertificateId,
    StartTime,
    EndTime,
    Connected,
    Failure,
    CreatedAt,
}

#[derive(DeriveIden)]
enum NetworkCredentials {
    Table,
    Id,
    Name,
    VanId,
    Lifecycle,
    CertificateId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MemberInvitations {
    Table,
    Id,
    Name,
    VanId,
    Lifecycle,
    CertificateId,
    ClaimAccessId,
    ClaimToken,
    Deadline,
    MemberClasses,
    InstanceLimit,
    InstanceCount,
    MemberNamePrefix,
    Failure,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EdgeLinks {
    Table,
    Id,
    AccessPointId,
    InvitationId,
    Priority,
}

#[derive(DeriveIden)]
pub enum MemberSites {
    Table,
    Id,
    Name,
    VanId,
    InvitationId,
    Lifecycle,
    CertificateId,
    SiteClasses,
    Metadata,
    FirstActiveTime,
    LastHeartbeat,
    Failure,
    CreatedAt,
}
