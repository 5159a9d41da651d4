//! create credential tables: tls certificates, certificate requests, and
//! controller configuration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TlsCertificates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TlsCertificates::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TlsCertificates::ObjectName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TlsCertificates::IsCa)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(TlsCertificates::SignedBy).big_integer())
                    .col(ColumnDef::new(TlsCertificates::Expiration).timestamp_with_time_zone())
                    .col(ColumnDef::new(TlsCertificates::RenewalTime).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(TlsCertificates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tls_certificates_signed_by")
                            .from(TlsCertificates::Table, TlsCertificates::SignedBy)
                            .to(TlsCertificates::Table, TlsCertificates::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // finalization looks certificates up by cluster object name
        manager
            .create_index(
                Index::create()
                    .name("idx_tls_certificates_object_name")
                    .table(TlsCertificates::Table)
                    .col(TlsCertificates::ObjectName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CertificateRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CertificateRequests::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CertificateRequests::Kind).string().not_null())
                    .col(
                        ColumnDef::new(CertificateRequests::Lifecycle)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .col(
                        ColumnDef::new(CertificateRequests::TargetId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CertificateRequests::IssuerId).big_integer())
                    .col(
                        ColumnDef::new(CertificateRequests::DurationDays)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CertificateRequests::RequestTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CertificateRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_certificate_requests_issuer")
                            .from(CertificateRequests::Table, CertificateRequests::IssuerId)
                            .to(TlsCertificates::Table, TlsCertificates::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // the request loop pops the oldest processable request
        manager
            .create_index(
                Index::create()
                    .name("idx_certificate_requests_lifecycle")
                    .table(CertificateRequests::Table)
                    .col(CertificateRequests::Lifecycle)
                    .col(CertificateRequests::RequestTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Configuration::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Configuration::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Configuration::Value).string().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Configuration::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CertificateRequests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TlsCertificates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TlsCertificates {
    Table,
    Id,
    ObjectName,
    IsCa,
    SignedBy,
    Expiration,
    RenewalTime,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CertificateRequests {
    Table,
    Id,
    Kind,
    Lifecycle,
    TargetId,
    IssuerId,
    DurationDays,
    RequestTime,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Configuration {
    Table,
    Key,
    Value,
}
