//! database layer for skyway.
//!
//! this crate provides persistent storage for the control plane's entire
//! model: backbones, interior sites, access points, links, application
//! networks, invitations, member sites, certificates, and the application
//! composition tables.
//!
//! operations live in [`ops`] as free functions generic over any sea-orm
//! connection, so the same code runs against the pooled connection or
//! inside an open transaction. reconcilers and admin handlers that touch
//! more than one row open a transaction with [`SkywayDb::begin`] and
//! commit explicitly; dropping an uncommitted transaction rolls back.

#![warn(missing_docs)]

mod entity;
mod error;
mod migration;
pub mod ops;

pub use error::Error;

use sea_orm::{
    ConnectOptions, Database as SeaOrmDatabase, DatabaseConnection, DatabaseTransaction,
    TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use skyway_types::Config;

/// result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// the skyway database handle.
#[derive(Clone)]
pub struct SkywayDb {
    conn: DatabaseConnection,
}

impl SkywayDb {
    /// create a new database connection from config and run migrations.
    pub async fn new(config: &Config) -> Result<Self> {
        let url = Self::build_connection_url(&config.database)?;
        let mut options = ConnectOptions::new(url);
        options.sqlx_logging(false);
        let conn = SeaOrmDatabase::connect(options)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    /// build a sea-orm compatible connection url from config.
    fn build_connection_url(config: &skyway_types::DatabaseConfig) -> Result<String> {
        match config.db_type.as_str() {
            "sqlite" => {
                let path = if config.connection_string.starts_with("sqlite:") {
                    config.connection_string.clone()
                } else {
                    format!("sqlite:{}", config.connection_string)
                };
                // add ?mode=rwc to create the file if it doesn't exist
                if path.contains('?') {
                    Ok(path)
                } else {
                    Ok(format!("{}?mode=rwc", path))
                }
            }
            "postgres" | "postgresql" => Ok(config.connection_string.clone()),
            other => Err(Error::InvalidData(format!(
                "unsupported database type: {}",
                other
            ))),
        }
    }

    /// create an in-memory sqlite database for testing.
    ///
    /// the pool is pinned to a single connection: every pooled connection
    /// to `:memory:` would otherwise open its own empty database.
    pub async fn new_in_memory() -> Result<Self> {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).sqlx_logging(false);
        let conn = SeaOrmDatabase::connect(options)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    /// run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        migration::Migrator::up(&self.conn, None)
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        Ok(())
    }

    /// the underlying connection, for single-statement operations.
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// begin a transaction. commit explicitly; dropping rolls back.
    pub async fn begin(&self) -> Result<DatabaseTransaction> {
        Ok(self.conn.begin().await?)
    }

    /// ping the database to verify connectivity.
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyway_types::{
        AccessPointKind, Backbone, BackboneAccessPoint, CertRequestKind, CertificateRequest,
        InteriorSite, Lifecycle, MemberInvitation, TlsCertificate,
    };

    async fn setup_test_db() -> SkywayDb {
        SkywayDb::new_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let db = setup_test_db().await;
        db.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_backbone_crud() {
        let db = setup_test_db().await;

        let created = ops::insert_backbone(db.conn(), &Backbone::new("bb1".to_string()))
            .await
            .unwrap();
        assert!(created.id.0 > 0);
        assert_eq!(created.lifecycle, Lifecycle::New);

        let fetched = ops::get_backbone(db.conn(), created.id).await.unwrap();
        assert_eq!(fetched.unwrap().name, "bb1");

        let all = ops::list_backbones(db.conn()).await.unwrap();
        assert_eq!(all.len(), 1);

        ops::delete_backbone(db.conn(), created.id).await.unwrap();
        assert!(
            ops::get_backbone(db.conn(), created.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_backbone_delete_conflicts_while_sites_remain() {
        let db = setup_test_db().await;

        let backbone = ops::insert_backbone(db.conn(), &Backbone::new("bb1".to_string()))
            .await
            .unwrap();
        ops::insert_site(
            db.conn(),
            &InteriorSite::new("s1".to_string(), backbone.id, "kube".to_string()),
        )
        .await
        .unwrap();

        let result = ops::delete_backbone(db.conn(), backbone.id).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_pick_new_site_requires_ready_backbone() {
        let db = setup_test_db().await;

        let backbone = ops::insert_backbone(db.conn(), &Backbone::new("bb1".to_string()))
            .await
            .unwrap();
        ops::insert_site(
            db.conn(),
            &InteriorSite::new("s1".to_string(), backbone.id, "kube".to_string()),
        )
        .await
        .unwrap();

        // backbone is still `new`: the site must not be picked
        assert!(ops::pick_new_site(db.conn()).await.unwrap().is_none());

        ops::set_backbone_lifecycle(db.conn(), backbone.id, Lifecycle::Ready)
            .await
            .unwrap();
        let picked = ops::pick_new_site(db.conn()).await.unwrap().unwrap();
        assert_eq!(picked.name, "s1");
    }

    #[tokio::test]
    async fn test_promote_access_point_only_from_partial() {
        let db = setup_test_db().await;

        let backbone = ops::insert_backbone(db.conn(), &Backbone::new("bb1".to_string()))
            .await
            .unwrap();
        let site = ops::insert_site(
            db.conn(),
            &InteriorSite::new("s1".to_string(), backbone.id, "kube".to_string()),
        )
        .await
        .unwrap();
        let ap = ops::insert_access_point(
            db.conn(),
            &BackboneAccessPoint::new("manage".to_string(), site.id, AccessPointKind::Manage),
        )
        .await
        .unwrap();
        assert_eq!(ap.lifecycle, Lifecycle::Partial);

        let promoted = ops::promote_access_point(db.conn(), ap.id, "ap.example.com", "55671")
            .await
            .unwrap();
        assert!(promoted);

        let fetched = ops::get_access_point(db.conn(), ap.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.lifecycle, Lifecycle::New);
        assert_eq!(fetched.hostname.as_deref(), Some("ap.example.com"));

        // a second promotion is a no-op
        let again = ops::promote_access_point(db.conn(), ap.id, "other", "1")
            .await
            .unwrap();
        assert!(!again);
    }

    #[tokio::test]
    async fn test_invitation_token_lookup_and_count() {
        let db = setup_test_db().await;

        let backbone = ops::insert_backbone(db.conn(), &Backbone::new("bb1".to_string()))
            .await
            .unwrap();
        let site = ops::insert_site(
            db.conn(),
            &InteriorSite::new("s1".to_string(), backbone.id, "kube".to_string()),
        )
        .await
        .unwrap();
        let claim_ap = ops::insert_access_point(
            db.conn(),
            &BackboneAccessPoint::new("claim".to_string(), site.id, AccessPointKind::Claim),
        )
        .await
        .unwrap();
        let van = ops::insert_van(
            db.conn(),
            &skyway_types::ApplicationNetwork::new(
                "v1".to_string(),
                "van-1".to_string(),
                backbone.id,
            ),
        )
        .await
        .unwrap();

        let invitation = ops::insert_invitation(
            db.conn(),
            &MemberInvitation::new("inv1".to_string(), van.id, claim_ap.id),
        )
        .await
        .unwrap();

        let fetched =
            ops::get_invitation_by_token(db.conn(), invitation.claim_token.as_str())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(fetched.id, invitation.id);
        assert_eq!(fetched.instance_count, 0);

        ops::set_invitation_instance_count(db.conn(), invitation.id, fetched.instance_count + 1)
            .await
            .unwrap();
        let fetched = ops::get_invitation(db.conn(), invitation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.instance_count, 1);
    }

    #[tokio::test]
    async fn test_request_queue_pops_oldest_first() {
        let db = setup_test_db().await;

        let first = ops::insert_certificate_request(
            db.conn(),
            &CertificateRequest::new(CertRequestKind::BackboneCa, 1, None),
        )
        .await
        .unwrap();
        // force distinct created_at ordering
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        ops::insert_certificate_request(
            db.conn(),
            &CertificateRequest::new(CertRequestKind::BackboneCa, 2, None),
        )
        .await
        .unwrap();

        let picked = ops::pick_oldest_new_request(db.conn()).await.unwrap().unwrap();
        assert_eq!(picked.id, first.id);

        ops::set_request_cert_created(db.conn(), first.id).await.unwrap();
        let picked = ops::pick_oldest_new_request(db.conn()).await.unwrap().unwrap();
        assert_eq!(picked.target_id, 2);
    }

    #[tokio::test]
    async fn test_referenced_certificate_ids_include_signing_links() {
        let db = setup_test_db().await;

        let ca = ops::insert_tls_certificate(
            db.conn(),
            &TlsCertificate {
                id: skyway_types::CertificateId(0),
                object_name: "skx-backbone-1".to_string(),
                is_ca: true,
                signed_by: None,
                expiration: None,
                renewal_time: None,
                created_at: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();
        ops::insert_tls_certificate(
            db.conn(),
            &TlsCertificate {
                id: skyway_types::CertificateId(0),
                object_name: "skx-site-1".to_string(),
                is_ca: false,
                signed_by: Some(ca.id),
                expiration: None,
                renewal_time: None,
                created_at: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();

        let referenced = ops::list_referenced_certificate_ids(db.conn()).await.unwrap();
        assert!(referenced.contains(&ca.id.0), "signing CA stays referenced");
    }

    #[tokio::test]
    async fn test_transaction_rollback_on_drop() {
        let db = setup_test_db().await;

        {
            let txn = db.begin().await.unwrap();
            ops::insert_backbone(&txn, &Backbone::new("bb1".to_string()))
                .await
                .unwrap();
            // dropped without commit
        }

        let all = ops::list_backbones(db.conn()).await.unwrap();
        assert!(all.is_empty(), "uncommitted insert must roll back");
    }
}
