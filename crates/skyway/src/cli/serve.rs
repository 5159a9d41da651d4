//! the `serve` subcommand - runs the management controller.

use std::sync::Arc;

use clap::Args;
use color_eyre::eyre::{Context, Result, bail};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use skyway_db::SkywayDb;
use skyway_proto::MANAGEMENT_ADDRESS;
use skyway_types::{Config, PeerClass};

use crate::bridge::SyncBridge;
use crate::claim::ClaimServer;
use crate::cluster::{CertManagerSim, StandaloneCluster};
use crate::compose::ComposeEngine;
use crate::links::{BackboneLinkManager, LocalConnector};
use crate::reconciler::Reconcilers;
use crate::sync::SyncEngine;

/// run the skyway management controller.
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// database url (sqlite:// or postgres://)
    #[arg(long, env = "SKYWAY_DATABASE_URL")]
    database_url: Option<String>,

    /// controller name; also read from SKX_CONTROLLER_NAME / HOSTNAME
    #[arg(long)]
    controller_name: Option<String>,

    /// run outside a cluster against an in-memory namespace
    #[arg(long, env = "SKX_STANDALONE_NAMESPACE")]
    standalone_namespace: Option<String>,

    /// log level
    #[arg(long, default_value = "info", env = "SKYWAY_LOG_LEVEL")]
    log_level: String,
}

impl ServeCommand {
    /// run the serve command.
    pub async fn run(self) -> Result<()> {
        let log_level = match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
        tracing::subscriber::set_global_default(subscriber)?;

        info!("starting skyway...");

        let mut config = Config::default();
        config.database = super::database_config(self.database_url)?;
        if let Some(name) = self.controller_name {
            config.controller_name = name;
        }
        if let Some(namespace) = self.standalone_namespace {
            config.standalone_namespace = Some(namespace);
        }
        info!("controller name: {}", config.controller_name);
        info!("database: {}", config.database.connection_string);

        // ensure parent directory exists for sqlite databases
        if config.database.db_type == "sqlite" {
            let db_path = std::path::Path::new(&config.database.connection_string);
            if let Some(parent) = db_path.parent()
                && !parent.exists()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create database directory: {parent:?}"))?;
            }
        }

        let db = SkywayDb::new(&config)
            .await
            .context("failed to initialize database")?;
        info!("database initialized");

        // the kubernetes binding is an external collaborator; standalone
        // mode runs the in-memory cluster with a simulated issuer
        let Some(namespace) = config.standalone_namespace.clone() else {
            bail!(
                "no cluster collaborator is linked into this build; \
                 set SKX_STANDALONE_NAMESPACE to run standalone"
            );
        };
        info!(namespace, "running standalone");
        let cluster = Arc::new(StandaloneCluster::new(&namespace));
        let _issuer = CertManagerSim::new(cluster.clone()).spawn();

        let connector = LocalConnector::new();
        let engine = SyncEngine::new(
            PeerClass::Management,
            config.controller_name.clone(),
            Some(MANAGEMENT_ADDRESS.to_string()),
            config.sync.clone(),
        );
        let _beacon = engine.start();

        let compose = ComposeEngine::new(db.clone());
        let bridge = SyncBridge::new(db.clone(), cluster.clone(), engine.clone(), compose);
        let claim = ClaimServer::new(db.clone(), cluster.clone(), config.links.clone());

        let links = BackboneLinkManager::new(
            db.clone(),
            cluster.clone(),
            connector.clone(),
            config.clone(),
        );
        links.register(Arc::new(engine.clone())).await;
        links.register(claim.clone()).await;

        let reconcilers = Reconcilers::new(
            db.clone(),
            cluster.clone(),
            config.reconciler.clone(),
            bridge.clone(),
            claim.clone(),
        );
        reconcilers.spawn_all();

        // blocks until the controller row is ready; a ready controller
        // without TLS material is fatal and exits for the supervisor
        links
            .bootstrap()
            .await
            .context("controller bootstrap failed")?;

        let handle = links.spawn();
        handle.await.context("backbone link manager exited")?;
        Ok(())
    }
}
