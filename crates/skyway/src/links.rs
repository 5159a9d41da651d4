//! backbone-link manager.
//!
//! maintains one transport session per reachable `manage`-kind access
//! point: every reconcile cycle the database's ready manage access points
//! (one per ready backbone) are diffed against the open-session map, new
//! rows open sessions with the controller's TLS credential, and vanished
//! rows close them. observers hear about both transitions, and are
//! replayed the current set when they register.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use skyway_db::{SkywayDb, ops};
use skyway_types::{
    BackboneAccessPoint, BackboneId, Config, Lifecycle, ManagementController,
};

use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::transport::{MessageBus, Session};

/// the controller's client TLS material, loaded from its credential
/// secret.
#[derive(Debug, Clone)]
pub struct ClientTls {
    /// the secret's cluster object name.
    pub secret_name: String,

    /// the secret data (base64-encoded values).
    pub data: std::collections::BTreeMap<String, String>,
}

/// observer of backbone-session lifecycle.
#[async_trait]
pub trait LinkObserver: Send + Sync {
    /// a session to a backbone opened.
    async fn on_link_added(&self, backbone: BackboneId, session: &Session);

    /// the session to a backbone closed.
    async fn on_link_deleted(&self, backbone: BackboneId);
}

/// opens transport sessions into backbone access points.
#[async_trait]
pub trait Connector: Send + Sync {
    /// open a session through the given manage access point.
    async fn open(
        &self,
        backbone: BackboneId,
        access_point: &BackboneAccessPoint,
        tls: &ClientTls,
    ) -> Result<Session>;
}

/// in-process connector: one message bus per backbone network.
///
/// the physical TLS/fabric binding is an external collaborator; in
/// standalone mode (and in tests) peers attach to the same per-backbone
/// bus to talk to the controller.
pub struct LocalConnector {
    buses: Mutex<HashMap<i64, MessageBus>>,
}

impl LocalConnector {
    /// create a connector with no networks yet.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            buses: Mutex::new(HashMap::new()),
        })
    }

    /// the bus representing one backbone's router network, created on
    /// first use. simulated peers attach here.
    pub fn bus_for_backbone(&self, backbone: BackboneId) -> MessageBus {
        let mut buses = self.buses.lock().expect("connector mutex poisoned");
        buses.entry(backbone.0).or_insert_with(MessageBus::new).clone()
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn open(
        &self,
        backbone: BackboneId,
        _access_point: &BackboneAccessPoint,
        _tls: &ClientTls,
    ) -> Result<Session> {
        Ok(self.bus_for_backbone(backbone).session())
    }
}

/// the sync engine participates in session lifecycle directly: each
/// backbone session becomes one of its connections.
#[async_trait]
impl LinkObserver for crate::sync::SyncEngine {
    async fn on_link_added(&self, backbone: BackboneId, session: &Session) {
        self.add_connection(crate::sync::ConnectionKey::Backbone(backbone), session.clone())
            .await;
    }

    async fn on_link_deleted(&self, backbone: BackboneId) {
        self.delete_connection(crate::sync::ConnectionKey::Backbone(backbone))
            .await;
    }
}

struct LinkState {
    sessions: HashMap<BackboneId, Session>,
    observers: Vec<Arc<dyn LinkObserver>>,
}

/// the backbone-link manager.
pub struct BackboneLinkManager {
    db: SkywayDb,
    cluster: Arc<dyn Cluster>,
    connector: Arc<dyn Connector>,
    config: Config,
    state: tokio::sync::Mutex<LinkState>,
}

impl BackboneLinkManager {
    /// create the manager.
    pub fn new(
        db: SkywayDb,
        cluster: Arc<dyn Cluster>,
        connector: Arc<dyn Connector>,
        config: Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            cluster,
            connector,
            config,
            state: tokio::sync::Mutex::new(LinkState {
                sessions: HashMap::new(),
                observers: Vec::new(),
            }),
        })
    }

    /// register an observer. sessions already open are replayed to it
    /// before this call returns.
    pub async fn register(&self, observer: Arc<dyn LinkObserver>) {
        let existing: Vec<(BackboneId, Session)> = {
            let mut state = self.state.lock().await;
            state.observers.push(observer.clone());
            state
                .sessions
                .iter()
                .map(|(id, session)| (*id, session.clone()))
                .collect()
        };
        for (backbone, session) in existing {
            observer.on_link_added(backbone, &session).await;
        }
    }

    /// wait until the configured management-controller row reaches
    /// `ready`, inserting it if missing, then verify its TLS material is
    /// loadable. a ready controller without TLS material is fatal.
    pub async fn bootstrap(&self) -> Result<ClientTls> {
        let name = &self.config.controller_name;
        let poll = Duration::from_secs(self.config.links.error_backoff_secs);

        loop {
            let txn = self.db.begin().await.map_err(Error::from)?;
            let controller = match ops::get_controller_by_name(&txn, name).await? {
                Some(controller) => controller,
                None => {
                    info!(name, "inserting management controller row");
                    ops::insert_controller(&txn, &ManagementController::new(name.clone())).await?
                }
            };
            txn.commit().await.map_err(skyway_db::Error::from)?;

            if controller.lifecycle == Lifecycle::Ready {
                break;
            }
            tokio::time::sleep(poll).await;
        }

        info!(name, "management controller is ready");
        self.controller_tls().await
    }

    /// load the controller's client TLS material.
    async fn controller_tls(&self) -> Result<ClientTls> {
        let controller = ops::get_controller_by_name(self.db.conn(), &self.config.controller_name)
            .await?
            .ok_or_else(|| Error::NotFound("management controller row".to_string()))?;
        let certificate = controller
            .certificate
            .ok_or_else(|| Error::Cluster("controller is ready without a credential".to_string()))?;
        let cert = ops::get_tls_certificate(self.db.conn(), certificate)
            .await?
            .ok_or_else(|| Error::NotFound(format!("certificate {certificate}")))?;
        let secret = self
            .cluster
            .load_secret(&cert.object_name)
            .await?
            .ok_or_else(|| {
                Error::Cluster(format!(
                    "no TLS material for ready controller credential {}",
                    cert.object_name
                ))
            })?;
        Ok(ClientTls {
            secret_name: cert.object_name,
            data: secret.data,
        })
    }

    /// one reconcile cycle: diff ready manage access points against the
    /// open-session map.
    pub async fn reconcile_once(&self) -> Result<()> {
        let tls = self.controller_tls().await?;
        let desired = ops::list_ready_manage_access_points(self.db.conn()).await?;

        let (to_open, to_close, observers) = {
            let state = self.state.lock().await;
            let to_open: Vec<(BackboneAccessPoint, BackboneId)> = desired
                .iter()
                .filter(|(_, backbone)| !state.sessions.contains_key(backbone))
                .cloned()
                .collect();
            let to_close: Vec<BackboneId> = state
                .sessions
                .keys()
                .filter(|backbone| !desired.iter().any(|(_, b)| b == *backbone))
                .copied()
                .collect();
            (to_open, to_close, state.observers.clone())
        };

        for (ap, backbone) in to_open {
            let session = self.connector.open(backbone, &ap, &tls).await?;
            info!(backbone = %backbone, access_point = %ap.id, "backbone session opened");
            {
                let mut state = self.state.lock().await;
                state.sessions.insert(backbone, session.clone());
            }
            for observer in &observers {
                observer.on_link_added(backbone, &session).await;
            }
        }

        for backbone in to_close {
            let session = {
                let mut state = self.state.lock().await;
                state.sessions.remove(&backbone)
            };
            if let Some(session) = session {
                session.close();
                info!(backbone = %backbone, "backbone session closed");
                for observer in &observers {
                    observer.on_link_deleted(backbone).await;
                }
            }
        }

        Ok(())
    }

    /// run the reconcile loop forever.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.links.reconcile_interval_secs);
        let backoff = Duration::from_secs(self.config.links.error_backoff_secs);
        tokio::spawn(async move {
            loop {
                match self.reconcile_once().await {
                    Ok(()) => tokio::time::sleep(interval).await,
                    Err(e) => {
                        warn!(error = %e, "backbone link reconcile failed");
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        })
    }
}
