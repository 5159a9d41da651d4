//! certificate reconcilers.
//!
//! one queue-draining loop per managed entity kind creates certificate
//! requests; a request loop turns those into cluster certificate objects;
//! finalization is driven by the cluster's secret watch; pruning sweeps
//! remove orphaned cluster objects and unreferenced certificate rows.

mod finalize;
mod kinds;
mod prune;
mod request;

pub use kinds::ManagedKind;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use skyway_db::SkywayDb;
use skyway_types::ReconcilerConfig;

use crate::bridge::SyncBridge;
use crate::claim::ClaimServer;
use crate::cluster::{ANN_DBLINK, Cluster, KIND_CERTIFICATE, KIND_SECRET, WatchEvent};

/// everything the reconciler loops need.
pub struct Reconcilers {
    db: SkywayDb,
    cluster: Arc<dyn Cluster>,
    config: ReconcilerConfig,
    bridge: Arc<SyncBridge>,
    claim: Arc<ClaimServer>,
}

impl Reconcilers {
    /// assemble the reconciler context.
    pub fn new(
        db: SkywayDb,
        cluster: Arc<dyn Cluster>,
        config: ReconcilerConfig,
        bridge: Arc<SyncBridge>,
        claim: Arc<ClaimServer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            cluster,
            config,
            bridge,
            claim,
        })
    }

    /// spawn every loop: one per managed kind, the request loop, both
    /// watches, and the pruning sweep.
    pub fn spawn_all(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        for kind in ManagedKind::ALL {
            let ctx = self.clone();
            handles.push(tokio::spawn(async move { ctx.run_kind_loop(kind).await }));
        }

        let ctx = self.clone();
        handles.push(tokio::spawn(async move { ctx.run_request_loop().await }));

        // subscribe before spawning so no early event is missed
        let ctx = self.clone();
        let secrets = self.cluster.watch(KIND_SECRET);
        handles.push(tokio::spawn(async move { ctx.run_secret_watch(secrets).await }));

        let ctx = self.clone();
        let certificates = self.cluster.watch(KIND_CERTIFICATE);
        handles.push(tokio::spawn(
            async move { ctx.run_certificate_watch(certificates).await },
        ));

        let ctx = self.clone();
        handles.push(tokio::spawn(async move { ctx.run_prune_loop().await }));

        info!("certificate reconcilers started");
        handles
    }

    /// drive one entity kind: advance a row, reschedule immediately on
    /// progress, sleep briefly when idle, back off on errors.
    async fn run_kind_loop(self: Arc<Self>, kind: ManagedKind) {
        let idle = Duration::from_secs(self.config.idle_delay_secs);
        let backoff = Duration::from_secs(self.config.error_backoff_secs);
        loop {
            match kinds::advance_one(&self.db, kind).await {
                Ok(true) => continue,
                Ok(false) => tokio::time::sleep(idle).await,
                Err(e) => {
                    warn!(kind = kind.name(), error = %e, "reconciler cycle failed");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// drive the certificate-request queue.
    async fn run_request_loop(self: Arc<Self>) {
        let idle = Duration::from_secs(self.config.idle_delay_secs);
        let backoff = Duration::from_secs(self.config.error_backoff_secs);
        loop {
            match request::process_one_request(&self.db, self.cluster.as_ref()).await {
                Ok(true) => continue,
                Ok(false) => tokio::time::sleep(idle).await,
                Err(e) => {
                    warn!(error = %e, "request loop cycle failed");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// finalize entities as issued secrets arrive.
    async fn run_secret_watch(
        self: Arc<Self>,
        mut events: tokio::sync::broadcast::Receiver<WatchEvent>,
    ) {
        loop {
            match events.recv().await {
                Ok(WatchEvent { object, .. }) => {
                    if !object.annotations.contains_key(ANN_DBLINK) {
                        continue;
                    }
                    if let Err(e) = finalize::handle_issued_secret(
                        &self.db,
                        self.cluster.as_ref(),
                        &self.bridge,
                        &self.claim,
                        object,
                    )
                    .await
                    {
                        warn!(error = %e, "secret finalization failed");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "secret watch lagged; pruning will reconcile");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// keep expiration/renewal times current as the issuer rotates
    /// certificates.
    async fn run_certificate_watch(
        self: Arc<Self>,
        mut events: tokio::sync::broadcast::Receiver<WatchEvent>,
    ) {
        loop {
            match events.recv().await {
                Ok(WatchEvent { object, .. }) => {
                    if let Err(e) = finalize::refresh_certificate_times(&self.db, &object).await {
                        warn!(error = %e, "certificate refresh failed");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "certificate watch lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// periodically sweep orphaned cluster objects and unreferenced
    /// certificate rows.
    async fn run_prune_loop(self: Arc<Self>) {
        let interval = Duration::from_secs(self.config.prune_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            if let Err(e) = prune::prune_cluster_objects(&self.db, self.cluster.as_ref()).await {
                warn!(error = %e, "cluster-object pruning failed");
            }
            if let Err(e) = prune::prune_certificate_rows(&self.db).await {
                warn!(error = %e, "certificate-row pruning failed");
            }
        }
    }
}

/// cluster object name for a certificate request's target.
pub(crate) fn object_name(kind: skyway_types::CertRequestKind, target_id: i64) -> String {
    use skyway_types::CertRequestKind::*;
    let tag = match kind {
        ManagementController => "controller",
        BackboneCa => "backbone-ca",
        InteriorSite => "site",
        AccessPoint => "access",
        VanCa => "van-ca",
        NetworkCredential => "netcred",
        MemberClaim => "claim",
        MemberSite => "member",
    };
    format!("skx-{tag}-{target_id}")
}
