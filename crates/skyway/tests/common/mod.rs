//! shared harness for control-plane integration tests.
//!
//! assembles the full controller in-process: in-memory database, the
//! standalone cluster with a simulated issuing authority, the sync
//! engine, bridge, claim server, link manager, and every reconciler loop.
//! simulated router peers attach to the per-backbone message bus.

#![allow(dead_code)] // test utilities may not all be used in every test file

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use skyway::admin::Admin;
use skyway::bridge::SyncBridge;
use skyway::claim::ClaimServer;
use skyway::cluster::{CertManagerSim, StandaloneCluster};
use skyway::compose::ComposeEngine;
use skyway::links::{BackboneLinkManager, LocalConnector};
use skyway::reconciler::Reconcilers;
use skyway::sync::SyncEngine;
use skyway_db::{SkywayDb, ops};
use skyway_proto::MANAGEMENT_ADDRESS;
use skyway_types::{
    AccessPointId, AccessPointKind, ApplicationNetwork, Backbone, BackboneAccessPoint, Config,
    InteriorSite, Lifecycle, MemberInvitation, PeerClass,
};

pub struct Harness {
    pub db: SkywayDb,
    pub cluster: Arc<StandaloneCluster>,
    pub connector: Arc<LocalConnector>,
    pub engine: SyncEngine,
    pub bridge: Arc<SyncBridge>,
    pub claim: Arc<ClaimServer>,
    pub compose: Arc<ComposeEngine>,
    pub links: Arc<BackboneLinkManager>,
    pub admin: Admin,
    pub config: Config,
}

/// start the whole control plane with test-friendly timings.
pub async fn start() -> Harness {
    let mut config = Config::default();
    config.controller_name = "test-controller".to_string();
    config.standalone_namespace = Some("skx-test".to_string());
    config.reconciler.idle_delay_secs = 1;
    config.reconciler.error_backoff_secs = 1;
    config.reconciler.prune_interval_secs = 3600;
    config.links.reconcile_interval_secs = 1;
    config.links.error_backoff_secs = 1;
    config.sync.beacon_interval_secs = 1;
    config.sync.heartbeat_period_secs = 1;
    config.sync.heartbeat_window_secs = 1;

    let db = SkywayDb::new_in_memory().await.expect("in-memory database");
    let cluster = Arc::new(StandaloneCluster::new("skx-test"));
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
    let bridge = SyncBridge::new(
        db.clone(),
        cluster.clone(),
        engine.clone(),
        compose.clone(),
    );
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

    // bootstrap and run the link manager in the background; the
    // reconcilers drive the controller row to ready
    let links_bg = links.clone();
    tokio::spawn(async move {
        if links_bg.bootstrap().await.is_ok() {
            let _ = links_bg.clone().spawn().await;
        }
    });

    let admin = Admin::new(db.clone()).with_bridge(bridge.clone());

    Harness {
        db,
        cluster,
        connector,
        engine,
        bridge,
        claim,
        compose,
        links,
        admin,
        config,
    }
}

/// poll a condition until it holds or the timeout expires.
pub async fn wait_for<F, Fut>(what: &str, timeout_secs: u64, condition: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    loop {
        if condition().await {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// create a backbone and wait for its CA to be issued.
pub async fn ready_backbone(h: &Harness, name: &str) -> Backbone {
    let backbone = h
        .admin
        .create_backbone(name, false)
        .await
        .expect("create backbone");
    let db = h.db.clone();
    let id = backbone.id;
    wait_for("backbone to become ready", 30, || {
        let db = db.clone();
        async move {
            ops::get_backbone(db.conn(), id)
                .await
                .expect("get backbone")
                .is_some_and(|b| b.lifecycle == Lifecycle::Ready)
        }
    })
    .await;
    ops::get_backbone(h.db.conn(), id)
        .await
        .expect("get backbone")
        .expect("backbone exists")
}

/// create an interior site and wait for its client credential.
pub async fn ready_site(h: &Harness, backbone: &Backbone, name: &str) -> InteriorSite {
    let site = h
        .admin
        .create_site(backbone.id, name, "kube")
        .await
        .expect("create site");
    let db = h.db.clone();
    let id = site.id;
    wait_for("site to become ready", 30, || {
        let db = db.clone();
        async move {
            ops::get_site(db.conn(), id)
                .await
                .expect("get site")
                .is_some_and(|s| s.lifecycle == Lifecycle::Ready)
        }
    })
    .await;
    ops::get_site(h.db.conn(), id)
        .await
        .expect("get site")
        .expect("site exists")
}

/// create an access point, supply its ingress, and wait for its server
/// credential.
pub async fn ready_access_point(
    h: &Harness,
    site: &InteriorSite,
    name: &str,
    kind: AccessPointKind,
    host: &str,
    port: &str,
) -> BackboneAccessPoint {
    let ap = h
        .admin
        .create_access_point(site.id, name, kind)
        .await
        .expect("create access point");
    h.admin
        .set_ingress(ap.id, host, port)
        .await
        .expect("set ingress");
    wait_ap_ready(h, ap.id).await
}

/// wait for an access point to reach `ready`.
pub async fn wait_ap_ready(h: &Harness, id: AccessPointId) -> BackboneAccessPoint {
    let db = h.db.clone();
    wait_for("access point to become ready", 30, || {
        let db = db.clone();
        async move {
            ops::get_access_point(db.conn(), id)
                .await
                .expect("get access point")
                .is_some_and(|ap| ap.lifecycle == Lifecycle::Ready)
        }
    })
    .await;
    ops::get_access_point(h.db.conn(), id)
        .await
        .expect("get access point")
        .expect("access point exists")
}

/// create an application network and wait for its CA.
pub async fn ready_van(h: &Harness, backbone: &Backbone, name: &str) -> ApplicationNetwork {
    let van = h.admin.create_van(backbone.id, name).await.expect("create van");
    let db = h.db.clone();
    let id = van.id;
    wait_for("application network to become ready", 30, || {
        let db = db.clone();
        async move {
            ops::get_van(db.conn(), id)
                .await
                .expect("get van")
                .is_some_and(|v| v.lifecycle == Lifecycle::Ready)
        }
    })
    .await;
    ops::get_van(h.db.conn(), id)
        .await
        .expect("get van")
        .expect("van exists")
}

/// create an invitation and wait for its claim credential.
pub async fn ready_invitation(
    h: &Harness,
    van: &ApplicationNetwork,
    name: &str,
    claim_access: AccessPointId,
    member_access: &[(AccessPointId, i64)],
    instance_limit: Option<i64>,
) -> MemberInvitation {
    let (invitation, _) = h
        .admin
        .create_invitation(
            van.id,
            name,
            claim_access,
            member_access,
            None,
            vec!["edge".to_string()],
            instance_limit,
            None,
        )
        .await
        .expect("create invitation");
    let db = h.db.clone();
    let id = invitation.id;
    wait_for("invitation to become ready", 30, || {
        let db = db.clone();
        async move {
            ops::get_invitation(db.conn(), id)
                .await
                .expect("get invitation")
                .is_some_and(|i| i.lifecycle == Lifecycle::Ready)
        }
    })
    .await;
    ops::get_invitation(h.db.conn(), id)
        .await
        .expect("get invitation")
        .expect("invitation exists")
}
