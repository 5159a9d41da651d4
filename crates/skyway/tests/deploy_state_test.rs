//! deployment-state evaluation and site download bundles.

mod common;

use skyway::deploy_state;
use skyway::download;
use skyway_db::ops;
use skyway_types::{AccessPointKind, DeploymentState};

#[tokio::test(flavor = "multi_thread")]
async fn manage_access_makes_a_ready_site_bootstrap_ready() {
    let h = common::start().await;
    let backbone = common::ready_backbone(&h, "bb1").await;
    let site = common::ready_site(&h, &backbone, "s1").await;
    assert_eq!(site.deployment_state, DeploymentState::NotReady);

    common::ready_access_point(
        &h,
        &site,
        "manage",
        AccessPointKind::Manage,
        "ap.example.com",
        "55671",
    )
    .await;

    common::wait_for("site to become bootstrap-ready", 30, || {
        let db = h.db.clone();
        async move {
            ops::get_site(db.conn(), site.id)
                .await
                .unwrap()
                .is_some_and(|s| s.deployment_state == DeploymentState::ReadyBootstrap)
        }
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn bootstrap_bundle_carries_the_expected_documents() {
    let h = common::start().await;
    let backbone = common::ready_backbone(&h, "bb1").await;
    let site = common::ready_site(&h, &backbone, "s1").await;
    let ap = common::ready_access_point(
        &h,
        &site,
        "manage",
        AccessPointKind::Manage,
        "ap.example.com",
        "55671",
    )
    .await;

    common::wait_for("site to become bootstrap-ready", 30, || {
        let db = h.db.clone();
        async move {
            ops::get_site(db.conn(), site.id)
                .await
                .unwrap()
                .is_some_and(|s| s.deployment_state == DeploymentState::ReadyBootstrap)
        }
    })
    .await;

    let bundle = download::interior_site_bundle(&h.db, h.cluster.as_ref(), site.id)
        .await
        .expect("bundle renders");

    let deployments = bundle.matches("kind: Deployment").count();
    let role_bindings = bundle.matches("kind: RoleBinding").count();
    assert_eq!(deployments, 1, "exactly one deployment");
    assert_eq!(role_bindings, 1, "exactly one role binding");

    // the site secret is annotated with its state key
    assert!(bundle.contains(&format!("state-key: tls-site-{}", site.id)));
    // bootstrap bundles include the access-point server secret
    assert!(bundle.contains(&format!("state-key: tls-server-{}", ap.id)));
}

#[tokio::test(flavor = "multi_thread")]
async fn deployed_neighbor_makes_a_linked_site_automatic() {
    let h = common::start().await;
    let backbone = common::ready_backbone(&h, "bb1").await;
    let s1 = common::ready_site(&h, &backbone, "s1").await;
    let s2 = common::ready_site(&h, &backbone, "s2").await;

    let peer_ap = common::ready_access_point(
        &h,
        &s1,
        "peer",
        AccessPointKind::Peer,
        "s1.example.com",
        "55672",
    )
    .await;
    h.admin
        .create_inter_router_link(s2.id, peer_ap.id, 1)
        .await
        .expect("create link");

    // s1 has no manage access and no deployed neighbor: s2 stays not-ready
    let s2_row = ops::get_site(h.db.conn(), s2.id).await.unwrap().unwrap();
    assert_eq!(s2_row.deployment_state, DeploymentState::NotReady);

    // s1 goes live: the evaluator cascades to every site linking into it
    let txn = h.db.begin().await.unwrap();
    ops::set_site_active(&txn, s1.id).await.unwrap();
    deploy_state::site_lifecycle_changed(&txn, s1.id).await.unwrap();
    txn.commit().await.unwrap();

    let s1_row = ops::get_site(h.db.conn(), s1.id).await.unwrap().unwrap();
    assert_eq!(s1_row.deployment_state, DeploymentState::Deployed);
    let s2_row = ops::get_site(h.db.conn(), s2.id).await.unwrap().unwrap();
    assert_eq!(s2_row.deployment_state, DeploymentState::ReadyAutomatic);
}

#[tokio::test(flavor = "multi_thread")]
async fn reevaluation_is_idempotent() {
    let h = common::start().await;
    let backbone = common::ready_backbone(&h, "bb1").await;
    let site = common::ready_site(&h, &backbone, "s1").await;
    common::ready_access_point(
        &h,
        &site,
        "manage",
        AccessPointKind::Manage,
        "ap.example.com",
        "55671",
    )
    .await;

    common::wait_for("site to become bootstrap-ready", 30, || {
        let db = h.db.clone();
        async move {
            ops::get_site(db.conn(), site.id)
                .await
                .unwrap()
                .is_some_and(|s| s.deployment_state == DeploymentState::ReadyBootstrap)
        }
    })
    .await;

    // re-evaluating every site yields the values already stored
    let before = ops::get_site(h.db.conn(), site.id).await.unwrap().unwrap();
    let txn = h.db.begin().await.unwrap();
    let state = deploy_state::evaluate_site(&txn, site.id).await.unwrap();
    txn.commit().await.unwrap();
    assert_eq!(state, before.deployment_state);
}
