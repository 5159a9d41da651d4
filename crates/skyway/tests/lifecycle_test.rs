//! lifecycle integration tests: the certificate reconcilers drive
//! backbones and sites from `new` to `ready` through issued credentials.

mod common;

use skyway::cluster::{ANN_DBLINK, Cluster, KIND_CERTIFICATE};
use skyway_db::ops;
use skyway_types::Lifecycle;

#[tokio::test(flavor = "multi_thread")]
async fn backbone_and_site_reach_ready_through_issued_credentials() {
    let h = common::start().await;

    // the backbone CA is issued first
    let backbone = common::ready_backbone(&h, "bb1").await;
    let ca_id = backbone.certificate.expect("ready backbone has a CA");
    let ca = ops::get_tls_certificate(h.db.conn(), ca_id)
        .await
        .unwrap()
        .expect("CA row exists");
    assert!(ca.is_ca);
    assert!(ca.signed_by.is_none(), "the root issuer signs backbone CAs");
    assert!(ca.expiration.is_some(), "issued CA carries an expiration");

    // the site's client credential is signed by the backbone CA
    let site = common::ready_site(&h, &backbone, "s1").await;
    let cert_id = site.certificate.expect("ready site has a credential");
    let cert = ops::get_tls_certificate(h.db.conn(), cert_id)
        .await
        .unwrap()
        .expect("site credential row exists");
    assert!(!cert.is_ca);
    assert_eq!(cert.signed_by, Some(ca_id));
    assert!(cert.expiration.is_some());

    // the fulfilled requests were deleted
    assert!(
        ops::pick_oldest_new_request(h.db.conn()).await.unwrap().is_none(),
        "no unprocessed requests remain"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn site_waits_for_its_backbone() {
    let h = common::start().await;

    let backbone = h.admin.create_backbone("bb1", false).await.unwrap();
    let site = h.admin.create_site(backbone.id, "s1", "kube").await.unwrap();

    // the site cannot progress until the backbone CA exists, but it gets
    // there once the backbone is ready
    common::wait_for("site to become ready", 60, || {
        let db = h.db.clone();
        async move {
            ops::get_site(db.conn(), site.id)
                .await
                .unwrap()
                .is_some_and(|s| s.lifecycle == Lifecycle::Ready)
        }
    })
    .await;

    let backbone = ops::get_backbone(h.db.conn(), backbone.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(backbone.lifecycle, Lifecycle::Ready);
}

#[tokio::test(flavor = "multi_thread")]
async fn pending_requests_map_to_exactly_one_certificate_object() {
    let h = common::start().await;
    let backbone = common::ready_backbone(&h, "bb1").await;
    let _site = common::ready_site(&h, &backbone, "s1").await;

    // every certificate object carries a distinct request link
    let certificates = h.cluster.list_objects(KIND_CERTIFICATE).await.unwrap();
    let mut links: Vec<&String> = certificates
        .iter()
        .filter_map(|c| c.annotations.get(ANN_DBLINK))
        .collect();
    let total = links.len();
    links.sort();
    links.dedup();
    assert_eq!(links.len(), total, "request links are unique");
    assert!(total >= 2, "backbone CA and site credential were requested");
}

#[tokio::test(flavor = "multi_thread")]
async fn controller_row_is_bootstrapped_and_becomes_ready() {
    let h = common::start().await;

    common::wait_for("controller to become ready", 30, || {
        let db = h.db.clone();
        let name = h.config.controller_name.clone();
        async move {
            ops::get_controller_by_name(db.conn(), &name)
                .await
                .unwrap()
                .is_some_and(|c| c.lifecycle == Lifecycle::Ready)
        }
    })
    .await;

    let controller = ops::get_controller_by_name(h.db.conn(), &h.config.controller_name)
        .await
        .unwrap()
        .unwrap();
    let cert = ops::get_tls_certificate(h.db.conn(), controller.certificate.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(
        h.cluster.load_secret(&cert.object_name).await.unwrap().is_some(),
        "controller TLS material is loadable"
    );
}
