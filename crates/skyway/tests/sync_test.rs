//! state-sync integration tests: heartbeat discovery, manifest
//! reconciliation, and runtime ingress promotion.

mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use skyway_db::ops;
use skyway_proto::{GetState, GetStateReply, Heartbeat, MANAGEMENT_ADDRESS, Message};
use skyway_types::{AccessPointKind, Lifecycle, PeerClass};

use common::Harness;

/// a simulated backbone router attached to a backbone's bus.
struct FakeRouter {
    session: skyway::transport::Session,
    address: String,
    /// heartbeats the controller sent us.
    heartbeats: mpsc::UnboundedReceiver<Heartbeat>,
}

impl FakeRouter {
    /// attach to the bus and start answering pulls with the given
    /// payloads (state key -> (hash, data)).
    fn attach(
        h: &Harness,
        backbone: skyway_types::BackboneId,
        payloads: BTreeMap<String, (String, serde_json::Value)>,
    ) -> Self {
        let bus = h.connector.bus_for_backbone(backbone);
        let session = bus.session();
        let mut receiver = session.open_receiver(None);
        let address = receiver.address.clone();
        let (hb_tx, heartbeats) = mpsc::unbounded_channel();

        let reply_session = session.clone();
        tokio::spawn(async move {
            while let Some(delivery) = receiver.rx.recv().await {
                match Message::decode(&delivery.body) {
                    Ok(Message::Heartbeat(hb)) => {
                        let _ = hb_tx.send(hb);
                    }
                    Ok(Message::GetState(get)) => {
                        let reply = match payloads.get(&get.statekey) {
                            Some((hash, data)) => GetStateReply::ok(
                                get.statekey.clone(),
                                hash.clone(),
                                data.clone(),
                            ),
                            None => GetStateReply::error(404, "no such key"),
                        };
                        let body = serde_json::to_value(&reply).unwrap();
                        let _ = reply_session.send_reply(&delivery, body);
                    }
                    _ => {}
                }
            }
        });

        Self {
            session,
            address,
            heartbeats,
        }
    }

    fn send_heartbeat(&self, site: &str, hashset: Option<BTreeMap<String, String>>) {
        let mut hb = Heartbeat::new(site.to_string(), PeerClass::Backbone, self.address.clone());
        if let Some(hashset) = hashset {
            hb = hb.with_hashset(hashset);
        }
        self.session
            .send_message(
                MANAGEMENT_ADDRESS,
                Message::Heartbeat(hb).encode(),
                BTreeMap::new(),
            )
            .expect("heartbeat routed");
    }

    async fn next_heartbeat(&mut self, timeout: Duration) -> Heartbeat {
        tokio::time::timeout(timeout, self.heartbeats.recv())
            .await
            .expect("heartbeat arrives")
            .expect("channel open")
    }
}

/// stand up a backbone with a ready site and manage access, so the
/// controller has a session on the backbone bus.
async fn connected_site(h: &Harness) -> (skyway_types::Backbone, skyway_types::InteriorSite) {
    let backbone = common::ready_backbone(h, "bb1").await;
    let site = common::ready_site(h, &backbone, "s1").await;
    common::ready_access_point(h, &site, "manage", AccessPointKind::Manage, "m.example.com", "55671")
        .await;
    // wait for the link manager to open the backbone session
    common::wait_for("backbone session to open", 30, || {
        let bus = h.connector.bus_for_backbone(backbone.id);
        async move {
            let probe = bus.session();
            let ok = probe
                .send_message(MANAGEMENT_ADDRESS, serde_json::Value::Null, BTreeMap::new())
                .is_ok();
            probe.close();
            ok
        }
    })
    .await;
    (backbone, site)
}

#[tokio::test(flavor = "multi_thread")]
async fn first_heartbeat_promotes_the_site_and_returns_the_manifest() {
    let h = common::start().await;
    let (backbone, site) = connected_site(&h).await;

    let mut router = FakeRouter::attach(&h, backbone.id, BTreeMap::new());
    router.send_heartbeat(&site.id.to_string(), None);

    // the engine answers a new peer with an immediate heartbeat carrying
    // the local manifest
    let hb = router.next_heartbeat(Duration::from_secs(10)).await;
    let hashset = hb.hashset.expect("manifest attached");
    assert!(hashset.contains_key(&format!("tls-site-{}", site.id)));

    // the advertised hashset is the engine's local manifest for the peer
    let local = h
        .engine
        .peer_local_state(PeerClass::Backbone, &site.id.to_string())
        .await
        .expect("peer is tracked");
    assert_eq!(hashset, local);

    // the ready site went active with its first-active time stamped
    common::wait_for("site to become active", 10, || {
        let db = h.db.clone();
        async move {
            ops::get_site(db.conn(), site.id)
                .await
                .unwrap()
                .is_some_and(|s| s.lifecycle == Lifecycle::Active && s.first_active_time.is_some())
        }
    })
    .await;
    let row = ops::get_site(h.db.conn(), site.id).await.unwrap().unwrap();
    assert!(row.last_heartbeat.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn advertised_state_is_pullable_at_the_advertised_hash() {
    let h = common::start().await;
    let (backbone, site) = connected_site(&h).await;

    let mut router = FakeRouter::attach(&h, backbone.id, BTreeMap::new());
    router.send_heartbeat(&site.id.to_string(), None);
    let hb = router.next_heartbeat(Duration::from_secs(10)).await;
    let hashset = hb.hashset.expect("manifest attached");

    // every advertised key returns bytes hashing to the advertised value
    for (key, advertised) in hashset {
        let get = Message::GetState(GetState::new(site.id.to_string(), key.clone()));
        let reply = router
            .session
            .request(&hb.address, get.encode(), BTreeMap::new(), Duration::from_secs(5))
            .await
            .expect("pull completes");
        let reply: GetStateReply = serde_json::from_value(reply.body).unwrap();
        assert_eq!(reply.status_code, 200, "pull of {key} succeeds");
        assert_eq!(reply.hash.as_deref(), Some(advertised.as_str()), "hash of {key}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ingress_report_promotes_a_partial_access_point() {
    let h = common::start().await;
    let (backbone, site) = connected_site(&h).await;

    // a claim access point with no ingress yet
    let claim_ap = h
        .admin
        .create_access_point(site.id, "claim", AccessPointKind::Claim)
        .await
        .unwrap();
    assert_eq!(claim_ap.lifecycle, Lifecycle::Partial);

    // the router discovers the listener's runtime host/port
    let status_key = format!("accessstatus-{}", claim_ap.id);
    let mut payloads = BTreeMap::new();
    payloads.insert(
        status_key.clone(),
        (
            "h1".to_string(),
            json!({"host": "c.example.com", "port": "55672"}),
        ),
    );
    let mut router = FakeRouter::attach(&h, backbone.id, payloads);

    let mut hashset = BTreeMap::new();
    hashset.insert(status_key.clone(), "h1".to_string());
    router.send_heartbeat(&site.id.to_string(), Some(hashset.clone()));

    // discovery kicks the certificate reconciler: the access point ends
    // up ready with the reported ingress
    common::wait_for("access point to become ready", 30, || {
        let db = h.db.clone();
        async move {
            ops::get_access_point(db.conn(), claim_ap.id)
                .await
                .unwrap()
                .is_some_and(|ap| ap.lifecycle == Lifecycle::Ready)
        }
    })
    .await;
    let ap = ops::get_access_point(h.db.conn(), claim_ap.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ap.hostname.as_deref(), Some("c.example.com"));
    assert_eq!(ap.port.as_deref(), Some("55672"));

    // the pulled hash landed in the peer's remote manifest
    common::wait_for("remote manifest to record the pull", 10, || {
        let engine = h.engine.clone();
        let site_id = site.id.to_string();
        let status_key = status_key.clone();
        async move {
            engine
                .peer_remote_state(PeerClass::Backbone, &site_id)
                .await
                .is_some_and(|remote| remote.get(&status_key).map(String::as_str) == Some("h1"))
        }
    })
    .await;

    // a second heartbeat with a changed hash triggers a re-pull
    let mut router2_payloads = BTreeMap::new();
    router2_payloads.insert(
        status_key.clone(),
        ("h2".to_string(), json!({"host": "c.example.com", "port": "55672"})),
    );
    drop(router);
    let router = FakeRouter::attach(&h, backbone.id, router2_payloads);
    let mut hashset2 = BTreeMap::new();
    hashset2.insert(status_key.clone(), "h2".to_string());
    router.send_heartbeat(&site.id.to_string(), Some(hashset2));

    common::wait_for("remote manifest to follow the new hash", 10, || {
        let engine = h.engine.clone();
        let site_id = site.id.to_string();
        let status_key = status_key.clone();
        async move {
            engine
                .peer_remote_state(PeerClass::Backbone, &site_id)
                .await
                .is_some_and(|remote| remote.get(&status_key).map(String::as_str) == Some("h2"))
        }
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_keys_leave_the_remote_manifest() {
    let h = common::start().await;
    let (backbone, site) = connected_site(&h).await;

    let key = "accessstatus-9999".to_string();
    let mut payloads = BTreeMap::new();
    payloads.insert(key.clone(), ("h1".to_string(), json!({"x": 1})));
    let router = FakeRouter::attach(&h, backbone.id, payloads);

    let mut hashset = BTreeMap::new();
    hashset.insert(key.clone(), "h1".to_string());
    router.send_heartbeat(&site.id.to_string(), Some(hashset));

    common::wait_for("key to arrive", 10, || {
        let engine = h.engine.clone();
        let site_id = site.id.to_string();
        let key = key.clone();
        async move {
            engine
                .peer_remote_state(PeerClass::Backbone, &site_id)
                .await
                .is_some_and(|remote| remote.contains_key(&key))
        }
    })
    .await;

    // the next heartbeat omits the key: a deletion
    router.send_heartbeat(&site.id.to_string(), Some(BTreeMap::new()));
    common::wait_for("key to be deleted", 10, || {
        let engine = h.engine.clone();
        let site_id = site.id.to_string();
        let key = key.clone();
        async move {
            engine
                .peer_remote_state(PeerClass::Backbone, &site_id)
                .await
                .is_some_and(|remote| !remote.contains_key(&key))
        }
    })
    .await;
}
