//! backbone-link manager tests: session lifecycle follows manage access
//! points.

mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use skyway::links::LinkObserver;
use skyway::transport::Session;
use skyway_types::{AccessPointKind, BackboneId};

/// records every add/delete notification.
#[derive(Default)]
struct RecordingObserver {
    added: Mutex<Vec<BackboneId>>,
    deleted: Mutex<Vec<BackboneId>>,
}

#[async_trait]
impl LinkObserver for RecordingObserver {
    async fn on_link_added(&self, backbone: BackboneId, _session: &Session) {
        self.added.lock().unwrap().push(backbone);
    }

    async fn on_link_deleted(&self, backbone: BackboneId) {
        self.deleted.lock().unwrap().push(backbone);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn sessions_follow_manage_access_points() {
    let h = common::start().await;
    let observer = Arc::new(RecordingObserver::default());
    h.links.register(observer.clone()).await;

    let backbone = common::ready_backbone(&h, "bb1").await;
    let site = common::ready_site(&h, &backbone, "s1").await;
    let ap = common::ready_access_point(
        &h,
        &site,
        "manage",
        AccessPointKind::Manage,
        "m.example.com",
        "55671",
    )
    .await;

    common::wait_for("session to open", 30, || {
        let observer = observer.clone();
        async move { observer.added.lock().unwrap().contains(&backbone.id) }
    })
    .await;

    // deleting the manage access point drops the session on the next
    // reconcile cycle
    h.admin.delete_access_point(ap.id).await.unwrap();
    common::wait_for("session to close", 30, || {
        let observer = observer.clone();
        async move { observer.deleted.lock().unwrap().contains(&backbone.id) }
    })
    .await;

    // exactly one delete notification
    tokio::time::sleep(Duration::from_secs(3)).await;
    let deleted = observer.deleted.lock().unwrap();
    assert_eq!(
        deleted.iter().filter(|b| **b == backbone.id).count(),
        1,
        "observers hear exactly one deletion"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn late_observers_are_replayed_the_current_set() {
    let h = common::start().await;
    let backbone = common::ready_backbone(&h, "bb1").await;
    let site = common::ready_site(&h, &backbone, "s1").await;
    common::ready_access_point(
        &h,
        &site,
        "manage",
        AccessPointKind::Manage,
        "m.example.com",
        "55671",
    )
    .await;

    // wait until the session exists, then register a fresh observer
    let probe = Arc::new(RecordingObserver::default());
    h.links.register(probe.clone()).await;
    common::wait_for("session to open", 30, || {
        let probe = probe.clone();
        async move { !probe.added.lock().unwrap().is_empty() }
    })
    .await;

    let late = Arc::new(RecordingObserver::default());
    h.links.register(late.clone()).await;
    assert!(
        late.added.lock().unwrap().contains(&backbone.id),
        "registration replays sessions already open"
    );
}
