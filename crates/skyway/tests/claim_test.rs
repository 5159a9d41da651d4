//! claim-assert integration tests: member onboarding over the claim
//! address, racing certificate reconciliation to completion.

mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use skyway_db::ops;
use skyway_proto::{AssertClaim, CLAIM_ADDRESS, MemberClaimReply, Message, status};
use skyway_types::{AccessPointKind, Lifecycle};

use common::Harness;

/// wait until the claim receiver is reachable on the backbone bus.
async fn wait_claim_receiver(h: &Harness, backbone: skyway_types::BackboneId) {
    let bus = h.connector.bus_for_backbone(backbone);
    common::wait_for("claim receiver to open", 30, || {
        let bus = bus.clone();
        async move {
            let probe = bus.session();
            let body = Message::AssertClaim(AssertClaim::new(
                format!("skx-claim-{}", "0".repeat(48)),
                String::new(),
            ))
            .encode();
            let result = probe
                .request(CLAIM_ADDRESS, body, BTreeMap::new(), Duration::from_secs(2))
                .await;
            probe.close();
            result.is_ok()
        }
    })
    .await;
}

async fn assert_claim(h: &Harness, backbone: skyway_types::BackboneId, token: &str, name: &str) -> MemberClaimReply {
    let bus = h.connector.bus_for_backbone(backbone);
    let peer = bus.session();
    let body = Message::AssertClaim(AssertClaim::new(token.to_string(), name.to_string())).encode();
    let reply = peer
        .request(CLAIM_ADDRESS, body, BTreeMap::new(), Duration::from_secs(60))
        .await
        .expect("claim request completes");
    peer.close();
    serde_json::from_value(reply.body).expect("claim reply decodes")
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_claim_returns_a_deployable_bundle() {
    let h = common::start().await;
    let backbone = common::ready_backbone(&h, "bb1").await;
    let site = common::ready_site(&h, &backbone, "s1").await;

    // manage access opens the backbone session the claim server rides on
    common::ready_access_point(&h, &site, "manage", AccessPointKind::Manage, "m.example.com", "55671").await;
    let claim_ap =
        common::ready_access_point(&h, &site, "claim", AccessPointKind::Claim, "c.example.com", "55672").await;
    let member_ap =
        common::ready_access_point(&h, &site, "member", AccessPointKind::Member, "e.example.com", "55673").await;

    let van = common::ready_van(&h, &backbone, "v1").await;
    let invitation =
        common::ready_invitation(&h, &van, "inv1", claim_ap.id, &[(member_ap.id, 0)], None).await;

    wait_claim_receiver(&h, backbone.id).await;
    let reply = assert_claim(&h, backbone.id, invitation.claim_token.as_str(), "m-1").await;

    assert_eq!(reply.status_code, status::OK, "claim succeeds: {}", reply.status_description);
    let site_id = reply.site_id.expect("reply carries the member id");

    // the member's credential is annotated with its state key
    let site_client = reply.site_client.expect("reply carries the credential");
    assert_eq!(site_client.statekey, format!("tls-site-{site_id}"));
    assert!(site_client.data.contains_key("tls.crt"));

    // one outgoing link referencing the member access point
    assert_eq!(reply.outgoing_links.len(), 1);
    assert_eq!(reply.outgoing_links[0].host, "e.example.com");
    assert_eq!(reply.outgoing_links[0].port, "55673");
    assert_eq!(reply.outgoing_links[0].cost, "1");

    // the member row is ready with a certificate
    let member_id = skyway_types::MemberId(site_id.parse().unwrap());
    let member = ops::get_member(h.db.conn(), member_id).await.unwrap().unwrap();
    assert_eq!(member.name, "m-1");
    assert_eq!(member.lifecycle, Lifecycle::Ready);
    assert!(member.certificate.is_some());
    assert_eq!(member.site_classes, vec!["edge".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn claim_over_the_instance_limit_is_rejected() {
    let h = common::start().await;
    let backbone = common::ready_backbone(&h, "bb1").await;
    let site = common::ready_site(&h, &backbone, "s1").await;
    common::ready_access_point(&h, &site, "manage", AccessPointKind::Manage, "m.example.com", "55671").await;
    let claim_ap =
        common::ready_access_point(&h, &site, "claim", AccessPointKind::Claim, "c.example.com", "55672").await;
    let member_ap =
        common::ready_access_point(&h, &site, "member", AccessPointKind::Member, "e.example.com", "55673").await;
    let van = common::ready_van(&h, &backbone, "v1").await;
    let invitation =
        common::ready_invitation(&h, &van, "inv1", claim_ap.id, &[(member_ap.id, 0)], Some(1)).await;

    wait_claim_receiver(&h, backbone.id).await;

    let first = assert_claim(&h, backbone.id, invitation.claim_token.as_str(), "m-1").await;
    assert_eq!(first.status_code, status::OK);

    let second = assert_claim(&h, backbone.id, invitation.claim_token.as_str(), "m-2").await;
    assert_eq!(second.status_code, status::FORBIDDEN);
    assert!(second.site_id.is_none());

    // no member row was created for the rejected claim
    let members = ops::list_members_for_van(h.db.conn(), van.id).await.unwrap();
    assert_eq!(members.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_claim_is_rejected() {
    let h = common::start().await;
    let backbone = common::ready_backbone(&h, "bb1").await;
    let site = common::ready_site(&h, &backbone, "s1").await;
    common::ready_access_point(&h, &site, "manage", AccessPointKind::Manage, "m.example.com", "55671").await;

    wait_claim_receiver(&h, backbone.id).await;
    let reply = assert_claim(&h, backbone.id, &format!("skx-claim-{}", "f".repeat(48)), "m-x").await;
    assert_eq!(reply.status_code, status::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn unnamed_claims_use_the_invitation_prefix() {
    let h = common::start().await;
    let backbone = common::ready_backbone(&h, "bb1").await;
    let site = common::ready_site(&h, &backbone, "s1").await;
    common::ready_access_point(&h, &site, "manage", AccessPointKind::Manage, "m.example.com", "55671").await;
    let claim_ap =
        common::ready_access_point(&h, &site, "claim", AccessPointKind::Claim, "c.example.com", "55672").await;
    let member_ap =
        common::ready_access_point(&h, &site, "member", AccessPointKind::Member, "e.example.com", "55673").await;
    let van = common::ready_van(&h, &backbone, "v1").await;

    let (invitation, _) = h
        .admin
        .create_invitation(
            van.id,
            "inv1",
            claim_ap.id,
            &[(member_ap.id, 0)],
            None,
            vec!["edge".to_string()],
            None,
            Some("branch".to_string()),
        )
        .await
        .unwrap();
    common::wait_for("invitation to become ready", 30, || {
        let db = h.db.clone();
        async move {
            ops::get_invitation(db.conn(), invitation.id)
                .await
                .unwrap()
                .is_some_and(|i| i.lifecycle == Lifecycle::Ready)
        }
    })
    .await;

    wait_claim_receiver(&h, backbone.id).await;
    let reply = assert_claim(&h, backbone.id, invitation.claim_token.as_str(), "").await;
    assert_eq!(reply.status_code, status::OK);

    let member_id = skyway_types::MemberId(reply.site_id.unwrap().parse().unwrap());
    let member = ops::get_member(h.db.conn(), member_id).await.unwrap().unwrap();
    assert_eq!(member.name, "branch-1");
}
