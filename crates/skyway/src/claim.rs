//! claim server: completes member onboarding over the claim address.
//!
//! an incoming claim assertion validates its invitation and allocates a
//! member-site row in one transaction, then blocks on a completion slot
//! until the certificate reconciler mints the member's credentials. the
//! slot is race-safe: completion may fire before the waiter attaches, in
//! which case the stored result is picked up immediately.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use skyway_db::{SkywayDb, ops};
use skyway_proto::{
    AssertClaim, CLAIM_ADDRESS, MemberClaimReply, Message, OutgoingLink, SiteClient, status,
};
use skyway_render::hash_of_string_map;
use skyway_types::{BackboneId, LinkConfig, MemberId, MemberSite, StateKey};

use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::links::LinkObserver;
use crate::transport::Session;

/// one member's completion slot.
struct Slot {
    result: Mutex<Option<MemberClaimReply>>,
    notify: Notify,
}

impl Slot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(None),
            notify: Notify::new(),
        })
    }

    /// store the result and wake the waiter. `notify_one` keeps a permit
    /// when nobody is waiting yet, so completion-before-wait still
    /// resolves.
    fn complete(&self, reply: MemberClaimReply) {
        *self.result.lock().expect("slot mutex poisoned") = Some(reply);
        self.notify.notify_one();
    }

    async fn wait(&self, timeout: Duration) -> Option<MemberClaimReply> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(reply) = self.result.lock().expect("slot mutex poisoned").clone() {
                return Some(reply);
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return self.result.lock().expect("slot mutex poisoned").clone();
            }
        }
    }
}

/// registry of in-flight member completions.
#[derive(Default)]
pub struct CompletionSlots {
    slots: Mutex<HashMap<i64, Arc<Slot>>>,
}

impl CompletionSlots {
    fn register(&self, member_id: MemberId) -> Arc<Slot> {
        let slot = Slot::new();
        self.slots
            .lock()
            .expect("slots mutex poisoned")
            .insert(member_id.0, slot.clone());
        slot
    }

    fn remove(&self, member_id: MemberId) {
        self.slots
            .lock()
            .expect("slots mutex poisoned")
            .remove(&member_id.0);
    }

    fn complete(&self, member_id: MemberId, reply: MemberClaimReply) -> bool {
        let slot = {
            let slots = self.slots.lock().expect("slots mutex poisoned");
            slots.get(&member_id.0).cloned()
        };
        match slot {
            Some(slot) => {
                slot.complete(reply);
                true
            }
            None => false,
        }
    }
}

/// the claim server. clones share the slot registry.
#[derive(Clone)]
pub struct ClaimServer {
    db: SkywayDb,
    cluster: Arc<dyn Cluster>,
    config: LinkConfig,
    slots: Arc<CompletionSlots>,
}

impl ClaimServer {
    /// create a claim server.
    pub fn new(db: SkywayDb, cluster: Arc<dyn Cluster>, config: LinkConfig) -> Arc<Self> {
        Arc::new(Self {
            db,
            cluster,
            config,
            slots: Arc::new(CompletionSlots::default()),
        })
    }

    /// open the claim receiver on one backbone session.
    pub fn open_on_session(&self, session: &Session) {
        let mut receiver = session.open_receiver(Some(CLAIM_ADDRESS));
        let server = self.clone();
        let session = session.clone();
        tokio::spawn(async move {
            while let Some(delivery) = receiver.rx.recv().await {
                let assert = match Message::decode(&delivery.body) {
                    Ok(Message::AssertClaim(assert)) => assert,
                    Ok(_) => {
                        warn!("non-claim message on the claim address; ignoring");
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "undecodable claim message");
                        continue;
                    }
                };
                let reply = server.handle_assert(assert).await;
                if let Ok(body) = serde_json::to_value(&reply)
                    && let Err(e) = session.send_reply(&delivery, body)
                {
                    debug!(error = %e, "claim reply dropped");
                }
            }
        });
    }

    async fn handle_assert(&self, assert: AssertClaim) -> MemberClaimReply {
        let (member_id, slot) = match self.allocate_member(&assert).await {
            Ok(allocated) => allocated,
            Err(reply) => return reply,
        };

        info!(member = %member_id, name = %assert.name, "member site allocated; awaiting credentials");

        let timeout = Duration::from_secs(self.config.claim_timeout_secs);
        let reply = slot.wait(timeout).await;
        self.slots.remove(member_id);

        reply.unwrap_or_else(|| {
            MemberClaimReply::error(status::TIMEOUT, "timed out waiting for member credentials")
        })
    }

    /// validate the invitation and insert the member row, registering the
    /// completion slot before the transaction commits so finalization can
    /// never miss it.
    async fn allocate_member(
        &self,
        assert: &AssertClaim,
    ) -> std::result::Result<(MemberId, Arc<Slot>), MemberClaimReply> {
        let internal =
            |e: &dyn std::fmt::Display| MemberClaimReply::error(status::INTERNAL, e.to_string());

        let txn = self.db.begin().await.map_err(|e| internal(&e))?;

        let invitation = match ops::get_invitation_by_token(&txn, &assert.claim).await {
            Ok(Some(invitation)) => invitation,
            Ok(None) => return Err(MemberClaimReply::error(status::NOT_FOUND, "unknown claim")),
            Err(e) => return Err(internal(&e)),
        };

        if invitation.is_expired() {
            return Err(MemberClaimReply::error(status::FORBIDDEN, "claim expired"));
        }
        if invitation.at_instance_limit() {
            return Err(MemberClaimReply::error(
                status::FORBIDDEN,
                "claim instance limit reached",
            ));
        }
        if !invitation.lifecycle.is_provisioned() {
            return Err(MemberClaimReply::error(
                status::BAD_REQUEST,
                "claim credentials not yet provisioned",
            ));
        }

        let name = if assert.name.is_empty() {
            let prefix = invitation.member_name_prefix.as_deref().unwrap_or("member");
            format!("{prefix}-{}", invitation.instance_count + 1)
        } else {
            assert.name.clone()
        };

        if let Err(e) =
            ops::set_invitation_instance_count(&txn, invitation.id, invitation.instance_count + 1)
                .await
        {
            return Err(internal(&e));
        }

        let mut member = MemberSite::new(name, invitation.van, invitation.id);
        member.site_classes = invitation.member_classes.clone();
        let member = match ops::insert_member(&txn, &member).await {
            Ok(member) => member,
            Err(e) => return Err(internal(&e)),
        };

        let slot = self.slots.register(member.id);
        if let Err(e) = txn.commit().await {
            self.slots.remove(member.id);
            return Err(internal(&e));
        }
        Ok((member.id, slot))
    }

    /// called by certificate finalization once the member's credentials
    /// exist: build the deployable bundle and resolve the completion slot.
    pub async fn complete_member(&self, member_id: MemberId) -> Result<()> {
        let member = ops::get_member(self.db.conn(), member_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("member site {member_id}")))?;
        let certificate_id = member
            .certificate
            .ok_or_else(|| Error::Internal(format!("member {member_id} has no certificate")))?;
        let certificate = ops::get_tls_certificate(self.db.conn(), certificate_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("certificate {certificate_id}")))?;
        let secret = self
            .cluster
            .load_secret(&certificate.object_name)
            .await?
            .ok_or_else(|| Error::Cluster(format!("secret {} missing", certificate.object_name)))?;

        let site_key = StateKey::TlsSite(member.id.0).to_string();
        let site_client = SiteClient {
            statekey: site_key,
            hash: hash_of_string_map(&secret.data),
            data: secret.data,
        };

        let mut outgoing_links = Vec::new();
        for edge in ops::list_edge_links_for_invitation(self.db.conn(), member.invitation).await? {
            let Some(ap) = ops::get_access_point(self.db.conn(), edge.access_point).await? else {
                continue;
            };
            let (Some(host), Some(port)) = (ap.hostname, ap.port) else {
                debug!(edge = %edge.id, "edge link's access point has no ingress yet; skipped");
                continue;
            };
            let mut descriptor = BTreeMap::new();
            descriptor.insert("cost".to_string(), "1".to_string());
            descriptor.insert("host".to_string(), host.clone());
            descriptor.insert("port".to_string(), port.clone());
            outgoing_links.push(OutgoingLink {
                host,
                port,
                cost: "1".to_string(),
                statekey: StateKey::Link(edge.id.0).to_string(),
                hash: hash_of_string_map(&descriptor),
            });
        }

        let reply = MemberClaimReply::ok(member.id.0.to_string(), outgoing_links, site_client);
        if !self.slots.complete(member.id, reply) {
            debug!(member = %member_id, "no claim waiting for completion");
        }
        Ok(())
    }
}

#[async_trait]
impl LinkObserver for ClaimServer {
    async fn on_link_added(&self, backbone: BackboneId, session: &Session) {
        debug!(backbone = %backbone, "opening claim receiver");
        self.open_on_session(session);
    }

    async fn on_link_deleted(&self, _backbone: BackboneId) {
        // the session's receivers die with the session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completion_before_wait_still_resolves() {
        let slots = CompletionSlots::default();
        let slot = slots.register(MemberId(1));

        // complete before any waiter attaches
        slots.complete(
            MemberId(1),
            MemberClaimReply::error(status::OK, "done early"),
        );

        let reply = slot.wait(Duration::from_millis(50)).await.unwrap();
        assert_eq!(reply.status_description, "done early");
    }

    #[tokio::test]
    async fn wait_then_complete_resolves() {
        let slots = Arc::new(CompletionSlots::default());
        let slot = slots.register(MemberId(2));

        let completer = slots.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            completer.complete(MemberId(2), MemberClaimReply::error(status::OK, "late"));
        });

        let reply = slot.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply.status_description, "late");
    }

    #[tokio::test]
    async fn wait_times_out_without_completion() {
        let slots = CompletionSlots::default();
        let slot = slots.register(MemberId(3));
        assert!(slot.wait(Duration::from_millis(30)).await.is_none());
    }

    #[tokio::test]
    async fn complete_unregistered_member_is_a_noop() {
        let slots = CompletionSlots::default();
        assert!(!slots.complete(MemberId(9), MemberClaimReply::error(status::OK, "x")));
    }
}
