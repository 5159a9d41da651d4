//! the three wire operations and their replies.
//!
//! field names follow the original wire format: lowercase for requests,
//! camelcase for reply envelopes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use skyway_types::PeerClass;

use crate::{Error, PROTOCOL_VERSION, Result};

/// reply status codes.
pub mod status {
    /// success.
    pub const OK: u16 = 200;
    /// the request was invalid or violated a rule.
    pub const BAD_REQUEST: u16 = 400;
    /// the claim was rejected (expired or over its instance limit).
    pub const FORBIDDEN: u16 = 403;
    /// the requested state or claim does not exist.
    pub const NOT_FOUND: u16 = 404;
    /// the server gave up waiting for credentials.
    pub const TIMEOUT: u16 = 408;
    /// an internal failure.
    pub const INTERNAL: u16 = 500;
}

/// a decoded protocol message, discriminated by the wire `op` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op")]
pub enum Message {
    /// peer heartbeat, optionally advertising a state hash set.
    #[serde(rename = "HB")]
    Heartbeat(Heartbeat),

    /// pull one unit of state from a peer.
    #[serde(rename = "GET")]
    GetState(GetState),

    /// redeem a member invitation.
    #[serde(rename = "CLAIM")]
    AssertClaim(AssertClaim),
}

impl Message {
    /// decode a message body, validating version and operation.
    pub fn decode(body: &Value) -> Result<Self> {
        let op = body
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Malformed("missing op field".to_string()))?;
        if !matches!(op, "HB" | "GET" | "CLAIM") {
            return Err(Error::UnknownOp(op.to_string()));
        }

        let version = body
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Malformed("missing version field".to_string()))?;
        if version != u64::from(PROTOCOL_VERSION) {
            return Err(Error::BadVersion(version as u32));
        }

        Ok(serde_json::from_value(body.clone())?)
    }

    /// encode the message as a json body.
    pub fn encode(&self) -> Value {
        // serialization of these shapes cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// heartbeat body.
///
/// an absent `hashset` is a beacon: it announces the peer without
/// advertising any state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Heartbeat {
    /// protocol version.
    pub version: u32,

    /// the sender's site identifier.
    pub site: String,

    /// the sender's peer class.
    pub sclass: PeerClass,

    /// the address heartbeats and pulls for this peer should be sent to.
    pub address: String,

    /// state-key to content-hash manifest of the sender's local state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashset: Option<BTreeMap<String, String>>,
}

impl Heartbeat {
    /// build a heartbeat from the local identity.
    pub fn new(site: String, sclass: PeerClass, address: String) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            site,
            sclass,
            address,
            hashset: None,
        }
    }

    /// attach a state manifest.
    pub fn with_hashset(mut self, hashset: BTreeMap<String, String>) -> Self {
        self.hashset = Some(hashset);
        self
    }
}

/// pull request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetState {
    /// protocol version.
    pub version: u32,

    /// the requester's site identifier.
    pub site: String,

    /// the state key being pulled.
    pub statekey: String,
}

impl GetState {
    /// build a pull request.
    pub fn new(site: String, statekey: String) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            site,
            statekey,
        }
    }
}

/// claim assertion body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssertClaim {
    /// protocol version.
    pub version: u32,

    /// the claim token being redeemed.
    pub claim: String,

    /// the requested member-site name.
    pub name: String,
}

impl AssertClaim {
    /// build a claim assertion.
    pub fn new(claim: String, name: String) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            claim,
            name,
        }
    }
}

/// reply to a [`GetState`] pull.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetStateReply {
    /// status code; anything other than 200 is an error.
    #[serde(rename = "statusCode")]
    pub status_code: u16,

    /// human-readable status description.
    #[serde(rename = "statusDescription", default)]
    pub status_description: String,

    /// the state key the reply refers to.
    #[serde(default)]
    pub statekey: String,

    /// the payload's content hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// the payload bytes, as json.
    #[serde(default)]
    pub data: Value,
}

impl GetStateReply {
    /// a successful reply.
    pub fn ok(statekey: String, hash: String, data: Value) -> Self {
        Self {
            status_code: status::OK,
            status_description: "OK".to_string(),
            statekey,
            hash: Some(hash),
            data,
        }
    }

    /// an error reply.
    pub fn error(code: u16, description: impl Into<String>) -> Self {
        Self {
            status_code: code,
            status_description: description.into(),
            statekey: String::new(),
            hash: None,
            data: Value::Null,
        }
    }

    /// turn a non-success reply into a protocol error.
    pub fn into_result(self) -> Result<Self> {
        if self.status_code == status::OK {
            Ok(self)
        } else {
            Err(Error::Status {
                code: self.status_code,
                description: self.status_description,
            })
        }
    }
}

/// one outgoing link handed to a freshly claimed member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutgoingLink {
    /// the access point's externally reachable host.
    pub host: String,

    /// the access point's externally reachable port.
    pub port: String,

    /// routing cost of the link.
    pub cost: String,

    /// the state key this link is synchronized under.
    pub statekey: String,

    /// content hash of the link descriptor.
    pub hash: String,
}

/// the member's client-credential secret, annotated for state sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteClient {
    /// the state key this credential is synchronized under.
    pub statekey: String,

    /// content hash of the secret data.
    pub hash: String,

    /// the secret's data map (base64-encoded values).
    pub data: BTreeMap<String, String>,
}

/// reply to an [`AssertClaim`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberClaimReply {
    /// status code; anything other than 200 is a rejection.
    #[serde(rename = "statusCode")]
    pub status_code: u16,

    /// human-readable status description.
    #[serde(rename = "statusDescription", default)]
    pub status_description: String,

    /// the new member site's identifier.
    #[serde(rename = "siteId", default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,

    /// links the member should establish, in priority order.
    #[serde(rename = "outgoingLinks", default)]
    pub outgoing_links: Vec<OutgoingLink>,

    /// the member's client credential.
    #[serde(rename = "siteClient", default, skip_serializing_if = "Option::is_none")]
    pub site_client: Option<SiteClient>,
}

impl MemberClaimReply {
    /// a successful claim.
    pub fn ok(site_id: String, outgoing_links: Vec<OutgoingLink>, site_client: SiteClient) -> Self {
        Self {
            status_code: status::OK,
            status_description: "OK".to_string(),
            site_id: Some(site_id),
            outgoing_links,
            site_client: Some(site_client),
        }
    }

    /// a rejection.
    pub fn error(code: u16, description: impl Into<String>) -> Self {
        Self {
            status_code: code,
            status_description: description.into(),
            site_id: None,
            outgoing_links: Vec::new(),
            site_client: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn heartbeat_round_trips() {
        let mut hashset = BTreeMap::new();
        hashset.insert("tls-site-1".to_string(), "abc".to_string());
        let hb = Message::Heartbeat(
            Heartbeat::new("1".to_string(), PeerClass::Backbone, "reply/1".to_string())
                .with_hashset(hashset),
        );

        let body = hb.encode();
        assert_eq!(body["op"], "HB");
        assert_eq!(body["version"], 1);
        assert_eq!(body["hashset"]["tls-site-1"], "abc");

        let decoded = Message::decode(&body).unwrap();
        assert_eq!(decoded, hb);
    }

    #[test]
    fn beacon_omits_hashset() {
        let hb = Message::Heartbeat(Heartbeat::new(
            "1".to_string(),
            PeerClass::Member,
            "reply/1".to_string(),
        ));
        let body = hb.encode();
        assert!(body.get("hashset").is_none());
    }

    #[test]
    fn unknown_op_is_rejected() {
        let body = json!({"version": 1, "op": "PUSH", "site": "1"});
        assert!(matches!(
            Message::decode(&body),
            Err(Error::UnknownOp(op)) if op == "PUSH"
        ));
    }

    #[test]
    fn bad_version_is_rejected() {
        let body = json!({"version": 2, "op": "HB", "site": "1",
                          "sclass": "backbone", "address": "a"});
        assert!(matches!(Message::decode(&body), Err(Error::BadVersion(2))));
    }

    #[test]
    fn missing_op_is_malformed() {
        let body = json!({"version": 1});
        assert!(matches!(Message::decode(&body), Err(Error::Malformed(_))));
    }

    #[test]
    fn get_reply_status_propagates() {
        let reply = GetStateReply::error(status::NOT_FOUND, "no such key");
        match reply.into_result() {
            Err(Error::Status { code, description }) => {
                assert_eq!(code, 404);
                assert_eq!(description, "no such key");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn claim_reply_wire_names() {
        let reply = MemberClaimReply::ok(
            "7".to_string(),
            vec![OutgoingLink {
                host: "ap.example.com".to_string(),
                port: "55671".to_string(),
                cost: "1".to_string(),
                statekey: "link-3".to_string(),
                hash: "h".to_string(),
            }],
            SiteClient {
                statekey: "tls-site-7".to_string(),
                hash: "h2".to_string(),
                data: BTreeMap::new(),
            },
        );
        let body = serde_json::to_value(&reply).unwrap();
        assert_eq!(body["statusCode"], 200);
        assert_eq!(body["siteId"], "7");
        assert_eq!(body["outgoingLinks"][0]["statekey"], "link-3");
        assert_eq!(body["siteClient"]["statekey"], "tls-site-7");
    }
}
