//! lifecycle enumerations shared by every managed entity.
//!
//! managed rows progress `partial (optional) -> new -> skx_cr_created ->
//! cm_cert_created -> ready -> active (sites only)`, with `expired` and
//! `failed` as terminal states. the database stores the string forms; the
//! enum variants are named for what each step means.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// lifecycle state of a managed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Lifecycle {
    /// created without enough information to proceed (access points
    /// before their host/port are known).
    Partial,
    /// ready for the certificate reconciler to pick up.
    New,
    /// a certificate request row has been queued.
    CertRequestCreated,
    /// the cluster certificate object has been created; waiting for the
    /// issued secret to arrive.
    CertObjectCreated,
    /// credentials issued; the entity is fully provisioned.
    Ready,
    /// a live peer has been heard from (sites only).
    Active,
    /// the entity's validity interval has passed.
    Expired,
    /// provisioning failed; see the row's failure text.
    Failed,
}

impl Lifecycle {
    /// database string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Partial => "partial",
            Lifecycle::New => "new",
            Lifecycle::CertRequestCreated => "skx_cr_created",
            Lifecycle::CertObjectCreated => "cm_cert_created",
            Lifecycle::Ready => "ready",
            Lifecycle::Active => "active",
            Lifecycle::Expired => "expired",
            Lifecycle::Failed => "failed",
        }
    }

    /// true once credentials have been issued (`ready` or `active`).
    pub fn is_provisioned(&self) -> bool {
        matches!(self, Lifecycle::Ready | Lifecycle::Active)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lifecycle {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partial" => Ok(Lifecycle::Partial),
            "new" => Ok(Lifecycle::New),
            "skx_cr_created" => Ok(Lifecycle::CertRequestCreated),
            "cm_cert_created" => Ok(Lifecycle::CertObjectCreated),
            "ready" => Ok(Lifecycle::Ready),
            "active" => Ok(Lifecycle::Active),
            "expired" => Ok(Lifecycle::Expired),
            "failed" => Ok(Lifecycle::Failed),
            other => Err(ParseError::new("lifecycle", other)),
        }
    }
}

impl TryFrom<String> for Lifecycle {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Lifecycle> for String {
    fn from(l: Lifecycle) -> Self {
        l.as_str().to_string()
    }
}

/// deployment readiness of an interior site, derived from its lifecycle,
/// its links, and its manage access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeploymentState {
    /// not yet deployable.
    NotReady,
    /// deployable by hand: the site has a manage access point for the
    /// controller to reach it once it comes up.
    ReadyBootstrap,
    /// deployable automatically: the site links into an already deployed
    /// site and will find the backbone on its own.
    ReadyAutomatic,
    /// a live router has connected for this site.
    Deployed,
}

impl DeploymentState {
    /// database string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::NotReady => "not-ready",
            DeploymentState::ReadyBootstrap => "ready-bootstrap",
            DeploymentState::ReadyAutomatic => "ready-automatic",
            DeploymentState::Deployed => "deployed",
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not-ready" => Ok(DeploymentState::NotReady),
            "ready-bootstrap" => Ok(DeploymentState::ReadyBootstrap),
            "ready-automatic" => Ok(DeploymentState::ReadyAutomatic),
            "deployed" => Ok(DeploymentState::Deployed),
            other => Err(ParseError::new("deployment state", other)),
        }
    }
}

impl TryFrom<String> for DeploymentState {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DeploymentState> for String {
    fn from(d: DeploymentState) -> Self {
        d.as_str().to_string()
    }
}

/// class of a peer in the state-sync protocol.
///
/// the class selects which bridge handlers apply to a peer's heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PeerClass {
    /// the management controller itself.
    Management,
    /// an interior (backbone) router.
    Backbone,
    /// a member site participating in a VAN.
    Member,
}

impl PeerClass {
    /// wire string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerClass::Management => "management",
            PeerClass::Backbone => "backbone",
            PeerClass::Member => "member",
        }
    }
}

impl fmt::Display for PeerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeerClass {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "management" => Ok(PeerClass::Management),
            "backbone" => Ok(PeerClass::Backbone),
            "member" => Ok(PeerClass::Member),
            other => Err(ParseError::new("peer class", other)),
        }
    }
}

impl TryFrom<String> for PeerClass {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PeerClass> for String {
    fn from(c: PeerClass) -> Self {
        c.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_round_trips_through_strings() {
        for l in [
            Lifecycle::Partial,
            Lifecycle::New,
            Lifecycle::CertRequestCreated,
            Lifecycle::CertObjectCreated,
            Lifecycle::Ready,
            Lifecycle::Active,
            Lifecycle::Expired,
            Lifecycle::Failed,
        ] {
            assert_eq!(l.as_str().parse::<Lifecycle>().unwrap(), l);
        }
    }

    #[test]
    fn lifecycle_database_strings_are_stable() {
        assert_eq!(Lifecycle::CertRequestCreated.as_str(), "skx_cr_created");
        assert_eq!(Lifecycle::CertObjectCreated.as_str(), "cm_cert_created");
    }

    #[test]
    fn unknown_lifecycle_is_rejected() {
        assert!("bogus".parse::<Lifecycle>().is_err());
    }

    #[test]
    fn deployment_state_round_trips() {
        for d in [
            DeploymentState::NotReady,
            DeploymentState::ReadyBootstrap,
            DeploymentState::ReadyAutomatic,
            DeploymentState::Deployed,
        ] {
            assert_eq!(d.as_str().parse::<DeploymentState>().unwrap(), d);
        }
    }

    #[test]
    fn peer_class_serde_uses_wire_strings() {
        let json = serde_json::to_string(&PeerClass::Backbone).unwrap();
        assert_eq!(json, "\"backbone\"");
        let parsed: PeerClass = serde_json::from_str("\"member\"").unwrap();
        assert_eq!(parsed, PeerClass::Member);
    }
}
