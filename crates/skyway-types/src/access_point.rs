//! backbone access points: ingresses on interior router sites.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::{AccessPointId, CertificateId, Lifecycle, SiteId};

/// the kind of traffic an access point admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AccessPointKind {
    /// claim assertions from prospective members.
    Claim,
    /// inter-router links from other backbone sites.
    Peer,
    /// edge links from member sites.
    Member,
    /// management-controller sessions.
    Manage,
    /// VAN onboarding for external application networks.
    Van,
}

impl AccessPointKind {
    /// database/wire string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessPointKind::Claim => "claim",
            AccessPointKind::Peer => "peer",
            AccessPointKind::Member => "member",
            AccessPointKind::Manage => "manage",
            AccessPointKind::Van => "van",
        }
    }
}

impl fmt::Display for AccessPointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessPointKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claim" => Ok(AccessPointKind::Claim),
            "peer" => Ok(AccessPointKind::Peer),
            "member" => Ok(AccessPointKind::Member),
            "manage" => Ok(AccessPointKind::Manage),
            "van" => Ok(AccessPointKind::Van),
            other => Err(ParseError::new("access point kind", other)),
        }
    }
}

impl TryFrom<String> for AccessPointKind {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AccessPointKind> for String {
    fn from(k: AccessPointKind) -> Self {
        k.as_str().to_string()
    }
}

/// an ingress on an interior site.
///
/// an access point is created `partial` when its host/port are not yet
/// known (the router discovers them at runtime and reports them through the
/// state-sync protocol). the moment both are present it becomes `new` and
/// the certificate reconciler issues its server credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackboneAccessPoint {
    /// unique identifier.
    pub id: AccessPointId,

    /// administrative name.
    pub name: String,

    /// the site this ingress lives on.
    pub site: SiteId,

    /// traffic kind.
    pub kind: AccessPointKind,

    /// provisioning lifecycle (`partial -> new -> ... -> ready`).
    pub lifecycle: Lifecycle,

    /// the access point's server credential, once issued.
    pub certificate: Option<CertificateId>,

    /// externally reachable host, once known.
    pub hostname: Option<String>,

    /// externally reachable port, once known.
    pub port: Option<String>,

    /// optional local bind host for the router listener.
    pub bind_host: Option<String>,

    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

impl BackboneAccessPoint {
    /// create a new access point. starts `partial` unless both host and
    /// port are already known.
    pub fn new(name: String, site: SiteId, kind: AccessPointKind) -> Self {
        Self {
            id: AccessPointId(0),
            name,
            site,
            kind,
            lifecycle: Lifecycle::Partial,
            certificate: None,
            hostname: None,
            port: None,
            bind_host: None,
            created_at: Utc::now(),
        }
    }

    /// true when both host and port are known.
    pub fn has_ingress(&self) -> bool {
        self.hostname.is_some() && self.port.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips() {
        for k in [
            AccessPointKind::Claim,
            AccessPointKind::Peer,
            AccessPointKind::Member,
            AccessPointKind::Manage,
            AccessPointKind::Van,
        ] {
            assert_eq!(k.as_str().parse::<AccessPointKind>().unwrap(), k);
        }
    }

    #[test]
    fn new_access_point_is_partial() {
        let ap = BackboneAccessPoint::new("ap1".into(), SiteId(1), AccessPointKind::Manage);
        assert_eq!(ap.lifecycle, Lifecycle::Partial);
        assert!(!ap.has_ingress());
    }
}
