//! tls certificate records and the certificate-request queue.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::{CertRequestId, CertificateId, Lifecycle};

/// an issued credential, referencing the cluster-side secret by name.
///
/// `signed_by` links certificates into a trust forest: CA rows sign their
/// children, and a `None` parent means the external root issuer signed
/// this certificate directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsCertificate {
    /// unique identifier.
    pub id: CertificateId,

    /// name of the cluster-side certificate/secret object.
    pub object_name: String,

    /// true when this credential is a certificate authority.
    pub is_ca: bool,

    /// the CA that signed this certificate; `None` for the external root.
    pub signed_by: Option<CertificateId>,

    /// certificate expiration, from the issued object's status.
    pub expiration: Option<DateTime<Utc>>,

    /// when the issuer plans to rotate the certificate.
    pub renewal_time: Option<DateTime<Utc>>,

    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

/// which managed entity a certificate request provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CertRequestKind {
    /// the management controller's client credential.
    ManagementController,
    /// a backbone's certificate authority.
    BackboneCa,
    /// an interior site's client credential.
    InteriorSite,
    /// an access point's server credential.
    AccessPoint,
    /// a VAN's certificate authority.
    VanCa,
    /// a network credential for external VAN onboarding.
    NetworkCredential,
    /// an invitation's claim credential.
    MemberClaim,
    /// a member site's client credential.
    MemberSite,
}

impl CertRequestKind {
    /// database string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            CertRequestKind::ManagementController => "management_controller",
            CertRequestKind::BackboneCa => "backbone_ca",
            CertRequestKind::InteriorSite => "interior_site",
            CertRequestKind::AccessPoint => "access_point",
            CertRequestKind::VanCa => "van_ca",
            CertRequestKind::NetworkCredential => "network_credential",
            CertRequestKind::MemberClaim => "member_claim",
            CertRequestKind::MemberSite => "member_site",
        }
    }

    /// true when the requested credential is a certificate authority.
    pub fn is_ca(&self) -> bool {
        matches!(self, CertRequestKind::BackboneCa | CertRequestKind::VanCa)
    }

    /// default requested duration, in days.
    pub fn default_duration_days(&self) -> i64 {
        match self {
            CertRequestKind::BackboneCa | CertRequestKind::VanCa => 365,
            CertRequestKind::MemberClaim => 30,
            _ => 90,
        }
    }
}

impl fmt::Display for CertRequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertRequestKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "management_controller" => Ok(CertRequestKind::ManagementController),
            "backbone_ca" => Ok(CertRequestKind::BackboneCa),
            "interior_site" => Ok(CertRequestKind::InteriorSite),
            "access_point" => Ok(CertRequestKind::AccessPoint),
            "van_ca" => Ok(CertRequestKind::VanCa),
            "network_credential" => Ok(CertRequestKind::NetworkCredential),
            "member_claim" => Ok(CertRequestKind::MemberClaim),
            "member_site" => Ok(CertRequestKind::MemberSite),
            other => Err(ParseError::new("certificate request kind", other)),
        }
    }
}

impl TryFrom<String> for CertRequestKind {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CertRequestKind> for String {
    fn from(k: CertRequestKind) -> Self {
        k.as_str().to_string()
    }
}

/// a queued certificate issuance job.
///
/// the owning entity's reconciler inserts the request and advances the
/// entity to `skx_cr_created`; the request loop turns it into a cluster
/// certificate object (`cm_cert_created`); finalization deletes it once
/// the issued secret arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRequest {
    /// unique identifier.
    pub id: CertRequestId,

    /// what is being provisioned.
    pub kind: CertRequestKind,

    /// request lifecycle (`new -> cm_cert_created`).
    pub lifecycle: Lifecycle,

    /// the target entity's row id, interpreted per `kind`.
    pub target_id: i64,

    /// the CA that should sign; `None` for the external root issuer.
    pub issuer: Option<CertificateId>,

    /// requested certificate duration, in days.
    pub duration_days: i64,

    /// do not process before this time.
    pub request_time: DateTime<Utc>,

    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

impl CertificateRequest {
    /// create a request processable immediately.
    pub fn new(kind: CertRequestKind, target_id: i64, issuer: Option<CertificateId>) -> Self {
        let now = Utc::now();
        Self {
            id: CertRequestId(0),
            kind,
            lifecycle: Lifecycle::New,
            target_id,
            issuer,
            duration_days: kind.default_duration_days(),
            request_time: now,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips() {
        for k in [
            CertRequestKind::ManagementController,
            CertRequestKind::BackboneCa,
            CertRequestKind::InteriorSite,
            CertRequestKind::AccessPoint,
            CertRequestKind::VanCa,
            CertRequestKind::NetworkCredential,
            CertRequestKind::MemberClaim,
            CertRequestKind::MemberSite,
        ] {
            assert_eq!(k.as_str().parse::<CertRequestKind>().unwrap(), k);
        }
    }

    #[test]
    fn ca_kinds_get_long_durations() {
        assert!(CertRequestKind::BackboneCa.is_ca());
        assert!(CertRequestKind::VanCa.is_ca());
        assert_eq!(CertRequestKind::BackboneCa.default_duration_days(), 365);
        assert_eq!(CertRequestKind::InteriorSite.default_duration_days(), 90);
    }
}
