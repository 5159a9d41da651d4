//! application network (VAN) records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BackboneId, CertificateId, CredentialId, Lifecycle, VanId};

/// a tenant application network layered over one backbone.
///
/// each VAN owns its own CA credential that signs member-site client
/// certificates and invitation claim credentials. `connected` tracks
/// whether the VAN's addresses have been observed on the router network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationNetwork {
    /// unique identifier.
    pub id: VanId,

    /// administrative name.
    pub name: String,

    /// human-facing VAN identifier used in router configuration.
    pub van_id: String,

    /// the backbone this VAN is layered on.
    pub backbone: BackboneId,

    /// provisioning lifecycle.
    pub lifecycle: Lifecycle,

    /// the VAN's CA credential, once issued.
    pub certificate: Option<CertificateId>,

    /// start of the validity interval.
    pub start_time: DateTime<Utc>,

    /// optional end of the validity interval.
    pub end_time: Option<DateTime<Utc>>,

    /// true while the VAN's router addresses are observed live.
    pub connected: bool,

    /// failure text when `lifecycle` is `failed`.
    pub failure: Option<String>,

    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

impl ApplicationNetwork {
    /// create a new VAN awaiting its CA.
    pub fn new(name: String, van_id: String, backbone: BackboneId) -> Self {
        let now = Utc::now();
        Self {
            id: VanId(0),
            name,
            van_id,
            backbone,
            lifecycle: Lifecycle::New,
            certificate: None,
            start_time: now,
            end_time: None,
            connected: false,
            failure: None,
            created_at: now,
        }
    }
}

/// a client credential an externally hosted VAN uses to join the
/// management backbone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkCredential {
    /// unique identifier.
    pub id: CredentialId,

    /// administrative name.
    pub name: String,

    /// the VAN this credential belongs to.
    pub van: VanId,

    /// provisioning lifecycle.
    pub lifecycle: Lifecycle,

    /// the issued client credential.
    pub certificate: Option<CertificateId>,

    /// when the row was created.
    pub created_at: DateTime<Utc>,
}
