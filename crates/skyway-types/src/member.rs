//! member site record: a site that redeemed an invitation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CertificateId, InvitationId, Lifecycle, MemberId, VanId};

/// a non-backbone site participating in a VAN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSite {
    /// unique identifier.
    pub id: MemberId,

    /// site name, taken from the claim assertion.
    pub name: String,

    /// the VAN this member belongs to.
    pub van: VanId,

    /// the invitation that was redeemed.
    pub invitation: InvitationId,

    /// provisioning lifecycle.
    pub lifecycle: Lifecycle,

    /// the member's client credential, once issued.
    pub certificate: Option<CertificateId>,

    /// site classes inherited from the invitation; drive application
    /// block allocation.
    pub site_classes: Vec<String>,

    /// free-form metadata exposed to application templates.
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// when the first heartbeat was received.
    pub first_active_time: Option<DateTime<Utc>>,

    /// when the most recent heartbeat was received.
    pub last_heartbeat: Option<DateTime<Utc>>,

    /// failure text when `lifecycle` is `failed`.
    pub failure: Option<String>,

    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

impl MemberSite {
    /// create a new member site awaiting credentials.
    pub fn new(name: String, van: VanId, invitation: InvitationId) -> Self {
        Self {
            id: MemberId(0),
            name,
            van,
            invitation,
            lifecycle: Lifecycle::New,
            certificate: None,
            site_classes: Vec::new(),
            metadata: BTreeMap::new(),
            first_active_time: None,
            last_heartbeat: None,
            failure: None,
            created_at: Utc::now(),
        }
    }
}
