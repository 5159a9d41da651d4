//! the management-controller record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CertificateId, ControllerId, Lifecycle};

/// the management controller's own row.
///
/// exactly one row with the configured name is expected; the backbone-link
/// manager inserts it at bootstrap if missing and waits for the certificate
/// reconciler to drive it to `ready` before opening any backbone sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementController {
    /// unique identifier.
    pub id: ControllerId,

    /// controller name, seeded from `SKX_CONTROLLER_NAME` or `HOSTNAME`.
    pub name: String,

    /// provisioning lifecycle.
    pub lifecycle: Lifecycle,

    /// the controller's client credential, once issued.
    pub certificate: Option<CertificateId>,

    /// failure text when `lifecycle` is `failed`.
    pub failure: Option<String>,

    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

impl ManagementController {
    /// create a new controller row awaiting credentials.
    pub fn new(name: String) -> Self {
        Self {
            id: ControllerId(0),
            name,
            lifecycle: Lifecycle::New,
            certificate: None,
            failure: None,
            created_at: Utc::now(),
        }
    }
}
