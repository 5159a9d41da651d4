//! interior site record: a router participating in a backbone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BackboneId, CertificateId, DeploymentState, Lifecycle, SiteId};

/// an interior router site.
///
/// the site's lifecycle is driven by the certificate reconciler up to
/// `ready`; the sync bridge promotes it to `active` on the first heartbeat
/// from the live router. `deployment_state` is maintained separately by the
/// deployment-state evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteriorSite {
    /// unique identifier.
    pub id: SiteId,

    /// administrative name.
    pub name: String,

    /// owning backbone.
    pub backbone: BackboneId,

    /// provisioning lifecycle.
    pub lifecycle: Lifecycle,

    /// the site's client credential, once issued.
    pub certificate: Option<CertificateId>,

    /// deployment readiness, derived by the evaluator.
    pub deployment_state: DeploymentState,

    /// target platform tag ("kube", "docker", "podman").
    pub platform: String,

    /// when the first heartbeat was received.
    pub first_active_time: Option<DateTime<Utc>>,

    /// when the most recent heartbeat was received.
    pub last_heartbeat: Option<DateTime<Utc>>,

    /// failure text when `lifecycle` is `failed`.
    pub failure: Option<String>,

    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

impl InteriorSite {
    /// create a new interior site awaiting credentials.
    pub fn new(name: String, backbone: BackboneId, platform: String) -> Self {
        Self {
            id: SiteId(0),
            name,
            backbone,
            lifecycle: Lifecycle::New,
            certificate: None,
            deployment_state: DeploymentState::NotReady,
            platform,
            first_active_time: None,
            last_heartbeat: None,
            failure: None,
            created_at: Utc::now(),
        }
    }
}
