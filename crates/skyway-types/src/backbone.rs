//! backbone record: an administrative grouping of interior router sites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BackboneId, CertificateId, Lifecycle};

/// a transit backbone of interior routers.
///
/// each backbone owns a certificate-authority credential that signs the
/// client and server certificates of its sites and access points. at most
/// one backbone is the "management backbone" the controller itself joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backbone {
    /// unique identifier.
    pub id: BackboneId,

    /// administrative name.
    pub name: String,

    /// provisioning lifecycle (`new -> skx_cr_created -> ready`).
    pub lifecycle: Lifecycle,

    /// true for the management backbone.
    pub management: bool,

    /// the backbone's CA credential, once issued.
    pub certificate: Option<CertificateId>,

    /// failure text when `lifecycle` is `failed`.
    pub failure: Option<String>,

    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

impl Backbone {
    /// create a new backbone awaiting its CA.
    pub fn new(name: String) -> Self {
        Self {
            id: BackboneId(0),
            name,
            lifecycle: Lifecycle::New,
            management: false,
            certificate: None,
            failure: None,
            created_at: Utc::now(),
        }
    }
}
