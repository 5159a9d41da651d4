//! link records: inter-router links and member edge links.

use serde::{Deserialize, Serialize};

use crate::{AccessPointId, EdgeLinkId, InvitationId, LinkId, SiteId};

/// a directed link from an interior site to a `peer`-kind access point on
/// another site of the same backbone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterRouterLink {
    /// unique identifier.
    pub id: LinkId,

    /// the target access point (must be of kind `peer`).
    pub access_point: AccessPointId,

    /// the site that initiates the connection.
    pub connecting_site: SiteId,

    /// routing cost of the link.
    pub cost: i64,
}

/// a directed attachment of an invitation's member sites to a
/// `member`-kind access point, with priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeLink {
    /// unique identifier.
    pub id: EdgeLinkId,

    /// the target access point (must be of kind `member`).
    pub access_point: AccessPointId,

    /// the invitation whose members attach through this link.
    pub invitation: InvitationId,

    /// preference order among an invitation's edge links.
    pub priority: i64,
}
