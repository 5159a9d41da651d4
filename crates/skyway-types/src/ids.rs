//! typed row identifiers.
//!
//! every database-backed entity gets its own id newtype so that a site id
//! cannot be passed where an access-point id is expected. ids are signed
//! 64-bit to match the database's auto-increment primary keys; zero means
//! "not yet assigned".

use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// identifier of a management-controller row.
    ControllerId
);
row_id!(
    /// identifier of a backbone.
    BackboneId
);
row_id!(
    /// identifier of an interior (backbone) site.
    SiteId
);
row_id!(
    /// identifier of a backbone access point.
    AccessPointId
);
row_id!(
    /// identifier of an inter-router link.
    LinkId
);
row_id!(
    /// identifier of an application network (VAN).
    VanId
);
row_id!(
    /// identifier of a network credential.
    CredentialId
);
row_id!(
    /// identifier of a member invitation.
    InvitationId
);
row_id!(
    /// identifier of an edge link (invitation to member access point).
    EdgeLinkId
);
row_id!(
    /// identifier of a member site.
    MemberId
);
row_id!(
    /// identifier of a tls certificate record.
    CertificateId
);
row_id!(
    /// identifier of a certificate request.
    CertRequestId
);
row_id!(
    /// identifier of an application.
    ApplicationId
);
row_id!(
    /// identifier of an instance block within an application.
    InstanceId
);
