//! core types for skyway - a VAN fabric management controller.
//!
//! this crate provides the fundamental data structures used throughout skyway:
//! - backbone, interior-site, and access-point records for the transit network
//! - application networks (VANs), invitations, and member sites
//! - tls certificates and certificate requests
//! - state keys for the peer state-sync protocol
//! - application configuration

#![warn(missing_docs)]

mod access_point;
mod backbone;
mod certificate;
mod config;
mod controller;
mod error;
mod ids;
mod invitation;
mod lifecycle;
mod link;
mod member;
mod site;
mod state_key;
mod van;

pub use access_point::{AccessPointKind, BackboneAccessPoint};
pub use backbone::Backbone;
pub use certificate::{CertRequestKind, CertificateRequest, TlsCertificate};
pub use config::{Config, DatabaseConfig, LinkConfig, ReconcilerConfig, SyncConfig};
pub use controller::ManagementController;
pub use error::ParseError;
pub use ids::{
    AccessPointId, ApplicationId, BackboneId, CertRequestId, CertificateId, ControllerId,
    CredentialId, EdgeLinkId, InstanceId, InvitationId, LinkId, MemberId, SiteId, VanId,
};
pub use invitation::{CLAIM_TOKEN_PREFIX, ClaimToken, ClaimTokenError, MemberInvitation};
pub use lifecycle::{DeploymentState, Lifecycle, PeerClass};
pub use link::{EdgeLink, InterRouterLink};
pub use member::MemberSite;
pub use site::InteriorSite;
pub use state_key::StateKey;
pub use van::{ApplicationNetwork, NetworkCredential};
