//! peer protocol for skyway.
//!
//! this crate defines the three operations routers and the controller
//! exchange over the messaging fabric:
//! - `HB` heartbeats carrying state-manifest hash sets
//! - `GET` pulls of individual state payloads
//! - `CLAIM` assertions redeeming member invitations
//!
//! messages are json bodies; [`Message::decode`] validates the protocol
//! version and operation before handing back the typed form.

#![warn(missing_docs)]

mod error;
mod message;

pub use error::Error;
pub use message::{
    AssertClaim, GetState, GetStateReply, Heartbeat, Message, MemberClaimReply, OutgoingLink,
    SiteClient, status,
};

/// result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// current protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// fixed address where claim assertions are received.
pub const CLAIM_ADDRESS: &str = "skx/claim";

/// fixed address of the management controller's sync receiver.
pub const MANAGEMENT_ADDRESS: &str = "skx/sync/mgmtcontroller";
