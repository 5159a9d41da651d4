//! database operations.
//!
//! every function is generic over [`sea_orm::ConnectionTrait`] so the same
//! code runs against the pooled connection or inside a transaction opened
//! with [`crate::SkywayDb::begin`].

mod access_point;
mod backbone;
mod certificate;
mod compose;
mod configuration;
mod controller;
mod invitation;
mod link;
mod member;
mod site;
mod van;

pub use access_point::*;
pub use backbone::*;
pub use certificate::*;
pub use compose::*;
pub use configuration::*;
pub use controller::*;
pub use invitation::*;
pub use link::*;
pub use member::*;
pub use site::*;
pub use van::*;
