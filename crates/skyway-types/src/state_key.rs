//! state keys: names for units of per-peer synchronized state.
//!
//! the state-sync protocol advertises a mapping from state key to content
//! hash; peers pull the bytes for keys whose hash changed. keys are opaque
//! strings on the wire; this module gives them a typed form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AccessPointId;
use crate::error::ParseError;

/// a typed state key.
///
/// the numeric payloads are row ids: `tls-site-*` and `link-*` are
/// interpreted in the id space of the peer's own class (interior sites and
/// inter-router links for backbone peers, member sites and edge links for
/// member peers).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StateKey {
    /// a site's client-credential secret.
    TlsSite(i64),
    /// an access point's server-credential secret.
    TlsServer(AccessPointId),
    /// an access point's kind/bind-host descriptor.
    Access(AccessPointId),
    /// runtime host/port of an access point, reported by the router.
    AccessStatus(AccessPointId),
    /// an outgoing link descriptor (host, port, cost).
    Link(i64),
    /// an application component allocated to a member site.
    Component(String),
    /// an application interface binding on a member site.
    Interface {
        /// the interface role.
        role: String,
        /// the binding's row id.
        binding: i64,
    },
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKey::TlsSite(id) => write!(f, "tls-site-{id}"),
            StateKey::TlsServer(id) => write!(f, "tls-server-{id}"),
            StateKey::Access(id) => write!(f, "access-{id}"),
            StateKey::AccessStatus(id) => write!(f, "accessstatus-{id}"),
            StateKey::Link(id) => write!(f, "link-{id}"),
            StateKey::Component(id) => write!(f, "component-{id}"),
            StateKey::Interface { role, binding } => write!(f, "iface-{role}-{binding}"),
        }
    }
}

impl FromStr for StateKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn id_suffix(s: &str, prefix: &str) -> Option<i64> {
            s.strip_prefix(prefix)?.parse().ok()
        }

        if let Some(id) = id_suffix(s, "tls-site-") {
            return Ok(StateKey::TlsSite(id));
        }
        if let Some(id) = id_suffix(s, "tls-server-") {
            return Ok(StateKey::TlsServer(AccessPointId(id)));
        }
        // accessstatus must be checked before access: shared prefix.
        if let Some(id) = id_suffix(s, "accessstatus-") {
            return Ok(StateKey::AccessStatus(AccessPointId(id)));
        }
        if let Some(id) = id_suffix(s, "access-") {
            return Ok(StateKey::Access(AccessPointId(id)));
        }
        if let Some(id) = id_suffix(s, "link-") {
            return Ok(StateKey::Link(id));
        }
        if let Some(rest) = s.strip_prefix("component-") {
            return Ok(StateKey::Component(rest.to_string()));
        }
        if let Some(rest) = s.strip_prefix("iface-")
            && let Some((role, binding)) = rest.rsplit_once('-')
            && let Ok(binding) = binding.parse()
        {
            return Ok(StateKey::Interface {
                role: role.to_string(),
                binding,
            });
        }
        Err(ParseError::new("state key", s))
    }
}

impl TryFrom<String> for StateKey {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StateKey> for String {
    fn from(k: StateKey) -> Self {
        k.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_strings() {
        for key in [
            StateKey::TlsSite(3),
            StateKey::TlsServer(AccessPointId(7)),
            StateKey::Access(AccessPointId(7)),
            StateKey::AccessStatus(AccessPointId(7)),
            StateKey::Link(12),
            StateKey::Component("5".to_string()),
            StateKey::Interface {
                role: "api".to_string(),
                binding: 4,
            },
        ] {
            let s = key.to_string();
            assert_eq!(s.parse::<StateKey>().unwrap(), key, "key {s}");
        }
    }

    #[test]
    fn accessstatus_is_not_mistaken_for_access() {
        assert_eq!(
            "accessstatus-9".parse::<StateKey>().unwrap(),
            StateKey::AccessStatus(AccessPointId(9))
        );
        assert_eq!(
            "access-9".parse::<StateKey>().unwrap(),
            StateKey::Access(AccessPointId(9))
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!("tls-site-x".parse::<StateKey>().is_err());
        assert!("unknown-1".parse::<StateKey>().is_err());
    }
}
