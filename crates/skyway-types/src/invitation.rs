//! member invitations and their claim tokens.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccessPointId, CertificateId, InvitationId, Lifecycle, VanId};

/// length of the hex portion of a claim token (24 random bytes).
pub const CLAIM_TOKEN_HEX_LEN: usize = 48;

/// the prefix of every claim token.
pub const CLAIM_TOKEN_PREFIX: &str = "skx-claim-";

/// a validated claim token string.
///
/// claim tokens are guaranteed to start with `skx-claim-` and carry exactly
/// 48 hex characters after the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimToken(String);

impl ClaimToken {
    /// create a claim token, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, ClaimTokenError> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// generate a new random claim token.
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        let bytes: [u8; 24] = rng.random();
        Self(format!("{}{}", CLAIM_TOKEN_PREFIX, hex::encode(bytes)))
    }

    /// the full token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// consume the token and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }

    fn validate(s: &str) -> Result<(), ClaimTokenError> {
        let Some(hex_part) = s.strip_prefix(CLAIM_TOKEN_PREFIX) else {
            return Err(ClaimTokenError::MissingPrefix);
        };
        if hex_part.len() != CLAIM_TOKEN_HEX_LEN {
            return Err(ClaimTokenError::InvalidLength {
                expected: CLAIM_TOKEN_HEX_LEN,
                got: hex_part.len(),
            });
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ClaimTokenError::InvalidHex);
        }
        Ok(())
    }
}

impl fmt::Display for ClaimToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClaimToken {
    type Err = ClaimTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ClaimToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ClaimToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClaimToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// error type for invalid claim tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimTokenError {
    /// token does not start with `skx-claim-`.
    #[error("claim token must start with '{CLAIM_TOKEN_PREFIX}'")]
    MissingPrefix,

    /// hex portion has the wrong length.
    #[error("claim token hex portion must be {expected} characters, got {got}")]
    InvalidLength {
        /// expected length.
        expected: usize,
        /// actual length.
        got: usize,
    },

    /// hex portion contains non-hex characters.
    #[error("claim token hex portion contains invalid characters")]
    InvalidHex,
}

/// an invitation that onboards member sites into a VAN.
///
/// redeemed over the claim address of the invitation's claim-kind access
/// point. each successful claim increments `instance_count`; once
/// `instance_limit` is reached further claims are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberInvitation {
    /// unique identifier.
    pub id: InvitationId,

    /// administrative name.
    pub name: String,

    /// the VAN this invitation admits members to.
    pub van: VanId,

    /// provisioning lifecycle of the claim credential.
    pub lifecycle: Lifecycle,

    /// the invitation's claim credential, once issued.
    pub certificate: Option<CertificateId>,

    /// the claim-kind access point through which the invitation is redeemed.
    pub claim_access: AccessPointId,

    /// the secret token a prospective member presents.
    pub claim_token: ClaimToken,

    /// optional redemption deadline.
    pub deadline: Option<DateTime<Utc>>,

    /// site classes granted to members of this invitation.
    pub member_classes: Vec<String>,

    /// maximum number of members that may redeem the invitation.
    pub instance_limit: Option<i64>,

    /// how many members have redeemed the invitation so far.
    pub instance_count: i64,

    /// prefix used when generating member names.
    pub member_name_prefix: Option<String>,

    /// failure text when `lifecycle` is `failed`.
    pub failure: Option<String>,

    /// when the row was created.
    pub created_at: DateTime<Utc>,
}

impl MemberInvitation {
    /// create a new invitation awaiting its claim credential.
    pub fn new(name: String, van: VanId, claim_access: AccessPointId) -> Self {
        Self {
            id: InvitationId(0),
            name,
            van,
            lifecycle: Lifecycle::New,
            certificate: None,
            claim_access,
            claim_token: ClaimToken::generate(),
            deadline: None,
            member_classes: Vec::new(),
            instance_limit: None,
            instance_count: 0,
            member_name_prefix: None,
            failure: None,
            created_at: Utc::now(),
        }
    }

    /// true when the redemption deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Utc::now() > d)
    }

    /// true when no further members may redeem the invitation.
    pub fn at_instance_limit(&self) -> bool {
        self.instance_limit
            .is_some_and(|limit| self.instance_count >= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_is_valid() {
        let token = ClaimToken::generate();
        assert!(token.as_str().starts_with(CLAIM_TOKEN_PREFIX));
        ClaimToken::new(token.as_str()).unwrap();
    }

    #[test]
    fn bad_prefix_is_rejected() {
        let result = ClaimToken::new("claim-0123456789abcdef0123456789abcdef0123456789abcdef");
        assert!(matches!(result, Err(ClaimTokenError::MissingPrefix)));
    }

    #[test]
    fn bad_length_is_rejected() {
        let result = ClaimToken::new("skx-claim-0123456789abcdef");
        assert!(matches!(result, Err(ClaimTokenError::InvalidLength { .. })));
    }

    #[test]
    fn invitation_limit_checks() {
        let mut inv = MemberInvitation::new("inv1".into(), VanId(1), AccessPointId(1));
        assert!(!inv.at_instance_limit());

        inv.instance_limit = Some(2);
        inv.instance_count = 1;
        assert!(!inv.at_instance_limit());

        inv.instance_count = 2;
        assert!(inv.at_instance_limit());
    }

    #[test]
    fn invitation_deadline_checks() {
        let mut inv = MemberInvitation::new("inv1".into(), VanId(1), AccessPointId(1));
        assert!(!inv.is_expired());

        inv.deadline = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(inv.is_expired());
    }
}
