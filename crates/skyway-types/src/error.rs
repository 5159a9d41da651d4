//! shared parse error for enumeration strings.

use thiserror::Error;

/// an unrecognized string form of one of the crate's enumerations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what}: {value:?}")]
pub struct ParseError {
    /// which enumeration failed to parse.
    pub what: &'static str,
    /// the offending input.
    pub value: String,
}

impl ParseError {
    pub(crate) fn new(what: &'static str, value: impl Into<String>) -> Self {
        Self {
            what,
            value: value.into(),
        }
    }
}
