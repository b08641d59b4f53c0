use std::fmt::{Display, Formatter};

use thiserror::Error;

/// What kind of named definition a reference points to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ReferenceKind {
    IpSpace,
    Filter,
}

impl Display for ReferenceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::IpSpace => write!(f, "IP space"),
            ReferenceKind::Filter => write!(f, "filter"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum Error {
    #[error("undefined {kind} reference: {name}")]
    UndefinedReference { kind: ReferenceKind, name: String },

    #[error("circular {kind} reference: {name}")]
    CircularReference { kind: ReferenceKind, name: String },

    #[error("invalid IP address: {0}")]
    InvalidIp(String),

    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error("invalid IP wildcard: {0}")]
    InvalidWildcard(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
