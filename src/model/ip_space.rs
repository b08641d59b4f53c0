use std::rc::Rc;

use crate::model::acl::LineAction;
use crate::model::ip::{Ip, IpWildcard, Prefix};

/// A set of IPv4 addresses, as an expression tree.
///
/// Nodes are shared through [`Rc`]. Compilers cache results by pointer identity, so two
/// structurally equal but separately allocated nodes are compiled separately.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum IpSpace {
    Universe,
    Empty,
    Ip(Ip),
    Prefix(Prefix),
    Wildcard(IpWildcard),
    /// A named definition, resolved against the caller's name map.
    Reference(String),
    /// Addresses matching any whitelisted wildcard and no blacklisted one.
    WildcardSet {
        whitelist: Vec<IpWildcard>,
        blacklist: Vec<IpWildcard>,
    },
    /// First-match-wins list of permitted and denied sub-spaces; default deny.
    Acl(Vec<AclIpSpaceLine>),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AclIpSpaceLine {
    pub action: LineAction,
    pub ip_space: Rc<IpSpace>,
}

impl AclIpSpaceLine {
    pub fn permit(ip_space: Rc<IpSpace>) -> Self {
        Self {
            action: LineAction::Permit,
            ip_space,
        }
    }

    pub fn deny(ip_space: Rc<IpSpace>) -> Self {
        Self {
            action: LineAction::Deny,
            ip_space,
        }
    }
}

impl IpSpace {
    pub fn reference(name: impl Into<String>) -> Rc<Self> {
        Rc::new(IpSpace::Reference(name.into()))
    }

    pub fn wildcard_set(
        whitelist: impl IntoIterator<Item = IpWildcard>,
        blacklist: impl IntoIterator<Item = IpWildcard>,
    ) -> Rc<Self> {
        Rc::new(IpSpace::WildcardSet {
            whitelist: whitelist.into_iter().collect(),
            blacklist: blacklist.into_iter().collect(),
        })
    }

    pub fn acl(lines: impl IntoIterator<Item = AclIpSpaceLine>) -> Rc<Self> {
        Rc::new(IpSpace::Acl(lines.into_iter().collect()))
    }
}

impl From<Ip> for IpSpace {
    fn from(ip: Ip) -> Self {
        IpSpace::Ip(ip)
    }
}

impl From<Prefix> for IpSpace {
    fn from(prefix: Prefix) -> Self {
        IpSpace::Prefix(prefix)
    }
}

impl From<IpWildcard> for IpSpace {
    fn from(wildcard: IpWildcard) -> Self {
        IpSpace::Wildcard(wildcard)
    }
}
