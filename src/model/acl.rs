use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::model::header_space::HeaderSpace;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LineAction {
    Permit,
    Deny,
}

impl Display for LineAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LineAction::Permit => write!(f, "permit"),
            LineAction::Deny => write!(f, "deny"),
        }
    }
}

/// Boolean predicate over a packet and the place it entered the device.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AclLineMatchExpr {
    True,
    False,
    And(Vec<AclLineMatchExpr>),
    Or(Vec<AclLineMatchExpr>),
    Not(Box<AclLineMatchExpr>),
    MatchHeaderSpace(Rc<HeaderSpace>),
    /// The packet entered through one of the named interfaces.
    MatchSrcInterface(BTreeSet<String>),
    /// The packet was originated by the device itself.
    OriginatingFromDevice,
    /// The packet is permitted by the named filter.
    PermittedByAcl(String),
    /// The packet is not permitted by the named filter.
    DeniedByAcl(String),
}

impl AclLineMatchExpr {
    pub fn match_header_space(header_space: HeaderSpace) -> Self {
        AclLineMatchExpr::MatchHeaderSpace(Rc::new(header_space))
    }

    pub fn match_src_interface<S: Into<String>>(interfaces: impl IntoIterator<Item = S>) -> Self {
        AclLineMatchExpr::MatchSrcInterface(interfaces.into_iter().map(Into::into).collect())
    }

    pub fn not(expr: AclLineMatchExpr) -> Self {
        AclLineMatchExpr::Not(Box::new(expr))
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AclLine {
    Expr {
        name: Option<String>,
        action: LineAction,
        match_condition: AclLineMatchExpr,
    },
    /// Defer to another filter: its permitted flows are permitted, its denied flows are
    /// denied, and unmatched flows fall through to the next line.
    Acl { name: Option<String>, acl_name: String },
}

impl AclLine {
    pub fn accepting(match_condition: AclLineMatchExpr) -> Self {
        AclLine::Expr {
            name: None,
            action: LineAction::Permit,
            match_condition,
        }
    }

    pub fn rejecting(match_condition: AclLineMatchExpr) -> Self {
        AclLine::Expr {
            name: None,
            action: LineAction::Deny,
            match_condition,
        }
    }

    pub fn acl(acl_name: impl Into<String>) -> Self {
        AclLine::Acl {
            name: None,
            acl_name: acl_name.into(),
        }
    }

    pub fn with_name(self, line_name: impl Into<String>) -> Self {
        let line_name = Some(line_name.into());
        match self {
            AclLine::Expr {
                action,
                match_condition,
                ..
            } => AclLine::Expr {
                name: line_name,
                action,
                match_condition,
            },
            AclLine::Acl { acl_name, .. } => AclLine::Acl {
                name: line_name,
                acl_name,
            },
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            AclLine::Expr { name, .. } | AclLine::Acl { name, .. } => name.as_deref(),
        }
    }
}

/// An ordered, first-match-wins filter with an implicit final deny.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IpAccessList {
    pub name: String,
    pub lines: Vec<AclLine>,
}

impl IpAccessList {
    pub fn new(name: impl Into<String>, lines: Vec<AclLine>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }
}
