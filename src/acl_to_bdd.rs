//! Compiling filters: ordered, first-match-wins lists of permit and deny lines.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::bdd::Bdd;
use crate::error::{Error, ReferenceKind, Result};
use crate::header_space_to_bdd::HeaderSpaceToBdd;
use crate::memo::NamedMemo;
use crate::model::{AclLine, IpAccessList, IpSpace, LineAction};
use crate::packet::BddPacket;
use crate::reference::Ref;
use crate::source::SourceManager;

/// Flows explicitly permitted and explicitly denied by a filter or a line.
///
/// Flows in neither set are not matched at all. The two sets are always disjoint.
#[derive(Debug, Clone)]
pub struct PermitAndDeny {
    permit: Ref,
    deny: Ref,
    matched: OnceCell<Ref>,
}

impl PermitAndDeny {
    pub fn new(permit: Ref, deny: Ref) -> Self {
        Self {
            permit,
            deny,
            matched: OnceCell::new(),
        }
    }

    pub fn permit(&self) -> Ref {
        self.permit
    }

    pub fn deny(&self) -> Ref {
        self.deny
    }

    /// Flows matched by some line, computed on first use.
    pub fn matched(&self, bdd: &Bdd) -> Ref {
        *self.matched.get_or_init(|| bdd.apply_or(self.permit, self.deny))
    }
}

impl PartialEq for PermitAndDeny {
    fn eq(&self, other: &Self) -> bool {
        self.permit == other.permit && self.deny == other.deny
    }
}

impl Eq for PermitAndDeny {}

/// Compiles filters and match expressions against one packet, one set of named
/// definitions and one source manager.
pub struct AclToBdd<'a> {
    pub(crate) packet: &'a BddPacket,
    pub(crate) header_space: HeaderSpaceToBdd<'a>,
    pub(crate) sources: &'a SourceManager,
    named_acls: &'a HashMap<String, IpAccessList>,
    acls: NamedMemo<PermitAndDeny>,
}

impl<'a> AclToBdd<'a> {
    pub fn new(
        packet: &'a BddPacket,
        named_acls: &'a HashMap<String, IpAccessList>,
        named_ip_spaces: &'a HashMap<String, Rc<IpSpace>>,
        sources: &'a SourceManager,
    ) -> Self {
        Self {
            packet,
            header_space: HeaderSpaceToBdd::new(packet, named_ip_spaces),
            sources,
            named_acls,
            acls: NamedMemo::new(ReferenceKind::Filter),
        }
    }

    pub fn packet(&self) -> &'a BddPacket {
        self.packet
    }

    pub fn header_space_to_bdd(&self) -> &HeaderSpaceToBdd<'a> {
        &self.header_space
    }

    pub(crate) fn bdd(&self) -> &Rc<Bdd> {
        self.packet.bdd()
    }

    /// Flows permitted by `acl`. Flows matching no line are denied.
    pub fn to_bdd(&self, acl: &IpAccessList) -> Result<Ref> {
        Ok(self.to_permit_and_deny(acl)?.permit())
    }

    /// Explicitly permitted and denied flows of `acl`.
    ///
    /// If `acl` is the definition registered under its own name, the result is shared with
    /// references to that name.
    pub fn to_permit_and_deny(&self, acl: &IpAccessList) -> Result<PermitAndDeny> {
        let registered = self
            .named_acls
            .get(&acl.name)
            .is_some_and(|named| std::ptr::eq(named, acl));
        if registered {
            self.named_to_permit_and_deny(&acl.name)
        } else {
            self.lines_to_permit_and_deny(&acl.lines)
        }
    }

    /// Explicitly permitted and denied flows of the filter registered as `name`.
    pub fn named_to_permit_and_deny(&self, name: &str) -> Result<PermitAndDeny> {
        self.acls.resolve(name, || {
            let acl = self.named_acls.get(name).ok_or_else(|| Error::UndefinedReference {
                kind: ReferenceKind::Filter,
                name: name.to_string(),
            })?;
            debug!("Compiling filter {} ({} lines)", name, acl.lines.len());
            self.lines_to_permit_and_deny(&acl.lines)
        })
    }

    /// Flows permitted and denied by a single line, as if it were the only line.
    pub fn line_to_permit_and_deny(&self, line: &AclLine) -> Result<PermitAndDeny> {
        match line {
            AclLine::Expr {
                action,
                match_condition,
                ..
            } => {
                let m = self.match_to_bdd(match_condition)?;
                Ok(match action {
                    LineAction::Permit => PermitAndDeny::new(m, Ref::ZERO),
                    LineAction::Deny => PermitAndDeny::new(Ref::ZERO, m),
                })
            }
            AclLine::Acl { acl_name, .. } => self.named_to_permit_and_deny(acl_name),
        }
    }

    /// Fold lines from last to first. Consecutive lines with the same action are merged
    /// into one batch before they shadow what comes after them.
    fn lines_to_permit_and_deny(&self, lines: &[AclLine]) -> Result<PermitAndDeny> {
        let bdd = self.bdd();
        let mut permit = Ref::ZERO;
        let mut deny = Ref::ZERO;
        let mut batch: Option<(LineAction, Ref)> = None;

        for line in lines.iter().rev() {
            match line {
                AclLine::Expr {
                    action,
                    match_condition,
                    ..
                } => {
                    let m = self.match_to_bdd(match_condition)?;
                    batch = match batch {
                        Some((a, b)) if a == *action => Some((a, bdd.apply_or(b, m))),
                        other => {
                            self.fold_batch(other, &mut permit, &mut deny);
                            Some((*action, m))
                        }
                    };
                }
                AclLine::Acl { acl_name, .. } => {
                    self.fold_batch(batch.take(), &mut permit, &mut deny);
                    let sub = self.named_to_permit_and_deny(acl_name)?;
                    let matched = sub.matched(bdd);
                    permit = bdd.apply_or(sub.permit(), bdd.apply_diff(permit, matched));
                    deny = bdd.apply_or(sub.deny(), bdd.apply_diff(deny, matched));
                }
            }
        }
        self.fold_batch(batch, &mut permit, &mut deny);

        Ok(PermitAndDeny::new(permit, deny))
    }

    /// Put a batch of same-action lines in front of the folded suffix.
    fn fold_batch(&self, batch: Option<(LineAction, Ref)>, permit: &mut Ref, deny: &mut Ref) {
        let bdd = self.bdd();
        match batch {
            Some((LineAction::Permit, m)) => {
                *permit = bdd.apply_or(m, *permit);
                *deny = bdd.apply_diff(*deny, m);
            }
            Some((LineAction::Deny, m)) => {
                *deny = bdd.apply_or(m, *deny);
                *permit = bdd.apply_diff(*permit, m);
            }
            None => {}
        }
    }

    /// For each line, the flows that reach it and are matched by it, followed by the flows
    /// that match no line.
    pub fn reach_and_match_lines(&self, acl: &IpAccessList) -> Result<Vec<Ref>> {
        let bdd = self.bdd();
        let mut result = Vec::with_capacity(acl.lines.len() + 1);
        let mut reach = Ref::ONE;
        for line in &acl.lines {
            let matched = self.line_to_permit_and_deny(line)?.matched(bdd);
            result.push(bdd.apply_and(reach, matched));
            reach = bdd.apply_diff(reach, matched);
        }
        result.push(reach);
        Ok(result)
    }
}
