//! Compiling address sets into formulas over one address field.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::bdd::Bdd;
use crate::error::{Error, ReferenceKind, Result};
use crate::integer::BddInteger;
use crate::memo::NamedMemo;
use crate::model::{AclIpSpaceLine, Ip, IpSpace, IpWildcard, LineAction, Prefix};
use crate::prefix::first_bits_equal;
use crate::reference::Ref;

/// Compiles [`IpSpace`] trees into formulas over a 32-bit address integer.
///
/// Results are cached per node by pointer identity. The cache keeps the node alive, so a
/// cached address can never be reused by a different node.
pub struct IpSpaceToBdd<'a> {
    bdd: Rc<Bdd>,
    var: BddInteger,
    named: &'a HashMap<String, Rc<IpSpace>>,
    cache: RefCell<HashMap<*const IpSpace, (Rc<IpSpace>, Ref)>>,
    references: NamedMemo<Ref>,
}

impl<'a> IpSpaceToBdd<'a> {
    pub fn new(var: &BddInteger, named: &'a HashMap<String, Rc<IpSpace>>) -> Self {
        assert_eq!(var.len(), 32, "Address integer must be 32 bits wide");
        Self {
            bdd: Rc::clone(var.bdd()),
            var: var.clone(),
            named,
            cache: RefCell::new(HashMap::new()),
            references: NamedMemo::new(ReferenceKind::IpSpace),
        }
    }

    pub fn var(&self) -> &BddInteger {
        &self.var
    }

    pub fn bdd(&self) -> &Rc<Bdd> {
        &self.bdd
    }

    pub fn ip_to_bdd(&self, ip: Ip) -> Ref {
        first_bits_equal(&self.var, ip, 32)
    }

    pub fn prefix_to_bdd(&self, prefix: Prefix) -> Ref {
        first_bits_equal(&self.var, prefix.start_ip(), prefix.length() as usize)
    }

    pub fn wildcard_to_bdd(&self, wildcard: IpWildcard) -> Ref {
        let ip = wildcard.ip();
        let mut acc = Ref::ONE;
        for i in (0..32).rev() {
            if wildcard.is_significant(i) {
                let bit = self.var.bits()[i];
                acc = self.bdd.apply_and(if ip.bit(i) { bit } else { -bit }, acc);
            }
        }
        acc
    }

    /// The formula of `space`, memoized by node identity.
    pub fn to_bdd(&self, space: &Rc<IpSpace>) -> Result<Ref> {
        let key = Rc::as_ptr(space);
        if let Some((_, f)) = self.cache.borrow().get(&key) {
            return Ok(*f);
        }
        let f = self.visit(space)?;
        self.cache.borrow_mut().insert(key, (Rc::clone(space), f));
        Ok(f)
    }

    /// The formula of the named definition `name`.
    pub fn reference_to_bdd(&self, name: &str) -> Result<Ref> {
        self.references.resolve(name, || {
            let space = self.named.get(name).ok_or_else(|| Error::UndefinedReference {
                kind: ReferenceKind::IpSpace,
                name: name.to_string(),
            })?;
            debug!("Resolving IP space reference {}", name);
            self.to_bdd(space)
        })
    }

    fn visit(&self, space: &IpSpace) -> Result<Ref> {
        Ok(match space {
            IpSpace::Universe => Ref::ONE,
            IpSpace::Empty => Ref::ZERO,
            IpSpace::Ip(ip) => self.ip_to_bdd(*ip),
            IpSpace::Prefix(prefix) => self.prefix_to_bdd(*prefix),
            IpSpace::Wildcard(wildcard) => self.wildcard_to_bdd(*wildcard),
            IpSpace::Reference(name) => self.reference_to_bdd(name)?,
            IpSpace::WildcardSet { whitelist, blacklist } => {
                let white = self
                    .bdd
                    .apply_or_many(whitelist.iter().map(|&w| self.wildcard_to_bdd(w)));
                let black = self
                    .bdd
                    .apply_or_many(blacklist.iter().map(|&w| self.wildcard_to_bdd(w)));
                self.bdd.apply_diff(white, black)
            }
            IpSpace::Acl(lines) => self.acl_lines_to_bdd(lines)?,
        })
    }

    /// First matching line decides; unmatched addresses are excluded.
    fn acl_lines_to_bdd(&self, lines: &[AclIpSpaceLine]) -> Result<Ref> {
        let mut acc = Ref::ZERO;
        for line in lines.iter().rev() {
            let f = self.to_bdd(&line.ip_space)?;
            let then = match line.action {
                LineAction::Permit => Ref::ONE,
                LineAction::Deny => Ref::ZERO,
            };
            acc = self.bdd.apply_ite(f, then, acc);
        }
        Ok(acc)
    }
}

/// Simplifies address sets under an ambient constraint on the same address field.
///
/// A node whose formula covers the ambient set becomes `Universe`, a node disjoint from it
/// becomes `Empty`, and members of composite nodes that cannot matter are dropped.
pub struct IpSpaceSpecializer<'a, 'b> {
    to_bdd: &'b IpSpaceToBdd<'a>,
    ambient: Ref,
}

impl<'a, 'b> IpSpaceSpecializer<'a, 'b> {
    pub fn new(to_bdd: &'b IpSpaceToBdd<'a>, ambient: Ref) -> Self {
        Self { to_bdd, ambient }
    }

    fn classify(&self, f: Ref) -> Option<IpSpace> {
        let bdd = self.to_bdd.bdd();
        if bdd.is_disjoint(self.ambient, f) {
            Some(IpSpace::Empty)
        } else if bdd.is_implies(self.ambient, f) {
            Some(IpSpace::Universe)
        } else {
            None
        }
    }

    pub fn specialize(&self, space: &Rc<IpSpace>) -> Result<Rc<IpSpace>> {
        let f = self.to_bdd.to_bdd(space)?;
        if let Some(trivial) = self.classify(f) {
            return Ok(Rc::new(trivial));
        }

        match space.as_ref() {
            IpSpace::WildcardSet { whitelist, blacklist } => {
                let relevant = |w: &&IpWildcard| self.classify(self.to_bdd.wildcard_to_bdd(**w)) != Some(IpSpace::Empty);
                let mut whitelist: Vec<IpWildcard> = whitelist.iter().filter(relevant).copied().collect();
                let blacklist: Vec<IpWildcard> = blacklist.iter().filter(relevant).copied().collect();
                if whitelist
                    .iter()
                    .any(|&w| self.classify(self.to_bdd.wildcard_to_bdd(w)) == Some(IpSpace::Universe))
                {
                    whitelist = vec![IpWildcard::ANY];
                }
                Ok(IpSpace::wildcard_set(whitelist, blacklist))
            }
            IpSpace::Acl(lines) => {
                let mut specialized = Vec::new();
                for line in lines {
                    let ip_space = self.specialize(&line.ip_space)?;
                    match ip_space.as_ref() {
                        IpSpace::Empty => continue,
                        IpSpace::Universe => {
                            // Nothing after this line is reachable.
                            specialized.push(AclIpSpaceLine {
                                action: line.action,
                                ip_space,
                            });
                            break;
                        }
                        _ => specialized.push(AclIpSpaceLine {
                            action: line.action,
                            ip_space,
                        }),
                    }
                }
                Ok(IpSpace::acl(specialized))
            }
            _ => Ok(Rc::clone(space)),
        }
    }
}
