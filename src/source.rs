//! Tracking where a packet entered the device.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use log::debug;

use crate::bdd::Bdd;
use crate::finite_domain::FiniteDomain;
use crate::flow_preference::FlowPreference;
use crate::model::{AclLine, AclLineMatchExpr, Flow, IpAccessList};
use crate::packet::BddPacket;
use crate::reference::Ref;

/// Where a packet came from: the device itself, or an ingress interface.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Source {
    Device,
    Interface(String),
}

impl Source {
    pub fn interface(name: impl Into<String>) -> Self {
        Source::Interface(name.into())
    }

    /// Ingress interface name, `None` for device-originated packets.
    pub fn interface_name(&self) -> Option<&str> {
        match self {
            Source::Device => None,
            Source::Interface(name) => Some(name),
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Device => write!(f, "<device>"),
            Source::Interface(name) => write!(f, "{}", name),
        }
    }
}

/// Active interfaces of one device and the sources its filters refer to.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SourceUsage {
    pub active_interfaces: BTreeSet<String>,
    pub referenced: BTreeSet<Source>,
}

/// Maps the sources of one device onto a finite domain.
///
/// Sources that are active and referenced get their own value. All active sources that
/// are never referenced share one value, keyed by the smallest of them. Inactive sources
/// match nothing.
#[derive(Debug, Clone)]
pub struct SourceManager {
    bdd: Rc<Bdd>,
    domain: FiniteDomain<Source>,
    active: BTreeSet<Source>,
    representative: Option<Source>,
}

impl SourceManager {
    pub fn new(packet: &BddPacket, active_interfaces: &BTreeSet<String>, referenced: &BTreeSet<Source>) -> Self {
        let active = Self::active_sources(active_interfaces);
        let (values, representative) = Self::domain_values(&active, referenced);
        let domain = FiniteDomain::new(packet, &values);
        Self::from_parts(packet, domain, active, representative)
    }

    /// Manager in which every active interface is distinguishable.
    pub fn for_interfaces(packet: &BddPacket, active_interfaces: &BTreeSet<String>) -> Self {
        let referenced = Self::active_sources(active_interfaces);
        Self::new(packet, active_interfaces, &referenced)
    }

    /// Managers for many devices over one shared block of variables.
    ///
    /// Only valid if devices are analyzed independently of each other.
    pub fn for_network<K: Ord + Clone>(
        packet: &BddPacket,
        devices: &BTreeMap<K, SourceUsage>,
    ) -> BTreeMap<K, SourceManager> {
        let mut actives = BTreeMap::new();
        let mut representatives = BTreeMap::new();
        let mut values_by_device = BTreeMap::new();
        for (key, usage) in devices {
            let active = Self::active_sources(&usage.active_interfaces);
            let (values, representative) = Self::domain_values(&active, &usage.referenced);
            actives.insert(key.clone(), active);
            representatives.insert(key.clone(), representative);
            values_by_device.insert(key.clone(), values);
        }

        FiniteDomain::shared(packet, &values_by_device)
            .into_iter()
            .map(|(key, domain)| {
                let active = actives.remove(&key).unwrap_or_default();
                let representative = representatives.remove(&key).flatten();
                let manager = Self::from_parts(packet, domain, active, representative);
                (key, manager)
            })
            .collect()
    }

    fn from_parts(
        packet: &BddPacket,
        domain: FiniteDomain<Source>,
        active: BTreeSet<Source>,
        representative: Option<Source>,
    ) -> Self {
        debug!(
            "Source manager: {} active sources, {} tracked values, {} bits",
            active.len(),
            domain.len(),
            domain.var().len()
        );
        Self {
            bdd: Rc::clone(packet.bdd()),
            domain,
            active,
            representative,
        }
    }

    /// The device itself is always a possible source.
    fn active_sources(active_interfaces: &BTreeSet<String>) -> BTreeSet<Source> {
        let mut active: BTreeSet<Source> = active_interfaces.iter().cloned().map(Source::Interface).collect();
        active.insert(Source::Device);
        active
    }

    fn domain_values(active: &BTreeSet<Source>, referenced: &BTreeSet<Source>) -> (BTreeSet<Source>, Option<Source>) {
        let mut values: BTreeSet<Source> = active.intersection(referenced).cloned().collect();
        let representative = active.difference(referenced).next().cloned();
        if let Some(r) = &representative {
            values.insert(r.clone());
        }
        (values, representative)
    }

    pub fn domain(&self) -> &FiniteDomain<Source> {
        &self.domain
    }

    pub fn is_active(&self, source: &Source) -> bool {
        self.active.contains(source)
    }

    /// Whether `source` shares its value with the other unreferenced sources.
    pub fn is_collapsed(&self, source: &Source) -> bool {
        (self.is_active(source) && self.domain.value_bdd(source).is_none())
            || self.representative.as_ref() == Some(source)
    }

    /// The packet came from `source`.
    pub fn source_bdd(&self, source: &Source) -> Ref {
        if !self.is_active(source) {
            return Ref::ZERO;
        }
        if let Some(f) = self.domain.value_bdd(source) {
            return f;
        }
        self.representative
            .as_ref()
            .and_then(|r| self.domain.value_bdd(r))
            .unwrap_or(Ref::ZERO)
    }

    /// The packet entered through one of `interfaces`.
    pub fn match_src_interface_bdd<'a>(&self, interfaces: impl IntoIterator<Item = &'a String>) -> Ref {
        self.bdd.apply_or_many(
            interfaces
                .into_iter()
                .map(|name| self.source_bdd(&Source::Interface(name.clone()))),
        )
    }

    pub fn originating_from_device_bdd(&self) -> Ref {
        self.source_bdd(&Source::Device)
    }

    /// The source block holds a valid value.
    pub fn is_valid_value(&self) -> Ref {
        self.domain.is_valid()
    }

    /// The source selected by a satisfying cube.
    ///
    /// For collapsed sources this is the representative, standing in for all of them.
    pub fn source_from_assignment(&self, cube: Ref) -> Option<Source> {
        self.domain.value_from_assignment(cube)
    }

    /// Ingress interface selected by a satisfying cube; `None` for the device itself.
    pub fn interface_from_assignment(&self, cube: Ref) -> Option<String> {
        self.source_from_assignment(cube)
            .and_then(|s| s.interface_name().map(str::to_string))
    }

    /// One well-formed flow in `f` from a valid source, with its ingress interface filled in.
    pub fn get_flow(&self, packet: &BddPacket, f: Ref, preference: FlowPreference) -> Option<Flow> {
        let f = self
            .bdd
            .apply_and_many([f, self.is_valid_value(), packet.well_formed_flow_constraint()]);
        if self.bdd.is_zero(f) {
            return None;
        }
        let cube = self.bdd.sat_one_cube(packet.pick_representative(f, preference));
        let mut flow = packet.decode_flow(cube);
        flow.ingress_interface = self.interface_from_assignment(cube);
        Some(flow)
    }
}

/// Sources mentioned by the predicates of `acl` and of every filter it refers to.
pub fn referenced_sources(acl: &IpAccessList, named_acls: &HashMap<String, IpAccessList>) -> BTreeSet<Source> {
    let mut visited = BTreeSet::from([acl.name.clone()]);
    let mut sources = BTreeSet::new();
    collect_acl_sources(acl, named_acls, &mut visited, &mut sources);
    sources
}

fn collect_acl_sources(
    acl: &IpAccessList,
    named_acls: &HashMap<String, IpAccessList>,
    visited: &mut BTreeSet<String>,
    sources: &mut BTreeSet<Source>,
) {
    for line in &acl.lines {
        match line {
            AclLine::Expr { match_condition, .. } => {
                collect_expr_sources(match_condition, named_acls, visited, sources);
            }
            AclLine::Acl { acl_name, .. } => {
                visit_named_acl(acl_name, named_acls, visited, sources);
            }
        }
    }
}

fn collect_expr_sources(
    expr: &AclLineMatchExpr,
    named_acls: &HashMap<String, IpAccessList>,
    visited: &mut BTreeSet<String>,
    sources: &mut BTreeSet<Source>,
) {
    match expr {
        AclLineMatchExpr::True | AclLineMatchExpr::False | AclLineMatchExpr::MatchHeaderSpace(_) => {}
        AclLineMatchExpr::And(exprs) | AclLineMatchExpr::Or(exprs) => {
            for e in exprs {
                collect_expr_sources(e, named_acls, visited, sources);
            }
        }
        AclLineMatchExpr::Not(e) => collect_expr_sources(e, named_acls, visited, sources),
        AclLineMatchExpr::MatchSrcInterface(names) => {
            sources.extend(names.iter().cloned().map(Source::Interface));
        }
        AclLineMatchExpr::OriginatingFromDevice => {
            sources.insert(Source::Device);
        }
        AclLineMatchExpr::PermittedByAcl(name) | AclLineMatchExpr::DeniedByAcl(name) => {
            visit_named_acl(name, named_acls, visited, sources);
        }
    }
}

fn visit_named_acl(
    name: &str,
    named_acls: &HashMap<String, IpAccessList>,
    visited: &mut BTreeSet<String>,
    sources: &mut BTreeSet<Source>,
) {
    // Undefined names are reported by the compiler, not here.
    if let Some(acl) = named_acls.get(name) {
        if visited.insert(name.to_string()) {
            collect_acl_sources(acl, named_acls, visited, sources);
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::model::AclLineMatchExpr as E;

    fn names(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_referenced_sources_get_own_values() {
        let packet = BddPacket::new();
        let bdd = packet.bdd();
        let referenced = BTreeSet::from([Source::interface("a"), Source::interface("b"), Source::Device]);
        let mgr = SourceManager::new(&packet, &names(&["a", "b", "c", "d"]), &referenced);

        // a, b, device, and one representative for {c, d}: 4 values in 2 bits.
        assert_eq!(mgr.domain().len(), 4);
        assert_eq!(mgr.domain().var().len(), 2);

        let a = mgr.source_bdd(&Source::interface("a"));
        let b = mgr.source_bdd(&Source::interface("b"));
        let c = mgr.source_bdd(&Source::interface("c"));
        let d = mgr.source_bdd(&Source::interface("d"));
        let device = mgr.originating_from_device_bdd();
        assert!(bdd.is_disjoint(a, b));
        assert!(bdd.is_disjoint(a, device));
        assert!(bdd.is_disjoint(c, a));
        assert_eq!(c, d);
        assert!(mgr.is_collapsed(&Source::interface("d")));
        assert!(!mgr.is_collapsed(&Source::interface("a")));

        assert_eq!(mgr.source_bdd(&Source::interface("inactive")), bdd.zero());
    }

    #[test]
    fn test_decode_source() {
        let packet = BddPacket::new();
        let bdd = packet.bdd();
        let referenced = BTreeSet::from([Source::interface("b")]);
        let mgr = SourceManager::new(&packet, &names(&["a", "b", "c"]), &referenced);

        let cube = bdd.sat_one_cube(mgr.source_bdd(&Source::interface("b")));
        assert_eq!(mgr.interface_from_assignment(cube), Some("b".to_string()));

        // Device sorts first, so it represents the unreferenced sources.
        let cube_a = bdd.sat_one_cube(mgr.source_bdd(&Source::interface("a")));
        let cube_c = bdd.sat_one_cube(mgr.source_bdd(&Source::interface("c")));
        assert_eq!(mgr.source_from_assignment(cube_a), Some(Source::Device));
        assert_eq!(mgr.source_from_assignment(cube_a), mgr.source_from_assignment(cube_c));
        assert_eq!(mgr.interface_from_assignment(cube_a), None);
    }

    #[test]
    fn test_bits_for_referenced_sources() {
        let packet = BddPacket::new();
        for (k, bits) in [(0, 0), (1, 1), (2, 2), (3, 2), (4, 3)] {
            let ifaces: BTreeSet<String> = (0..k).map(|i| format!("eth{}", i)).collect();
            let mut referenced: BTreeSet<Source> = ifaces.iter().cloned().map(Source::Interface).collect();
            referenced.insert(Source::Device);
            let mgr = SourceManager::new(&packet, &ifaces, &referenced);
            assert_eq!(mgr.domain().len(), k + 1);
            assert_eq!(mgr.domain().var().len(), bits, "{} sources", k + 1);
        }
    }

    #[test]
    fn test_nothing_referenced() {
        let packet = BddPacket::new();
        let before = packet.next_free_var();
        let mgr = SourceManager::new(&packet, &names(&["a", "b"]), &BTreeSet::new());

        assert_eq!(packet.next_free_var(), before);
        assert_eq!(mgr.source_bdd(&Source::interface("a")), packet.bdd().one());
        assert_eq!(mgr.originating_from_device_bdd(), packet.bdd().one());
    }

    #[test]
    fn test_for_network_shares_block() {
        let packet = BddPacket::new();
        let before = packet.next_free_var();
        let devices = BTreeMap::from([
            (
                "r1",
                SourceUsage {
                    active_interfaces: names(&["a", "b", "c"]),
                    referenced: BTreeSet::from([Source::interface("a"), Source::interface("b"), Source::interface("c")]),
                },
            ),
            (
                "r2",
                SourceUsage {
                    active_interfaces: names(&["x"]),
                    referenced: BTreeSet::from([Source::interface("x")]),
                },
            ),
        ]);
        let managers = SourceManager::for_network(&packet, &devices);

        // r1 needs 4 values (a, b, c, device): 2 bits, shared with r2.
        assert_eq!(packet.next_free_var(), before + 2);
        assert_eq!(managers["r1"].domain().var().bits(), managers["r2"].domain().var().bits());
        assert!(packet
            .bdd()
            .is_disjoint(managers["r2"].source_bdd(&Source::interface("x")), managers["r2"].originating_from_device_bdd()));
    }

    #[test]
    fn test_referenced_sources_follows_references() {
        let inner = IpAccessList::new(
            "inner",
            vec![
                AclLine::accepting(E::match_src_interface(["eth1"])),
                AclLine::accepting(E::PermittedByAcl("outer".to_string())),
            ],
        );
        let outer = IpAccessList::new(
            "outer",
            vec![
                AclLine::rejecting(E::And(vec![E::OriginatingFromDevice, E::PermittedByAcl("inner".to_string())])),
                AclLine::acl("missing"),
                AclLine::accepting(E::not(E::match_src_interface(["eth2"]))),
            ],
        );
        let named = HashMap::from([("inner".to_string(), inner), ("outer".to_string(), outer.clone())]);

        let sources = referenced_sources(&outer, &named);
        assert_eq!(
            sources,
            BTreeSet::from([Source::Device, Source::interface("eth1"), Source::interface("eth2")])
        );
    }
}
