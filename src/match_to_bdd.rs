use log::debug;

use crate::acl_to_bdd::AclToBdd;
use crate::error::Result;
use crate::model::AclLineMatchExpr;
use crate::reference::Ref;

impl AclToBdd<'_> {
    /// Compile a line predicate.
    pub fn match_to_bdd(&self, expr: &AclLineMatchExpr) -> Result<Ref> {
        let bdd = self.bdd();
        match expr {
            AclLineMatchExpr::True => Ok(Ref::ONE),
            AclLineMatchExpr::False => Ok(Ref::ZERO),
            AclLineMatchExpr::And(conjuncts) => {
                let mut res = Ref::ONE;
                for e in conjuncts {
                    res = bdd.apply_and(res, self.match_to_bdd(e)?);
                    if bdd.is_zero(res) {
                        break;
                    }
                }
                Ok(res)
            }
            AclLineMatchExpr::Or(disjuncts) => {
                let mut res = Ref::ZERO;
                for e in disjuncts {
                    res = bdd.apply_or(res, self.match_to_bdd(e)?);
                    if bdd.is_one(res) {
                        break;
                    }
                }
                Ok(res)
            }
            AclLineMatchExpr::Not(e) => Ok(-self.match_to_bdd(e)?),
            AclLineMatchExpr::MatchHeaderSpace(hs) => self.header_space.to_bdd(hs),
            AclLineMatchExpr::MatchSrcInterface(interfaces) => {
                Ok(self.sources.match_src_interface_bdd(interfaces))
            }
            AclLineMatchExpr::OriginatingFromDevice => Ok(self.sources.originating_from_device_bdd()),
            AclLineMatchExpr::PermittedByAcl(name) => {
                debug!("Predicate refers to filter {}", name);
                Ok(self.named_to_permit_and_deny(name)?.permit())
            }
            AclLineMatchExpr::DeniedByAcl(name) => {
                debug!("Predicate refers to filter {}", name);
                Ok(-self.named_to_permit_and_deny(name)?.permit())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::rc::Rc;

    use test_log::test;

    use crate::error::{Error, ReferenceKind};
    use crate::model::{
        AclLine, AclLineMatchExpr as E, HeaderSpace, IpAccessList, Ip, IpProtocol, IpSpace, SubRange,
    };
    use crate::packet::BddPacket;
    use crate::source::{Source, SourceManager};

    use super::*;

    fn tcp() -> E {
        E::match_header_space(HeaderSpace::new().with_ip_protocols([IpProtocol::TCP]))
    }

    fn dst_port(port: u32) -> E {
        E::match_header_space(HeaderSpace::new().with_dst_ports([SubRange::singleton(port)]))
    }

    #[test]
    fn test_boolean_structure() {
        let packet = BddPacket::new();
        let sources = SourceManager::for_interfaces(&packet, &BTreeSet::new());
        let acls = HashMap::new();
        let ip_spaces = HashMap::new();
        let c = AclToBdd::new(&packet, &acls, &ip_spaces, &sources);
        let bdd = packet.bdd();

        let t = c.match_to_bdd(&tcp()).unwrap();
        let p = c.match_to_bdd(&dst_port(22)).unwrap();

        assert_eq!(c.match_to_bdd(&E::True).unwrap(), bdd.one());
        assert_eq!(c.match_to_bdd(&E::False).unwrap(), bdd.zero());
        assert_eq!(c.match_to_bdd(&E::And(vec![])).unwrap(), bdd.one());
        assert_eq!(c.match_to_bdd(&E::Or(vec![])).unwrap(), bdd.zero());
        assert_eq!(c.match_to_bdd(&E::And(vec![tcp(), dst_port(22)])).unwrap(), bdd.apply_and(t, p));
        assert_eq!(c.match_to_bdd(&E::Or(vec![tcp(), dst_port(22)])).unwrap(), bdd.apply_or(t, p));
        assert_eq!(c.match_to_bdd(&E::not(tcp())).unwrap(), -t);
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        let packet = BddPacket::new();
        let sources = SourceManager::for_interfaces(&packet, &BTreeSet::new());
        let acls = HashMap::new();
        let ip_spaces = HashMap::new();
        let c = AclToBdd::new(&packet, &acls, &ip_spaces, &sources);

        let missing = E::PermittedByAcl("missing".to_string());
        assert_eq!(c.match_to_bdd(&E::And(vec![E::False, missing.clone()])).unwrap(), Ref::ZERO);
        assert_eq!(c.match_to_bdd(&E::Or(vec![E::True, missing.clone()])).unwrap(), Ref::ONE);
        assert_eq!(
            c.match_to_bdd(&missing),
            Err(Error::UndefinedReference {
                kind: ReferenceKind::Filter,
                name: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_source_predicates() {
        let packet = BddPacket::new();
        let active: BTreeSet<String> = ["eth0", "eth1", "eth2"].iter().map(|s| s.to_string()).collect();
        let referenced = BTreeSet::from([Source::Device, Source::interface("eth0"), Source::interface("eth1")]);
        let sources = SourceManager::new(&packet, &active, &referenced);
        let acls = HashMap::new();
        let ip_spaces = HashMap::new();
        let c = AclToBdd::new(&packet, &acls, &ip_spaces, &sources);
        let bdd = packet.bdd();

        let eth0 = c.match_to_bdd(&E::match_src_interface(["eth0"])).unwrap();
        let eth1 = c.match_to_bdd(&E::match_src_interface(["eth1"])).unwrap();
        let device = c.match_to_bdd(&E::OriginatingFromDevice).unwrap();
        assert!(bdd.is_disjoint(eth0, eth1));
        assert!(bdd.is_disjoint(eth0, device));
        assert_eq!(
            c.match_to_bdd(&E::match_src_interface(["eth0", "eth1"])).unwrap(),
            bdd.apply_or(eth0, eth1)
        );

        // Inactive interfaces never match.
        assert_eq!(c.match_to_bdd(&E::match_src_interface(["eth9"])).unwrap(), bdd.zero());
    }

    #[test]
    fn test_permitted_and_denied_by_acl() {
        let packet = BddPacket::new();
        let sources = SourceManager::for_interfaces(&packet, &BTreeSet::new());
        let acls = HashMap::from([(
            "ssh".to_string(),
            IpAccessList::new("ssh", vec![AclLine::accepting(E::And(vec![tcp(), dst_port(22)]))]),
        )]);
        let ip_spaces = HashMap::new();
        let c = AclToBdd::new(&packet, &acls, &ip_spaces, &sources);
        let bdd = packet.bdd();

        let ssh = c.match_to_bdd(&E::And(vec![tcp(), dst_port(22)])).unwrap();
        let permitted = c.match_to_bdd(&E::PermittedByAcl("ssh".to_string())).unwrap();
        let denied = c.match_to_bdd(&E::DeniedByAcl("ssh".to_string())).unwrap();
        assert_eq!(permitted, ssh);
        assert_eq!(denied, -ssh);
        assert_eq!(bdd.apply_or(permitted, denied), bdd.one());
    }

    #[test]
    fn test_circular_filters() {
        let packet = BddPacket::new();
        let sources = SourceManager::for_interfaces(&packet, &BTreeSet::new());
        let acls = HashMap::from([
            (
                "a".to_string(),
                IpAccessList::new("a", vec![AclLine::accepting(E::PermittedByAcl("b".to_string()))]),
            ),
            ("b".to_string(), IpAccessList::new("b", vec![AclLine::acl("a")])),
        ]);
        let ip_spaces = HashMap::new();
        let c = AclToBdd::new(&packet, &acls, &ip_spaces, &sources);

        assert_eq!(
            c.to_bdd(&acls["a"]),
            Err(Error::CircularReference {
                kind: ReferenceKind::Filter,
                name: "a".to_string()
            })
        );
        assert_eq!(
            c.to_bdd(&acls["b"]),
            Err(Error::CircularReference {
                kind: ReferenceKind::Filter,
                name: "b".to_string()
            })
        );
    }

    #[test]
    fn test_named_ip_space_in_header_space() {
        let packet = BddPacket::new();
        let sources = SourceManager::for_interfaces(&packet, &BTreeSet::new());
        let acls = HashMap::new();
        let ip_spaces = HashMap::from([(
            "servers".to_string(),
            Rc::new(IpSpace::Prefix("10.0.0.0/8".parse().unwrap())),
        )]);
        let c = AclToBdd::new(&packet, &acls, &ip_spaces, &sources);
        let bdd = packet.bdd();

        let f = c
            .match_to_bdd(&E::match_header_space(
                HeaderSpace::new().with_dst_ips(IpSpace::reference("servers")),
            ))
            .unwrap();
        let inside = packet.dst_ip().value(u64::from("10.1.2.3".parse::<Ip>().unwrap().as_u32()));
        let outside = packet.dst_ip().value(u64::from("11.0.0.1".parse::<Ip>().unwrap().as_u32()));
        assert!(bdd.is_implies(inside, f));
        assert!(bdd.is_disjoint(outside, f));
    }
}
