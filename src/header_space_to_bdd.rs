use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Result;
use crate::integer::BddInteger;
use crate::ip_space_to_bdd::IpSpaceToBdd;
use crate::model::{HeaderSpace, IpProtocol, IpSpace, SubRange, TcpFlag, TcpFlagsMatchConditions};
use crate::packet::BddPacket;
use crate::reference::Ref;

/// Integer fields that are constrained by ranges.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RangeField {
    DstPort,
    SrcPort,
    IcmpType,
    IcmpCode,
    FragmentOffset,
    PacketLength,
}

/// Compiles [`HeaderSpace`]s into formulas over a [`BddPacket`].
pub struct HeaderSpaceToBdd<'a> {
    packet: &'a BddPacket,
    dst_ip_space: IpSpaceToBdd<'a>,
    src_ip_space: IpSpaceToBdd<'a>,
    range_cache: RefCell<HashMap<(RangeField, SubRange), Ref>>,
}

impl<'a> HeaderSpaceToBdd<'a> {
    pub fn new(packet: &'a BddPacket, named_ip_spaces: &'a HashMap<String, Rc<IpSpace>>) -> Self {
        Self {
            packet,
            dst_ip_space: IpSpaceToBdd::new(packet.dst_ip(), named_ip_spaces),
            src_ip_space: IpSpaceToBdd::new(packet.src_ip(), named_ip_spaces),
            range_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn packet(&self) -> &'a BddPacket {
        self.packet
    }

    pub fn dst_ip_space_to_bdd(&self) -> &IpSpaceToBdd<'a> {
        &self.dst_ip_space
    }

    pub fn src_ip_space_to_bdd(&self) -> &IpSpaceToBdd<'a> {
        &self.src_ip_space
    }

    fn integer(&self, field: RangeField) -> &'a BddInteger {
        match field {
            RangeField::DstPort => self.packet.dst_port(),
            RangeField::SrcPort => self.packet.src_port(),
            RangeField::IcmpType => self.packet.icmp_type().integer(),
            RangeField::IcmpCode => self.packet.icmp_code().integer(),
            RangeField::FragmentOffset => self.packet.fragment_offset(),
            RangeField::PacketLength => self.packet.packet_length().integer(),
        }
    }

    /// Values of `field` inside `range`; parts of the range the field cannot hold are
    /// ignored.
    pub fn range_to_bdd(&self, field: RangeField, range: SubRange) -> Ref {
        if let Some(&f) = self.range_cache.borrow().get(&(field, range)) {
            return f;
        }
        let var = self.integer(field);
        let max = var.max_value();
        let f = if range.is_empty() || range.start as u64 > max {
            Ref::ZERO
        } else {
            var.range(range.start as u64, (range.end as u64).min(max))
        };
        self.range_cache.borrow_mut().insert((field, range), f);
        f
    }

    fn ranges_to_bdd(&self, field: RangeField, ranges: &[SubRange]) -> Option<Ref> {
        if ranges.is_empty() {
            return None;
        }
        let bdd = self.packet.bdd();
        Some(bdd.apply_or_many(ranges.iter().map(|&r| self.range_to_bdd(field, r))))
    }

    fn values_to_bdd(&self, var: &BddInteger, values: &[u8]) -> Option<Ref> {
        if values.is_empty() {
            return None;
        }
        let max = var.max_value();
        let bdd = self.packet.bdd();
        Some(bdd.apply_or_many(
            values
                .iter()
                .filter(|&&v| v as u64 <= max)
                .map(|&v| var.value(v as u64)),
        ))
    }

    fn protocols_to_bdd(&self, protocols: &[IpProtocol]) -> Option<Ref> {
        if protocols.is_empty() {
            return None;
        }
        let bdd = self.packet.bdd();
        let ip_protocol = self.packet.ip_protocol();
        Some(bdd.apply_or_many(protocols.iter().map(|&p| ip_protocol.value(Some(p)))))
    }

    fn ip_space_to_bdd(&self, compiler: &IpSpaceToBdd<'a>, space: &Option<Rc<IpSpace>>) -> Result<Option<Ref>> {
        space.as_ref().map(|s| compiler.to_bdd(s)).transpose()
    }

    /// Any one of `conditions`, each requiring only the flags it uses.
    pub fn tcp_flags_to_bdd(&self, conditions: &[TcpFlagsMatchConditions]) -> Option<Ref> {
        if conditions.is_empty() {
            return None;
        }
        let bdd = self.packet.bdd();
        Some(bdd.apply_or_many(conditions.iter().map(|c| {
            bdd.apply_and_many(
                TcpFlag::ALL
                    .iter()
                    .filter(|&&flag| c.use_flags.get(flag))
                    .map(|&flag| {
                        let var = self.packet.tcp_flag(flag);
                        if c.tcp_flags.get(flag) {
                            var
                        } else {
                            -var
                        }
                    }),
            )
        })))
    }

    /// Conjoin the inclusive constraint with the negated exclusive one. Neither means no
    /// constraint at all.
    fn field_constraint(&self, include: Option<Ref>, exclude: Option<Ref>) -> Option<Ref> {
        let bdd = self.packet.bdd();
        match (include, exclude) {
            (Some(i), Some(e)) => Some(bdd.apply_diff(i, e)),
            (Some(i), None) => Some(i),
            (None, Some(e)) => Some(-e),
            (None, None) => None,
        }
    }

    pub fn to_bdd(&self, hs: &HeaderSpace) -> Result<Ref> {
        let bdd = self.packet.bdd();
        let packet = self.packet;

        let src_or_dst_ips = match &hs.src_or_dst_ips {
            Some(space) => Some(bdd.apply_or(self.dst_ip_space.to_bdd(space)?, self.src_ip_space.to_bdd(space)?)),
            None => None,
        };
        let src_or_dst_ports = match (
            self.ranges_to_bdd(RangeField::DstPort, &hs.src_or_dst_ports),
            self.ranges_to_bdd(RangeField::SrcPort, &hs.src_or_dst_ports),
        ) {
            (Some(dst), Some(src)) => Some(bdd.apply_or(dst, src)),
            _ => None,
        };

        let constraints = [
            self.field_constraint(
                self.ip_space_to_bdd(&self.dst_ip_space, &hs.dst_ips)?,
                self.ip_space_to_bdd(&self.dst_ip_space, &hs.not_dst_ips)?,
            ),
            self.field_constraint(
                self.ip_space_to_bdd(&self.src_ip_space, &hs.src_ips)?,
                self.ip_space_to_bdd(&self.src_ip_space, &hs.not_src_ips)?,
            ),
            src_or_dst_ips,
            self.field_constraint(
                self.ranges_to_bdd(RangeField::DstPort, &hs.dst_ports),
                self.ranges_to_bdd(RangeField::DstPort, &hs.not_dst_ports),
            ),
            self.field_constraint(
                self.ranges_to_bdd(RangeField::SrcPort, &hs.src_ports),
                self.ranges_to_bdd(RangeField::SrcPort, &hs.not_src_ports),
            ),
            src_or_dst_ports,
            self.field_constraint(
                self.protocols_to_bdd(&hs.ip_protocols),
                self.protocols_to_bdd(&hs.not_ip_protocols),
            ),
            self.field_constraint(
                self.ranges_to_bdd(RangeField::IcmpType, &hs.icmp_types),
                self.ranges_to_bdd(RangeField::IcmpType, &hs.not_icmp_types),
            ),
            self.field_constraint(
                self.ranges_to_bdd(RangeField::IcmpCode, &hs.icmp_codes),
                self.ranges_to_bdd(RangeField::IcmpCode, &hs.not_icmp_codes),
            ),
            self.field_constraint(
                self.values_to_bdd(packet.dscp(), &hs.dscps),
                self.values_to_bdd(packet.dscp(), &hs.not_dscps),
            ),
            self.field_constraint(
                self.values_to_bdd(packet.ecn(), &hs.ecns),
                self.values_to_bdd(packet.ecn(), &hs.not_ecns),
            ),
            self.field_constraint(
                self.ranges_to_bdd(RangeField::FragmentOffset, &hs.fragment_offsets),
                self.ranges_to_bdd(RangeField::FragmentOffset, &hs.not_fragment_offsets),
            ),
            self.field_constraint(
                self.ranges_to_bdd(RangeField::PacketLength, &hs.packet_lengths),
                self.ranges_to_bdd(RangeField::PacketLength, &hs.not_packet_lengths),
            ),
            self.tcp_flags_to_bdd(&hs.tcp_flags),
        ];

        let res = bdd.apply_and_many(constraints.into_iter().flatten());
        Ok(if hs.negate { -res } else { res })
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use test_log::test;

    use super::*;
    use crate::error::{Error, ReferenceKind};
    use crate::model::{Ip, Prefix, TcpFlags};

    fn prefix_space(s: &str) -> Rc<IpSpace> {
        Rc::new(IpSpace::Prefix(s.parse::<Prefix>().unwrap()))
    }

    #[test]
    fn test_unconstrained() {
        let packet = BddPacket::new();
        let named = HashMap::new();
        let c = HeaderSpaceToBdd::new(&packet, &named);

        assert_eq!(c.to_bdd(&HeaderSpace::new()).unwrap(), packet.bdd().one());
        assert_eq!(c.to_bdd(&HeaderSpace::new().negated()).unwrap(), packet.bdd().zero());
    }

    #[test]
    fn test_fields_are_conjoined() {
        let packet = BddPacket::new();
        let named = HashMap::new();
        let c = HeaderSpaceToBdd::new(&packet, &named);
        let bdd = packet.bdd();

        let hs = HeaderSpace::new()
            .with_ip_protocols([IpProtocol::TCP])
            .with_dst_ports([SubRange::singleton(22)])
            .with_dst_ips(prefix_space("10.0.0.0/8"));
        let f = c.to_bdd(&hs).unwrap();

        let expected = bdd.apply_and_many([
            packet.ip_protocol().value(Some(IpProtocol::TCP)),
            packet.dst_port().value(22),
            c.dst_ip_space_to_bdd().prefix_to_bdd("10.0.0.0/8".parse().unwrap()),
        ]);
        assert_eq!(f, expected);

        let negated = c.to_bdd(&hs.clone().negated()).unwrap();
        assert_eq!(negated, -f);
    }

    #[test]
    fn test_not_fields() {
        let packet = BddPacket::new();
        let named = HashMap::new();
        let c = HeaderSpaceToBdd::new(&packet, &named);
        let bdd = packet.bdd();

        let ports = HeaderSpace {
            dst_ports: vec![SubRange::new(0, 1023)],
            not_dst_ports: vec![SubRange::singleton(22), SubRange::singleton(23)],
            ..HeaderSpace::default()
        };
        let f = c.to_bdd(&ports).unwrap();
        assert_eq!(bdd.sat_count(f, 16), BigUint::from(1022u32));
        assert!(bdd.is_disjoint(f, packet.dst_port().value(22)));
        assert!(!bdd.is_disjoint(f, packet.dst_port().value(21)));

        let not_udp = HeaderSpace {
            not_ip_protocols: vec![IpProtocol::UDP],
            ..HeaderSpace::default()
        };
        let g = c.to_bdd(&not_udp).unwrap();
        assert_eq!(g, -packet.ip_protocol().value(Some(IpProtocol::UDP)));
    }

    #[test]
    fn test_excluding_the_included_ports() {
        let packet = BddPacket::new();
        let named = HashMap::new();
        let c = HeaderSpaceToBdd::new(&packet, &named);
        let bdd = packet.bdd();

        let hs = HeaderSpace {
            dst_ports: vec![SubRange::singleton(22)],
            not_dst_ports: vec![SubRange::singleton(22)],
            ..HeaderSpace::default()
        };
        assert_eq!(c.to_bdd(&hs).unwrap(), bdd.zero());

        let hs = HeaderSpace {
            src_ips: Some(prefix_space("10.0.0.0/8")),
            not_src_ips: Some(prefix_space("10.0.0.0/8")),
            ..HeaderSpace::default()
        };
        assert_eq!(c.to_bdd(&hs).unwrap(), bdd.zero());
    }

    #[test]
    fn test_only_exclusion_does_not_exclude_everything() {
        let packet = BddPacket::new();
        let named = HashMap::new();
        let c = HeaderSpaceToBdd::new(&packet, &named);
        let bdd = packet.bdd();

        let hs = HeaderSpace {
            not_src_ips: Some(prefix_space("10.0.0.0/8")),
            ..HeaderSpace::default()
        };
        let f = c.to_bdd(&hs).unwrap();
        assert_ne!(f, bdd.zero());
        assert_eq!(f, -c.src_ip_space_to_bdd().prefix_to_bdd("10.0.0.0/8".parse().unwrap()));
    }

    #[test]
    fn test_src_or_dst() {
        let packet = BddPacket::new();
        let named = HashMap::new();
        let c = HeaderSpaceToBdd::new(&packet, &named);
        let bdd = packet.bdd();

        let hs = HeaderSpace {
            src_or_dst_ports: vec![SubRange::singleton(53)],
            src_or_dst_ips: Some(Rc::new(IpSpace::Ip(Ip::from_octets(8, 8, 8, 8)))),
            ..HeaderSpace::default()
        };
        let f = c.to_bdd(&hs).unwrap();
        let ip = Ip::from_octets(8, 8, 8, 8).as_u32() as u64;

        let forward = bdd.apply_and(packet.dst_port().value(53), packet.dst_ip().value(ip));
        let reverse = bdd.apply_and(packet.src_port().value(53), packet.src_ip().value(ip));
        let mixed = bdd.apply_and(packet.src_port().value(53), packet.dst_ip().value(ip));
        assert!(bdd.is_implies(forward, f));
        assert!(bdd.is_implies(reverse, f));
        assert!(bdd.is_implies(mixed, f));
        assert!(!bdd.is_disjoint(f, packet.dst_ip().value(0)));
        assert!(bdd.is_disjoint(bdd.apply_and(packet.dst_ip().value(0), packet.src_ip().value(0)), f));
    }

    #[test]
    fn test_tcp_flags() {
        let packet = BddPacket::new();
        let named = HashMap::new();
        let c = HeaderSpaceToBdd::new(&packet, &named);
        let bdd = packet.bdd();

        let syn = packet.tcp_flag(TcpFlag::Syn);
        let ack = packet.tcp_flag(TcpFlag::Ack);
        let rst = packet.tcp_flag(TcpFlag::Rst);

        // SYN without ACK, or RST. Other flags are not looked at.
        let conditions = [
            TcpFlagsMatchConditions::new(TcpFlags::SYN, TcpFlags::SYN.with(TcpFlag::Ack, true)),
            TcpFlagsMatchConditions::single(TcpFlag::Rst, true),
        ];
        let f = c.to_bdd(&HeaderSpace::new().with_tcp_flags(conditions)).unwrap();
        assert_eq!(f, bdd.apply_or(bdd.apply_and(syn, -ack), rst));
    }

    #[test]
    fn test_ranges_clamped_to_field() {
        let packet = BddPacket::new();
        let named = HashMap::new();
        let c = HeaderSpaceToBdd::new(&packet, &named);
        let bdd = packet.bdd();

        assert_eq!(c.range_to_bdd(RangeField::IcmpType, SubRange::new(300, 400)), bdd.zero());
        assert_eq!(c.range_to_bdd(RangeField::IcmpType, SubRange::new(0, 400)), bdd.one());
        assert_eq!(c.range_to_bdd(RangeField::DstPort, SubRange::new(10, 9)), bdd.zero());
        assert_eq!(c.range_cache.borrow().len(), 3);
    }

    #[test]
    fn test_undefined_ip_space() {
        let packet = BddPacket::new();
        let named = HashMap::new();
        let c = HeaderSpaceToBdd::new(&packet, &named);

        let hs = HeaderSpace::new().with_dst_ips(IpSpace::reference("nowhere"));
        assert_eq!(
            c.to_bdd(&hs),
            Err(Error::UndefinedReference {
                kind: ReferenceKind::IpSpace,
                name: "nowhere".to_string()
            })
        );
    }
}
