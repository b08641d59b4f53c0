//! The symbolic packet: one block of variables per header field.

use std::cell::{Cell, OnceCell};
use std::rc::Rc;

use log::debug;

use crate::bdd::{Bdd, BddConfig};
use crate::fields::{BddIcmpCode, BddIcmpType, BddIpProtocol, BddPacketLength};
use crate::flow_preference::{FlowConstraintGenerator, FlowPreference};
use crate::integer::BddInteger;
use crate::model::{Flow, Ip, IpProtocol, Prefix, TcpFlag, TcpFlags};
use crate::pairing::Pairing;
use crate::reference::Ref;

pub const IP_BITS: usize = 32;
pub const PORT_BITS: usize = 16;
pub const DSCP_BITS: usize = 6;
pub const ECN_BITS: usize = 2;
pub const FRAGMENT_OFFSET_BITS: usize = 13;

/// Header field variables, allocated in a fixed order starting at variable 1.
///
/// | field           | bits |
/// |-----------------|------|
/// | dst_ip          | 32   |
/// | src_ip          | 32   |
/// | dst_port        | 16   |
/// | src_port        | 16   |
/// | ip_protocol     | 8    |
/// | icmp_type       | 8    |
/// | icmp_code       | 8    |
/// | tcp flags       | 8×1  |
/// | dscp            | 6    |
/// | ecn             | 2    |
/// | fragment_offset | 13   |
/// | packet_length   | 16   |
///
/// Variables past the header block are handed out by [`BddPacket::allocate_vars`].
pub struct BddPacket {
    bdd: Rc<Bdd>,
    next_free_var: Cell<u32>,

    dst_ip: BddInteger,
    src_ip: BddInteger,
    dst_port: BddInteger,
    src_port: BddInteger,
    ip_protocol: BddIpProtocol,
    icmp_type: BddIcmpType,
    icmp_code: BddIcmpCode,
    tcp_flags: [Ref; 8],
    dscp: BddInteger,
    ecn: BddInteger,
    fragment_offset: BddInteger,
    packet_length: BddPacketLength,

    swap_pairing: Pairing,
    well_formed: OnceCell<Ref>,
    flow_constraints: OnceCell<FlowConstraintGenerator>,
}

impl BddPacket {
    pub const FIRST_HEADER_VAR: u32 = 1;

    pub fn new() -> Self {
        Self::with_config(BddConfig::default())
    }

    pub fn with_config(config: BddConfig) -> Self {
        Self::with_bdd(Rc::new(Bdd::new(config)))
    }

    pub fn with_bdd(bdd: Rc<Bdd>) -> Self {
        let mut next = Self::FIRST_HEADER_VAR;
        let mut integer = |bits: usize| {
            let var = BddInteger::make_from_index(Rc::clone(&bdd), bits, next);
            next += bits as u32;
            var
        };

        let dst_ip = integer(IP_BITS);
        let src_ip = integer(IP_BITS);
        let dst_port = integer(PORT_BITS);
        let src_port = integer(PORT_BITS);
        let ip_protocol = BddIpProtocol::new(integer(BddIpProtocol::BITS));
        let icmp_type = BddIcmpType::new(integer(BddIcmpType::BITS));
        let icmp_code = BddIcmpCode::new(integer(BddIcmpCode::BITS));
        let flags = integer(TcpFlag::ALL.len());
        let dscp = integer(DSCP_BITS);
        let ecn = integer(ECN_BITS);
        let fragment_offset = integer(FRAGMENT_OFFSET_BITS);
        let packet_length = BddPacketLength::new(integer(BddPacketLength::BITS));

        let mut tcp_flags = [Ref::ZERO; 8];
        tcp_flags.copy_from_slice(flags.bits());

        let mut swap_pairing = Pairing::new();
        for (a, b) in [(&dst_ip, &src_ip), (&dst_port, &src_port)] {
            for (&x, &y) in a.bits().iter().zip(b.bits()) {
                swap_pairing.set(bdd.variable(x.index()), bdd.variable(y.index()));
                swap_pairing.set(bdd.variable(y.index()), bdd.variable(x.index()));
            }
        }

        debug!("Allocated {} header variables", next - Self::FIRST_HEADER_VAR);

        Self {
            bdd,
            next_free_var: Cell::new(next),
            dst_ip,
            src_ip,
            dst_port,
            src_port,
            ip_protocol,
            icmp_type,
            icmp_code,
            tcp_flags,
            dscp,
            ecn,
            fragment_offset,
            packet_length,
            swap_pairing,
            well_formed: OnceCell::new(),
            flow_constraints: OnceCell::new(),
        }
    }
}

impl Default for BddPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl BddPacket {
    pub fn bdd(&self) -> &Rc<Bdd> {
        &self.bdd
    }

    pub fn dst_ip(&self) -> &BddInteger {
        &self.dst_ip
    }
    pub fn src_ip(&self) -> &BddInteger {
        &self.src_ip
    }
    pub fn dst_port(&self) -> &BddInteger {
        &self.dst_port
    }
    pub fn src_port(&self) -> &BddInteger {
        &self.src_port
    }
    pub fn ip_protocol(&self) -> &BddIpProtocol {
        &self.ip_protocol
    }
    pub fn icmp_type(&self) -> &BddIcmpType {
        &self.icmp_type
    }
    pub fn icmp_code(&self) -> &BddIcmpCode {
        &self.icmp_code
    }
    pub fn dscp(&self) -> &BddInteger {
        &self.dscp
    }
    pub fn ecn(&self) -> &BddInteger {
        &self.ecn
    }
    pub fn fragment_offset(&self) -> &BddInteger {
        &self.fragment_offset
    }
    pub fn packet_length(&self) -> &BddPacketLength {
        &self.packet_length
    }

    pub fn tcp_flag(&self, flag: TcpFlag) -> Ref {
        self.tcp_flags[flag as usize]
    }

    /// First variable index that is not used yet.
    pub fn next_free_var(&self) -> u32 {
        self.next_free_var.get()
    }

    /// Reserve `n` fresh variables past everything allocated so far; returns the first.
    pub fn allocate_vars(&self, n: usize) -> u32 {
        let start = self.next_free_var.get();
        self.next_free_var.set(start + n as u32);
        debug!("Allocated variables {}..{}", start, start + n as u32);
        start
    }

    /// Reserve a fresh integer of `bits` bits.
    pub fn allocate_integer(&self, bits: usize) -> BddInteger {
        let start = self.allocate_vars(bits);
        BddInteger::make_from_index(Rc::clone(&self.bdd), bits, start)
    }

    /// Packets whose fields are consistent with their IP protocol.
    ///
    /// ICMP packets have zero ports and no TCP flags, TCP packets have zero ICMP fields,
    /// UDP packets have neither ICMP fields nor TCP flags, and any other protocol has none
    /// of them. The packet length is at least an IPv4 header.
    pub fn well_formed_flow_constraint(&self) -> Ref {
        *self.well_formed.get_or_init(|| {
            let bdd = &self.bdd;

            let no_ports = bdd.apply_and(self.dst_port.value(0), self.src_port.value(0));
            let no_icmp = bdd.apply_and(self.icmp_type.value(Some(0)), self.icmp_code.value(Some(0)));
            let no_flags = bdd.apply_and_many(self.tcp_flags.iter().map(|&f| -f));

            let icmp = self.ip_protocol.value(Some(IpProtocol::ICMP));
            let tcp = self.ip_protocol.value(Some(IpProtocol::TCP));
            let udp = self.ip_protocol.value(Some(IpProtocol::UDP));
            let other = -bdd.apply_or_many([icmp, tcp, udp]);

            let icmp = bdd.apply_and_many([icmp, no_ports, no_flags]);
            let tcp = bdd.apply_and(tcp, no_icmp);
            let udp = bdd.apply_and_many([udp, no_icmp, no_flags]);
            let other = bdd.apply_and_many([other, no_ports, no_icmp, no_flags]);

            let by_protocol = bdd.apply_or_many([icmp, tcp, udp, other]);
            bdd.apply_and(by_protocol, self.packet_length.valid_lengths())
        })
    }

    /// Exchange source and destination addresses and ports in `f`.
    pub fn swap_source_and_destination(&self, f: Ref) -> Ref {
        self.bdd.replace(f, &self.swap_pairing)
    }

    pub fn swap_pairing(&self) -> &Pairing {
        &self.swap_pairing
    }

    pub(crate) fn flow_constraints(&self) -> &FlowConstraintGenerator {
        self.flow_constraints
            .get_or_init(|| FlowConstraintGenerator::new(self))
    }

    /// Narrow `f` to the most preferred flows it contains.
    pub fn pick_representative(&self, f: Ref, preference: FlowPreference) -> Ref {
        self.flow_constraints().pick_representative(&self.bdd, f, preference)
    }

    /// The single packet described by `flow`. The ingress interface is not a header field
    /// and is ignored. Panics if a field value does not fit its width.
    pub fn flow_to_bdd(&self, flow: &Flow) -> Ref {
        let bdd = &self.bdd;
        let flags = TcpFlag::ALL.iter().map(|&flag| {
            let var = self.tcp_flag(flag);
            if flow.tcp_flags.get(flag) {
                var
            } else {
                -var
            }
        });
        let fields = [
            self.dst_ip.value(flow.dst_ip.as_u32() as u64),
            self.src_ip.value(flow.src_ip.as_u32() as u64),
            self.dst_port.value(flow.dst_port as u64),
            self.src_port.value(flow.src_port as u64),
            self.ip_protocol.value(Some(flow.ip_protocol)),
            self.icmp_type.value(Some(flow.icmp_type)),
            self.icmp_code.value(Some(flow.icmp_code)),
            self.dscp.value(flow.dscp as u64),
            self.ecn.value(flow.ecn as u64),
            self.fragment_offset.value(flow.fragment_offset as u64),
            self.packet_length.value(Some(flow.packet_length)),
        ];
        bdd.apply_and_many(fields.into_iter().chain(flags))
    }

    /// Cofactor `f` by each prefix's leading destination-address bits and join the results.
    ///
    /// The fixed bits no longer appear in the result. An empty prefix list gives false.
    pub fn restrict_dst_prefix(&self, f: Ref, prefixes: &[Prefix]) -> Ref {
        let bdd = &self.bdd;
        let bits = self.dst_ip.bits();
        let restricted = prefixes.iter().map(|p| {
            let ip = p.start_ip();
            (0..p.length() as usize).fold(f, |acc, i| {
                let v = bdd.variable(bits[i].index());
                bdd.restrict(acc, v, ip.bit(i))
            })
        });
        bdd.apply_or_many(restricted)
    }

    /// Decode every header field from a satisfying cube.
    pub fn decode_flow(&self, cube: Ref) -> Flow {
        let mut tcp_flags = TcpFlags::default();
        for flag in TcpFlag::ALL {
            tcp_flags.set(flag, self.bdd.is_implies(cube, self.tcp_flag(flag)));
        }
        Flow {
            ingress_interface: None,
            dst_ip: Ip::new(self.dst_ip.sat_assignment_to_value(cube) as u32),
            src_ip: Ip::new(self.src_ip.sat_assignment_to_value(cube) as u32),
            dst_port: self.dst_port.sat_assignment_to_value(cube) as u16,
            src_port: self.src_port.sat_assignment_to_value(cube) as u16,
            ip_protocol: self.ip_protocol.decode(cube),
            icmp_type: self.icmp_type.decode(cube),
            icmp_code: self.icmp_code.decode(cube),
            tcp_flags,
            dscp: self.dscp.sat_assignment_to_value(cube) as u8,
            ecn: self.ecn.sat_assignment_to_value(cube) as u8,
            fragment_offset: self.fragment_offset.sat_assignment_to_value(cube) as u16,
            packet_length: self.packet_length.decode(cube),
        }
    }

    /// One well-formed flow in `f`, or `None` if there is none.
    pub fn get_flow(&self, f: Ref) -> Option<Flow> {
        let f = self.bdd.apply_and(f, self.well_formed_flow_constraint());
        if self.bdd.is_zero(f) {
            return None;
        }
        let cube = self.bdd.sat_one_cube(f);
        Some(self.decode_flow(cube))
    }

    /// One well-formed flow in `f`, biased by `preference`.
    pub fn get_flow_with_preference(&self, f: Ref, preference: FlowPreference) -> Option<Flow> {
        let f = self.bdd.apply_and(f, self.well_formed_flow_constraint());
        if self.bdd.is_zero(f) {
            return None;
        }
        let refined = self.pick_representative(f, preference);
        let cube = self.bdd.sat_one_cube(refined);
        Some(self.decode_flow(cube))
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use test_log::test;

    use super::*;

    #[test]
    fn test_header_layout() {
        let packet = BddPacket::new();
        let bdd = packet.bdd();

        let first = |x: &BddInteger| bdd.variable(x.bits()[0].index());
        assert_eq!(first(packet.dst_ip()), 1);
        assert_eq!(first(packet.src_ip()), 33);
        assert_eq!(first(packet.dst_port()), 65);
        assert_eq!(first(packet.src_port()), 81);
        assert_eq!(first(packet.ip_protocol().integer()), 97);
        assert_eq!(first(packet.icmp_type().integer()), 105);
        assert_eq!(first(packet.icmp_code().integer()), 113);
        assert_eq!(bdd.variable(packet.tcp_flag(TcpFlag::Ack).index()), 121);
        assert_eq!(bdd.variable(packet.tcp_flag(TcpFlag::Urg).index()), 128);
        assert_eq!(first(packet.dscp()), 129);
        assert_eq!(first(packet.ecn()), 135);
        assert_eq!(first(packet.fragment_offset()), 137);
        assert_eq!(first(packet.packet_length().integer()), 150);
        assert_eq!(packet.next_free_var(), 166);
    }

    #[test]
    fn test_allocate_after_header() {
        let packet = BddPacket::new();
        let start = packet.allocate_vars(3);
        assert_eq!(start, 166);
        let x = packet.allocate_integer(2);
        assert_eq!(packet.bdd().variable(x.bits()[0].index()), 169);
        assert_eq!(packet.next_free_var(), 171);
    }

    #[test]
    fn test_well_formed() {
        let packet = BddPacket::new();
        let bdd = packet.bdd();
        let wf = packet.well_formed_flow_constraint();

        let icmp_with_port = bdd.apply_and(packet.ip_protocol().value(Some(IpProtocol::ICMP)), packet.dst_port().value(80));
        assert!(bdd.is_disjoint(wf, icmp_with_port));

        let tcp_with_icmp_type = bdd.apply_and(packet.ip_protocol().value(Some(IpProtocol::TCP)), packet.icmp_type().value(Some(8)));
        assert!(bdd.is_disjoint(wf, tcp_with_icmp_type));

        let udp_with_syn = bdd.apply_and(packet.ip_protocol().value(Some(IpProtocol::UDP)), packet.tcp_flag(TcpFlag::Syn));
        assert!(bdd.is_disjoint(wf, udp_with_syn));

        let gre_with_port = bdd.apply_and(packet.ip_protocol().value(Some(IpProtocol::GRE)), packet.src_port().value(1));
        assert!(bdd.is_disjoint(wf, gre_with_port));

        let tcp_syn_80 = bdd.apply_and_many([
            packet.ip_protocol().value(Some(IpProtocol::TCP)),
            packet.tcp_flag(TcpFlag::Syn),
            packet.dst_port().value(80),
        ]);
        assert!(!bdd.is_disjoint(wf, tcp_syn_80));

        // Memoized.
        assert_eq!(packet.well_formed_flow_constraint(), wf);
    }

    #[test]
    fn test_swap_source_and_destination() {
        let packet = BddPacket::new();
        let bdd = packet.bdd();

        let a = Ip::from_octets(10, 0, 0, 1).as_u32() as u64;
        let b = Ip::from_octets(10, 0, 0, 2).as_u32() as u64;
        let f = bdd.apply_and_many([
            packet.src_ip().value(a),
            packet.dst_ip().value(b),
            packet.src_port().value(1234),
            packet.dst_port().value(80),
        ]);
        let expected = bdd.apply_and_many([
            packet.dst_ip().value(a),
            packet.src_ip().value(b),
            packet.dst_port().value(1234),
            packet.src_port().value(80),
        ]);
        let swapped = packet.swap_source_and_destination(f);
        assert_eq!(swapped, expected);
        assert_eq!(packet.swap_source_and_destination(swapped), f);
    }

    #[test]
    fn test_get_flow() {
        let packet = BddPacket::new();
        let bdd = packet.bdd();

        assert_eq!(packet.get_flow(bdd.zero()), None);

        let f = bdd.apply_and_many([
            packet.ip_protocol().value(Some(IpProtocol::TCP)),
            packet.dst_port().value(22),
            packet.dst_ip().value(Ip::from_octets(192, 168, 1, 1).as_u32() as u64),
        ]);
        let flow = packet.get_flow(f).unwrap();
        assert_eq!(flow.ip_protocol, IpProtocol::TCP);
        assert_eq!(flow.dst_port, 22);
        assert_eq!(flow.dst_ip, Ip::from_octets(192, 168, 1, 1));
        assert_eq!(flow.src_ip, Ip::ZERO);
        assert_eq!(flow.packet_length, 20);
        assert_eq!(flow.ingress_interface, None);

        // ICMP with a port is never well formed.
        let g = bdd.apply_and(packet.ip_protocol().value(Some(IpProtocol::ICMP)), packet.src_port().value(7));
        assert_eq!(packet.get_flow(g), None);
    }

    #[test]
    fn test_flow_to_bdd() {
        let packet = BddPacket::new();
        let bdd = packet.bdd();

        let mut tcp_flags = TcpFlags::default();
        tcp_flags.set(TcpFlag::Syn, true);
        let flow = Flow {
            ingress_interface: None,
            dst_ip: Ip::from_octets(192, 0, 2, 10),
            src_ip: Ip::from_octets(198, 51, 100, 7),
            dst_port: 443,
            src_port: 49152,
            ip_protocol: IpProtocol::TCP,
            icmp_type: 0,
            icmp_code: 0,
            tcp_flags,
            dscp: 46,
            ecn: 1,
            fragment_offset: 0,
            packet_length: 512,
        };
        let f = packet.flow_to_bdd(&flow);
        assert_eq!(bdd.sat_count(f, packet.next_free_var() as usize - 1), BigUint::from(1u32));
        assert!(bdd.is_implies(f, packet.well_formed_flow_constraint()));
        assert_eq!(packet.get_flow(f), Some(flow));
    }

    #[test]
    fn test_restrict_dst_prefix() {
        let packet = BddPacket::new();
        let bdd = packet.bdd();

        let ssh = packet.dst_port().value(22);
        let prefix = |s: &str| -> Prefix { s.parse().unwrap() };
        let lan = prefix("10.0.0.0/8");
        let f = bdd.apply_and(packet.dst_ip().range(0x0A00_0000, 0x0AFF_FFFF), ssh);

        assert_eq!(packet.restrict_dst_prefix(f, &[lan]), ssh);
        assert_eq!(packet.restrict_dst_prefix(f, &[prefix("10.1.0.0/16")]), ssh);
        assert_eq!(packet.restrict_dst_prefix(f, &[prefix("11.0.0.0/8")]), bdd.zero());
        assert_eq!(packet.restrict_dst_prefix(f, &[]), bdd.zero());

        let g = bdd.apply_or(f, packet.dst_ip().range(0x0B00_0000, 0x0BFF_FFFF));
        let both = [lan, prefix("11.0.0.0/8")];
        assert_eq!(packet.restrict_dst_prefix(g, &both), bdd.one());

        // The default route fixes no bits.
        assert_eq!(packet.restrict_dst_prefix(f, &[prefix("0.0.0.0/0")]), f);
    }
}
