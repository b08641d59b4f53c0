//! Preferences for picking a "typical" flow out of a set of flows.

use log::debug;

use crate::bdd::Bdd;
use crate::fields::BddIcmpType;
use crate::integer::BddInteger;
use crate::model::{Ip, IpProtocol, SubRange, TcpFlag};
use crate::packet::BddPacket;
use crate::reference::Ref;

/// Built-in orderings of preferred flows, most preferred first.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FlowPreference {
    /// ICMP echo, then traceroute UDP, then TCP to a well-known port.
    Debugging,
    /// TCP to a well-known port, then traceroute UDP, then ICMP echo.
    Application,
    /// TCP or UDP towards [`FlowConstraintGenerator::DEFAULT_DST_IP`] on default ports.
    TestFilter,
}

/// Formulas describing preferred flows, built once per packet.
#[derive(Debug, Clone)]
pub struct FlowConstraintGenerator {
    icmp_flow: Ref,
    udp_flow: Ref,
    tcp_flow: Ref,
    default_packet_length: Ref,
    debugging: Vec<Ref>,
    application: Vec<Ref>,
    test_filter: Vec<Ref>,
}

impl FlowConstraintGenerator {
    pub const DEFAULT_PACKET_LENGTH: u16 = 512;
    pub const DEFAULT_DST_IP: Ip = Ip::from_octets(8, 8, 8, 8);
    pub const DEFAULT_SRC_PORT: u16 = 49152;
    pub const DEFAULT_DST_PORT: u16 = 80;
    pub const TRACEROUTE_PORTS: SubRange = SubRange::new(33434, 33534);
    pub const EPHEMERAL_PORTS: SubRange = SubRange::new(49152, 65535);
    pub const WELL_KNOWN_TCP_PORTS: [u16; 10] = [21, 22, 23, 25, 53, 80, 110, 143, 443, 3389];

    pub fn new(packet: &BddPacket) -> Self {
        let bdd = packet.bdd();
        let default_packet_length = packet
            .packet_length()
            .value(Some(Self::DEFAULT_PACKET_LENGTH));

        let icmp_flow = bdd.apply_and_many([
            packet.ip_protocol().value(Some(IpProtocol::ICMP)),
            packet.icmp_type().value(Some(BddIcmpType::ECHO_REQUEST)),
            packet.icmp_code().value(Some(0)),
            default_packet_length,
        ]);

        let udp_flow = bdd.apply_and_many([
            packet.ip_protocol().value(Some(IpProtocol::UDP)),
            range(packet.dst_port(), Self::TRACEROUTE_PORTS),
            range(packet.src_port(), Self::EPHEMERAL_PORTS),
            default_packet_length,
        ]);

        let well_known = bdd.apply_or_many(
            Self::WELL_KNOWN_TCP_PORTS
                .iter()
                .map(|&port| packet.dst_port().value(port as u64)),
        );
        let syn_only = bdd.apply_and_many(TcpFlag::ALL.iter().map(|&flag| {
            let f = packet.tcp_flag(flag);
            if flag == TcpFlag::Syn {
                f
            } else {
                -f
            }
        }));
        let tcp_flow = bdd.apply_and_many([
            packet.ip_protocol().value(Some(IpProtocol::TCP)),
            well_known,
            range(packet.src_port(), Self::EPHEMERAL_PORTS),
            syn_only,
            default_packet_length,
        ]);

        let debugging = vec![icmp_flow, udp_flow, tcp_flow, default_packet_length];
        let application = vec![tcp_flow, udp_flow, icmp_flow, default_packet_length];
        let test_filter = Self::test_filter_preferences(packet, default_packet_length);
        debug!("Built {} test-filter preferences", test_filter.len());

        Self {
            icmp_flow,
            udp_flow,
            tcp_flow,
            default_packet_length,
            debugging,
            application,
            test_filter,
        }
    }

    fn test_filter_preferences(packet: &BddPacket, default_packet_length: Ref) -> Vec<Ref> {
        let bdd = packet.bdd();
        let dst_ip = packet.dst_ip().value(Self::DEFAULT_DST_IP.as_u32() as u64);
        let src_ports = [packet.src_port().value(Self::DEFAULT_SRC_PORT as u64), Ref::ONE];
        let dst_ports = [packet.dst_port().value(Self::DEFAULT_DST_PORT as u64), Ref::ONE];

        let mut preferences = Vec::new();
        for protocol in [IpProtocol::TCP, IpProtocol::UDP] {
            let protocol = packet.ip_protocol().value(Some(protocol));
            for &src_port in &src_ports {
                for &dst_port in &dst_ports {
                    preferences.push(bdd.apply_and_many([
                        dst_ip,
                        protocol,
                        src_port,
                        dst_port,
                        default_packet_length,
                    ]));
                }
            }
        }
        preferences.push(dst_ip);
        preferences.push(default_packet_length);
        preferences
    }

    /// ICMP echo request with the default packet length.
    pub fn icmp_flow(&self) -> Ref {
        self.icmp_flow
    }

    /// UDP traceroute packet from an ephemeral port.
    pub fn udp_flow(&self) -> Ref {
        self.udp_flow
    }

    /// TCP SYN from an ephemeral port to a well-known port.
    pub fn tcp_flow(&self) -> Ref {
        self.tcp_flow
    }

    pub fn default_packet_length(&self) -> Ref {
        self.default_packet_length
    }

    pub fn preferences(&self, preference: FlowPreference) -> &[Ref] {
        match preference {
            FlowPreference::Debugging => &self.debugging,
            FlowPreference::Application => &self.application,
            FlowPreference::TestFilter => &self.test_filter,
        }
    }

    /// Narrow `f` to its most preferred non-empty part, or keep `f` if no preference applies.
    pub fn pick_representative(&self, bdd: &Bdd, f: Ref, preference: FlowPreference) -> Ref {
        for &p in self.preferences(preference) {
            let refined = bdd.apply_and(f, p);
            if !bdd.is_zero(refined) {
                return refined;
            }
        }
        f
    }
}

fn range(var: &BddInteger, range: SubRange) -> Ref {
    var.range(range.start as u64, range.end as u64)
}
