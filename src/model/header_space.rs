use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::model::ip_space::IpSpace;

/// Inclusive integer range `start..=end`. A range with `start > end` is empty.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubRange {
    pub start: u32,
    pub end: u32,
}

impl SubRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub const fn singleton(value: u32) -> Self {
        Self { start: value, end: value }
    }

    pub const fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub const fn includes(&self, value: u32) -> bool {
        self.start <= value && value <= self.end
    }
}

impl Display for SubRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// IP protocol number.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct IpProtocol(pub u8);

impl IpProtocol {
    pub const HOPOPT: IpProtocol = IpProtocol(0);
    pub const ICMP: IpProtocol = IpProtocol(1);
    pub const IGMP: IpProtocol = IpProtocol(2);
    pub const TCP: IpProtocol = IpProtocol(6);
    pub const UDP: IpProtocol = IpProtocol(17);
    pub const GRE: IpProtocol = IpProtocol(47);
    pub const ESP: IpProtocol = IpProtocol(50);
    pub const AHP: IpProtocol = IpProtocol(51);
    pub const OSPF: IpProtocol = IpProtocol(89);
    pub const PIM: IpProtocol = IpProtocol(103);
    pub const VRRP: IpProtocol = IpProtocol(112);
    pub const SCTP: IpProtocol = IpProtocol(132);

    pub const fn number(self) -> u8 {
        self.0
    }

    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            IpProtocol::HOPOPT => "HOPOPT",
            IpProtocol::ICMP => "ICMP",
            IpProtocol::IGMP => "IGMP",
            IpProtocol::TCP => "TCP",
            IpProtocol::UDP => "UDP",
            IpProtocol::GRE => "GRE",
            IpProtocol::ESP => "ESP",
            IpProtocol::AHP => "AHP",
            IpProtocol::OSPF => "OSPF",
            IpProtocol::PIM => "PIM",
            IpProtocol::VRRP => "VRRP",
            IpProtocol::SCTP => "SCTP",
            _ => return None,
        })
    }

    /// Whether packets of this protocol carry source and destination ports.
    pub fn uses_ports(self) -> bool {
        matches!(self, IpProtocol::TCP | IpProtocol::UDP | IpProtocol::SCTP)
    }
}

impl Display for IpProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "UNNAMED_{}", self.0),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TcpFlag {
    Ack,
    Cwr,
    Ece,
    Fin,
    Psh,
    Rst,
    Syn,
    Urg,
}

impl TcpFlag {
    pub const ALL: [TcpFlag; 8] = [
        TcpFlag::Ack,
        TcpFlag::Cwr,
        TcpFlag::Ece,
        TcpFlag::Fin,
        TcpFlag::Psh,
        TcpFlag::Rst,
        TcpFlag::Syn,
        TcpFlag::Urg,
    ];
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct TcpFlags {
    pub ack: bool,
    pub cwr: bool,
    pub ece: bool,
    pub fin: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub urg: bool,
}

impl TcpFlags {
    pub const SYN: TcpFlags = TcpFlags {
        ack: false,
        cwr: false,
        ece: false,
        fin: false,
        psh: false,
        rst: false,
        syn: true,
        urg: false,
    };

    pub const ALL: TcpFlags = TcpFlags {
        ack: true,
        cwr: true,
        ece: true,
        fin: true,
        psh: true,
        rst: true,
        syn: true,
        urg: true,
    };

    pub fn get(&self, flag: TcpFlag) -> bool {
        match flag {
            TcpFlag::Ack => self.ack,
            TcpFlag::Cwr => self.cwr,
            TcpFlag::Ece => self.ece,
            TcpFlag::Fin => self.fin,
            TcpFlag::Psh => self.psh,
            TcpFlag::Rst => self.rst,
            TcpFlag::Syn => self.syn,
            TcpFlag::Urg => self.urg,
        }
    }

    pub fn set(&mut self, flag: TcpFlag, value: bool) {
        let field = match flag {
            TcpFlag::Ack => &mut self.ack,
            TcpFlag::Cwr => &mut self.cwr,
            TcpFlag::Ece => &mut self.ece,
            TcpFlag::Fin => &mut self.fin,
            TcpFlag::Psh => &mut self.psh,
            TcpFlag::Rst => &mut self.rst,
            TcpFlag::Syn => &mut self.syn,
            TcpFlag::Urg => &mut self.urg,
        };
        *field = value;
    }

    pub fn with(mut self, flag: TcpFlag, value: bool) -> Self {
        self.set(flag, value);
        self
    }
}

impl Display for TcpFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names = TcpFlag::ALL
            .iter()
            .filter(|&&flag| self.get(flag))
            .map(|flag| format!("{:?}", flag).to_uppercase())
            .collect::<Vec<_>>();
        if names.is_empty() {
            write!(f, "-")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Per-flag constraints: a flag is only checked if it is set in `use_flags`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TcpFlagsMatchConditions {
    pub tcp_flags: TcpFlags,
    pub use_flags: TcpFlags,
}

impl TcpFlagsMatchConditions {
    pub fn new(tcp_flags: TcpFlags, use_flags: TcpFlags) -> Self {
        Self { tcp_flags, use_flags }
    }

    /// Require exactly `tcp_flags`, checking all eight flags.
    pub fn exact(tcp_flags: TcpFlags) -> Self {
        Self::new(tcp_flags, TcpFlags::ALL)
    }

    /// Require only `flag` to have `value`.
    pub fn single(flag: TcpFlag, value: bool) -> Self {
        Self::new(
            TcpFlags::default().with(flag, value),
            TcpFlags::default().with(flag, true),
        )
    }
}

/// Conjunction of per-field packet constraints.
///
/// Every empty collection or `None` leaves the field unconstrained. For each field, the
/// packet must match one of the inclusive values (if any) and none of the `not_` values.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct HeaderSpace {
    pub dst_ips: Option<Rc<IpSpace>>,
    pub not_dst_ips: Option<Rc<IpSpace>>,
    pub src_ips: Option<Rc<IpSpace>>,
    pub not_src_ips: Option<Rc<IpSpace>>,
    pub src_or_dst_ips: Option<Rc<IpSpace>>,

    pub dst_ports: Vec<SubRange>,
    pub not_dst_ports: Vec<SubRange>,
    pub src_ports: Vec<SubRange>,
    pub not_src_ports: Vec<SubRange>,
    pub src_or_dst_ports: Vec<SubRange>,

    pub ip_protocols: Vec<IpProtocol>,
    pub not_ip_protocols: Vec<IpProtocol>,

    pub icmp_types: Vec<SubRange>,
    pub not_icmp_types: Vec<SubRange>,
    pub icmp_codes: Vec<SubRange>,
    pub not_icmp_codes: Vec<SubRange>,

    pub dscps: Vec<u8>,
    pub not_dscps: Vec<u8>,
    pub ecns: Vec<u8>,
    pub not_ecns: Vec<u8>,

    pub fragment_offsets: Vec<SubRange>,
    pub not_fragment_offsets: Vec<SubRange>,
    pub packet_lengths: Vec<SubRange>,
    pub not_packet_lengths: Vec<SubRange>,

    /// Any one of these conditions must hold.
    pub tcp_flags: Vec<TcpFlagsMatchConditions>,

    /// Complement the whole header space.
    pub negate: bool,
}

impl HeaderSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dst_ips(mut self, ip_space: impl Into<Rc<IpSpace>>) -> Self {
        self.dst_ips = Some(ip_space.into());
        self
    }

    pub fn with_src_ips(mut self, ip_space: impl Into<Rc<IpSpace>>) -> Self {
        self.src_ips = Some(ip_space.into());
        self
    }

    pub fn with_dst_ports(mut self, ranges: impl IntoIterator<Item = SubRange>) -> Self {
        self.dst_ports.extend(ranges);
        self
    }

    pub fn with_src_ports(mut self, ranges: impl IntoIterator<Item = SubRange>) -> Self {
        self.src_ports.extend(ranges);
        self
    }

    pub fn with_ip_protocols(mut self, protocols: impl IntoIterator<Item = IpProtocol>) -> Self {
        self.ip_protocols.extend(protocols);
        self
    }

    pub fn with_icmp_types(mut self, ranges: impl IntoIterator<Item = SubRange>) -> Self {
        self.icmp_types.extend(ranges);
        self
    }

    pub fn with_tcp_flags(mut self, conditions: impl IntoIterator<Item = TcpFlagsMatchConditions>) -> Self {
        self.tcp_flags.extend(conditions);
        self
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_range() {
        let r = SubRange::new(10, 20);
        assert!(r.includes(10));
        assert!(r.includes(20));
        assert!(!r.includes(21));
        assert!(SubRange::new(5, 4).is_empty());
        assert_eq!(r.to_string(), "10-20");
        assert_eq!(SubRange::singleton(22).to_string(), "22");
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(IpProtocol::TCP.to_string(), "TCP");
        assert_eq!(IpProtocol(250).to_string(), "UNNAMED_250");
        assert!(IpProtocol::UDP.uses_ports());
        assert!(!IpProtocol::ICMP.uses_ports());
    }

    #[test]
    fn test_tcp_flags() {
        let flags = TcpFlags::SYN.with(TcpFlag::Ack, true);
        assert!(flags.get(TcpFlag::Syn));
        assert!(flags.get(TcpFlag::Ack));
        assert!(!flags.get(TcpFlag::Fin));
        assert_eq!(flags.to_string(), "ACK|SYN");
        assert_eq!(TcpFlags::default().to_string(), "-");

        let c = TcpFlagsMatchConditions::single(TcpFlag::Rst, false);
        assert!(c.use_flags.rst);
        assert!(!c.tcp_flags.rst);
        assert!(!c.use_flags.syn);
    }
}
