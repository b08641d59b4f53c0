use std::fmt::{Display, Formatter};

use crate::model::header_space::{IpProtocol, TcpFlags};
use crate::model::ip::Ip;

/// One concrete packet, as decoded from a satisfying assignment.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Flow {
    /// Ingress interface, or `None` if the packet was originated by the device.
    pub ingress_interface: Option<String>,
    pub dst_ip: Ip,
    pub src_ip: Ip,
    pub dst_port: u16,
    pub src_port: u16,
    pub ip_protocol: IpProtocol,
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub tcp_flags: TcpFlags,
    pub dscp: u8,
    pub ecn: u8,
    pub fragment_offset: u16,
    pub packet_length: u16,
}

impl Display for Flow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(iface) = &self.ingress_interface {
            write!(f, "[{}] ", iface)?;
        }
        match self.ip_protocol {
            IpProtocol::ICMP => write!(
                f,
                "{} -> {} ICMP type={} code={}",
                self.src_ip, self.dst_ip, self.icmp_type, self.icmp_code
            )?,
            IpProtocol::TCP => write!(
                f,
                "{}:{} -> {}:{} TCP flags={}",
                self.src_ip, self.src_port, self.dst_ip, self.dst_port, self.tcp_flags
            )?,
            p if p.uses_ports() => write!(
                f,
                "{}:{} -> {}:{} {}",
                self.src_ip, self.src_port, self.dst_ip, self.dst_port, p
            )?,
            p => write!(f, "{} -> {} {}", self.src_ip, self.dst_ip, p)?,
        }
        write!(f, " length={}", self.packet_length)
    }
}
