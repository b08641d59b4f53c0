//! Header fields with their own value semantics on top of a raw [`BddInteger`].
//!
//! Passing `None` to `value` means "any value" and yields the constant `true`.

use crate::integer::BddInteger;
use crate::model::IpProtocol;
use crate::reference::Ref;

#[derive(Debug, Clone)]
pub struct BddIpProtocol {
    var: BddInteger,
}

impl BddIpProtocol {
    pub const BITS: usize = 8;

    pub fn new(var: BddInteger) -> Self {
        assert_eq!(var.len(), Self::BITS, "IP protocol must be 8 bits wide");
        Self { var }
    }

    pub fn integer(&self) -> &BddInteger {
        &self.var
    }

    pub fn value(&self, protocol: Option<IpProtocol>) -> Ref {
        match protocol {
            Some(p) => self.var.value(p.number() as u64),
            None => Ref::ONE,
        }
    }

    pub fn decode(&self, cube: Ref) -> IpProtocol {
        IpProtocol(self.var.sat_assignment_to_value(cube) as u8)
    }
}

#[derive(Debug, Clone)]
pub struct BddIcmpType {
    var: BddInteger,
}

impl BddIcmpType {
    pub const BITS: usize = 8;

    pub const ECHO_REPLY: u8 = 0;
    pub const DESTINATION_UNREACHABLE: u8 = 3;
    pub const ECHO_REQUEST: u8 = 8;
    pub const TIME_EXCEEDED: u8 = 11;

    pub fn new(var: BddInteger) -> Self {
        assert_eq!(var.len(), Self::BITS, "ICMP type must be 8 bits wide");
        Self { var }
    }

    pub fn integer(&self) -> &BddInteger {
        &self.var
    }

    pub fn value(&self, icmp_type: Option<u8>) -> Ref {
        match icmp_type {
            Some(t) => self.var.value(t as u64),
            None => Ref::ONE,
        }
    }

    pub fn decode(&self, cube: Ref) -> u8 {
        self.var.sat_assignment_to_value(cube) as u8
    }
}

#[derive(Debug, Clone)]
pub struct BddIcmpCode {
    var: BddInteger,
}

impl BddIcmpCode {
    pub const BITS: usize = 8;

    pub fn new(var: BddInteger) -> Self {
        assert_eq!(var.len(), Self::BITS, "ICMP code must be 8 bits wide");
        Self { var }
    }

    pub fn integer(&self) -> &BddInteger {
        &self.var
    }

    pub fn value(&self, icmp_code: Option<u8>) -> Ref {
        match icmp_code {
            Some(c) => self.var.value(c as u64),
            None => Ref::ONE,
        }
    }

    pub fn decode(&self, cube: Ref) -> u8 {
        self.var.sat_assignment_to_value(cube) as u8
    }
}

/// Total IP packet length. Lengths below the IPv4 header size are not valid packets.
#[derive(Debug, Clone)]
pub struct BddPacketLength {
    var: BddInteger,
}

impl BddPacketLength {
    pub const BITS: usize = 16;
    pub const MIN_LENGTH: u16 = 20;

    pub fn new(var: BddInteger) -> Self {
        assert_eq!(var.len(), Self::BITS, "Packet length must be 16 bits wide");
        Self { var }
    }

    pub fn integer(&self) -> &BddInteger {
        &self.var
    }

    pub fn value(&self, length: Option<u16>) -> Ref {
        match length {
            Some(l) => self.var.value(l as u64),
            None => Ref::ONE,
        }
    }

    /// Lengths a real packet may have.
    pub fn valid_lengths(&self) -> Ref {
        self.var.geq(Self::MIN_LENGTH as u64)
    }

    /// Decoded length, raised to [`Self::MIN_LENGTH`] if the assignment allows less.
    pub fn decode(&self, cube: Ref) -> u16 {
        let length = self.var.sat_assignment_to_value(cube) as u16;
        length.max(Self::MIN_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use test_log::test;

    use super::*;
    use crate::bdd::Bdd;

    #[test]
    fn test_any_value_is_unconstrained() {
        let bdd = Rc::new(Bdd::default());
        let protocol = BddIpProtocol::new(BddInteger::make_from_index(Rc::clone(&bdd), 8, 1));
        let icmp_type = BddIcmpType::new(BddInteger::make_from_index(Rc::clone(&bdd), 8, 9));
        let length = BddPacketLength::new(BddInteger::make_from_index(Rc::clone(&bdd), 16, 17));

        assert_eq!(protocol.value(None), bdd.one());
        assert_eq!(icmp_type.value(None), bdd.one());
        assert_eq!(length.value(None), bdd.one());
        assert_ne!(protocol.value(Some(IpProtocol::TCP)), bdd.one());
    }

    #[test]
    fn test_decode() {
        let bdd = Rc::new(Bdd::default());
        let protocol = BddIpProtocol::new(BddInteger::make_from_index(Rc::clone(&bdd), 8, 1));
        let length = BddPacketLength::new(BddInteger::make_from_index(Rc::clone(&bdd), 16, 9));

        let cube = bdd.sat_one_cube(protocol.value(Some(IpProtocol::UDP)));
        assert_eq!(protocol.decode(cube), IpProtocol::UDP);

        let cube = bdd.sat_one_cube(length.value(Some(1500)));
        assert_eq!(length.decode(cube), 1500);
    }

    #[test]
    fn test_packet_length_clamped() {
        let bdd = Rc::new(Bdd::default());
        let length = BddPacketLength::new(BddInteger::make_from_index(Rc::clone(&bdd), 16, 1));

        // Unconstrained length decodes to 0, which is not a valid packet.
        assert_eq!(length.decode(bdd.one()), BddPacketLength::MIN_LENGTH);
        let cube = bdd.sat_one_cube(length.value(Some(7)));
        assert_eq!(length.decode(cube), BddPacketLength::MIN_LENGTH);
    }
}
