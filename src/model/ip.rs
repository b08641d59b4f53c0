use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::Error;

/// An IPv4 address.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Ip(u32);

impl Ip {
    pub const ZERO: Ip = Ip(0);
    pub const MAX: Ip = Ip(u32::MAX);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn from_octets(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self(u32::from_be_bytes([a, b, c, d]))
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Bit `i` of the address, counting from the most significant bit.
    pub const fn bit(self, i: usize) -> bool {
        (self.0 >> (31 - i)) & 1 == 1
    }
}

impl From<u32> for Ip {
    fn from(value: u32) -> Self {
        Ip(value)
    }
}

impl FromStr for Ip {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets = s
            .split('.')
            .map(|part| part.parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidIp(s.to_string()))?;
        match octets.as_slice() {
            &[a, b, c, d] => Ok(Ip::from_octets(a, b, c, d)),
            _ => Err(Error::InvalidIp(s.to_string())),
        }
    }
}

impl Display for Ip {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d] = self.0.to_be_bytes();
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

/// An IPv4 network `start_ip/length`. Host bits of `start_ip` are always zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Prefix {
    start_ip: Ip,
    length: u8,
}

impl Prefix {
    pub const ZERO: Prefix = Prefix {
        start_ip: Ip::ZERO,
        length: 0,
    };

    pub fn new(ip: Ip, length: u8) -> Self {
        assert!(length <= 32, "Prefix length should be in the range 0..=32");
        Self {
            start_ip: Ip(ip.0 & Self::network_mask(length)),
            length,
        }
    }

    /// The mask with the first `length` bits set.
    pub fn network_mask(length: u8) -> u32 {
        if length == 0 {
            0
        } else {
            u32::MAX << (32 - length as u32)
        }
    }

    pub fn start_ip(&self) -> Ip {
        self.start_ip
    }

    pub fn end_ip(&self) -> Ip {
        Ip(self.start_ip.0 | !Self::network_mask(self.length))
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    pub fn contains_ip(&self, ip: Ip) -> bool {
        ip.0 & Self::network_mask(self.length) == self.start_ip.0
    }
}

impl FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, length) = s
            .split_once('/')
            .ok_or_else(|| Error::InvalidPrefix(s.to_string()))?;
        let ip = ip.parse::<Ip>().map_err(|_| Error::InvalidPrefix(s.to_string()))?;
        let length = length
            .parse::<u8>()
            .ok()
            .filter(|&l| l <= 32)
            .ok_or_else(|| Error::InvalidPrefix(s.to_string()))?;
        Ok(Prefix::new(ip, length))
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.start_ip, self.length)
    }
}

/// An address with a wildcard mask. Bits set in `wildcard` are "don't care".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct IpWildcard {
    ip: Ip,
    wildcard: Ip,
}

impl IpWildcard {
    pub const ANY: IpWildcard = IpWildcard {
        ip: Ip::ZERO,
        wildcard: Ip::MAX,
    };

    pub fn new(ip: Ip, wildcard: Ip) -> Self {
        Self {
            ip: Ip(ip.0 & !wildcard.0),
            wildcard,
        }
    }

    pub fn ip(&self) -> Ip {
        self.ip
    }

    pub fn wildcard(&self) -> Ip {
        self.wildcard
    }

    /// Whether bit `i` (from the most significant) must match.
    pub fn is_significant(&self, i: usize) -> bool {
        !self.wildcard.bit(i)
    }

    /// The equivalent prefix, if the don't-care bits form a suffix.
    pub fn to_prefix(&self) -> Option<Prefix> {
        let care = !self.wildcard.0;
        let length = care.leading_ones();
        if care.count_ones() == length {
            Some(Prefix::new(self.ip, length as u8))
        } else {
            None
        }
    }

    pub fn contains_ip(&self, ip: Ip) -> bool {
        ip.0 & !self.wildcard.0 == self.ip.0
    }
}

impl From<Ip> for IpWildcard {
    fn from(ip: Ip) -> Self {
        IpWildcard::new(ip, Ip::ZERO)
    }
}

impl From<Prefix> for IpWildcard {
    fn from(prefix: Prefix) -> Self {
        IpWildcard::new(prefix.start_ip, Ip(!Prefix::network_mask(prefix.length)))
    }
}

impl FromStr for IpWildcard {
    type Err = Error;

    /// Accepts `ip:wildcard`, `ip/length` or a single `ip`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |_| Error::InvalidWildcard(s.to_string());
        if let Some((ip, wildcard)) = s.split_once(':') {
            let ip = ip.parse::<Ip>().map_err(invalid)?;
            let wildcard = wildcard.parse::<Ip>().map_err(invalid)?;
            Ok(IpWildcard::new(ip, wildcard))
        } else if s.contains('/') {
            Ok(s.parse::<Prefix>().map_err(invalid)?.into())
        } else {
            Ok(s.parse::<Ip>().map_err(invalid)?.into())
        }
    }
}

impl Display for IpWildcard {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.to_prefix() {
            Some(prefix) if prefix.length == 32 => write!(f, "{}", self.ip),
            Some(prefix) => write!(f, "{}", prefix),
            None => write!(f, "{}:{}", self.ip, self.wildcard),
        }
    }
}
