//! Formulas over a (prefix, prefix length) pair of integers, as used for route matching.

use std::fmt::{Display, Formatter};

use crate::integer::BddInteger;
use crate::model::{Ip, Prefix, SubRange};
use crate::reference::Ref;

/// A prefix together with the lengths a matching prefix may have.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PrefixRange {
    pub prefix: Prefix,
    pub length_range: SubRange,
}

impl PrefixRange {
    pub fn new(prefix: Prefix, length_range: SubRange) -> Self {
        Self { prefix, length_range }
    }

    /// Only `prefix` itself.
    pub fn exact(prefix: Prefix) -> Self {
        let length = prefix.length() as u32;
        Self::new(prefix, SubRange::singleton(length))
    }

    /// `prefix` and every more specific prefix.
    pub fn more_specific_than(prefix: Prefix) -> Self {
        Self::new(prefix, SubRange::new(prefix.length() as u32, 32))
    }
}

impl Display for PrefixRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.prefix, self.length_range)
    }
}

/// Number of bits needed to tell `size` values apart.
pub fn num_bits(size: u64) -> usize {
    if size <= 1 {
        0
    } else {
        (64 - (size - 1).leading_zeros()) as usize
    }
}

/// The first `length` bits of `integer` spell out the first `length` bits of `ip`.
pub fn first_bits_equal(integer: &BddInteger, ip: Ip, length: usize) -> Ref {
    assert!(length <= 32, "Prefix length should be in the range 0..=32");
    assert!(integer.len() >= length, "Integer is narrower than the prefix");
    let bdd = integer.bdd();
    let mut acc = Ref::ONE;
    for i in (0..length).rev() {
        let bit = integer.bits()[i];
        acc = bdd.apply_and(if ip.bit(i) { bit } else { -bit }, acc);
    }
    acc
}

/// Exactly the route prefix `p`: all 32 address bits and the length.
pub fn prefix_to_bdd(prefix: &BddInteger, prefix_length: &BddInteger, p: Prefix) -> Ref {
    let bits_match = first_bits_equal(prefix, p.start_ip(), 32);
    let correct_length = prefix_length.value(p.length() as u64);
    prefix.bdd().apply_and(bits_match, correct_length)
}

/// Route prefixes inside `range.prefix` whose length lies in `range.length_range`.
///
/// The full `0..=32` length range leaves the length unconstrained.
pub fn prefix_range_to_bdd(prefix: &BddInteger, prefix_length: &BddInteger, range: PrefixRange) -> Ref {
    let bdd = prefix.bdd();
    let p = range.prefix;
    let bits_match = first_bits_equal(prefix, p.start_ip(), p.length() as usize);

    let SubRange { start, end } = range.length_range;
    let length_match = if start == 0 && end == 32 {
        Ref::ONE
    } else if start > end {
        Ref::ZERO
    } else {
        let end = end.min(prefix_length.max_value() as u32);
        if start > end {
            Ref::ZERO
        } else {
            prefix_length.range(start as u64, end as u64)
        }
    };
    bdd.apply_and(length_match, bits_match)
}
