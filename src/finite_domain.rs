use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use log::debug;

use crate::integer::BddInteger;
use crate::packet::BddPacket;
use crate::prefix::num_bits;
use crate::reference::Ref;

/// Bits needed to give each of `n` values its own index.
pub fn bits_required(n: usize) -> usize {
    num_bits(n as u64)
}

/// Encodes a finite set of values as indices of a block of variables.
///
/// Values are numbered in their `Ord` order, so the encoding only depends on the set.
#[derive(Debug, Clone)]
pub struct FiniteDomain<T> {
    var: BddInteger,
    values: Vec<T>,
    value_bdds: BTreeMap<T, Ref>,
    is_valid: Ref,
}

impl<T> FiniteDomain<T>
where
    T: Ord + Clone + Debug,
{
    /// Domain over a freshly allocated block of just enough variables.
    pub fn new(packet: &BddPacket, values: &BTreeSet<T>) -> Self {
        let var = packet.allocate_integer(bits_required(values.len()));
        Self::with_var(var, values)
    }

    /// Domain over an existing block, which must be wide enough.
    pub fn with_var(var: BddInteger, values: &BTreeSet<T>) -> Self {
        let bits = bits_required(values.len());
        assert!(
            var.len() >= bits,
            "{} values do not fit in {} bits",
            values.len(),
            var.len()
        );

        let values: Vec<T> = values.iter().cloned().collect();
        let value_bdds = values
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), var.value(i as u64)))
            .collect();
        let is_valid = if values.is_empty() {
            Ref::ONE
        } else {
            var.leq(values.len() as u64 - 1)
        };
        debug!("Finite domain of {} values over {} bits", values.len(), var.len());

        Self {
            var,
            values,
            value_bdds,
            is_valid,
        }
    }

    /// Domains that share one block, sized for the largest value set.
    ///
    /// Only valid if the domains are never constrained together.
    pub fn shared<K: Ord + Clone>(
        packet: &BddPacket,
        values_by_key: &BTreeMap<K, BTreeSet<T>>,
    ) -> BTreeMap<K, FiniteDomain<T>> {
        let bits = values_by_key
            .values()
            .map(|values| bits_required(values.len()))
            .max()
            .unwrap_or(0);
        let var = packet.allocate_integer(bits);
        values_by_key
            .iter()
            .map(|(key, values)| (key.clone(), FiniteDomain::with_var(var.clone(), values)))
            .collect()
    }

    pub fn var(&self) -> &BddInteger {
        &self.var
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// The formula "the block encodes `value`", or `None` if `value` is not in the domain.
    pub fn value_bdd(&self, value: &T) -> Option<Ref> {
        self.value_bdds.get(value).copied()
    }

    /// The block encodes some value of the domain.
    pub fn is_valid(&self) -> Ref {
        self.is_valid
    }

    /// The value selected by a satisfying cube.
    pub fn value_from_assignment(&self, cube: Ref) -> Option<T> {
        let index = self.var.sat_assignment_to_value(cube);
        self.values.get(index as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bits_required() {
        assert_eq!(bits_required(0), 0);
        assert_eq!(bits_required(1), 0);
        assert_eq!(bits_required(2), 1);
        assert_eq!(bits_required(5), 3);
        assert_eq!(bits_required(8), 3);
    }

    #[test]
    fn test_domain_round_trip() {
        let packet = BddPacket::new();
        let bdd = packet.bdd();
        let domain = FiniteDomain::new(&packet, &set(&["eth0", "eth1", "eth2"]));

        assert_eq!(domain.var().len(), 2);
        for name in ["eth0", "eth1", "eth2"] {
            let f = domain.value_bdd(&name.to_string()).unwrap();
            assert!(bdd.is_implies(f, domain.is_valid()));
            let cube = bdd.sat_one_cube(f);
            assert_eq!(domain.value_from_assignment(cube), Some(name.to_string()));
        }
        assert_eq!(domain.value_bdd(&"eth9".to_string()), None);

        // Index 3 is not a value.
        assert!(bdd.is_disjoint(domain.var().value(3), domain.is_valid()));
    }

    #[test]
    fn test_single_value_needs_no_bits() {
        let packet = BddPacket::new();
        let before = packet.next_free_var();
        let domain = FiniteDomain::new(&packet, &set(&["only"]));

        assert_eq!(domain.var().len(), 0);
        assert_eq!(packet.next_free_var(), before);
        assert_eq!(domain.value_bdd(&"only".to_string()), Some(packet.bdd().one()));
        assert_eq!(domain.is_valid(), packet.bdd().one());
    }

    #[test]
    fn test_shared_block() {
        let packet = BddPacket::new();
        let before = packet.next_free_var();
        let by_device = BTreeMap::from([
            ("r1", set(&["a", "b", "c", "d", "e"])),
            ("r2", set(&["x", "y"])),
        ]);
        let domains = FiniteDomain::shared(&packet, &by_device);

        assert_eq!(packet.next_free_var(), before + 3);
        let r1 = &domains["r1"];
        let r2 = &domains["r2"];
        assert_eq!(r1.var().bits(), r2.var().bits());
        assert_eq!(r1.value_bdd(&"a".to_string()), r2.value_bdd(&"x".to_string()));
        assert!(packet.bdd().is_implies(r2.is_valid(), r1.is_valid()));
    }
}
