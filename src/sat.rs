use std::collections::HashMap;

use num_bigint::BigUint;

use crate::bdd::Bdd;
use crate::reference::Ref;

impl Bdd {
    /// Find one satisfying assignment of `node`, as a list of signed literals.
    ///
    /// The low branch is preferred whenever it is satisfiable, so variables that are
    /// set by the returned cube lean towards `false`. Variables that do not appear in
    /// the cube are unconstrained. Returns `None` if `node` is unsatisfiable.
    pub fn one_sat(&self, node: Ref) -> Option<Vec<i32>> {
        if self.is_zero(node) {
            return None;
        }

        let mut path = Vec::new();
        let mut current = node;
        while !self.is_terminal(current) {
            let v = self.variable(current.index()) as i32;
            let low = self.low_node(current);
            if self.is_zero(low) {
                path.push(v);
                current = self.high_node(current);
            } else {
                path.push(-v);
                current = low;
            }
        }
        // Every reduced, non-zero node has a path to one.
        debug_assert!(self.is_one(current));
        Some(path)
    }

    /// The cube (conjunction of literals) picked by [`Bdd::one_sat`], or zero.
    pub fn sat_one_cube(&self, node: Ref) -> Ref {
        match self.one_sat(node) {
            Some(path) => self.cube(path),
            None => self.zero(),
        }
    }

    /// Count satisfying assignments of `node` over `num_vars` variables.
    ///
    /// `num_vars` must be at least the size of the support of `node`.
    pub fn sat_count(&self, node: Ref, num_vars: usize) -> BigUint {
        let max = BigUint::from(1u32) << num_vars;
        let mut cache = HashMap::new();
        self._sat_count(node, &max, &mut cache)
    }

    fn _sat_count(&self, node: Ref, max: &BigUint, cache: &mut HashMap<u32, BigUint>) -> BigUint {
        if self.is_zero(node) {
            return BigUint::from(0u32);
        } else if self.is_one(node) {
            return max.clone();
        }

        let i = node.index();
        let count = if let Some(count) = cache.get(&i) {
            count.clone()
        } else {
            let low = self._sat_count(self.low(i), max, cache);
            let high = self._sat_count(self.high(i), max, cache);
            let count: BigUint = (low + high) >> 1u32;
            cache.insert(i, count.clone());
            count
        };

        if node.is_negated() {
            max - count
        } else {
            count
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_one_sat_prefers_low() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        let f = bdd.apply_or(bdd.apply_and(x1, x2), x3);
        assert_eq!(bdd.one_sat(f), Some(vec![-1, 3]));

        let g = bdd.apply_and(x1, -x2);
        assert_eq!(bdd.one_sat(g), Some(vec![1, -2]));

        assert_eq!(bdd.one_sat(bdd.one()), Some(vec![]));
        assert_eq!(bdd.one_sat(bdd.zero()), None);
    }

    #[test]
    fn test_sat_one_cube_implies_node() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let f = bdd.apply_xor(x1, x2);

        let cube = bdd.sat_one_cube(f);
        assert!(bdd.is_implies(cube, f));
        assert_eq!(bdd.sat_one_cube(bdd.zero()), bdd.zero());
    }

    #[test]
    fn test_sat_count() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        assert_eq!(bdd.sat_count(bdd.zero(), 3), BigUint::from(0u32));
        assert_eq!(bdd.sat_count(bdd.one(), 3), BigUint::from(8u32));
        assert_eq!(bdd.sat_count(x1, 3), BigUint::from(4u32));
        assert_eq!(bdd.sat_count(-x1, 3), BigUint::from(4u32));

        let f = bdd.apply_or(bdd.apply_and(x1, x2), x3);
        assert_eq!(bdd.sat_count(f, 3), BigUint::from(5u32));
        assert_eq!(bdd.sat_count(-f, 3), BigUint::from(3u32));
    }
}
