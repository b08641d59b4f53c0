//! Fixed-width unsigned integers whose bits are boolean formulas.

use std::rc::Rc;

use crate::bdd::Bdd;
use crate::reference::Ref;

/// Symbolic unsigned integer, most significant bit first.
#[derive(Debug, Clone)]
pub struct BddInteger {
    bdd: Rc<Bdd>,
    bits: Vec<Ref>,
    variables_only: bool,
}

impl BddInteger {
    /// Integer of `length` bits over the fresh variables `start_var..start_var+length`.
    ///
    /// The most significant bit gets the smallest variable, so it is tested first.
    pub fn make_from_index(bdd: Rc<Bdd>, length: usize, start_var: u32) -> Self {
        assert_ne!(start_var, 0, "Variable index should not be zero");
        let bits = (0..length as u32).map(|i| bdd.mk_var(start_var + i)).collect();
        Self {
            bdd,
            bits,
            variables_only: true,
        }
    }

    /// Integer over arbitrary bit formulas.
    pub fn from_bits(bdd: Rc<Bdd>, bits: Vec<Ref>) -> Self {
        Self {
            bdd,
            bits,
            variables_only: false,
        }
    }

    pub fn bdd(&self) -> &Rc<Bdd> {
        &self.bdd
    }

    pub fn bits(&self) -> &[Ref] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn is_variables_only(&self) -> bool {
        self.variables_only
    }

    /// Variables backing each bit, if every bit is a bare variable.
    pub fn variables(&self) -> Option<Vec<u32>> {
        if !self.variables_only {
            return None;
        }
        Some(self.bits.iter().map(|b| self.bdd.variable(b.index())).collect())
    }

    /// Largest representable value.
    pub fn max_value(&self) -> u64 {
        assert!(self.len() <= 64, "Integer is wider than 64 bits");
        if self.len() == 64 {
            u64::MAX
        } else {
            (1 << self.len()) - 1
        }
    }

    fn check_fits(&self, v: u64) {
        assert!(
            v <= self.max_value(),
            "Value {} does not fit in {} bits",
            v,
            self.len()
        );
    }

    /// Bit `i` (from the most significant) of `v`, in this integer's width.
    fn bit_of(&self, v: u64, i: usize) -> bool {
        (v >> (self.len() - 1 - i)) & 1 == 1
    }

    fn literal(&self, i: usize, value: bool) -> Ref {
        if value {
            self.bits[i]
        } else {
            -self.bits[i]
        }
    }

    /// The formula `self == v`.
    pub fn value(&self, v: u64) -> Ref {
        self.check_fits(v);
        let mut res = Ref::ONE;
        for i in (0..self.len()).rev() {
            res = self.bdd.apply_and(self.literal(i, self.bit_of(v, i)), res);
        }
        res
    }

    /// `self[start..] <= v[start..]`, comparing only the suffix starting at bit `start`.
    fn leq_from(&self, v: u64, start: usize) -> Ref {
        let mut acc = Ref::ONE;
        for i in (start..self.len()).rev() {
            let x = self.bits[i];
            acc = if self.bit_of(v, i) {
                self.bdd.apply_or(-x, acc)
            } else {
                self.bdd.apply_and(-x, acc)
            };
        }
        acc
    }

    /// `self[start..] >= v[start..]`, comparing only the suffix starting at bit `start`.
    fn geq_from(&self, v: u64, start: usize) -> Ref {
        let mut acc = Ref::ONE;
        for i in (start..self.len()).rev() {
            let x = self.bits[i];
            acc = if self.bit_of(v, i) {
                self.bdd.apply_and(x, acc)
            } else {
                self.bdd.apply_or(x, acc)
            };
        }
        acc
    }

    /// The formula `self <= v`.
    pub fn leq(&self, v: u64) -> Ref {
        self.check_fits(v);
        self.leq_from(v, 0)
    }

    /// The formula `self >= v`.
    pub fn geq(&self, v: u64) -> Ref {
        self.check_fits(v);
        self.geq_from(v, 0)
    }

    /// The formula `a <= self <= b`.
    ///
    /// The bits above the first position where `a` and `b` differ are fixed by an equality
    /// chain; only the differing suffix is compared.
    pub fn range(&self, a: u64, b: u64) -> Ref {
        assert!(a <= b, "Range bounds are reversed: {} > {}", a, b);
        self.check_fits(b);
        if a == b {
            return self.value(a);
        }

        let first_diff = (0..self.len())
            .find(|&i| self.bit_of(a, i) != self.bit_of(b, i))
            .unwrap_or(self.len());
        debug_assert!(first_diff < self.len());

        // Since a < b, a has 0 and b has 1 at the first differing bit.
        let x = self.bits[first_diff];
        let lower = self.bdd.apply_and(-x, self.geq_from(a, first_diff + 1));
        let upper = self.bdd.apply_and(x, self.leq_from(b, first_diff + 1));
        let mut res = self.bdd.apply_or(lower, upper);

        for i in (0..first_diff).rev() {
            res = self.bdd.apply_and(self.literal(i, self.bit_of(a, i)), res);
        }
        res
    }

    /// Ripple-carry sum, modulo `2^len`.
    pub fn add(&self, other: &BddInteger) -> BddInteger {
        self.ripple_carry(other.bits.iter().copied(), Ref::ZERO)
    }

    /// Difference `self - other`, modulo `2^len`, computed as `self + !other + 1`.
    pub fn sub(&self, other: &BddInteger) -> BddInteger {
        self.ripple_carry(other.bits.iter().map(|&b| -b), Ref::ONE)
    }

    fn ripple_carry(&self, other: impl DoubleEndedIterator<Item = Ref> + ExactSizeIterator, carry_in: Ref) -> BddInteger {
        assert_eq!(self.len(), other.len(), "Integers must have the same width");

        let mut bits = vec![Ref::ZERO; self.len()];
        let mut carry = carry_in;
        for (i, y) in other.enumerate().rev() {
            let x = self.bits[i];
            let x_xor_y = self.bdd.apply_xor(x, y);
            bits[i] = self.bdd.apply_xor(x_xor_y, carry);
            let generate = self.bdd.apply_and(x, y);
            let propagate = self.bdd.apply_and(carry, x_xor_y);
            carry = self.bdd.apply_or(generate, propagate);
        }
        BddInteger::from_bits(Rc::clone(&self.bdd), bits)
    }

    /// Decode the value selected by a satisfying cube.
    ///
    /// A bit is 1 only if the cube forces it to 1, so bits left open by a partial
    /// assignment decode to 0. The result is the smallest value consistent with `cube`.
    pub fn sat_assignment_to_value(&self, cube: Ref) -> u64 {
        assert!(self.len() <= 64, "Integer is wider than 64 bits");
        let mut value = 0u64;
        for &bit in &self.bits {
            value <<= 1;
            if self.bdd.is_implies(cube, bit) {
                value |= 1;
            }
        }
        value
    }

    /// Decode from signed literals, as returned by [`Bdd::one_sat`].
    ///
    /// Only valid when every bit is a bare variable.
    pub fn value_from_literals(&self, literals: &[i32]) -> u64 {
        assert!(self.len() <= 64, "Integer is wider than 64 bits");
        assert!(
            self.variables_only,
            "Decoding from literals requires variable bits"
        );
        let mut value = 0u64;
        for &bit in &self.bits {
            value <<= 1;
            let v = self.bdd.variable(bit.index()) as i32;
            if literals.contains(&v) {
                value |= 1;
            }
        }
        value
    }

    /// Up to `max` distinct values of this integer allowed by `f`, smallest first.
    pub fn get_values_satisfying(&self, f: Ref, max: usize) -> Vec<u64> {
        let mut values = Vec::new();
        let mut rest = f;
        while values.len() < max && !self.bdd.is_zero(rest) {
            let cube = self.bdd.sat_one_cube(rest);
            let value = self.sat_assignment_to_value(cube);
            let value_bdd = self.value(value);
            if self.bdd.is_disjoint(rest, value_bdd) {
                break;
            }
            values.push(value);
            rest = self.bdd.apply_diff(rest, value_bdd);
        }
        values
    }
}
