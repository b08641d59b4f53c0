use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// Handle to a node in a [`Bdd`][crate::bdd::Bdd] manager.
///
/// The sign of the inner value is a complement edge: `-r` denotes the negation of `r`.
/// Handles are plain `Copy` values; the nodes they point to are owned by the manager.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ref(i32);

impl Ref {
    /// The constant `true` function (positive edge to the terminal node).
    pub const ONE: Ref = Ref(1);
    /// The constant `false` function (negative edge to the terminal node).
    pub const ZERO: Ref = Ref(-1);

    pub const fn positive(index: u32) -> Self {
        Self(index as i32)
    }

    pub const fn is_negated(&self) -> bool {
        self.0 < 0
    }

    /// Return the internal representation of the reference.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Index of the referenced node in the unique table.
    pub const fn index(self) -> u32 {
        self.0.unsigned_abs()
    }

    /// Literal-style encoding (`2 * index + sign`), used for hashing.
    pub(crate) const fn as_lit(self) -> u64 {
        ((self.0.unsigned_abs() as u64) << 1) + (self.0 < 0) as u64
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation() {
        let r = Ref::positive(42);
        assert!(!r.is_negated());
        assert!((-r).is_negated());
        assert_eq!(-(-r), r);
        assert_eq!((-r).index(), 42);
    }

    #[test]
    fn test_terminals() {
        assert_eq!(-Ref::ONE, Ref::ZERO);
        assert_eq!(Ref::ONE.index(), Ref::ZERO.index());
    }

    #[test]
    fn test_display() {
        assert_eq!(Ref::positive(7).to_string(), "@7");
        assert_eq!((-Ref::positive(7)).to_string(), "~@7");
    }

    #[test]
    fn test_lit_encoding() {
        assert_eq!(Ref::positive(3).as_lit(), 6);
        assert_eq!((-Ref::positive(3)).as_lit(), 7);
    }
}
