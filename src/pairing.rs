use std::collections::BTreeMap;

/// A variable renaming, consumed by [`Bdd::replace`][crate::bdd::Bdd::replace].
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Pairing {
    map: BTreeMap<u32, u32>,
}

impl Pairing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut pairing = Self::new();
        for (from, to) in pairs {
            pairing.set(from, to);
        }
        pairing
    }

    /// Pairing that exchanges `a[i]` with `b[i]` in both directions.
    pub fn swap(a: &[u32], b: &[u32]) -> Self {
        assert_eq!(a.len(), b.len(), "Swapped variable blocks must have equal length");
        let mut pairing = Self::new();
        for (&x, &y) in a.iter().zip(b) {
            pairing.set(x, y);
            pairing.set(y, x);
        }
        pairing
    }

    pub fn set(&mut self, from: u32, to: u32) {
        assert_ne!(from, 0, "Variable index should not be zero");
        assert_ne!(to, 0, "Variable index should not be zero");
        self.map.insert(from, to);
    }

    pub fn get(&self, from: u32) -> Option<u32> {
        self.map.get(&from).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
