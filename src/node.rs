use crate::reference::Ref;

/// Perfect hash used by the unique table.
pub trait NodeHash {
    fn hash(&self) -> u64;
}

/// [Szudzik pairing function][szudzik-pairing].
///
/// ```text
/// (a, b) -> if (a<b) then (b^2 + a) else (a^2 + a + b)
/// ```
///
/// [szudzik-pairing]: http://szudzik.com/ElegantPairing.pdf
pub fn pairing2(a: u64, b: u64) -> u64 {
    // Wrapping arithmetic: only bucket distribution depends on the result.
    if a < b {
        b.wrapping_mul(b).wrapping_add(a)
    } else {
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    }
}

pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(pairing2(a, b), c)
}

/// Internal decision node: `if variable then high else low`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node {
    pub variable: u32,
    pub low: Ref,
    pub high: Ref,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            variable: 0,
            low: Ref::ZERO,
            high: Ref::ZERO,
        }
    }
}

impl NodeHash for Node {
    fn hash(&self) -> u64 {
        pairing3(self.variable as u64, self.low.as_lit(), self.high.as_lit())
    }
}
