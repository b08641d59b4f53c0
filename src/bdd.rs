//! The formula manager.
//!
//! All boolean functions in this crate are nodes of a single shared, canonical, reduced
//! ordered BDD owned by a [`Bdd`] manager. Variables are 1-indexed and a smaller index is
//! closer to the root. Negation is a complement edge, so [`Bdd::apply_not`] is free.
//!
//! Nodes are never freed individually: they live as long as the manager does, and a
//! [`Ref`] is only meaningful together with the manager that produced it.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Debug;

use log::debug;

use crate::cache::Cache;
use crate::node::Node;
use crate::pairing::Pairing;
use crate::reference::Ref;
use crate::table::Table;

/// Construction-time sizing of a [`Bdd`] manager.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BddConfig {
    /// The unique table holds at most `2^storage_bits` nodes.
    pub storage_bits: usize,
    /// The computed table is pre-allocated for `2^cache_bits` entries.
    pub cache_bits: usize,
}

impl Default for BddConfig {
    fn default() -> Self {
        Self {
            storage_bits: 20,
            cache_bits: 16,
        }
    }
}

impl BddConfig {
    pub fn with_storage_bits(mut self, bits: usize) -> Self {
        self.storage_bits = bits;
        self
    }

    pub fn with_cache_bits(mut self, bits: usize) -> Self {
        self.cache_bits = bits;
        self
    }
}

pub struct Bdd {
    storage: RefCell<Table<Node>>,
    cache: RefCell<Cache<(Ref, Ref, Ref), Ref>>,
    config: BddConfig,
}

impl Bdd {
    pub fn new(config: BddConfig) -> Self {
        assert!(
            config.storage_bits <= 31,
            "Storage bits should be in the range 0..=31"
        );
        assert!(
            config.cache_bits <= 31,
            "Cache bits should be in the range 0..=31"
        );

        let mut storage = Table::new(config.storage_bits);

        // Allocate the terminal node:
        let one = storage.add(Node::default());
        assert_eq!(one, 1); // Make sure the terminal node is (1).

        Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(Cache::new(config.cache_bits)),
            config,
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(BddConfig::default())
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        f.debug_struct("Bdd")
            .field("capacity", &storage.capacity())
            .field("size", &storage.size())
            .field("config", &self.config)
            .finish()
    }
}

impl Bdd {
    pub fn config(&self) -> BddConfig {
        self.config
    }

    /// Number of nodes allocated so far, including the terminal.
    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().size()
    }

    /// Hits and misses of the ITE computed table.
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.borrow();
        (cache.hits(), cache.misses())
    }

    pub fn zero(&self) -> Ref {
        Ref::ZERO
    }
    pub fn one(&self) -> Ref {
        Ref::ONE
    }

    pub fn variable(&self, index: u32) -> u32 {
        self.storage.borrow().value(index as usize).variable
    }
    pub fn low(&self, index: u32) -> Ref {
        self.storage.borrow().value(index as usize).low
    }
    pub fn high(&self, index: u32) -> Ref {
        self.storage.borrow().value(index as usize).high
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.low(node.index());
        if node.is_negated() {
            -low
        } else {
            low
        }
    }
    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.high(node.index());
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == Ref::ZERO
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == Ref::ONE
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.index() == Ref::ONE.index()
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");

        // Handle canonicity
        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }

        // Handle duplicates
        if low == high {
            return low;
        }

        let i = self.storage.borrow_mut().put(Node {
            variable: v,
            low,
            high,
        });
        Ref::positive(i as u32)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");
        self.mk_node(v, Ref::ZERO, Ref::ONE)
    }

    /// Conjunction of literals, given as signed variable indices (`-v` is `¬v`).
    pub fn cube(&self, literals: impl IntoIterator<Item = i32>) -> Ref {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort_by_key(|&v| std::cmp::Reverse(v.unsigned_abs()));
        let mut current = Ref::ONE;
        for lit in literals {
            assert_ne!(lit, 0, "Variable index should not be zero");
            current = if lit < 0 {
                self.mk_node(lit.unsigned_abs(), current, Ref::ZERO)
            } else {
                self.mk_node(lit as u32, Ref::ZERO, current)
            };
        }
        current
    }

    /// Disjunction of literals, given as signed variable indices.
    pub fn clause(&self, literals: impl IntoIterator<Item = i32>) -> Ref {
        -self.cube(literals.into_iter().map(|lit| -lit))
    }

    pub fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        assert_ne!(v, 0, "Variable index should not be zero");

        let i = node.index();
        if self.is_terminal(node) || v < self.variable(i) {
            return (node, node);
        }
        assert_eq!(v, self.variable(i));
        (self.low_node(node), self.high_node(node))
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(x, y, z) = (x ∧ y) ∨ (¬x ∧ z)
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use bdd_acl::bdd::Bdd;
    ///
    /// let bdd = Bdd::default();
    /// let x = bdd.mk_var(1);
    /// let y = bdd.mk_var(2);
    /// let z = bdd.mk_var(3);
    /// let f = bdd.apply_ite(x, y, z);
    /// let x_and_y = bdd.apply_and(x, y);
    /// let not_x_and_z = bdd.apply_and(-x, z);
    /// assert_eq!(f, bdd.apply_or(x_and_y, not_x_and_z));
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }

        // From now on, F is known not to be a constant.

        // More base cases:
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        //   ite(F,0,1) => ~F
        //   ite(F,1,~F) => 1
        //   ite(F,F,1) => 1
        //   ite(F,~F,0) => 0
        //   ite(F,0,F) => 0
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }
        if self.is_one(g) && h == -f {
            return Ref::ONE;
        }
        if g == f && self.is_one(h) {
            return Ref::ONE;
        }
        if g == -f && self.is_zero(h) {
            return Ref::ZERO;
        }
        if self.is_zero(g) && h == f {
            return Ref::ZERO;
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,~F) => ite(F,G,1)
        if g == f {
            return self.apply_ite(f, Ref::ONE, h);
        }
        if h == f {
            return self.apply_ite(f, g, Ref::ZERO);
        }
        if g == -f {
            return self.apply_ite(f, Ref::ZERO, h);
        }
        if h == -f {
            return self.apply_ite(f, g, Ref::ONE);
        }

        let i = self.variable(f.index());
        let j = self.variable(g.index());
        let k = self.variable(h.index());
        assert_ne!(i, 0);

        // Equivalent pairs (choose the one with the lowest variable):
        //   ite(F,1,H) == ite(H,1,F) == F ∨ H
        //   ite(F,G,0) == ite(G,F,0) == F ∧ G
        //   ite(F,G,1) == ite(~G,~F,1) == F -> G
        //   ite(F,0,H) == ite(~H,0,~F) == ~F ∧ H
        //   ite(F,G,~G) == ite(G,F,~F)
        if self.is_one(g) && k < i {
            return self.apply_ite(h, Ref::ONE, f);
        }
        if self.is_zero(h) && j < i {
            return self.apply_ite(g, f, Ref::ZERO);
        }
        if self.is_one(h) && j < i {
            return self.apply_ite(-g, -f, Ref::ONE);
        }
        if self.is_zero(g) && k < i {
            return self.apply_ite(-h, Ref::ZERO, -f);
        }
        if g == -h && j < i {
            return self.apply_ite(g, f, -f);
        }

        // Make sure the first two pointers (f and g) are regular (not negated).
        let (mut f, mut g, mut h) = (f, g, h);

        // ite(~F,G,H) => ite(F,H,G)
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }

        // ite(F,~G,H) => ~ite(F,G,~H)
        let mut n = false;
        if g.is_negated() {
            n = true;
            g = -g;
            h = -h;
        }

        let key = (f, g, h);
        let cached = self.cache.borrow_mut().get(&key);
        if let Some(res) = cached {
            return if n { -res } else { res };
        }

        // Determine the top variable:
        let mut m = self.variable(f.index());
        let j = self.variable(g.index());
        let k = self.variable(h.index());
        if j != 0 {
            m = m.min(j);
        }
        if k != 0 {
            m = m.min(k);
        }
        assert_ne!(m, 0);

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let e = self.apply_ite(f0, g0, h0);
        let t = self.apply_ite(f1, g1, h1);

        let res = self.mk_node(m, e, t);
        self.cache.borrow_mut().insert(key, res);

        if n {
            -res
        } else {
            res
        }
    }

    fn maybe_constant(&self, node: Ref) -> Option<bool> {
        if self.is_zero(node) {
            Some(false)
        } else if self.is_one(node) {
            Some(true)
        } else {
            None
        }
    }

    /// Decide whether `ite(f, g, h)` is a constant without building it.
    pub fn ite_constant(&self, f: Ref, g: Ref, h: Ref) -> Option<bool> {
        if self.is_one(f) {
            return self.maybe_constant(g);
        }
        if self.is_zero(f) {
            return self.maybe_constant(h);
        }

        if g == h {
            return self.maybe_constant(g);
        }
        if self.is_one(g) && self.is_zero(h) {
            return None;
        }
        if self.is_zero(g) && self.is_one(h) {
            return None;
        }
        if self.is_one(g) && h == -f {
            return Some(true);
        }
        if g == f && self.is_one(h) {
            return Some(true);
        }
        if g == -f && self.is_zero(h) {
            return Some(false);
        }
        if self.is_zero(g) && h == f {
            return Some(false);
        }

        let cached = self.cache.borrow_mut().get(&(f, g, h));
        if let Some(res) = cached {
            return self.maybe_constant(res);
        }

        let mut m = self.variable(f.index());
        let j = self.variable(g.index());
        let k = self.variable(h.index());
        if j != 0 {
            m = m.min(j);
        }
        if k != 0 {
            m = m.min(k);
        }
        assert_ne!(m, 0);

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let t = self.ite_constant(f1, g1, h1)?;
        let e = self.ite_constant(f0, g0, h0)?;
        if t == e {
            Some(t)
        } else {
            None
        }
    }

    /// Check whether `f` implies `g`, i.e. `f ∧ ¬g` is unsatisfiable.
    pub fn is_implies(&self, f: Ref, g: Ref) -> bool {
        self.ite_constant(f, g, Ref::ONE) == Some(true)
    }

    /// Check whether `f ∧ g` is unsatisfiable.
    pub fn is_disjoint(&self, f: Ref, g: Ref) -> bool {
        self.ite_constant(f, g, Ref::ZERO) == Some(false)
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, Ref::ZERO)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, Ref::ONE, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_eq(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, -v)
    }

    pub fn apply_imply(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, Ref::ONE)
    }

    /// Set difference: `u ∧ ¬v`.
    pub fn apply_diff(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(v, Ref::ZERO, u)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = Ref::ONE;
        for node in nodes {
            res = self.apply_and(res, node);
            if self.is_zero(res) {
                break;
            }
        }
        res
    }

    pub fn apply_or_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = Ref::ZERO;
        for node in nodes {
            res = self.apply_or(res, node);
            if self.is_one(res) {
                break;
            }
        }
        res
    }

    // f|v<-b
    pub fn restrict(&self, f: Ref, v: u32, b: bool) -> Ref {
        let mut cache = HashMap::new();
        self.restrict_(f, v, b, &mut cache)
    }

    fn restrict_(&self, f: Ref, v: u32, b: bool, cache: &mut HashMap<Ref, Ref>) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");

        if self.is_terminal(f) {
            return f;
        }

        let i = self.variable(f.index());

        if v < i {
            // 'f' does not depend on 'v'
            return f;
        }

        if v == i {
            return if b { self.high_node(f) } else { self.low_node(f) };
        }

        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let low = self.restrict_(self.low_node(f), v, b, cache);
        let high = self.restrict_(self.high_node(f), v, b, cache);
        let res = self.mk_node(i, low, high);
        cache.insert(f, res);
        res
    }

    /// Existentially quantify `vars` out of `f`.
    pub fn exists(&self, f: Ref, vars: &BTreeSet<u32>) -> Ref {
        let Some(&last) = vars.iter().next_back() else {
            return f;
        };
        debug!("exists(f = {}, |vars| = {})", f, vars.len());
        let mut cache = HashMap::new();
        self.exists_(f, vars, last, &mut cache)
    }

    fn exists_(&self, f: Ref, vars: &BTreeSet<u32>, last: u32, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }

        let v = self.variable(f.index());
        if v > last {
            // Nothing left to quantify below this node.
            return f;
        }

        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let low = self.exists_(self.low_node(f), vars, last, cache);
        let high = self.exists_(self.high_node(f), vars, last, cache);
        let res = if vars.contains(&v) {
            self.apply_or(low, high)
        } else {
            self.mk_node(v, low, high)
        };
        cache.insert(f, res);
        res
    }

    /// Simultaneously rename the variables of `f` according to `pairing`.
    ///
    /// Variables absent from the pairing are kept as is. The renaming need not preserve
    /// the variable order.
    pub fn replace(&self, f: Ref, pairing: &Pairing) -> Ref {
        if pairing.is_empty() {
            return f;
        }
        let mut cache = HashMap::new();
        self.replace_(f, pairing, &mut cache)
    }

    fn replace_(&self, f: Ref, pairing: &Pairing, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let v = self.variable(f.index());
        let low = self.replace_(self.low_node(f), pairing, cache);
        let high = self.replace_(self.high_node(f), pairing, cache);
        let target = pairing.get(v).unwrap_or(v);
        let res = self.apply_ite(self.mk_var(target), high, low);
        cache.insert(f, res);
        res
    }

    /// Indices of all nodes reachable from `nodes`, terminal included.
    pub fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> HashSet<u32> {
        let mut visited = HashSet::new();
        visited.insert(Ref::ONE.index());
        let mut queue = VecDeque::from_iter(nodes);

        while let Some(node) = queue.pop_front() {
            let i = node.index();
            if visited.insert(i) {
                queue.push_back(self.low(i));
                queue.push_back(self.high(i));
            }
        }

        visited
    }

    /// Number of distinct nodes (terminal included) in the graph of `f`.
    pub fn size(&self, f: Ref) -> u64 {
        self.descendants([f]).len() as u64
    }

    /// Variables `f` depends on.
    pub fn support(&self, f: Ref) -> BTreeSet<u32> {
        self.descendants([f])
            .into_iter()
            .map(|i| self.variable(i))
            .filter(|&v| v != 0)
            .collect()
    }

    pub fn to_bracket_string(&self, node: Ref) -> String {
        if self.is_zero(node) {
            return "(0)".to_string();
        } else if self.is_one(node) {
            return "(1)".to_string();
        }

        let v = self.variable(node.index());
        let low = self.low_node(node);
        let high = self.high_node(node);

        format!(
            "{}:(x{}, {}, {})",
            node,
            v,
            self.to_bracket_string(high),
            self.to_bracket_string(low)
        )
    }
}
