//! Multi-terminal binary decision diagram (MTBDD) manager.
//!
//! MTBDDs (also called ADDs) map boolean assignments to real values. They are
//! used here both for rate matrices (over interleaved row/column variables) and
//! for state sets, which are simply 0/1-valued MTBDDs.
//!
//! # Design
//!
//! - **Uniqueness**: decision nodes are hash-consed per variable, constants
//!   per bit pattern, so equal functions have equal [`AddId`]s
//! - **Fixed order**: a smaller variable id is closer to the root
//! - **Caching**: binary `apply` results are memoized in a computed table
//!
//! ```
//! use ctmc_rs::cache::BinaryOp;
//! use ctmc_rs::mtbdd::Mtbdd;
//! use ctmc_rs::types::Var;
//!
//! let mgr = Mtbdd::new();
//! let x = mgr.mk_var(1);
//! let f = mgr.apply(BinaryOp::Times, x, mgr.constant(2.5));
//! assert_eq!(mgr.eval(f, |v| v == Var::new(1)), 2.5);
//! assert_eq!(mgr.eval(f, |_| false), 0.0);
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use log::debug;

use crate::cache::{BinaryOp, Cache, CacheKey};
use crate::node::AddNode;
use crate::reference::AddId;
use crate::subtable::Subtable;
use crate::types::Var;

/// The MTBDD manager: owns all nodes and performs all operations.
pub struct Mtbdd {
    /// Node storage. Index 0 = constant 0, index 1 = constant 1.
    nodes: RefCell<Vec<AddNode>>,

    /// Unique tables, indexed by `var.id() - 1`.
    subtables: RefCell<Vec<Subtable>>,

    /// Constants other than 0 and 1, keyed by the bit pattern of their value.
    constants: RefCell<HashMap<u64, AddId>>,

    /// Computed table for `apply`.
    cache: RefCell<Cache>,
}

impl Default for Mtbdd {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mtbdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mtbdd")
            .field("nodes", &self.nodes.borrow().len())
            .field("vars", &self.subtables.borrow().len())
            .field("constants", &(self.constants.borrow().len() + 2))
            .field("cache", &self.cache.borrow().len())
            .finish()
    }
}

impl Mtbdd {
    // ========================================================================
    // Construction
    // ========================================================================

    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.max(2));
        nodes.push(AddNode::terminal(0.0));
        nodes.push(AddNode::terminal(1.0));

        Self {
            nodes: RefCell::new(nodes),
            subtables: RefCell::new(Vec::new()),
            constants: RefCell::new(HashMap::new()),
            cache: RefCell::new(Cache::new()),
        }
    }

    /// Number of allocated nodes, terminals included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Number of variables for which a unique table exists.
    pub fn num_vars(&self) -> usize {
        self.subtables.borrow().len()
    }

    pub fn cache_hits(&self) -> usize {
        self.cache.borrow().hits()
    }

    // ========================================================================
    // Node access
    // ========================================================================

    pub fn zero(&self) -> AddId {
        AddId::ZERO
    }

    pub fn one(&self) -> AddId {
        AddId::ONE
    }

    /// Access node data.
    pub fn node(&self, f: AddId) -> AddNode {
        self.nodes.borrow()[f.index()]
    }

    /// The top variable of `f`, or `Var::TERMINAL` for constants.
    pub fn var(&self, f: AddId) -> Var {
        self.node(f).var
    }

    /// Else child of a decision node.
    pub fn low(&self, f: AddId) -> AddId {
        self.node(f).lo
    }

    /// Then child of a decision node.
    pub fn high(&self, f: AddId) -> AddId {
        self.node(f).hi
    }

    pub fn is_constant(&self, f: AddId) -> bool {
        self.node(f).is_terminal()
    }

    /// Leaf value of a constant.
    pub fn value(&self, f: AddId) -> f64 {
        let node = self.node(f);
        debug_assert!(node.is_terminal(), "value() of decision node {}", f);
        node.value
    }

    /// Cofactors of `f` with respect to `v`, which must not lie below the top
    /// variable of `f`. If `f` does not branch on `v`, both cofactors are `f`.
    pub fn cofactors(&self, f: AddId, v: Var) -> (AddId, AddId) {
        let node = self.node(f);
        debug_assert!(v <= node.var, "cofactor on {} below top variable {}", v, node.var);
        if node.var == v {
            (node.lo, node.hi)
        } else {
            (f, f)
        }
    }

    // ========================================================================
    // Node construction
    // ========================================================================

    /// Returns the unique constant node with value `value`.
    pub fn constant(&self, value: f64) -> AddId {
        debug_assert!(!value.is_nan(), "NaN terminal");
        if value == 0.0 {
            return AddId::ZERO;
        }
        if value == 1.0 {
            return AddId::ONE;
        }
        if let Some(&id) = self.constants.borrow().get(&value.to_bits()) {
            return id;
        }
        let id = {
            let mut nodes = self.nodes.borrow_mut();
            let id = AddId::new(nodes.len() as u32);
            nodes.push(AddNode::terminal(value));
            id
        };
        self.constants.borrow_mut().insert(value.to_bits(), id);
        id
    }

    fn ensure_var(&self, var: Var) {
        let mut subtables = self.subtables.borrow_mut();
        while subtables.len() < var.id() as usize {
            let next = Var::new(subtables.len() as u32 + 1);
            subtables.push(Subtable::new(next));
        }
    }

    /// Creates or retrieves the reduced node `if var then hi else lo`.
    pub fn mk_node(&self, var: Var, lo: AddId, hi: AddId) -> AddId {
        if lo == hi {
            return lo;
        }
        debug_assert!(
            var < self.var(lo) && var < self.var(hi),
            "variable order violated at {}",
            var
        );

        self.ensure_var(var);
        let slot = var.id() as usize - 1;

        {
            let subtables = self.subtables.borrow();
            let nodes = self.nodes.borrow();
            if let Some(id) = subtables[slot].find(lo, hi, &nodes) {
                return id;
            }
        }

        let mut nodes = self.nodes.borrow_mut();
        let id = AddId::new(nodes.len() as u32);
        nodes.push(AddNode::decision(var, lo, hi));
        self.subtables.borrow_mut()[slot].insert(id, &mut nodes);
        id
    }

    /// The 0/1 projection function of variable `v`.
    pub fn mk_var(&self, v: u32) -> AddId {
        self.mk_node(Var::new(v), AddId::ZERO, AddId::ONE)
    }

    /// Conjunction of literals, as a 0/1 diagram.
    ///
    /// Each literal is `(variable, polarity)`.
    pub fn cube(&self, literals: &[(Var, bool)]) -> AddId {
        let mut literals = literals.to_vec();
        literals.sort_by(|a, b| b.0.cmp(&a.0));
        let mut current = AddId::ONE;
        for (var, positive) in literals {
            current = if positive {
                self.mk_node(var, AddId::ZERO, current)
            } else {
                self.mk_node(var, current, AddId::ZERO)
            };
        }
        current
    }

    // ========================================================================
    // Apply
    // ========================================================================

    fn apply_terminal(&self, op: BinaryOp, f: AddId, g: AddId) -> Option<AddId> {
        let (nf, ng) = (self.node(f), self.node(g));
        if nf.is_terminal() && ng.is_terminal() {
            return Some(self.constant(op.eval(nf.value, ng.value)));
        }
        match op {
            BinaryOp::Plus if f.is_zero() => Some(g),
            BinaryOp::Plus if g.is_zero() => Some(f),
            BinaryOp::Minus if g.is_zero() => Some(f),
            BinaryOp::Times | BinaryOp::And if f.is_zero() || g.is_zero() => Some(AddId::ZERO),
            BinaryOp::Times if f.is_one() => Some(g),
            BinaryOp::Times if g.is_one() => Some(f),
            BinaryOp::Min | BinaryOp::Max if f == g => Some(f),
            _ => None,
        }
    }

    /// Apply a binary operation pointwise.
    pub fn apply(&self, op: BinaryOp, f: AddId, g: AddId) -> AddId {
        if let Some(result) = self.apply_terminal(op, f, g) {
            return result;
        }

        let key = CacheKey::new(op, f, g);
        if let Some(result) = self.cache.borrow().get(&key) {
            return result;
        }

        let top = self.var(f).min(self.var(g));
        let (f0, f1) = self.cofactors(f, top);
        let (g0, g1) = self.cofactors(g, top);
        let lo = self.apply(op, f0, g0);
        let hi = self.apply(op, f1, g1);
        let result = self.mk_node(top, lo, hi);

        self.cache.borrow_mut().insert(key, result);
        result
    }

    pub fn apply_plus(&self, f: AddId, g: AddId) -> AddId {
        self.apply(BinaryOp::Plus, f, g)
    }

    pub fn apply_times(&self, f: AddId, g: AddId) -> AddId {
        self.apply(BinaryOp::Times, f, g)
    }

    pub fn apply_and(&self, f: AddId, g: AddId) -> AddId {
        self.apply(BinaryOp::And, f, g)
    }

    pub fn apply_or(&self, f: AddId, g: AddId) -> AddId {
        self.apply(BinaryOp::Or, f, g)
    }

    /// `ite(f, g, h)` for a 0/1 condition `f`.
    pub fn apply_ite(&self, f: AddId, g: AddId, h: AddId) -> AddId {
        let then = self.apply_times(f, g);
        let other = self.apply_times(self.apply_not(f), h);
        self.apply_plus(then, other)
    }

    // ========================================================================
    // Terminal maps
    // ========================================================================

    /// Replace every terminal value `v` by `func(v)`.
    pub fn map_terminals(&self, f: AddId, func: impl Fn(f64) -> f64) -> AddId {
        self.map_terminals_(f, &func, &mut HashMap::new())
    }

    fn map_terminals_(&self, f: AddId, func: &dyn Fn(f64) -> f64, cache: &mut HashMap<AddId, AddId>) -> AddId {
        let node = self.node(f);
        if node.is_terminal() {
            return self.constant(func(node.value));
        }
        if let Some(&result) = cache.get(&f) {
            return result;
        }
        let lo = self.map_terminals_(node.lo, func, cache);
        let hi = self.map_terminals_(node.hi, func, cache);
        let result = self.mk_node(node.var, lo, hi);
        cache.insert(f, result);
        result
    }

    /// Boolean negation: 1 where `f` is zero, 0 elsewhere.
    pub fn apply_not(&self, f: AddId) -> AddId {
        self.map_terminals(f, |v| (v == 0.0) as u8 as f64)
    }

    /// The 0/1 support set of `f`: 1 wherever `f` is nonzero.
    pub fn pattern(&self, f: AddId) -> AddId {
        self.map_terminals(f, |v| (v != 0.0) as u8 as f64)
    }

    /// 1 where `f >= threshold`, 0 elsewhere.
    pub fn threshold(&self, f: AddId, threshold: f64) -> AddId {
        self.map_terminals(f, |v| (v >= threshold) as u8 as f64)
    }

    /// 1 where `f > threshold`, 0 elsewhere.
    pub fn strict_threshold(&self, f: AddId, threshold: f64) -> AddId {
        self.map_terminals(f, |v| (v > threshold) as u8 as f64)
    }

    pub fn scale(&self, f: AddId, factor: f64) -> AddId {
        self.map_terminals(f, |v| v * factor)
    }

    // ========================================================================
    // Abstraction and renaming
    // ========================================================================

    /// `∑ vars. f`
    pub fn sum_abstract(&self, f: AddId, vars: &[Var]) -> AddId {
        self.abstract_vars(BinaryOp::Plus, f, vars)
    }

    /// `∃ vars. f`, producing a 0/1 diagram.
    pub fn exist_abstract(&self, f: AddId, vars: &[Var]) -> AddId {
        self.abstract_vars(BinaryOp::Or, f, vars)
    }

    /// `max vars. f`
    pub fn max_abstract(&self, f: AddId, vars: &[Var]) -> AddId {
        self.abstract_vars(BinaryOp::Max, f, vars)
    }

    fn abstract_vars(&self, op: BinaryOp, f: AddId, vars: &[Var]) -> AddId {
        let mut vars = vars.to_vec();
        vars.sort();
        vars.dedup();
        debug!("abstract(op = {:?}, f = {}, vars = {:?})", op, f, vars);
        let result = self.abstract_(op, f, &vars, &mut HashMap::new());
        // `Or` over a constant does not pass through `apply`, so normalize to 0/1.
        if op == BinaryOp::Or {
            self.pattern(result)
        } else {
            result
        }
    }

    fn abstract_(&self, op: BinaryOp, f: AddId, vars: &[Var], cache: &mut HashMap<(AddId, usize), AddId>) -> AddId {
        let Some((&first, rest)) = vars.split_first() else {
            return f;
        };
        // `vars` is always a suffix of the sorted list, so its length identifies it.
        let key = (f, vars.len());
        if let Some(&result) = cache.get(&key) {
            return result;
        }

        let node = self.node(f);
        let result = if first < node.var {
            // `f` does not depend on `first`: combine two copies of the rest.
            let r = self.abstract_(op, f, rest, cache);
            self.apply(op, r, r)
        } else if first > node.var {
            let lo = self.abstract_(op, node.lo, vars, cache);
            let hi = self.abstract_(op, node.hi, vars, cache);
            self.mk_node(node.var, lo, hi)
        } else {
            let lo = self.abstract_(op, node.lo, rest, cache);
            let hi = self.abstract_(op, node.hi, rest, cache);
            self.apply(op, lo, hi)
        };

        cache.insert(key, result);
        result
    }

    /// Swap each variable `xs[i]` with `ys[i]` in `f`.
    pub fn swap_variables(&self, f: AddId, xs: &[Var], ys: &[Var]) -> AddId {
        assert_eq!(xs.len(), ys.len(), "Variable lists must have equal length");
        let mut mapping = HashMap::new();
        for (&x, &y) in xs.iter().zip(ys) {
            mapping.insert(x, y);
            mapping.insert(y, x);
        }
        self.permute_(f, &mapping, &mut HashMap::new())
    }

    fn permute_(&self, f: AddId, mapping: &HashMap<Var, Var>, cache: &mut HashMap<AddId, AddId>) -> AddId {
        let node = self.node(f);
        if node.is_terminal() {
            return f;
        }
        if let Some(&result) = cache.get(&f) {
            return result;
        }
        let lo = self.permute_(node.lo, mapping, cache);
        let hi = self.permute_(node.hi, mapping, cache);
        let var = mapping.get(&node.var).copied().unwrap_or(node.var);
        let x = self.mk_node(var, AddId::ZERO, AddId::ONE);
        let result = self.apply_ite(x, hi, lo);
        cache.insert(f, result);
        result
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Evaluate `f` under the assignment `value_of`.
    pub fn eval(&self, f: AddId, value_of: impl Fn(Var) -> bool) -> f64 {
        let mut current = self.node(f);
        while !current.is_terminal() {
            current = if value_of(current.var) {
                self.node(current.hi)
            } else {
                self.node(current.lo)
            };
        }
        current.value
    }

    /// All nodes reachable from `f`, terminals included.
    pub fn descendants(&self, f: AddId) -> HashSet<AddId> {
        let mut visited = HashSet::new();
        let mut stack = vec![f];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let node = self.node(id);
            if !node.is_terminal() {
                stack.push(node.lo);
                stack.push(node.hi);
            }
        }
        visited
    }

    /// Number of nodes in `f`, terminals included.
    pub fn size(&self, f: AddId) -> usize {
        self.descendants(f).len()
    }

    /// Largest terminal value of `f`.
    pub fn find_max(&self, f: AddId) -> f64 {
        self.descendants(f)
            .into_iter()
            .map(|id| self.node(id))
            .filter(|node| node.is_terminal())
            .map(|node| node.value)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Smallest terminal value of `f`.
    pub fn find_min(&self, f: AddId) -> f64 {
        self.descendants(f)
            .into_iter()
            .map(|id| self.node(id))
            .filter(|node| node.is_terminal())
            .map(|node| node.value)
            .fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn x(id: u32) -> Var {
        Var::new(id)
    }

    #[test]
    fn test_constants_are_unique() {
        let mgr = Mtbdd::new();
        assert_eq!(mgr.constant(0.0), mgr.zero());
        assert_eq!(mgr.constant(-0.0), mgr.zero());
        assert_eq!(mgr.constant(1.0), mgr.one());
        let a = mgr.constant(2.5);
        let b = mgr.constant(2.5);
        assert_eq!(a, b);
        assert!(mgr.is_constant(a));
        assert_eq!(mgr.value(a), 2.5);
    }

    #[test]
    fn test_mk_node_reduces() {
        let mgr = Mtbdd::new();
        let c = mgr.constant(3.0);
        assert_eq!(mgr.mk_node(x(1), c, c), c);
        let v = mgr.mk_var(1);
        assert_eq!(mgr.mk_node(x(1), AddId::ZERO, AddId::ONE), v);
        assert_eq!(mgr.var(v), x(1));
        assert_eq!(mgr.low(v), AddId::ZERO);
        assert_eq!(mgr.high(v), AddId::ONE);
    }

    #[test]
    fn test_apply_arithmetic() {
        let mgr = Mtbdd::new();
        let x1 = mgr.mk_var(1);
        let x2 = mgr.mk_var(2);
        let f = mgr.apply_plus(mgr.scale(x1, 2.0), mgr.scale(x2, 3.0));

        let value = |a: bool, b: bool| mgr.eval(f, |v| if v == x(1) { a } else { b });
        assert_eq!(value(false, false), 0.0);
        assert_eq!(value(true, false), 2.0);
        assert_eq!(value(false, true), 3.0);
        assert_eq!(value(true, true), 5.0);

        let g = mgr.apply(BinaryOp::Minus, f, mgr.scale(x1, 2.0));
        assert_eq!(g, mgr.scale(x2, 3.0));
        assert_eq!(mgr.find_max(f), 5.0);
        assert_eq!(mgr.find_min(f), 0.0);
    }

    #[test]
    fn test_boolean_ops() {
        let mgr = Mtbdd::new();
        let x1 = mgr.mk_var(1);
        let x2 = mgr.mk_var(2);

        let and = mgr.apply_and(x1, x2);
        assert_eq!(and, mgr.cube(&[(x(1), true), (x(2), true)]));

        // De Morgan
        let or = mgr.apply_or(x1, x2);
        let via_and = mgr.apply_not(mgr.apply_and(mgr.apply_not(x1), mgr.apply_not(x2)));
        assert_eq!(or, via_and);

        assert_eq!(mgr.apply_ite(x1, x2, mgr.one()), mgr.apply_or(mgr.apply_not(x1), x2));
    }

    #[test]
    fn test_thresholds() {
        let mgr = Mtbdd::new();
        let x1 = mgr.mk_var(1);
        let f = mgr.apply_plus(mgr.scale(x1, 0.5), mgr.constant(0.25));
        assert_eq!(mgr.threshold(f, 0.75), x1);
        assert_eq!(mgr.strict_threshold(f, 0.75), mgr.zero());
        assert_eq!(mgr.pattern(f), mgr.one());
    }

    #[test]
    fn test_sum_abstract() {
        let mgr = Mtbdd::new();
        let x1 = mgr.mk_var(1);
        let x2 = mgr.mk_var(2);
        let f = mgr.apply_plus(mgr.scale(x1, 2.0), mgr.scale(x2, 3.0));

        // ∑x2. f = 2*(2*x1) + 3
        let g = mgr.sum_abstract(f, &[x(2)]);
        assert_eq!(mgr.eval(g, |_| false), 3.0);
        assert_eq!(mgr.eval(g, |_| true), 7.0);

        // Abstracting a variable `f` does not depend on doubles it.
        let h = mgr.sum_abstract(x1, &[x(3)]);
        assert_eq!(h, mgr.scale(x1, 2.0));

        let e = mgr.exist_abstract(mgr.apply_and(x1, x2), &[x(1)]);
        assert_eq!(e, x2);

        let m = mgr.max_abstract(f, &[x(1), x(2)]);
        assert_eq!(m, mgr.constant(5.0));
    }

    #[test]
    fn test_swap_variables() {
        let mgr = Mtbdd::new();
        let f = mgr.cube(&[(x(1), true), (x(2), false)]);
        let g = mgr.swap_variables(f, &[x(1)], &[x(2)]);
        assert_eq!(g, mgr.cube(&[(x(1), false), (x(2), true)]));

        let c = mgr.apply_times(mgr.mk_var(3), mgr.constant(4.0));
        let d = mgr.swap_variables(c, &[x(3)], &[x(4)]);
        assert_eq!(mgr.eval(d, |v| v == x(4)), 4.0);
        assert_eq!(mgr.eval(d, |v| v == x(3)), 0.0);
    }

    #[test]
    fn test_size() {
        let mgr = Mtbdd::new();
        let f = mgr.cube(&[(x(1), true), (x(2), true)]);
        // two decision nodes plus both terminals
        assert_eq!(mgr.size(f), 4);
        assert_eq!(mgr.size(mgr.one()), 1);
    }
}
