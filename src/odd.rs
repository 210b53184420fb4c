//! Offset-labelled decision diagrams.
//!
//! An ODD enumerates a set of states encoded over an ordered list of boolean
//! variables. Every decision point records how many states lie in its else
//! branch, which gives a dense index (the rank of the encoding among all
//! members) to each state in the set. Dense vectors indexed this way are what
//! the numerical engines operate on.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use num_bigint::BigUint;

use crate::error::CheckError;
use crate::mtbdd::Mtbdd;
use crate::reference::AddId;
use crate::types::Var;

/// Identity of an ODD node.
///
/// `OddId::EMPTY` is the unique node of size zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OddId(u32);

impl OddId {
    pub const EMPTY: OddId = OddId(0);
    /// The unique node of size one at the deepest level.
    pub const LEAF: OddId = OddId(1);

    fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_empty(self) -> bool {
        self == OddId::EMPTY
    }
}

impl fmt::Display for OddId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug, Copy, Clone)]
struct OddNode {
    else_child: OddId,
    then_child: OddId,
    else_count: usize,
    size: usize,
}

#[derive(Debug, Clone)]
pub struct Odd {
    nodes: Vec<OddNode>,
    root: OddId,
    vars: Vec<Var>,
}

impl Odd {
    /// Build the ODD of the 0/1 diagram `states` over `vars` (top-down order).
    pub fn new(mgr: &Mtbdd, states: AddId, vars: &[Var]) -> Result<Self, CheckError> {
        let count = mgr.sat_count(states, vars);
        if usize::try_from(&count).is_err() {
            return Err(CheckError::StateSpaceTooLarge(count));
        }

        let empty = OddNode {
            else_child: OddId::EMPTY,
            then_child: OddId::EMPTY,
            else_count: 0,
            size: 0,
        };
        let leaf = OddNode { size: 1, ..empty };
        let mut odd = Odd {
            nodes: vec![empty, leaf],
            root: OddId::EMPTY,
            vars: vars.to_vec(),
        };

        let mut memo = vec![HashMap::new(); vars.len()];
        odd.root = odd.build(mgr, states, 0, &mut memo);
        debug!(
            "Built ODD with {} nodes for {} states over {} variables",
            odd.nodes.len(),
            odd.num_states(),
            vars.len()
        );
        debug_assert_eq!(BigUint::from(odd.num_states()), count);
        Ok(odd)
    }

    fn build(&mut self, mgr: &Mtbdd, f: AddId, level: usize, memo: &mut [HashMap<AddId, OddId>]) -> OddId {
        if f.is_zero() {
            return OddId::EMPTY;
        }
        if level == self.vars.len() {
            return OddId::LEAF;
        }
        if let Some(&id) = memo[level].get(&f) {
            return id;
        }

        let (f0, f1) = mgr.cofactors(f, self.vars[level]);
        let else_child = self.build(mgr, f0, level + 1, memo);
        let then_child = self.build(mgr, f1, level + 1, memo);
        let else_count = self.size(else_child);
        let size = else_count + self.size(then_child);

        let id = OddId(self.nodes.len() as u32);
        self.nodes.push(OddNode {
            else_child,
            then_child,
            else_count,
            size,
        });
        memo[level].insert(f, id);
        id
    }

    pub fn root(&self) -> OddId {
        self.root
    }

    /// The variables the ODD branches on, top-down.
    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn num_levels(&self) -> usize {
        self.vars.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of enumerated states.
    pub fn num_states(&self) -> usize {
        self.size(self.root)
    }

    pub fn else_child(&self, id: OddId) -> OddId {
        self.nodes[id.index()].else_child
    }

    pub fn then_child(&self, id: OddId) -> OddId {
        self.nodes[id.index()].then_child
    }

    /// Number of states below the else branch of `id`.
    pub fn else_count(&self, id: OddId) -> usize {
        self.nodes[id.index()].else_count
    }

    /// Number of states below `id`.
    pub fn size(&self, id: OddId) -> usize {
        self.nodes[id.index()].size
    }

    /// Dense index of the state with the given assignment (one bit per level),
    /// or `None` if it is not a member.
    pub fn index_of(&self, bits: &[bool]) -> Option<usize> {
        assert_eq!(bits.len(), self.vars.len(), "Assignment must have one bit per level");
        let mut current = self.root;
        let mut index = 0;
        for &bit in bits {
            if current.is_empty() {
                return None;
            }
            if bit {
                index += self.else_count(current);
                current = self.then_child(current);
            } else {
                current = self.else_child(current);
            }
        }
        (current == OddId::LEAF).then_some(index)
    }

    /// Values of `f` on all enumerated states, in index order.
    ///
    /// `f` must depend on the ODD variables only.
    pub fn to_vector(&self, mgr: &Mtbdd, f: AddId) -> Vec<f64> {
        let mut out = vec![0.0; self.num_states()];
        self.fill(mgr, f, self.root, 0, 0, &mut out);
        out
    }

    fn fill(&self, mgr: &Mtbdd, f: AddId, id: OddId, level: usize, offset: usize, out: &mut [f64]) {
        if id.is_empty() || f.is_zero() {
            return;
        }
        if level == self.vars.len() {
            out[offset] = mgr.value(f);
            return;
        }
        let (f0, f1) = mgr.cofactors(f, self.vars[level]);
        self.fill(mgr, f0, self.else_child(id), level + 1, offset, out);
        self.fill(mgr, f1, self.then_child(id), level + 1, offset + self.else_count(id), out);
    }

    /// The diagram that maps state `i` to `values[i]` and non-members to zero.
    pub fn from_vector(&self, mgr: &Mtbdd, values: &[f64]) -> AddId {
        assert_eq!(values.len(), self.num_states(), "Vector length must match the number of states");
        self.unfill(mgr, values, self.root, 0, 0)
    }

    fn unfill(&self, mgr: &Mtbdd, values: &[f64], id: OddId, level: usize, offset: usize) -> AddId {
        if id.is_empty() {
            return mgr.zero();
        }
        if level == self.vars.len() {
            return mgr.constant(values[offset]);
        }
        let lo = self.unfill(mgr, values, self.else_child(id), level + 1, offset);
        let hi = self.unfill(mgr, values, self.then_child(id), level + 1, offset + self.else_count(id));
        mgr.mk_node(self.vars[level], lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    /// States {0, 2, 3} over two variables x1 (MSB) and x3.
    fn sample(mgr: &Mtbdd) -> (AddId, Vec<Var>) {
        let vars = vec![Var::new(1), Var::new(3)];
        let s0 = mgr.cube(&[(vars[0], false), (vars[1], false)]);
        let s2 = mgr.cube(&[(vars[0], true), (vars[1], false)]);
        let s3 = mgr.cube(&[(vars[0], true), (vars[1], true)]);
        let states = mgr.apply_or(s0, mgr.apply_or(s2, s3));
        (states, vars)
    }

    #[test]
    fn test_counts() {
        let mgr = Mtbdd::new();
        let (states, vars) = sample(&mgr);
        let odd = Odd::new(&mgr, states, &vars).unwrap();

        assert_eq!(odd.num_states(), 3);
        let root = odd.root();
        assert_eq!(odd.else_count(root), 1);
        assert_eq!(odd.size(odd.then_child(root)), 2);
        assert_eq!(odd.size(OddId::EMPTY), 0);
    }

    #[test]
    fn test_index_of() {
        let mgr = Mtbdd::new();
        let (states, vars) = sample(&mgr);
        let odd = Odd::new(&mgr, states, &vars).unwrap();

        assert_eq!(odd.index_of(&[false, false]), Some(0));
        assert_eq!(odd.index_of(&[false, true]), None);
        assert_eq!(odd.index_of(&[true, false]), Some(1));
        assert_eq!(odd.index_of(&[true, true]), Some(2));
    }

    #[test]
    fn test_vector_conversion() {
        let mgr = Mtbdd::new();
        let (states, vars) = sample(&mgr);
        let odd = Odd::new(&mgr, states, &vars).unwrap();

        let f = odd.from_vector(&mgr, &[0.5, 0.0, 2.0]);
        assert_eq!(mgr.eval(f, |_| false), 0.5);
        assert_eq!(mgr.eval(f, |v| v == vars[0]), 0.0);
        assert_eq!(mgr.eval(f, |_| true), 2.0);
        // non-member
        assert_eq!(mgr.eval(f, |v| v == vars[1]), 0.0);

        assert_eq!(odd.to_vector(&mgr, f), vec![0.5, 0.0, 2.0]);
        assert_eq!(odd.to_vector(&mgr, states), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_empty_set() {
        let mgr = Mtbdd::new();
        let odd = Odd::new(&mgr, mgr.zero(), &[Var::new(1)]).unwrap();
        assert_eq!(odd.num_states(), 0);
        assert_eq!(odd.root(), OddId::EMPTY);
        assert!(odd.to_vector(&mgr, mgr.one()).is_empty());
    }
}
