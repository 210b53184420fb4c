use std::collections::HashMap;

use log::debug;

use super::{Axis, Extent, HybridId, HybridMatrix, HybridNode};
use crate::error::CheckError;
use crate::mtbdd::Mtbdd;
use crate::odd::{Odd, OddId};
use crate::reference::AddId;
use crate::types::Var;

type Key = (AddId, OddId, OddId);

/// Build-phase state: the arena under construction, the ODD context of each
/// node and the per-level sharing tables.
struct Builder<'a> {
    mgr: &'a Mtbdd,
    odd: &'a Odd,
    row_vars: &'a [Var],
    col_vars: &'a [Var],
    nodes: Vec<HybridNode>,
    contexts: Vec<(OddId, OddId)>,
    rows: Vec<HashMap<Key, HybridId>>,
    cols: Vec<HashMap<Key, HybridId>>,
}

impl Builder<'_> {
    fn push(&mut self, node: HybridNode, r: OddId, c: OddId) -> Result<HybridId, CheckError> {
        let id = HybridId::from_index(self.nodes.len()).ok_or(CheckError::TooManyNodes(self.nodes.len()))?;
        self.nodes.push(node);
        self.contexts.push((r, c));
        Ok(id)
    }

    /// Expected variable: `row_vars[level]`.
    fn row(&mut self, f: AddId, level: usize, r: OddId, c: OddId) -> Result<HybridId, CheckError> {
        if f.is_zero() || r.is_empty() || c.is_empty() {
            return Ok(HybridId::ZERO);
        }
        let key = (f, r, c);
        if let Some(&id) = self.rows[level].get(&key) {
            return Ok(id);
        }

        let id = if level == self.row_vars.len() {
            if !self.mgr.is_constant(f) {
                return Err(CheckError::invalid("rate matrix variable", self.mgr.var(f).id()));
            }
            self.push(HybridNode::Terminal(self.mgr.value(f)), r, c)?
        } else {
            let (f0, f1) = self.cofactor(f, self.row_vars[level])?;
            let else_child = self.col(f0, level, self.odd.else_child(r), c)?;
            let then_child = self.col(f1, level, self.odd.then_child(r), c)?;
            if else_child.is_zero() && then_child.is_zero() {
                HybridId::ZERO
            } else {
                let node = HybridNode::Internal {
                    axis: Axis::Row,
                    else_child,
                    then_child,
                };
                self.push(node, r, c)?
            }
        };

        self.rows[level].insert(key, id);
        Ok(id)
    }

    /// Expected variable: `col_vars[level]`.
    fn col(&mut self, f: AddId, level: usize, r: OddId, c: OddId) -> Result<HybridId, CheckError> {
        if f.is_zero() || r.is_empty() || c.is_empty() {
            return Ok(HybridId::ZERO);
        }
        let key = (f, r, c);
        if let Some(&id) = self.cols[level].get(&key) {
            return Ok(id);
        }

        let (f0, f1) = self.cofactor(f, self.col_vars[level])?;
        let else_child = self.row(f0, level + 1, r, self.odd.else_child(c))?;
        let then_child = self.row(f1, level + 1, r, self.odd.then_child(c))?;
        let id = if else_child.is_zero() && then_child.is_zero() {
            HybridId::ZERO
        } else {
            let node = HybridNode::Internal {
                axis: Axis::Column,
                else_child,
                then_child,
            };
            self.push(node, r, c)?
        };

        self.cols[level].insert(key, id);
        Ok(id)
    }

    fn cofactor(&self, f: AddId, expected: Var) -> Result<(AddId, AddId), CheckError> {
        let top = self.mgr.var(f);
        if top < expected {
            return Err(CheckError::invalid("rate matrix variable", top.id()));
        }
        Ok(self.mgr.cofactors(f, expected))
    }
}

/// Live ids of one sharing table, in creation order.
fn live(table: HashMap<Key, HybridId>) -> Vec<HybridId> {
    let mut ids: Vec<HybridId> = table.into_values().filter(|id| !id.is_zero()).collect();
    ids.sort();
    ids
}

impl<'a> HybridMatrix<'a> {
    /// Build the hybrid form of `rates` over the given row/column variables,
    /// indexed by `odd` on both axes.
    pub fn build(
        mgr: &Mtbdd,
        rates: AddId,
        row_vars: &[Var],
        col_vars: &[Var],
        odd: &'a Odd,
    ) -> Result<Self, CheckError> {
        let n = odd.num_levels();
        if row_vars.len() != col_vars.len() || row_vars.len() != n {
            return Err(CheckError::VariableMismatch {
                rows: row_vars.len(),
                columns: col_vars.len(),
                levels: n,
            });
        }

        let mut builder = Builder {
            mgr,
            odd,
            row_vars,
            col_vars,
            nodes: vec![HybridNode::Zero],
            contexts: vec![(OddId::EMPTY, OddId::EMPTY)],
            rows: vec![HashMap::new(); n + 1],
            cols: vec![HashMap::new(); n],
        };
        let root = builder.row(rates, 0, odd.root(), odd.root())?;

        // Resolve ODD contexts to dense extents.
        let extents = builder
            .contexts
            .iter()
            .map(|&(r, c)| Extent {
                else_rows: odd.else_count(r),
                rows: odd.size(r),
                else_cols: odd.else_count(c),
                cols: odd.size(c),
            })
            .collect();

        let matrix = HybridMatrix {
            nodes: builder.nodes,
            extents,
            rows: builder.rows.into_iter().map(live).collect(),
            cols: builder.cols.into_iter().map(live).collect(),
            blocks: Vec::new(),
            root,
            odd,
            sparse_levels: 0,
        };
        debug!("Built {}", matrix);
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::ctmc::CtmcBuilder;

    #[test]
    fn test_build_two_states() {
        let mgr = Mtbdd::new();
        let ctmc = CtmcBuilder::new(&mgr, 2)
            .add_transition(0, 1, 2.0)
            .add_transition(1, 0, 3.0)
            .build(0)
            .unwrap();
        let matrix =
            HybridMatrix::build(&mgr, ctmc.rates(), ctmc.row_vars(), ctmc.col_vars(), ctmc.odd()).unwrap();

        assert!(matrix.check_alternation());
        assert_eq!(matrix.num_levels(), 1);
        assert_eq!(matrix.num_states(), 2);
        // root row node, two column nodes, two terminals
        assert_eq!(matrix.node_count(), 6);

        let HybridNode::Internal { axis, else_child, .. } = matrix.node(matrix.root()) else {
            panic!("root must be internal");
        };
        assert_eq!(axis, Axis::Row);
        assert_eq!(matrix.extent(matrix.root()).rows, 2);
        assert_eq!(matrix.extent(matrix.root()).else_rows, 1);
        let HybridNode::Internal { axis, else_child, then_child } = matrix.node(else_child) else {
            panic!("column node must be internal");
        };
        assert_eq!(axis, Axis::Column);
        assert!(else_child.is_zero());
        assert_eq!(matrix.node(then_child), HybridNode::Terminal(2.0));
    }

    #[test]
    fn test_sharing_by_context() {
        let mgr = Mtbdd::new();
        // Uniform rate between every pair of three states: the diagram is
        // small, but distinct ODD contexts split its nodes.
        let mut builder = CtmcBuilder::new(&mgr, 3);
        for i in 0..3 {
            for j in 0..3 {
                builder.add_transition(i, j, 1.0);
            }
        }
        let ctmc = builder.build(0).unwrap();
        assert_eq!(ctmc.num_states(), 3);
        let matrix =
            HybridMatrix::build(&mgr, ctmc.rates(), ctmc.row_vars(), ctmc.col_vars(), ctmc.odd()).unwrap();

        assert!(matrix.check_alternation());
        // Terminals with equal value and equal (leaf) contexts are shared.
        assert_eq!(matrix.rows[2].len(), 1);
    }

    #[test]
    fn test_variable_mismatch() {
        let mgr = Mtbdd::new();
        let ctmc = CtmcBuilder::new(&mgr, 4).add_transition(0, 3, 1.0).build(0).unwrap();
        let result = HybridMatrix::build(&mgr, ctmc.rates(), ctmc.row_vars(), &ctmc.col_vars()[..1], ctmc.odd());
        assert!(matches!(result, Err(CheckError::VariableMismatch { rows: 2, columns: 1, levels: 2 })));
    }

    #[test]
    fn test_foreign_variable() {
        let mgr = Mtbdd::new();
        let ctmc = CtmcBuilder::new(&mgr, 2).add_transition(0, 1, 1.0).build(0).unwrap();
        // A rate that depends on x5, which is neither a row nor a column variable.
        let rates = mgr.apply_times(ctmc.rates(), mgr.mk_var(5));
        let result = HybridMatrix::build(&mgr, rates, ctmc.row_vars(), ctmc.col_vars(), ctmc.odd());
        assert!(matches!(result, Err(CheckError::InvalidParameter { .. })));
    }
}
