use std::collections::HashMap;

use log::debug;

use super::{Axis, HybridId, HybridMatrix, HybridNode, SparseBlock};
use crate::error::CheckError;

/// Controls how many of the deepest levels are stored as CSR blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseConfig {
    /// Memory budget in KiB. Level costs are summed from the deepest level
    /// upward; the cutoff is placed below the level that overruns it.
    pub memory_budget_kb: usize,
    /// Explicit number of levels to sparsify, overriding the budget.
    pub levels: Option<usize>,
    pub bytes_per_nonzero: usize,
    pub bytes_per_row: usize,
    pub bytes_per_block: usize,
    /// Levels at or above this one stay symbolic.
    pub reserved_level: Option<usize>,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            memory_budget_kb: 1024,
            levels: None,
            bytes_per_nonzero: 12,
            bytes_per_row: 4,
            bytes_per_block: 64,
            reserved_level: None,
        }
    }
}

impl SparseConfig {
    /// Bytes needed to store a submatrix with `rows` rows and `nnz` entries.
    pub fn block_cost(&self, rows: usize, nnz: usize) -> usize {
        self.bytes_per_nonzero * nnz + self.bytes_per_row * (rows + 1) + self.bytes_per_block
    }
}

impl HybridMatrix<'_> {
    /// Replace every row node at the cutoff level by a CSR block.
    ///
    /// Returns an error if an explicit level count exceeds the number of
    /// levels.
    pub fn sparsify(&mut self, config: &SparseConfig) -> Result<(), CheckError> {
        let n = self.num_levels();
        let mut cutoff = match config.levels {
            Some(k) if k > n => return Err(CheckError::invalid("number of sparse levels", k as f64)),
            Some(k) => n - k,
            None => self.cutoff_for_budget(config),
        };
        if let Some(reserved) = config.reserved_level {
            cutoff = cutoff.max(reserved + 1).min(n);
        }
        if cutoff == n {
            debug!("No levels sparsified");
            return Ok(());
        }

        let targets = self.rows[cutoff].clone();
        for id in targets {
            let block = self.make_block(id);
            self.blocks.push(block);
            self.nodes[id.index()] = HybridNode::Sparse(self.blocks.len() - 1);
        }
        for level in cutoff + 1..=n {
            self.rows[level] = Vec::new();
        }
        for level in cutoff..n {
            self.cols[level] = Vec::new();
        }
        self.sparse_levels = n - cutoff;

        debug!("Sparsified {} levels into {}", self.sparse_levels, self);
        Ok(())
    }

    /// Scan row levels bottom-up, summing their block costs, and stop at the
    /// first one that pushes the total over the budget.
    fn cutoff_for_budget(&self, config: &SparseConfig) -> usize {
        let budget = config.memory_budget_kb * 1024;
        let mut nnz = HashMap::new();
        let mut running = 0;
        for level in (0..self.num_levels()).rev() {
            let cost: usize = self.rows[level]
                .iter()
                .map(|&id| config.block_cost(self.extent(id).rows, self.count_nnz(id, &mut nnz)))
                .sum();
            running += cost;
            debug!("Level {} would take {} bytes as sparse blocks, {} in total", level, cost, running);
            if running > budget {
                return level + 1;
            }
        }
        0
    }

    /// Number of nonzero entries below `id`, memoized in `memo`.
    fn count_nnz(&self, id: HybridId, memo: &mut HashMap<HybridId, usize>) -> usize {
        match self.node(id) {
            HybridNode::Zero => 0,
            HybridNode::Terminal(_) => 1,
            HybridNode::Sparse(b) => self.blocks[b].nnz(),
            HybridNode::Internal {
                else_child,
                then_child,
                ..
            } => {
                if let Some(&count) = memo.get(&id) {
                    return count;
                }
                let count = self.count_nnz(else_child, memo) + self.count_nnz(then_child, memo);
                memo.insert(id, count);
                count
            }
        }
    }

    /// Visit every entry below `id` as `(row, column, value)`, with rows and
    /// columns relative to `row` and `col`.
    pub(super) fn for_each_entry(&self, id: HybridId, row: usize, col: usize, visit: &mut impl FnMut(usize, usize, f64)) {
        match self.node(id) {
            HybridNode::Zero => {}
            HybridNode::Terminal(value) => visit(row, col, value),
            HybridNode::Sparse(b) => {
                let block = &self.blocks[b];
                for i in 0..block.num_rows() {
                    for (j, value) in block.row(i) {
                        visit(row + i, col + j, value);
                    }
                }
            }
            HybridNode::Internal {
                axis,
                else_child,
                then_child,
            } => {
                let extent = self.extent(id);
                self.for_each_entry(else_child, row, col, visit);
                match axis {
                    Axis::Row => self.for_each_entry(then_child, row + extent.else_rows, col, visit),
                    Axis::Column => self.for_each_entry(then_child, row, col + extent.else_cols, visit),
                }
            }
        }
    }

    /// Two walks: count entries per row into `row_starts[i + 1]`, prefix-sum,
    /// then fill using `row_starts[i]` as the cursor of row `i`, which leaves
    /// each start shifted to the next row.
    fn make_block(&self, id: HybridId) -> SparseBlock {
        let rows = self.extent(id).rows;
        let mut row_starts = vec![0; rows + 1];
        self.for_each_entry(id, 0, 0, &mut |r, _, _| row_starts[r + 1] += 1);
        for i in 0..rows {
            row_starts[i + 1] += row_starts[i];
        }

        let nnz = row_starts[rows];
        let mut columns = vec![0; nnz];
        let mut values = vec![0.0; nnz];
        self.for_each_entry(id, 0, 0, &mut |r, c, v| {
            let k = row_starts[r];
            columns[k] = c;
            values[k] = v;
            row_starts[r] += 1;
        });
        for i in (1..=rows).rev() {
            row_starts[i] = row_starts[i - 1];
        }
        row_starts[0] = 0;

        SparseBlock {
            row_starts,
            columns,
            values,
        }
    }
}
