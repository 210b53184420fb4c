use super::{HybridId, HybridMatrix, HybridNode};

impl HybridMatrix<'_> {
    /// `result[i] += unif * ∑_j R[i][j] * vector[j]`.
    pub fn multiply(&self, vector: &[f64], result: &mut [f64], unif: f64) {
        debug_assert_eq!(vector.len(), self.num_states());
        debug_assert_eq!(result.len(), self.num_states());
        self.multiply_rec(self.root, 0, 0, vector, result, unif);
    }

    /// `id` is a row node; its children are column nodes whose children are
    /// the row nodes of the next level.
    fn multiply_rec(&self, id: HybridId, row: usize, col: usize, vector: &[f64], result: &mut [f64], unif: f64) {
        match self.node(id) {
            HybridNode::Zero => {}
            HybridNode::Terminal(value) => result[row] += unif * value * vector[col],
            HybridNode::Sparse(b) => {
                let block = self.block(b);
                for i in 0..block.num_rows() {
                    let sum: f64 = block.row(i).map(|(j, value)| value * vector[col + j]).sum();
                    result[row + i] += unif * sum;
                }
            }
            HybridNode::Internal {
                else_child,
                then_child,
                ..
            } => {
                let then_row = row + self.extent(id).else_rows;
                for (child, child_row) in [(else_child, row), (then_child, then_row)] {
                    let HybridNode::Internal {
                        else_child: e,
                        then_child: t,
                        ..
                    } = self.node(child)
                    else {
                        continue;
                    };
                    let then_col = col + self.extent(child).else_cols;
                    self.multiply_rec(e, child_row, col, vector, result, unif);
                    self.multiply_rec(t, child_row, then_col, vector, result, unif);
                }
            }
        }
    }
}
