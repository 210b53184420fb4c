use super::{Axis, HybridId, HybridMatrix, HybridNode};

impl HybridMatrix<'_> {
    /// Negated row sums: `diag[i] = -∑_j R[i][j]`.
    pub fn diagonal(&self) -> Vec<f64> {
        let mut diag = vec![0.0; self.num_states()];
        self.subtract_rows(self.root, 0, &mut diag);
        diag
    }

    fn subtract_rows(&self, id: HybridId, row: usize, diag: &mut [f64]) {
        match self.node(id) {
            HybridNode::Zero => {}
            HybridNode::Terminal(value) => diag[row] -= value,
            HybridNode::Sparse(b) => {
                let block = self.block(b);
                for i in 0..block.num_rows() {
                    for (_, value) in block.row(i) {
                        diag[row + i] -= value;
                    }
                }
            }
            HybridNode::Internal {
                axis,
                else_child,
                then_child,
            } => {
                self.subtract_rows(else_child, row, diag);
                let then_row = match axis {
                    Axis::Row => row + self.extent(id).else_rows,
                    Axis::Column => row,
                };
                self.subtract_rows(then_child, then_row, diag);
            }
        }
    }
}
