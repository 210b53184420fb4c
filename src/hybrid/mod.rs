//! Hybrid symbolic/sparse matrices.
//!
//! A [`HybridMatrix`] is an MTBDD rate matrix re-indexed against an ODD: each
//! node knows how many states lie in the else branch of its row or column
//! context, so multiplication can compute dense offsets directly. Nodes at and
//! below a cutoff level can additionally be replaced by explicit CSR blocks.
//!
//! The matrix is built in phases, each owning its data:
//!
//! 1. [`HybridMatrix::build`] descends the MTBDD, sharing nodes by
//!    `(diagram node, row context, column context)` per level, then resolves
//!    the ODD contexts to integer [`Extent`]s.
//! 2. [`HybridMatrix::sparsify`] materializes [`SparseBlock`]s.
//! 3. [`HybridMatrix::diagonal`] and [`HybridMatrix::multiply`] only read.

mod build;
mod diagonal;
mod multiply;
mod sparse;

use std::collections::HashSet;
use std::fmt;

pub use sparse::SparseConfig;

use crate::odd::Odd;

/// Index of a node in the matrix arena.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HybridId(u32);

impl HybridId {
    /// The zero sentinel, shared by every all-zero submatrix.
    pub const ZERO: HybridId = HybridId(0);

    /// Id of arena slot `index`, or `None` past the `u32` range.
    fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(HybridId)
    }

    fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_zero(self) -> bool {
        self == HybridId::ZERO
    }
}

impl fmt::Display for HybridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Which index an internal node splits on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Axis {
    Row,
    Column,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum HybridNode {
    Zero,
    Internal {
        axis: Axis,
        else_child: HybridId,
        then_child: HybridId,
    },
    /// A single rate, at the deepest level.
    Terminal(f64),
    /// Submatrix stored as the block with this index.
    Sparse(usize),
}

/// Dense position of a node's submatrix.
///
/// `else_rows` (`else_cols`) is the number of states in the else branch of the
/// row (column) context; `rows` (`cols`) is the total.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Extent {
    pub else_rows: usize,
    pub rows: usize,
    pub else_cols: usize,
    pub cols: usize,
}

/// A submatrix in compressed sparse row form, indexed relative to the offsets
/// of the node it replaces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseBlock {
    /// `row_starts[i]..row_starts[i + 1]` are the entries of row `i`.
    pub row_starts: Vec<usize>,
    pub columns: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseBlock {
    pub fn num_rows(&self) -> usize {
        self.row_starts.len().saturating_sub(1)
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Entries `(column, value)` of row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_starts[i]..self.row_starts[i + 1];
        self.columns[range.clone()].iter().copied().zip(self.values[range].iter().copied())
    }
}

#[derive(Debug)]
pub struct HybridMatrix<'a> {
    nodes: Vec<HybridNode>,
    extents: Vec<Extent>,
    /// Live row nodes per level; level `n` holds the terminals.
    rows: Vec<Vec<HybridId>>,
    /// Live column nodes per level.
    cols: Vec<Vec<HybridId>>,
    blocks: Vec<SparseBlock>,
    root: HybridId,
    odd: &'a Odd,
    sparse_levels: usize,
}

impl<'a> HybridMatrix<'a> {
    pub fn root(&self) -> HybridId {
        self.root
    }

    pub fn odd(&self) -> &'a Odd {
        self.odd
    }

    pub fn node(&self, id: HybridId) -> HybridNode {
        self.nodes[id.index()]
    }

    pub fn extent(&self, id: HybridId) -> Extent {
        self.extents[id.index()]
    }

    pub fn block(&self, index: usize) -> &SparseBlock {
        &self.blocks[index]
    }

    /// Number of symbolic levels (row/column variable pairs).
    pub fn num_levels(&self) -> usize {
        self.cols.len()
    }

    pub fn num_states(&self) -> usize {
        self.odd.num_states()
    }

    /// Number of live nodes, the zero sentinel included.
    pub fn node_count(&self) -> usize {
        1 + self.rows.iter().chain(&self.cols).map(Vec::len).sum::<usize>()
    }

    /// Number of levels replaced by sparse blocks.
    pub fn sparse_levels(&self) -> usize {
        self.sparse_levels
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_nnz(&self) -> usize {
        self.blocks.iter().map(SparseBlock::nnz).sum()
    }

    /// Check that levels alternate row, column, row from the root, that
    /// terminals only occur at the deepest level and sparse blocks only at the
    /// cutoff.
    pub fn check_alternation(&self) -> bool {
        let n = self.num_levels();
        let cutoff = n - self.sparse_levels;
        let mut visited = HashSet::new();
        let mut stack = vec![(self.root, Axis::Row, 0)];
        while let Some((id, expected, level)) = stack.pop() {
            if !visited.insert((id, expected, level)) {
                continue;
            }
            match self.node(id) {
                HybridNode::Zero => {}
                HybridNode::Terminal(_) => {
                    if expected != Axis::Row || level != n {
                        return false;
                    }
                }
                HybridNode::Sparse(_) => {
                    if expected != Axis::Row || level != cutoff {
                        return false;
                    }
                }
                HybridNode::Internal {
                    axis,
                    else_child,
                    then_child,
                } => {
                    if axis != expected || level >= n {
                        return false;
                    }
                    let next = match axis {
                        Axis::Row => (Axis::Column, level),
                        Axis::Column => (Axis::Row, level + 1),
                    };
                    stack.push((else_child, next.0, next.1));
                    stack.push((then_child, next.0, next.1));
                }
            }
        }
        true
    }
}

impl fmt::Display for HybridMatrix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HybridMatrix({} states, {} levels, {} nodes, {} sparse levels, {} blocks with {} nonzeros)",
            self.num_states(),
            self.num_levels(),
            self.node_count(),
            self.sparse_levels,
            self.num_blocks(),
            self.block_nnz()
        )
    }
}
