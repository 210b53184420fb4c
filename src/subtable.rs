//! Per-variable unique table for MTBDD decision nodes.
//!
//! Collision chains are intrusive: each [`AddNode`] stores the id of the next
//! node in its bucket, and the subtable only holds the chain heads.

use crate::node::AddNode;
use crate::reference::AddId;
use crate::types::Var;

/// Default number of bucket bits (2^10 = 1024 buckets per variable).
const DEFAULT_BUCKET_BITS: usize = 10;

#[derive(Debug, Clone)]
pub struct Subtable {
    /// The variable labelling all nodes in this subtable.
    pub variable: Var,
    buckets: Vec<AddId>,
    bitmask: u64,
    count: usize,
}

impl Subtable {
    pub fn new(variable: Var) -> Self {
        Self::with_bucket_bits(variable, DEFAULT_BUCKET_BITS)
    }

    /// Create a new subtable with `2^bits` buckets.
    pub fn with_bucket_bits(variable: Var, bits: usize) -> Self {
        let num_buckets = 1 << bits;
        Self {
            variable,
            buckets: vec![AddNode::NO_NEXT; num_buckets],
            bitmask: (num_buckets - 1) as u64,
            count: 0,
        }
    }

    #[inline]
    fn bucket_index(&self, lo: AddId, hi: AddId) -> usize {
        (hash_children(lo, hi) & self.bitmask) as usize
    }

    /// Look up a node of this variable by its children.
    pub fn find(&self, lo: AddId, hi: AddId, nodes: &[AddNode]) -> Option<AddId> {
        let mut current = self.buckets[self.bucket_index(lo, hi)];
        while current != AddNode::NO_NEXT {
            let node = &nodes[current.index()];
            if node.lo == lo && node.hi == hi {
                return Some(current);
            }
            current = node.next;
        }
        None
    }

    /// Insert the node `id` at the head of its bucket chain.
    pub fn insert(&mut self, id: AddId, nodes: &mut [AddNode]) {
        let node = &nodes[id.index()];
        debug_assert_eq!(node.var, self.variable);
        let bucket = self.bucket_index(node.lo, node.hi);
        nodes[id.index()].next = self.buckets[bucket];
        self.buckets[bucket] = id;
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// FNV-1a style mixing of the (lo, hi) children.
#[inline]
fn hash_children(lo: AddId, hi: AddId) -> u64 {
    let mut h = 14695981039346656037u64;
    h ^= lo.raw() as u64;
    h = h.wrapping_mul(1099511628211);
    h ^= hi.raw() as u64;
    h = h.wrapping_mul(1099511628211);
    h
}
