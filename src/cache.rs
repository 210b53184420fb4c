//! Computed table for binary MTBDD operations.

use std::cell::Cell;
use std::collections::HashMap;

use crate::reference::AddId;

/// Binary operations on MTBDDs, applied pointwise to terminal values.
///
/// The boolean operations treat any nonzero value as true and always produce
/// 0/1 results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Plus,
    Minus,
    Times,
    Divide,
    Min,
    Max,
    And,
    Or,
}

impl BinaryOp {
    /// Apply the operation to two terminal values.
    pub fn eval(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Plus => a + b,
            BinaryOp::Minus => a - b,
            BinaryOp::Times => a * b,
            BinaryOp::Divide => a / b,
            BinaryOp::Min => a.min(b),
            BinaryOp::Max => a.max(b),
            BinaryOp::And => ((a != 0.0) && (b != 0.0)) as u8 as f64,
            BinaryOp::Or => ((a != 0.0) || (b != 0.0)) as u8 as f64,
        }
    }

    pub fn is_commutative(self) -> bool {
        !matches!(self, BinaryOp::Minus | BinaryOp::Divide)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub op: BinaryOp,
    pub f: AddId,
    pub g: AddId,
}

impl CacheKey {
    /// Create a key, normalizing operand order for commutative operations.
    pub fn new(op: BinaryOp, f: AddId, g: AddId) -> Self {
        if op.is_commutative() && g < f {
            Self { op, f: g, g: f }
        } else {
            Self { op, f, g }
        }
    }
}

#[derive(Debug, Default)]
pub struct Cache {
    map: HashMap<CacheKey, AddId>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<AddId> {
        let result = self.map.get(key).copied();
        match result {
            Some(_) => self.hits.set(self.hits.get() + 1),
            None => self.misses.set(self.misses.get() + 1),
        }
        result
    }

    pub fn insert(&mut self, key: CacheKey, value: AddId) {
        self.map.insert(key, value);
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}
