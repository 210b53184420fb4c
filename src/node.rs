use crate::reference::AddId;
use crate::types::Var;

/// An MTBDD node: either a decision point or a numeric terminal.
///
/// # Semantics
///
/// A decision node denotes the function
/// ```text
/// f = if var then f(hi) else f(lo)
/// ```
/// A terminal node (with `var == Var::TERMINAL`) denotes the constant `value`.
///
/// # Invariant
///
/// Decision nodes are reduced: `lo != hi`.
#[derive(Debug, Copy, Clone)]
pub struct AddNode {
    /// Decision variable, or `Var::TERMINAL` for constants.
    pub var: Var,
    /// Else child (`var = 0`).
    pub lo: AddId,
    /// Then child (`var = 1`).
    pub hi: AddId,
    /// Leaf value; meaningful only for terminals.
    pub value: f64,
    /// Next node in the unique-table collision chain.
    pub next: AddId,
}

impl AddNode {
    /// Sentinel value for end of hash collision chain.
    pub const NO_NEXT: AddId = AddId::INVALID;

    pub fn decision(var: Var, lo: AddId, hi: AddId) -> Self {
        debug_assert!(!var.is_terminal());
        debug_assert_ne!(lo, hi, "decision node must be reduced");
        Self {
            var,
            lo,
            hi,
            value: 0.0,
            next: Self::NO_NEXT,
        }
    }

    pub fn terminal(value: f64) -> Self {
        Self {
            var: Var::TERMINAL,
            lo: AddId::INVALID,
            hi: AddId::INVALID,
            value,
            next: Self::NO_NEXT,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.var.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_node_kinds() {
        let leaf = AddNode::terminal(2.5);
        assert!(leaf.is_terminal());
        assert_eq!(leaf.value, 2.5);

        let node = AddNode::decision(Var::new(3), AddId::ZERO, AddId::ONE);
        assert!(!node.is_terminal());
        assert_eq!(node.var, Var::new(3));
        assert_eq!(node.lo, AddId::ZERO);
        assert_eq!(node.hi, AddId::ONE);
        assert_eq!(node.next, AddNode::NO_NEXT);
    }
}
