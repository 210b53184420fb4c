//! Type-safe wrapper for decision-diagram variables.
//!
//! The variable order of the [`Mtbdd`][crate::mtbdd::Mtbdd] manager is fixed:
//! a smaller variable id is closer to the root. Terminal nodes carry the
//! [`Var::TERMINAL`] marker, which compares greater than every real variable,
//! so that "the top variable of `f` and `g`" is simply `min(var(f), var(g))`.

use std::fmt;

/// A variable identifier (1-indexed).
///
/// # Invariants
///
/// - Variable IDs must be >= 1 (0 is reserved)
/// - `Var::TERMINAL` is never a decision variable
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Marker variable of terminal nodes, ordered below every decision variable.
    pub const TERMINAL: Var = Var(u32::MAX);

    /// Creates a new variable with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0` or `id == u32::MAX`.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Variable IDs must be >= 1");
        assert_ne!(id, u32::MAX, "Variable ID is reserved for terminals");
        Var(id)
    }

    /// Returns the raw variable ID.
    pub fn id(self) -> u32 {
        self.0
    }

    pub fn is_terminal(self) -> bool {
        self == Var::TERMINAL
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_terminal() {
            write!(f, "x⊤")
        } else {
            write!(f, "x{}", self.0)
        }
    }
}

impl From<u32> for Var {
    fn from(id: u32) -> Self {
        Var::new(id)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_var_order() {
        let x1 = Var::new(1);
        let x2 = Var::new(2);
        assert!(x1 < x2);
        assert!(x2 < Var::TERMINAL);
        assert!(Var::TERMINAL.is_terminal());
        assert!(!x1.is_terminal());
        assert_eq!(x2.to_string(), "x2");
    }

    #[test]
    #[should_panic(expected = "Variable IDs must be >= 1")]
    fn test_var_zero_panics() {
        Var::new(0);
    }
}
