use std::fmt::{Display, Formatter};

/// A reference to an MTBDD node.
///
/// MTBDDs have no complement edges, so `AddId` is a plain index into the
/// manager's node arena.
///
/// # Terminal Values
///
/// - `AddId::ZERO`: the constant `0.0` (also boolean false)
/// - `AddId::ONE`: the constant `1.0` (also boolean true)
///
/// Other constants are allocated on demand and are not distinguishable from
/// decision nodes without asking the manager.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct AddId(u32);

impl AddId {
    pub const ZERO: AddId = AddId(0);
    pub const ONE: AddId = AddId(1);

    /// Sentinel for invalid references (end of collision chains, empty buckets).
    pub const INVALID: AddId = AddId(0xFFFF_FFFF);

    pub const fn new(index: u32) -> Self {
        AddId(index)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the index for array access.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_one(self) -> bool {
        self.0 == 1
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0xFFFF_FFFF
    }
}

impl Default for AddId {
    fn default() -> Self {
        AddId::INVALID
    }
}

impl Display for AddId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            0 => write!(f, "0"),
            1 => write!(f, "1"),
            0xFFFF_FFFF => write!(f, "#invalid"),
            _ => write!(f, "#{}", self.0),
        }
    }
}

impl From<u32> for AddId {
    fn from(index: u32) -> Self {
        AddId::new(index)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_terminals() {
        assert!(AddId::ZERO.is_zero());
        assert!(!AddId::ZERO.is_one());
        assert!(AddId::ONE.is_one());
        assert!(!AddId::INVALID.is_valid());
        assert_eq!(AddId::default(), AddId::INVALID);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", AddId::ZERO), "0");
        assert_eq!(format!("{}", AddId::ONE), "1");
        assert_eq!(format!("{}", AddId::new(42)), "#42");
    }
}
