use std::collections::HashMap;

use num_bigint::BigUint;

use crate::mtbdd::Mtbdd;
use crate::reference::AddId;
use crate::types::Var;

impl Mtbdd {
    /// Number of assignments to `vars` on which `f` is nonzero.
    ///
    /// `f` must not depend on variables outside `vars`.
    pub fn sat_count(&self, f: AddId, vars: &[Var]) -> BigUint {
        let max = BigUint::from(1u32) << vars.len();
        let mut cache = HashMap::new();
        self._sat_count(f, &max, &mut cache)
    }

    fn _sat_count(&self, f: AddId, max: &BigUint, cache: &mut HashMap<AddId, BigUint>) -> BigUint {
        let node = self.node(f);
        if node.is_terminal() {
            return if node.value == 0.0 { BigUint::ZERO } else { max.clone() };
        }

        if let Some(count) = cache.get(&f) {
            return count.clone();
        }

        let count_low = self._sat_count(node.lo, max, cache);
        let count_high = self._sat_count(node.hi, max, cache);
        let count: BigUint = (count_low + count_high) >> 1;

        cache.insert(f, count.clone());
        count
    }

    /// One assignment (as literals, top-down) on which `f` is nonzero.
    ///
    /// Returns `None` if `f` is the constant zero.
    pub fn one_sat(&self, f: AddId) -> Option<Vec<(Var, bool)>> {
        if f.is_zero() {
            return None;
        }

        let mut path = Vec::new();
        let mut current = self.node(f);
        while !current.is_terminal() {
            // Prefer high branch if nonzero, otherwise take low
            if !current.hi.is_zero() {
                path.push((current.var, true));
                current = self.node(current.hi);
            } else {
                path.push((current.var, false));
                current = self.node(current.lo);
            }
        }

        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn vars(ids: &[u32]) -> Vec<Var> {
        ids.iter().map(|&id| Var::new(id)).collect()
    }

    #[test]
    fn test_sat_count() {
        let mgr = Mtbdd::new();
        let x1 = mgr.mk_var(1);
        let x3 = mgr.mk_var(3);
        let f = mgr.apply_or(x1, x3);

        assert_eq!(mgr.sat_count(f, &vars(&[1, 2, 3])), BigUint::from(6u32));
        assert_eq!(mgr.sat_count(f, &vars(&[1, 3])), BigUint::from(3u32));
        assert_eq!(mgr.sat_count(mgr.zero(), &vars(&[1, 2])), BigUint::ZERO);
        assert_eq!(mgr.sat_count(mgr.one(), &vars(&[1, 2])), BigUint::from(4u32));
    }

    #[test]
    fn test_sat_count_ignores_values() {
        let mgr = Mtbdd::new();
        let f = mgr.scale(mgr.mk_var(2), 0.125);
        assert_eq!(mgr.sat_count(f, &vars(&[1, 2])), BigUint::from(2u32));
    }

    #[test]
    fn test_one_sat() {
        let mgr = Mtbdd::new();
        let lits = [(Var::new(1), true), (Var::new(2), false), (Var::new(3), false)];
        let f = mgr.cube(&lits);
        let model = mgr.one_sat(f);
        assert_eq!(model, Some(lits.to_vec()));

        let g = mgr.apply_and(f, mgr.apply_not(mgr.cube(&model.unwrap())));
        assert_eq!(mgr.one_sat(g), None);
    }
}
