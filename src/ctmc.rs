//! Continuous-time Markov chains in decision-diagram form.
//!
//! A [`Ctmc`] bundles the rate matrix (an MTBDD over interleaved row and column
//! variables), its reachable state set, the initial state and the ODD that
//! enumerates the reachable states. States are encoded in binary over the row
//! variables, most significant bit first.

use std::collections::BTreeMap;

use log::debug;

use crate::error::CheckError;
use crate::mtbdd::Mtbdd;
use crate::odd::Odd;
use crate::reference::AddId;
use crate::types::Var;

#[derive(Debug)]
pub struct Ctmc<'m> {
    mgr: &'m Mtbdd,
    rates: AddId,
    reach: AddId,
    initial: AddId,
    row_vars: Vec<Var>,
    col_vars: Vec<Var>,
    odd: Odd,
}

impl<'m> Ctmc<'m> {
    /// Create a chain from its rate matrix and initial state set, computing the
    /// reachable states by a symbolic fixpoint.
    pub fn new(
        mgr: &'m Mtbdd,
        rates: AddId,
        initial: AddId,
        row_vars: Vec<Var>,
        col_vars: Vec<Var>,
    ) -> Result<Self, CheckError> {
        check_vars(&row_vars, &col_vars)?;

        let transitions = mgr.pattern(rates);
        let mut reach = mgr.pattern(initial);
        let mut iterations = 0;
        loop {
            iterations += 1;
            let image = mgr.exist_abstract(mgr.apply_and(reach, transitions), &row_vars);
            let image = mgr.swap_variables(image, &row_vars, &col_vars);
            let next = mgr.apply_or(reach, image);
            if next == reach {
                break;
            }
            reach = next;
        }
        debug!("Reachability converged after {} iterations", iterations);

        Self::with_reachable(mgr, rates, reach, initial, row_vars, col_vars)
    }

    /// Create a chain whose reachable state set is already known.
    ///
    /// The rate matrix is restricted to `reach` on both rows and columns.
    pub fn with_reachable(
        mgr: &'m Mtbdd,
        rates: AddId,
        reach: AddId,
        initial: AddId,
        row_vars: Vec<Var>,
        col_vars: Vec<Var>,
    ) -> Result<Self, CheckError> {
        check_vars(&row_vars, &col_vars)?;

        let reach = mgr.pattern(reach);
        let initial = mgr.apply_and(initial, reach);
        if initial.is_zero() {
            return Err(CheckError::invalid("number of reachable initial states", 0.0));
        }

        let reach_cols = mgr.swap_variables(reach, &row_vars, &col_vars);
        let rates = mgr.apply_times(mgr.apply_times(rates, reach), reach_cols);
        let odd = Odd::new(mgr, reach, &row_vars)?;
        debug!(
            "Created CTMC with {} reachable states, rate matrix of {} nodes",
            odd.num_states(),
            mgr.size(rates)
        );

        Ok(Self {
            mgr,
            rates,
            reach,
            initial,
            row_vars,
            col_vars,
            odd,
        })
    }

    pub fn manager(&self) -> &'m Mtbdd {
        self.mgr
    }

    pub fn rates(&self) -> AddId {
        self.rates
    }

    pub fn reachable(&self) -> AddId {
        self.reach
    }

    pub fn initial(&self) -> AddId {
        self.initial
    }

    pub fn row_vars(&self) -> &[Var] {
        &self.row_vars
    }

    pub fn col_vars(&self) -> &[Var] {
        &self.col_vars
    }

    pub fn odd(&self) -> &Odd {
        &self.odd
    }

    pub fn num_states(&self) -> usize {
        self.odd.num_states()
    }

    /// Bits of `state`, most significant first, or `None` if it needs more
    /// bits than there are row variables.
    fn encode(&self, state: usize) -> Option<Vec<bool>> {
        let n = self.row_vars.len();
        if n < usize::BITS as usize && state >> n != 0 {
            return None;
        }
        Some((0..n).map(|l| (state >> (n - 1 - l)) & 1 == 1).collect())
    }

    /// The 0/1 diagram of the given state numbers, restricted to reachable
    /// states. Numbers that cannot be encoded are skipped.
    pub fn state_set(&self, states: &[usize]) -> AddId {
        let mut result = self.mgr.zero();
        for bits in states.iter().filter_map(|&state| self.encode(state)) {
            let literals: Vec<(Var, bool)> = self.row_vars.iter().copied().zip(bits).collect();
            result = self.mgr.apply_or(result, self.mgr.cube(&literals));
        }
        self.mgr.apply_and(result, self.reach)
    }

    /// Dense index of state number `state`, if it is encodable and reachable.
    pub fn state_index(&self, state: usize) -> Option<usize> {
        self.odd.index_of(&self.encode(state)?)
    }

    /// Dense index of the initial state. With several initial states, the
    /// first one found in the diagram is used.
    pub fn initial_index(&self) -> Option<usize> {
        let path = self.mgr.one_sat(self.initial)?;
        let bits: Vec<bool> = self
            .row_vars
            .iter()
            .map(|v| path.iter().any(|&(var, value)| var == *v && value))
            .collect();
        self.odd.index_of(&bits)
    }
}

/// Row and column variables must pair up and interleave in the manager order.
fn check_vars(row_vars: &[Var], col_vars: &[Var]) -> Result<(), CheckError> {
    if row_vars.len() != col_vars.len() {
        return Err(CheckError::VariableMismatch {
            rows: row_vars.len(),
            columns: col_vars.len(),
            levels: row_vars.len(),
        });
    }
    let mut previous = None;
    for (&row, &col) in row_vars.iter().zip(col_vars) {
        if previous.is_some_and(|p| p >= row) || row >= col {
            return Err(CheckError::invalid("variable order at", row.id()));
        }
        previous = Some(col);
    }
    Ok(())
}

/// Builds a [`Ctmc`] from explicitly numbered states and transition rates.
///
/// State `s` is encoded in binary over `max(1, ceil(log2 n))` bits; bit `l`
/// (counting from the most significant) is row variable `x(2l+1)` and column
/// variable `x(2l+2)`.
#[derive(Debug)]
pub struct CtmcBuilder<'m> {
    mgr: &'m Mtbdd,
    num_states: usize,
    transitions: Vec<(usize, usize, f64)>,
}

impl<'m> CtmcBuilder<'m> {
    pub fn new(mgr: &'m Mtbdd, num_states: usize) -> Self {
        Self {
            mgr,
            num_states,
            transitions: Vec::new(),
        }
    }

    /// Add a transition. Rates of repeated transitions are summed.
    pub fn add_transition(&mut self, from: usize, to: usize, rate: f64) -> &mut Self {
        self.transitions.push((from, to, rate));
        self
    }

    pub fn num_bits(&self) -> usize {
        let n = self.num_states.max(2) - 1;
        (usize::BITS - n.leading_zeros()) as usize
    }

    pub fn build(&self, initial: usize) -> Result<Ctmc<'m>, CheckError> {
        if self.num_states == 0 {
            return Err(CheckError::invalid("number of states", 0.0));
        }
        if initial >= self.num_states {
            return Err(CheckError::invalid("initial state", initial as f64));
        }

        let bits = self.num_bits();
        let row_vars: Vec<Var> = (0..bits).map(|l| Var::new(2 * l as u32 + 1)).collect();
        let col_vars: Vec<Var> = (0..bits).map(|l| Var::new(2 * l as u32 + 2)).collect();
        let literals = |vars: &[Var], state: usize| -> Vec<(Var, bool)> {
            vars.iter()
                .enumerate()
                .map(|(l, &v)| (v, (state >> (bits - 1 - l)) & 1 == 1))
                .collect()
        };

        let mut merged = BTreeMap::new();
        for &(from, to, rate) in &self.transitions {
            if from >= self.num_states {
                return Err(CheckError::invalid("source state", from as f64));
            }
            if to >= self.num_states {
                return Err(CheckError::invalid("target state", to as f64));
            }
            if !rate.is_finite() || rate < 0.0 {
                return Err(CheckError::invalid("rate", rate));
            }
            *merged.entry((from, to)).or_insert(0.0) += rate;
        }

        let mgr = self.mgr;
        let mut rates = mgr.zero();
        for ((from, to), rate) in merged {
            let mut cube = literals(&row_vars, from);
            cube.extend(literals(&col_vars, to));
            rates = mgr.apply_plus(rates, mgr.scale(mgr.cube(&cube), rate));
        }
        let initial = mgr.cube(&literals(&row_vars, initial));
        debug!(
            "Encoded {} states, {} transitions over {} bits",
            self.num_states,
            self.transitions.len(),
            bits
        );

        Ctmc::new(mgr, rates, initial, row_vars, col_vars)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_num_bits() {
        let mgr = Mtbdd::new();
        assert_eq!(CtmcBuilder::new(&mgr, 1).num_bits(), 1);
        assert_eq!(CtmcBuilder::new(&mgr, 2).num_bits(), 1);
        assert_eq!(CtmcBuilder::new(&mgr, 3).num_bits(), 2);
        assert_eq!(CtmcBuilder::new(&mgr, 4).num_bits(), 2);
        assert_eq!(CtmcBuilder::new(&mgr, 5).num_bits(), 3);
    }

    #[test]
    fn test_reachability() {
        let mgr = Mtbdd::new();
        // 0 -> 1 -> 2, state 3 unreachable, state 4 only reaches 0
        let ctmc = CtmcBuilder::new(&mgr, 5)
            .add_transition(0, 1, 1.0)
            .add_transition(1, 2, 2.0)
            .add_transition(4, 0, 1.0)
            .build(0)
            .unwrap();

        assert_eq!(ctmc.num_states(), 3);
        assert_eq!(ctmc.state_index(0), Some(0));
        assert_eq!(ctmc.state_index(2), Some(2));
        assert_eq!(ctmc.state_index(3), None);
        assert_eq!(ctmc.state_index(4), None);
        assert_eq!(ctmc.initial_index(), Some(0));
        assert_eq!(ctmc.state_set(&[3, 4]), mgr.zero());
    }

    #[test]
    fn test_unencodable_states() {
        let mgr = Mtbdd::new();
        let ctmc = CtmcBuilder::new(&mgr, 3)
            .add_transition(0, 1, 1.0)
            .add_transition(1, 2, 1.0)
            .build(0)
            .unwrap();

        // Two bits cover state numbers 0..4.
        assert_eq!(ctmc.row_vars().len(), 2);
        assert_eq!(ctmc.state_index(4), None);
        assert_eq!(ctmc.state_index(usize::MAX), None);
        assert_eq!(ctmc.state_set(&[2, 4, usize::MAX]), ctmc.state_set(&[2]));
        assert_eq!(ctmc.state_set(&[7]), mgr.zero());
    }

    #[test]
    fn test_rates_restricted() {
        let mgr = Mtbdd::new();
        let ctmc = CtmcBuilder::new(&mgr, 4)
            .add_transition(1, 0, 3.0)
            .add_transition(1, 0, 0.5)
            .add_transition(3, 1, 1.0)
            .build(1)
            .unwrap();

        // 3 -> 1 is not reachable from 1, so it is dropped
        let row_sums = mgr.sum_abstract(ctmc.rates(), ctmc.col_vars());
        let sums = ctmc.odd().to_vector(&mgr, row_sums);
        assert_eq!(sums, vec![0.0, 3.5]);
        assert_eq!(ctmc.initial_index(), Some(1));
    }

    #[test]
    fn test_invalid_input() {
        let mgr = Mtbdd::new();
        assert!(matches!(
            CtmcBuilder::new(&mgr, 2).add_transition(0, 2, 1.0).build(0),
            Err(CheckError::InvalidParameter { what: "target state", .. })
        ));
        assert!(matches!(
            CtmcBuilder::new(&mgr, 2).add_transition(0, 1, -1.0).build(0),
            Err(CheckError::InvalidParameter { what: "rate", .. })
        ));
        assert!(matches!(
            CtmcBuilder::new(&mgr, 2).build(2),
            Err(CheckError::InvalidParameter { .. })
        ));

        let vars = vec![Var::new(1)];
        assert!(matches!(
            Ctmc::new(&mgr, mgr.zero(), mgr.one(), vars, vec![]),
            Err(CheckError::VariableMismatch { rows: 1, columns: 0, .. })
        ));
    }
}
