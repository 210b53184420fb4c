//! # ctmc-rs: transient analysis of CTMCs with hybrid decision diagrams
//!
//! **`ctmc-rs`** checks time-bounded reachability ("bounded Until") properties of
//! continuous-time Markov chains (CTMCs) whose rate matrices are stored as
//! multi-terminal binary decision diagrams (MTBDDs).
//!
//! ## How it works
//!
//! Symbolic storage keeps huge but regular models small; explicit sparse storage
//! is fast to multiply. The *hybrid* matrix combines both: the upper levels of
//! the MTBDD stay symbolic, while the deepest levels are flattened into
//! compressed-sparse-row blocks, as far as a memory budget allows. Offsets into
//! dense probability vectors come from an ODD (offset-labelled decision diagram)
//! that enumerates the reachable states.
//!
//! Transient probabilities are computed by uniformization: a Poisson-weighted
//! sum of matrix powers, truncated with the Fox–Glynn algorithm. When only a
//! threshold verdict is needed, the iteration stops as soon as the remaining
//! Poisson mass cannot change it.
//!
//! ## Basic Usage
//!
//! ```rust
//! use ctmc_rs::ctmc::CtmcBuilder;
//! use ctmc_rs::mtbdd::Mtbdd;
//! use ctmc_rs::transient::{BoundedUntil, Threshold, TimeBound, TransientOptions, UntilResult};
//!
//! // 1. Initialize the manager
//! let mgr = Mtbdd::default();
//!
//! // 2. Describe the chain: state 0 moves to the absorbing state 1 at rate 1
//! let ctmc = CtmcBuilder::new(&mgr, 2).add_transition(0, 1, 1.0).build(0)?;
//!
//! // 3. P>=0.5 [ true U[0,5] "state 1" ]
//! let formula = BoundedUntil {
//!     phi: mgr.one(),
//!     psi: ctmc.state_set(&[1]),
//!     bound: TimeBound::upto(5.0),
//!     threshold: Threshold::at_least(0.5),
//! };
//!
//! // 4. Check it for the initial state
//! let options = TransientOptions {
//!     top_level: true,
//!     ..TransientOptions::default()
//! };
//! assert_eq!(ctmc.check_bounded_until(&formula, &options)?, UntilResult::Decision(true));
//! # Ok::<(), ctmc_rs::error::CheckError>(())
//! ```
//!
//! ## Core Components
//!
//! - **[`mtbdd`]**: The MTBDD manager and its operations.
//! - **[`odd`]**: State enumeration.
//! - **[`ctmc`]**: Chains in decision-diagram form, reachability and an explicit builder.
//! - **[`hybrid`]**: Hybrid matrix construction, sparsification, diagonal and multiplication.
//! - **[`foxglynn`]**: Truncated Poisson weights.
//! - **[`transient`]**: The bounded Until procedure.

pub mod cache;
pub mod ctmc;
pub mod error;
pub mod foxglynn;
pub mod hybrid;
pub mod mtbdd;
pub mod node;
pub mod odd;
pub mod reference;
pub mod sat;
pub mod subtable;
pub mod transient;
pub mod types;
