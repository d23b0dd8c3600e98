//! MIP instance model.
//!
//! The decomposition talks to the underlying solver only through the
//! [`MipInstance`] trait. [`LinearMip`] is a small pure-integer implementation
//! used for testing and benchmarking the decomposition.

mod instance;
mod linear;
mod types;

pub use instance::MipInstance;
pub use linear::{LinearConstraint, LinearMip};
pub use types::{Bounds, ConsId, Solution, SolveLimits, SolveStatus, VarId, VarMap, VarType};
