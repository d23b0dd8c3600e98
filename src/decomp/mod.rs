//! Component decomposition and incremental component scheduling.
//!
//! A MIP whose constraint/variable incidence graph falls apart into
//! independent pieces is solved piece by piece: every piece becomes a
//! [`Component`] with its own sub-instance, and a priority queue hands out
//! one bounded solve call ("tick") at a time, growing each component's node
//! budget across calls. Results flow back into the parent: optimal
//! components are fixed and their constraints deleted, dual bounds add up to
//! a node lower bound, and once every component has a feasible solution the
//! assembled solution is offered to the parent.
//!
//! # Key Types
//!
//! - [`ComponentsPropagator`]: Entry point for the parent's propagation and
//!   presolving callbacks
//! - [`Problem`]: The decomposition of one node, with its queue and aggregates
//! - [`Component`]: Per-partition solving state
//! - [`DecompConfig`]: Detection thresholds and budgets
//! - [`PropResult`]: Result in propagation-callback convention
//!
//! # References
//!
//! - Gamrath, Koch, Martin, Miltenberger, Weninger (2015), "Progress in
//!   presolving for mixed integer programming", *Mathematical Programming
//!   Computation* 7(4)
//! - Achterberg (2007), *Constraint Integer Programming*, PhD thesis, TU Berlin

mod aggregate;
mod component;
mod config;
mod factory;
mod presolve;
mod problem;
mod propagator;
mod scheduler;
mod types;

pub use component::Component;
pub use config::DecompConfig;
pub use factory::ComponentFactory;
pub use presolve::{presolve_components, PresolveStats};
pub use problem::Problem;
pub use propagator::ComponentsPropagator;
pub use scheduler::ComponentQueue;
pub use types::{ComponentState, PropResult};
