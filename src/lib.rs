//! Connected-component decomposition for branch-and-bound MIP solvers.
//!
//! When the variables and constraints of a mixed-integer program fall apart
//! into independent pieces, each piece can be solved on its own and the
//! results combined. This crate provides:
//!
//! - **Detection**: Builds the variable incidence graph of an instance and
//!   splits it into connected components ordered by complexity.
//! - **Decomposition**: Clones every component into its own sub-instance and
//!   schedules bounded solve calls on them by priority, growing each
//!   component's budget across calls.
//! - **Aggregation**: Fixes optimal components in the parent, sums component
//!   dual bounds into a node lower bound, and assembles full solutions.
//! - **Presolving**: Solves small components outright before the search.
//! - **Model**: The [`model::MipInstance`] capability trait the decomposition
//!   drives, plus a small reference implementation for tests and benches.
//!
//! # Architecture
//!
//! The crate never looks inside the branch-and-bound machinery. The parent
//! search and every sub-instance are seen through the same trait, and the
//! parent calls [`decomp::ComponentsPropagator`] from its propagation and
//! presolving hooks.

pub mod decomp;
pub mod detect;
mod error;
pub mod model;
pub mod num;

pub use error::{DecompError, DecompResult};
