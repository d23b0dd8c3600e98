//! Component detection.
//!
//! Builds the variable incidence graph of an instance and splits it into
//! connected components, sorted by increasing complexity.
//!
//! # References
//!
//! - Gamrath, G. (2010). "Generic Branch-Cut-and-Price", Diploma thesis, TU Berlin
//! - Achterberg, T. (2007). "Constraint Integer Programming", PhD thesis, TU Berlin

mod components;
mod graph;

pub use components::{Block, ComponentDetector, Detection};
pub use graph::{IncidenceGraph, IncidenceGraphBuilder};
