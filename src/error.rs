//! Error types for component decomposition.

use thiserror::Error;

/// Errors raised while decomposing or scheduling components.
///
/// Most variants are recovered inside the crate and only surface as a
/// [`PropResult`](crate::decomp::PropResult); see the variant docs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecompError {
    /// Configuration validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Cloning a variable, constraint or plugin set into a sub-instance failed.
    ///
    /// The whole decomposition attempt for the current node is discarded.
    #[error("Copy failed: {0}")]
    CopyFailed(String),

    /// No time or memory left for a sub-solve; the tick becomes a no-op.
    #[error("Resource budget exhausted")]
    ResourceExhausted,

    /// A component was proven infeasible.
    #[error("Component {component} is infeasible")]
    Infeasible {
        /// Number of the infeasible component.
        component: usize,
    },

    /// A component was proven unbounded.
    #[error("Component {component} is unbounded")]
    Unbounded {
        /// Number of the unbounded component.
        component: usize,
    },

    /// A clamped optimal sub-solution failed re-validation.
    #[error("Component {component}: clamped solution failed re-validation ({reason})")]
    ToleranceViolation {
        /// Number of the affected component.
        component: usize,
        /// What the re-validation rejected.
        reason: String,
    },

    /// An instance rejected a modification (fixing, deletion, bound change).
    #[error("Instance operation failed: {0}")]
    Instance(String),
}

/// Result type for decomposition operations.
pub type DecompResult<T> = Result<T, DecompError>;
