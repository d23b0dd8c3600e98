//! Result and state enums of the decomposition.

/// Result reported to the parent search, in propagation-callback convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropResult {
    /// The decomposition did not run at all.
    DidNotRun,
    /// It ran but achieved nothing.
    DidNotFind,
    /// Progress was made; calling again may help.
    Success,
    /// The current node is solved or proven infeasible.
    Cutoff,
    /// A component was proven unbounded.
    Unbounded,
    /// Components remain; call again before advancing the node.
    Delay,
}

/// Life-cycle state of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComponentState {
    /// Still queued for further solving.
    #[default]
    Pending,
    /// Solved to optimality and merged into the parent.
    Optimal,
    /// Proven infeasible.
    Infeasible,
    /// Proven unbounded (or infeasible-or-unbounded).
    Unbounded,
    /// Solved, but its solution could not be merged into the parent.
    Stalled,
}

impl ComponentState {
    /// Whether the component will not be solved again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ComponentState::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ComponentState::Pending.is_terminal());
        assert!(ComponentState::Optimal.is_terminal());
        assert!(ComponentState::Stalled.is_terminal());
        assert_eq!(ComponentState::default(), ComponentState::Pending);
    }
}
