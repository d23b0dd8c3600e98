//! The capability interface to the underlying MIP solver.

use super::types::{Bounds, ConsId, Solution, SolveLimits, SolveStatus, VarId, VarMap, VarType};
use crate::error::DecompResult;
use crate::num::Tolerances;

/// A MIP instance as seen by the decomposition.
///
/// The same trait describes the parent search and every sub-instance cloned
/// from it: the decomposition never looks inside the branch-and-bound
/// machinery, it only creates instances, copies entities, sets limits,
/// solves, and reads results back.
///
/// Variables and constraints are addressed by ids local to each instance.
/// [`variables`](MipInstance::variables) lists only active (not aggregated)
/// variables; [`constraint_variables`](MipInstance::constraint_variables)
/// reports a constraint in terms of those active variables.
///
/// # Minimization
///
/// All objectives are minimized. Dual bounds are lower bounds, primal
/// bounds are objective values of feasible solutions.
pub trait MipInstance: Sized {
    // ---- structure ----

    /// Name of the instance.
    fn name(&self) -> &str;

    /// Size of the variable id space (one past the largest id).
    fn var_capacity(&self) -> usize;

    /// Active variables in id order.
    fn variables(&self) -> Vec<VarId>;

    fn var_type(&self, var: VarId) -> VarType;

    fn objective(&self, var: VarId) -> f64;

    /// Bounds valid at the current node.
    fn local_bounds(&self, var: VarId) -> Bounds;

    /// Bounds valid in the whole search.
    fn global_bounds(&self, var: VarId) -> Bounds;

    /// Constraints that are checked for feasibility, in id order.
    fn checked_constraints(&self) -> Vec<ConsId>;

    /// Active variables of a constraint, aggregated variables replaced by
    /// their active representatives. `None` if the constraint cannot say.
    fn constraint_variables(&self, cons: ConsId) -> Option<Vec<VarId>>;

    /// Numeric tolerances of this instance.
    fn tolerances(&self) -> Tolerances {
        Tolerances::default()
    }

    // ---- copying ----

    /// Creates an empty instance with this instance's plugins and settings.
    ///
    /// Fails with [`CopyFailed`](crate::DecompError::CopyFailed) if the
    /// plugins cannot be copied.
    fn create_sub_instance(&self, name: &str) -> DecompResult<Self>;

    /// Clones `var` into `target`, recording the rename in `map`.
    ///
    /// Cloning a variable that is already in `map` returns the existing clone.
    fn clone_variable(&self, var: VarId, target: &mut Self, map: &mut VarMap)
        -> DecompResult<VarId>;

    /// Clones `cons` into `target`, cloning any variable not yet in `map`.
    fn clone_constraint(
        &self,
        cons: ConsId,
        target: &mut Self,
        map: &mut VarMap,
    ) -> DecompResult<ConsId>;

    // ---- solving ----

    fn set_limits(&mut self, limits: &SolveLimits);

    /// Solves (or continues solving) until a limit is hit or the instance is
    /// decided.
    fn solve(&mut self) -> SolveStatus;

    /// Status of the last solve call.
    fn status(&self) -> SolveStatus;

    fn dual_bound(&self) -> f64;

    fn primal_bound(&self) -> f64;

    /// Relative gap between primal and dual bound.
    fn gap(&self) -> f64 {
        crate::num::relative_gap(&self.tolerances(), self.primal_bound(), self.dual_bound())
    }

    /// Nodes processed over all solve calls.
    fn node_count(&self) -> u64;

    /// Solving time over all solve calls, in seconds.
    fn solving_time(&self) -> f64;

    // ---- solutions ----

    fn best_solution(&self) -> Option<&Solution>;

    fn solution_count(&self) -> usize;

    /// Objective value of `solution` in this instance.
    fn solution_objective(&self, solution: &Solution) -> f64;

    /// Checks bounds, integrality and all checked constraints.
    fn check_solution(&self, solution: &Solution) -> bool;

    /// Stores a solution; returns whether it was accepted.
    fn add_solution(&mut self, solution: Solution) -> bool;

    // ---- modifications ----

    /// Fixes `var` to `value` (lower and upper bound).
    fn fix_variable(&mut self, var: VarId, value: f64) -> DecompResult<()>;

    fn delete_constraint(&mut self, cons: ConsId) -> DecompResult<()>;

    /// Raises the local lower bound; returns whether anything changed.
    fn tighten_lower_bound(&mut self, var: VarId, value: f64) -> DecompResult<bool>;

    /// Lowers the local upper bound; returns whether anything changed.
    fn tighten_upper_bound(&mut self, var: VarId, value: f64) -> DecompResult<bool>;

    /// Raises the lower bound of the current node.
    fn update_local_lower_bound(&mut self, bound: f64);

    // ---- search context ----

    /// Time limit in seconds of solving time (infinite if unset).
    fn time_limit(&self) -> f64 {
        f64::INFINITY
    }

    /// Memory limit in megabytes (infinite if unset).
    fn memory_limit(&self) -> f64 {
        f64::INFINITY
    }

    /// Memory in use, in megabytes, including external estimates.
    fn memory_used(&self) -> f64 {
        0.0
    }

    fn node_limit(&self) -> u64 {
        u64::MAX
    }

    /// Depth of the current node (0 at the root).
    fn depth(&self) -> usize {
        0
    }

    /// Number of the current node.
    fn node_number(&self) -> u64 {
        1
    }

    /// Whether the search has been asked to stop.
    fn is_stopped(&self) -> bool {
        false
    }
}
