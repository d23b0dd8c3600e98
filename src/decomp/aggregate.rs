//! Folding sub-solve outcomes back into the problem and the parent.

use super::component::Component;
use super::problem::Problem;
use super::types::ComponentState;
use crate::error::{DecompError, DecompResult};
use crate::model::{ConsId, MipInstance, Solution, SolveStatus, VarId};
use crate::num::Tolerances;

impl<M: MipInstance> Problem<M> {
    /// Aggregates the outcome of one solve call of component `number`.
    ///
    /// # Errors
    ///
    /// - [`DecompError::Infeasible`] / [`DecompError::Unbounded`] when the
    ///   component was proven so, or when the bounds it derived contradict
    ///   the parent's; it is released first
    /// - [`DecompError::ToleranceViolation`] when an optimal solution could
    ///   not be merged; the component is stalled
    /// - [`DecompError::Instance`] when the parent rejects a modification
    pub(crate) fn evaluate(
        &mut self,
        number: usize,
        status: SolveStatus,
        parent: &mut M,
    ) -> DecompResult<()> {
        match status {
            SolveStatus::Infeasible => {
                self.components[number].release(ComponentState::Infeasible);
                Err(DecompError::Infeasible { component: number })
            }
            SolveStatus::Unbounded | SolveStatus::InfeasibleOrUnbounded => {
                self.components[number].release(ComponentState::Unbounded);
                Err(DecompError::Unbounded { component: number })
            }
            _ => {
                self.update_dual_bound(number, parent)?;
                self.update_primal(number, parent)?;

                if status == SolveStatus::Optimal {
                    return self.merge(number, parent);
                }

                let component = &self.components[number];
                let sub = component.sub_ref()?;
                if sub.solution_count() > 0 {
                    return Ok(());
                }
                let tightened =
                    tighten_parent_bounds(parent, number, &component.vars, &component.subvars, sub);
                match tightened {
                    Ok(n) => {
                        if n > 0 {
                            log::debug!(
                                "component <{}>: tightened {n} parent bounds",
                                self.components[number].name
                            );
                        }
                        Ok(())
                    }
                    Err(e @ DecompError::Infeasible { .. }) => {
                        self.components[number].release(ComponentState::Infeasible);
                        Err(e)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Raises the component's dual bound and, once every component has a
    /// finite one, the node's lower bound.
    fn update_dual_bound(&mut self, number: usize, parent: &mut M) -> DecompResult<()> {
        let tol = self.tol;
        let component = &mut self.components[number];
        let sub_dual = component.sub_ref()?.dual_bound();
        if sub_dual.is_nan() || tol.is_neg_infinity(sub_dual) {
            return Ok(());
        }
        let new = sub_dual - component.collateral_obj_sum;

        if tol.is_neg_infinity(component.last_dual_bound) {
            self.n_inf_dual -= 1;
            self.lower_bound += new;
            component.last_dual_bound = new;
        } else if new > component.last_dual_bound {
            self.lower_bound += new - component.last_dual_bound;
            component.last_dual_bound = new;
        }

        if self.n_inf_dual == 0 {
            parent.update_local_lower_bound(self.lower_bound);
        }
        Ok(())
    }

    /// Copies a new best sub-solution into the assembled solution and offers
    /// that to the parent once every component has one.
    fn update_primal(&mut self, number: usize, parent: &mut M) -> DecompResult<()> {
        let component = &mut self.components[number];
        let sub = component.sub.as_ref().ok_or_else(|| {
            DecompError::Instance(format!("component <{}> has no sub-instance", component.name))
        })?;
        let Some(best) = sub.best_solution() else {
            return Ok(());
        };
        if best.id().is_some() && best.id() == component.last_sol_seen {
            return Ok(());
        }

        for (&var, &subvar) in component.vars.iter().zip(&component.subvars) {
            self.best_solution.set_value(var, best.value(subvar));
        }
        if self.tol.is_infinity(component.last_primal_bound) {
            self.n_feasible_components += 1;
        }
        component.last_sol_seen = best.id();
        component.last_primal_bound = component
            .last_primal_bound
            .min(sub.primal_bound() - component.collateral_obj_sum);

        if self.n_feasible_components == self.components.len() {
            self.offer_best_solution(parent);
        }
        Ok(())
    }

    fn offer_best_solution(&self, parent: &mut M) {
        if parent.check_solution(&self.best_solution) {
            let obj = parent.solution_objective(&self.best_solution);
            let accepted = parent.add_solution(self.best_solution.detached());
            log::debug!(
                "problem <{}>: assembled solution with objective {obj} (accepted: {accepted})",
                self.name
            );
        } else {
            log::warn!(
                "problem <{}>: assembled solution is infeasible in the parent",
                self.name
            );
        }
    }

    /// Fixes the parent variables of an optimal component to its solution
    /// and deletes the component's constraints.
    ///
    /// Merging a terminal component does nothing.
    pub(crate) fn merge(&mut self, number: usize, parent: &mut M) -> DecompResult<()> {
        let tol = self.tol;
        let component = &mut self.components[number];
        if component.is_solved() {
            return Ok(());
        }

        let values = match merge_values(component, parent, &tol) {
            Ok(values) => values,
            Err(e) => {
                component.release(ComponentState::Stalled);
                return Err(e);
            }
        };

        fix_and_delete(parent, &component.vars, &values, &component.conss)?;
        for (&var, &value) in component.vars.iter().zip(&values) {
            self.best_solution.set_value(var, value);
        }

        log::debug!(
            "component <{}>: merged optimal solution, fixed {} vars, deleted {} conss",
            component.name,
            values.len(),
            component.conss.len()
        );
        component.release(ComponentState::Optimal);
        self.n_solved_components += 1;
        Ok(())
    }
}

/// Values of the component's optimal solution, clamped into the parent's
/// local bounds and re-validated if clamping changed anything.
fn merge_values<M: MipInstance>(
    component: &Component<M>,
    parent: &M,
    tol: &Tolerances,
) -> DecompResult<Vec<f64>> {
    let sub = component.sub_ref()?;
    let best = sub.best_solution().ok_or_else(|| {
        DecompError::Instance(format!(
            "component <{}> is optimal without a solution",
            component.name
        ))
    })?;
    let (values, clamped) = clamp_to_parent(parent, &component.vars, &component.subvars, best, tol);
    if clamped {
        validate_clamped(sub, &component.subvars, &values, best, tol).map_err(|reason| {
            DecompError::ToleranceViolation {
                component: component.number,
                reason,
            }
        })?;
    }
    Ok(values)
}

/// Reads `subvars` from `solution`, clamping each into the local bounds of
/// the matching parent variable.
///
/// The flag is set if any value lay outside its bounds by more than epsilon.
pub(crate) fn clamp_to_parent<M: MipInstance>(
    parent: &M,
    vars: &[VarId],
    subvars: &[VarId],
    solution: &Solution,
    tol: &Tolerances,
) -> (Vec<f64>, bool) {
    let mut clamped = false;
    let values = vars
        .iter()
        .zip(subvars)
        .map(|(&var, &subvar)| {
            let value = solution.value(subvar);
            let bounds = parent.local_bounds(var);
            if value < bounds.lower {
                clamped |= tol.approx_lt(value, bounds.lower);
                bounds.lower
            } else if value > bounds.upper {
                clamped |= tol.approx_gt(value, bounds.upper);
                bounds.upper
            } else {
                value
            }
        })
        .collect();
    (values, clamped)
}

/// Checks a clamped solution against the sub-instance and its objective
/// against the sub-instance's primal bound.
pub(crate) fn validate_clamped<M: MipInstance>(
    sub: &M,
    subvars: &[VarId],
    values: &[f64],
    original: &Solution,
    tol: &Tolerances,
) -> Result<(), String> {
    let mut corrected = original.detached();
    for (&subvar, &value) in subvars.iter().zip(values) {
        corrected.set_value(subvar, value);
    }
    if !sub.check_solution(&corrected) {
        return Err("solution infeasible after clamping".into());
    }
    let obj = sub.solution_objective(&corrected);
    let primal = sub.primal_bound();
    if !tol.feas_eq(obj, primal) {
        return Err(format!("objective {obj} differs from optimum {primal}"));
    }
    Ok(())
}

/// Fixes `vars` to `values` in the parent and deletes `conss`.
pub(crate) fn fix_and_delete<M: MipInstance>(
    parent: &mut M,
    vars: &[VarId],
    values: &[f64],
    conss: &[ConsId],
) -> DecompResult<()> {
    for (&var, &value) in vars.iter().zip(values) {
        parent.fix_variable(var, value)?;
    }
    for &cons in conss {
        parent.delete_constraint(cons)?;
    }
    Ok(())
}

/// Tightens the parent's local bounds of `vars` to the global bounds the
/// sub-instance derived for `subvars`; returns the number of changes.
///
/// If any derived bound contradicts the parent's local bounds, nothing is
/// changed and [`DecompError::Infeasible`] is returned for `component`.
pub(crate) fn tighten_parent_bounds<M: MipInstance>(
    parent: &mut M,
    component: usize,
    vars: &[VarId],
    subvars: &[VarId],
    sub: &M,
) -> DecompResult<usize> {
    let tol = sub.tolerances();
    let contradicts = vars.iter().zip(subvars).any(|(&var, &subvar)| {
        let derived = sub.global_bounds(subvar);
        let local = parent.local_bounds(var);
        tol.feas_gt(derived.lower, local.upper) || tol.feas_lt(derived.upper, local.lower)
    });
    if contradicts {
        return Err(DecompError::Infeasible { component });
    }

    let mut changed = 0;
    for (&var, &subvar) in vars.iter().zip(subvars) {
        let bounds = sub.global_bounds(subvar);
        if !tol.is_neg_infinity(bounds.lower) && parent.tighten_lower_bound(var, bounds.lower)? {
            changed += 1;
        }
        if !tol.is_infinity(bounds.upper) && parent.tighten_upper_bound(var, bounds.upper)? {
            changed += 1;
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomp::{DecompConfig, PropResult};
    use crate::model::{LinearConstraint, LinearMip, VarType};

    fn config() -> DecompConfig {
        DecompConfig::default()
            .with_min_absolute_component_size(2)
            .with_min_relative_component_size(0.0)
    }

    /// A: two binaries of cost 7 covering one row; B: one integer in [1, 2]
    /// and two binaries over a row that no single node decides.
    fn partial_progress() -> LinearMip {
        let mut mip = LinearMip::new("partial");
        let a1 = mip.add_var("a1", VarType::Binary, 0.0, 1.0, 7.0);
        let a2 = mip.add_var("a2", VarType::Binary, 0.0, 1.0, 7.0);
        let y1 = mip.add_var("y1", VarType::Integer, 1.0, 2.0, 3.0);
        let y2 = mip.add_var("y2", VarType::Binary, 0.0, 1.0, 1.0);
        let y3 = mip.add_var("y3", VarType::Binary, 0.0, 1.0, 1.0);
        mip.add_constraint(LinearConstraint::greater_equal("a", vec![(a1, 1.0), (a2, 1.0)], 1.0));
        mip.add_constraint(LinearConstraint::greater_equal(
            "b",
            vec![(y1, 1.0), (y2, 1.0), (y3, 1.0)],
            2.0,
        ));
        mip
    }

    #[test]
    fn test_lower_bound_without_solution() {
        let mut mip = partial_progress();
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();
        assert_eq!(problem.components()[0].vars().len(), 2);

        // A, then B, then A again
        for _ in 0..3 {
            assert_eq!(problem.solve_step(&mut mip).unwrap(), PropResult::Delay);
        }
        assert!((problem.components()[1].last_dual_bound() - 3.0).abs() < 1e-9);
        assert!((problem.components()[0].last_primal_bound() - 7.0).abs() < 1e-9);
        assert_eq!(problem.n_inf_dual(), 0);
        assert!((problem.lower_bound() - 10.0).abs() < 1e-9);
        assert!((mip.local_lower_bound() - 10.0).abs() < 1e-9);
        assert_eq!(problem.n_feasible_components(), 1);
        assert_eq!(mip.solution_count(), 0);

        let mut result = PropResult::Delay;
        while result == PropResult::Delay {
            result = problem.solve_step(&mut mip).unwrap();
        }
        assert_eq!(result, PropResult::Cutoff);
        assert!((mip.primal_bound() - 11.0).abs() < 1e-9);
        assert!((problem.lower_bound() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_to_parent() {
        let mut parent = LinearMip::new("p");
        let x = parent.add_var("x", VarType::Integer, 0.0, 5.0, 1.0);
        let y = parent.add_var("y", VarType::Integer, 0.0, 5.0, 1.0);
        parent.set_local_bounds(x, 1.0, 3.0);
        let tol = Tolerances::default();

        let sol = Solution::from_values(vec![2.0, 4.0]);
        let (values, clamped) = clamp_to_parent(&parent, &[x, y], &[x, y], &sol, &tol);
        assert_eq!(values, vec![2.0, 4.0]);
        assert!(!clamped);

        let sol = Solution::from_values(vec![3.0 + 1e-12, 4.0]);
        let (values, clamped) = clamp_to_parent(&parent, &[x, y], &[x, y], &sol, &tol);
        assert_eq!(values[0], 3.0);
        assert!(!clamped);

        let sol = Solution::from_values(vec![0.0, 4.0]);
        let (values, clamped) = clamp_to_parent(&parent, &[x, y], &[x, y], &sol, &tol);
        assert_eq!(values[0], 1.0);
        assert!(clamped);
    }

    fn forced_and_free() -> (LinearMip, Vec<VarId>) {
        let mut mip = LinearMip::new("forced");
        let x: Vec<VarId> = (0..4)
            .map(|i| mip.add_var(format!("x{i}"), VarType::Binary, 0.0, 1.0, 1.0))
            .collect();
        mip.add_constraint(LinearConstraint::greater_equal("f", vec![(x[0], 1.0), (x[1], 1.0)], 2.0));
        mip.add_constraint(LinearConstraint::greater_equal("g", vec![(x[2], 1.0), (x[3], 1.0)], 1.0));
        (mip, x)
    }

    #[test]
    fn test_merge_fixes_and_deletes() {
        let (mut mip, x) = forced_and_free();
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();
        let forced = problem
            .components()
            .iter()
            .position(|c| c.vars().contains(&x[0]))
            .unwrap();

        let status = problem.components[forced]
            .run(&crate::model::SolveLimits::default())
            .unwrap();
        assert_eq!(status, SolveStatus::Optimal);
        problem.evaluate(forced, status, &mut mip).unwrap();

        assert_eq!(problem.components()[forced].state(), ComponentState::Optimal);
        assert_eq!(problem.n_solved_components(), 1);
        assert_eq!(mip.local_bounds(x[0]).lower, 1.0);
        assert_eq!(mip.global_bounds(x[1]).lower, 1.0);
        assert_eq!(mip.constraint_count(), 1);
        assert_eq!(problem.best_solution().value(x[1]), 1.0);

        // already merged: nothing happens, nothing is deleted twice
        problem.merge(forced, &mut mip).unwrap();
        assert_eq!(problem.n_solved_components(), 1);
    }

    #[test]
    fn test_clamped_merge_failure_stalls() {
        let (mut mip, x) = forced_and_free();
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();
        // a later branching decision contradicts what the component must do
        mip.set_local_bounds(x[0], 0.0, 0.0);

        let mut result = PropResult::Delay;
        let mut ticks = 0;
        while result == PropResult::Delay {
            result = problem.solve_step(&mut mip).unwrap();
            ticks += 1;
            assert!(ticks < 100);
        }
        let forced = problem
            .components()
            .iter()
            .find(|c| c.vars().contains(&x[0]))
            .unwrap();
        assert_eq!(forced.state(), ComponentState::Stalled);
        assert!(forced.sub_instance().is_none());
        assert_eq!(result, PropResult::DidNotFind);
        assert_eq!(problem.n_solved_components(), 1);
        assert_eq!(mip.local_bounds(x[1]).upper, 1.0);
        assert_eq!(mip.local_bounds(x[1]).lower, 0.0);
    }

    #[test]
    fn test_interrupted_without_solution_tightens_parent() {
        let mut mip = LinearMip::new("tight");
        let y = mip.add_var("y", VarType::Integer, 0.0, 5.0, -1.0);
        let z = mip.add_var("z", VarType::Integer, 0.0, 5.0, -1.0);
        let p = mip.add_var("p", VarType::Integer, 0.0, 5.0, 1.0);
        let q = mip.add_var("q", VarType::Integer, 0.0, 5.0, 1.0);
        mip.add_constraint(LinearConstraint::less_equal("yz", vec![(y, 1.0), (z, 1.0)], 3.0));
        mip.add_constraint(LinearConstraint::greater_equal("pq", vec![(p, 1.0), (q, 1.0)], 1.0));
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();

        problem.solve_step(&mut mip).unwrap();
        problem.solve_step(&mut mip).unwrap();
        assert_eq!(mip.local_bounds(y).upper, 3.0);
        assert_eq!(mip.local_bounds(z).upper, 3.0);
        assert_eq!(mip.local_bounds(p).upper, 5.0);
    }

    #[test]
    fn test_bounds_contradicting_parent_cut_off() {
        let mut mip = LinearMip::new("clash");
        let y = mip.add_var("y", VarType::Integer, 0.0, 5.0, -1.0);
        let z = mip.add_var("z", VarType::Integer, 0.0, 5.0, -1.0);
        let p = mip.add_var("p", VarType::Integer, 0.0, 5.0, 1.0);
        let q = mip.add_var("q", VarType::Integer, 0.0, 5.0, 1.0);
        mip.add_constraint(LinearConstraint::less_equal("yz", vec![(y, 1.0), (z, 1.0)], 3.0));
        mip.add_constraint(LinearConstraint::greater_equal("pq", vec![(p, 1.0), (q, 1.0)], 1.0));
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();
        // branching at the same node after the decomposition was built
        mip.set_local_bounds(y, 4.0, 5.0);

        let mut result = PropResult::Delay;
        let mut ticks = 0;
        while result == PropResult::Delay {
            result = problem.solve_step(&mut mip).unwrap();
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(result, PropResult::Cutoff);
        let clashing = problem
            .components()
            .iter()
            .find(|c| c.vars().contains(&y))
            .unwrap();
        assert_eq!(clashing.state(), ComponentState::Infeasible);
        assert_eq!(mip.local_bounds(y), crate::model::Bounds::new(4.0, 5.0));
        assert_eq!(mip.local_bounds(z), crate::model::Bounds::new(0.0, 5.0));
    }

    #[test]
    fn test_tighten_parent_bounds_counts_changes() {
        let mut parent = LinearMip::new("p");
        let x = parent.add_var("x", VarType::Integer, 0.0, 10.0, 1.0);
        let mut sub = LinearMip::new("s");
        let sx = sub.add_var("x", VarType::Integer, 2.0, 10.0, 1.0);
        assert_eq!(tighten_parent_bounds(&mut parent, 0, &[x], &[sx], &sub).unwrap(), 1);
        assert_eq!(parent.local_bounds(x).lower, 2.0);
        assert_eq!(tighten_parent_bounds(&mut parent, 0, &[x], &[sx], &sub).unwrap(), 0);
    }

    #[test]
    fn test_tighten_parent_bounds_contradiction_changes_nothing() {
        let mut parent = LinearMip::new("p");
        let x = parent.add_var("x", VarType::Integer, 0.0, 10.0, 1.0);
        let y = parent.add_var("y", VarType::Integer, 0.0, 10.0, 1.0);
        parent.set_local_bounds(y, 5.0, 10.0);
        let mut sub = LinearMip::new("s");
        let sx = sub.add_var("x", VarType::Integer, 2.0, 10.0, 1.0);
        let sy = sub.add_var("y", VarType::Integer, 0.0, 3.0, 1.0);

        let result = tighten_parent_bounds(&mut parent, 4, &[x, y], &[sx, sy], &sub);
        assert!(matches!(result, Err(DecompError::Infeasible { component: 4 })));
        assert_eq!(parent.local_bounds(x), crate::model::Bounds::new(0.0, 10.0));
        assert_eq!(parent.local_bounds(y), crate::model::Bounds::new(5.0, 10.0));
    }
}
