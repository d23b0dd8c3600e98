//! Per-partition solving state.

use super::types::ComponentState;
use crate::error::{DecompError, DecompResult};
use crate::model::{ConsId, MipInstance, Solution, SolveLimits, SolveStatus, VarId};
use crate::num::Tolerances;

/// One independent piece of a decomposed problem.
///
/// A component owns its sub-instance and working solution until it reaches a
/// terminal state; both are released at that point. All progress made by
/// successive solve calls (budgets, call count, last bounds) lives here, so a
/// tick can be resumed at any later time.
#[derive(Debug)]
pub struct Component<M: MipInstance> {
    pub(crate) number: usize,
    pub(crate) name: String,
    pub(crate) vars: Vec<VarId>,
    pub(crate) subvars: Vec<VarId>,
    pub(crate) conss: Vec<ConsId>,
    pub(crate) collateral_vars: Vec<VarId>,
    pub(crate) collateral_obj_sum: f64,
    pub(crate) last_dual_bound: f64,
    pub(crate) last_primal_bound: f64,
    pub(crate) last_node_limit: u64,
    pub(crate) last_status: SolveStatus,
    pub(crate) state: ComponentState,
    pub(crate) ncalls: usize,
    /// Id of the last sub-instance solution merged into the problem.
    pub(crate) last_sol_seen: Option<u64>,
    /// Id of the last parent solution copied into the working solution.
    pub(crate) last_parent_sol: Option<u64>,
    pub(crate) sub: Option<M>,
    pub(crate) working_solution: Option<Solution>,
}

impl<M: MipInstance> Component<M> {
    /// Position of the component in its problem, fixed at creation.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent variables of this component.
    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    /// Sub-instance clones of [`vars`](Self::vars), index for index.
    pub fn subvars(&self) -> &[VarId] {
        &self.subvars
    }

    /// Parent constraints of this component.
    pub fn conss(&self) -> &[ConsId] {
        &self.conss
    }

    /// Sub-instance variables pulled in by constraint copying.
    pub fn collateral_vars(&self) -> &[VarId] {
        &self.collateral_vars
    }

    /// Objective contribution of the globally fixed collateral variables.
    pub fn collateral_obj_sum(&self) -> f64 {
        self.collateral_obj_sum
    }

    pub fn last_dual_bound(&self) -> f64 {
        self.last_dual_bound
    }

    pub fn last_primal_bound(&self) -> f64 {
        self.last_primal_bound
    }

    pub fn last_node_limit(&self) -> u64 {
        self.last_node_limit
    }

    pub fn last_status(&self) -> SolveStatus {
        self.last_status
    }

    pub fn state(&self) -> ComponentState {
        self.state
    }

    pub fn ncalls(&self) -> usize {
        self.ncalls
    }

    pub fn is_solved(&self) -> bool {
        self.state.is_terminal()
    }

    /// The sub-instance, `None` once the component is terminal.
    pub fn sub_instance(&self) -> Option<&M> {
        self.sub.as_ref()
    }

    pub fn working_solution(&self) -> Option<&Solution> {
        self.working_solution.as_ref()
    }

    /// `(primal - dual)^2 / ncalls`; larger means solve sooner.
    pub fn weighted_gap(&self) -> f64 {
        if self.ncalls == 0 {
            return f64::INFINITY;
        }
        let gap = self.last_primal_bound - self.last_dual_bound;
        if gap.is_nan() {
            return 0.0;
        }
        gap * gap / self.ncalls as f64
    }

    pub(crate) fn sub_mut(&mut self) -> DecompResult<&mut M> {
        let name = &self.name;
        self.sub
            .as_mut()
            .ok_or_else(|| DecompError::Instance(format!("component <{name}> has no sub-instance")))
    }

    pub(crate) fn sub_ref(&self) -> DecompResult<&M> {
        self.sub.as_ref().ok_or_else(|| {
            DecompError::Instance(format!("component <{}> has no sub-instance", self.name))
        })
    }

    /// Copies a changed parent solution into the working solution and offers
    /// it to the sub-instance if it improves on what the sub-instance has.
    pub(crate) fn inherit_parent_solution(&mut self, parent_best: Option<&Solution>, tol: &Tolerances) {
        let Some(best) = parent_best else {
            return;
        };
        if best.id().is_some() && best.id() == self.last_parent_sol {
            return;
        }
        self.last_parent_sol = best.id();

        let (Some(sub), Some(working)) = (self.sub.as_mut(), self.working_solution.as_mut()) else {
            return;
        };
        for (&var, &subvar) in self.vars.iter().zip(&self.subvars) {
            working.set_value(subvar, best.value(var));
        }

        let obj = sub.solution_objective(working);
        if sub.solution_count() == 0 || tol.approx_lt(obj, sub.primal_bound()) {
            if sub.check_solution(working) {
                let accepted = sub.add_solution(working.detached());
                log::debug!(
                    "component <{}>: inherited parent solution with objective {obj} (accepted: {accepted})",
                    self.name
                );
            } else {
                log::debug!(
                    "component <{}>: inherited parent solution is infeasible",
                    self.name
                );
            }
        }
    }

    /// Limits for the next solve call.
    ///
    /// The first call explores a single node to full optimality; later calls
    /// at least double the nodes used so far and ask for half the current gap
    /// (at most 10%), or no gap at all for the last pending component.
    pub(crate) fn next_limits(
        &self,
        parent: &M,
        last: bool,
        tol: &Tolerances,
    ) -> DecompResult<SolveLimits> {
        let sub = self.sub_ref()?;
        let (time, memory) = resource_budget(parent, sub, tol)?;

        let (nodes, gap) = if self.ncalls == 0 {
            (1, 0.0)
        } else {
            let nodes = sub
                .node_count()
                .saturating_mul(2)
                .max(10)
                .max(self.last_node_limit);
            let current = sub.gap();
            let gap = if last {
                0.0
            } else if current < 0.2 {
                0.5 * current
            } else {
                0.1
            };
            (nodes, gap)
        };

        Ok(SolveLimits {
            nodes,
            gap,
            time,
            memory,
        })
    }

    /// Runs one solve call on the sub-instance and records the call.
    pub(crate) fn run(&mut self, limits: &SolveLimits) -> DecompResult<SolveStatus> {
        let sub = self.sub_mut()?;
        sub.set_limits(limits);
        let status = sub.solve();
        let nodes = sub.node_count();
        let (primal, dual) = (sub.primal_bound(), sub.dual_bound());

        self.last_node_limit = self.last_node_limit.max(limits.nodes);
        self.last_status = status;
        self.ncalls += 1;

        log::debug!(
            "component <{}>: call {} (nodes {}, gap limit {:.4}) -> {:?}, nodes={}, primal={}, dual={}",
            self.name,
            self.ncalls,
            limits.nodes,
            limits.gap,
            status,
            nodes,
            primal,
            dual
        );
        Ok(status)
    }

    /// Drops the sub-instance and working solution.
    pub(crate) fn release(&mut self, state: ComponentState) {
        self.state = state;
        self.sub = None;
        self.working_solution = None;
    }
}

/// Absolute time and memory limits for a sub-instance.
///
/// The sub-instance may use what the parent has left plus what the
/// sub-instance itself already spent, since its solving time is cumulative.
pub(crate) fn resource_budget<M: MipInstance>(
    parent: &M,
    sub: &M,
    tol: &Tolerances,
) -> DecompResult<(f64, f64)> {
    let mut time = parent.time_limit();
    if tol.is_infinity(time) {
        time = f64::INFINITY;
    } else {
        time = time - parent.solving_time() + sub.solving_time();
        if time <= 0.0 {
            return Err(DecompError::ResourceExhausted);
        }
    }

    let mut memory = parent.memory_limit();
    if tol.is_infinity(memory) {
        memory = f64::INFINITY;
    } else {
        memory -= parent.memory_used();
        if memory <= 0.0 {
            return Err(DecompError::ResourceExhausted);
        }
    }

    Ok((time, memory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinearConstraint, LinearMip, VarType};

    fn component(sub: LinearMip, vars: Vec<VarId>) -> Component<LinearMip> {
        let n = sub.var_capacity();
        Component {
            number: 0,
            name: "test_comp_0".into(),
            subvars: vars.clone(),
            vars,
            conss: vec![ConsId(0)],
            collateral_vars: Vec::new(),
            collateral_obj_sum: 0.0,
            last_dual_bound: f64::NEG_INFINITY,
            last_primal_bound: f64::INFINITY,
            last_node_limit: 0,
            last_status: SolveStatus::Unknown,
            state: ComponentState::Pending,
            ncalls: 0,
            last_sol_seen: None,
            last_parent_sol: None,
            sub: Some(sub),
            working_solution: Some(Solution::new(n)),
        }
    }

    fn cover() -> (LinearMip, Vec<VarId>) {
        let mut mip = LinearMip::new("cover");
        let x: Vec<VarId> = (0..5)
            .map(|i| mip.add_var(format!("x{i}"), VarType::Binary, 0.0, 1.0, 1.0 + i as f64))
            .collect();
        mip.add_constraint(LinearConstraint::greater_equal(
            "c",
            x.iter().map(|&v| (v, 1.0)).collect(),
            2.0,
        ));
        (mip, x)
    }

    #[test]
    fn test_first_call_limits() {
        let (sub, x) = cover();
        let parent = LinearMip::new("parent");
        let comp = component(sub, x);
        let limits = comp.next_limits(&parent, false, &Tolerances::default()).unwrap();
        assert_eq!(limits.nodes, 1);
        assert_eq!(limits.gap, 0.0);
        assert!(limits.time.is_infinite());
    }

    #[test]
    fn test_later_limits_grow() {
        let (sub, x) = cover();
        let parent = LinearMip::new("parent");
        let tol = Tolerances::default();
        let mut comp = component(sub, x);

        let first = comp.next_limits(&parent, false, &tol).unwrap();
        comp.run(&first).unwrap();
        assert_eq!(comp.ncalls(), 1);
        assert_eq!(comp.last_node_limit(), 1);

        let second = comp.next_limits(&parent, false, &tol).unwrap();
        assert_eq!(second.nodes, 10);
        // no primal bound yet: infinite gap caps the limit at 10%
        assert!((second.gap - 0.1).abs() < 1e-12);

        let last = comp.next_limits(&parent, true, &tol).unwrap();
        assert_eq!(last.gap, 0.0);
    }

    #[test]
    fn test_exhausted_time_budget() {
        let (sub, x) = cover();
        let mut parent = LinearMip::new("parent");
        parent.set_time(10.0, 12.0);
        let comp = component(sub, x);
        assert_eq!(
            comp.next_limits(&parent, false, &Tolerances::default()).unwrap_err(),
            DecompError::ResourceExhausted
        );
    }

    #[test]
    fn test_time_budget_adds_sub_time() {
        let (sub, _) = cover();
        let mut parent = LinearMip::new("parent");
        parent.set_time(100.0, 40.0);
        let (time, memory) = resource_budget(&parent, &sub, &Tolerances::default()).unwrap();
        assert!((time - 60.0).abs() < 1e-6);
        assert!(memory.is_infinite());

        parent.set_memory(1024.0, 1024.0);
        assert!(resource_budget(&parent, &sub, &Tolerances::default()).is_err());
    }

    #[test]
    fn test_inherit_parent_solution() {
        let (sub, x) = cover();
        let tol = Tolerances::default();
        let mut comp = component(sub, x.clone());

        let mut best = Solution::new(5);
        best.set_value(x[0], 1.0);
        best.set_value(x[1], 1.0);
        let best = best.with_id(3);

        comp.inherit_parent_solution(Some(&best), &tol);
        let sub = comp.sub_instance().unwrap();
        assert_eq!(sub.solution_count(), 1);
        assert!((sub.primal_bound() - 3.0).abs() < 1e-9);
        assert_eq!(comp.working_solution().unwrap().value(x[1]), 1.0);

        // same id again: nothing to do
        comp.inherit_parent_solution(Some(&best), &tol);
        assert_eq!(comp.sub_instance().unwrap().solution_count(), 1);
    }

    #[test]
    fn test_weighted_gap() {
        let (sub, x) = cover();
        let mut comp = component(sub, x);
        assert!(comp.weighted_gap().is_infinite());
        comp.ncalls = 2;
        comp.last_primal_bound = 10.0;
        comp.last_dual_bound = 4.0;
        assert!((comp.weighted_gap() - 18.0).abs() < 1e-12);
    }

    #[test]
    fn test_release() {
        let (sub, x) = cover();
        let mut comp = component(sub, x);
        comp.release(ComponentState::Optimal);
        assert!(comp.is_solved());
        assert!(comp.sub_instance().is_none());
        assert!(comp.working_solution().is_none());
        assert!(comp.run(&SolveLimits::default()).is_err());
    }
}
