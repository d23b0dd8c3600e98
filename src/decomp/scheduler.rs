//! Priority-driven incremental scheduling of components.
//!
//! Each tick pops one component, grows its budget, runs one solve call on
//! its sub-instance and hands the outcome to the aggregation step.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::component::{resource_budget, Component};
use super::problem::Problem;
use super::types::PropResult;
use crate::error::{DecompError, DecompResult};
use crate::model::{MipInstance, SolveLimits};
use crate::num::Tolerances;

/// Queue entry with the priority a component had when it was pushed.
#[derive(Debug, Clone)]
struct QueuedComponent {
    number: usize,
    uncalled: bool,
    priority: f64,
}

impl PartialEq for QueuedComponent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedComponent {}

impl PartialOrd for QueuedComponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedComponent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Greater pops first: uncalled, then larger weighted gap, then lower number.
        self.uncalled
            .cmp(&other.uncalled)
            .then_with(|| self.priority.total_cmp(&other.priority))
            .then_with(|| other.number.cmp(&self.number))
    }
}

/// Max-heap of pending components.
///
/// Components never called come first, in creation order. Called components
/// follow by decreasing `(primal - dual)^2 / ncalls`, quantized by the
/// feasibility tolerance so that the order is total; ties go to the lower
/// number.
#[derive(Debug, Clone)]
pub struct ComponentQueue {
    heap: BinaryHeap<QueuedComponent>,
    tol: Tolerances,
}

impl ComponentQueue {
    pub fn new(tol: Tolerances) -> Self {
        Self {
            heap: BinaryHeap::new(),
            tol,
        }
    }

    pub fn push<M: MipInstance>(&mut self, component: &Component<M>) {
        let uncalled = component.ncalls() == 0;
        let priority = if uncalled {
            0.0
        } else {
            self.tol.priority_key(component.weighted_gap())
        };
        self.heap.push(QueuedComponent {
            number: component.number(),
            uncalled,
            priority,
        });
    }

    /// Number of the component to solve next.
    pub fn pop(&mut self) -> Option<usize> {
        self.heap.pop().map(|q| q.number)
    }

    pub fn peek(&self) -> Option<usize> {
        self.heap.peek().map(|q| q.number)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<M: MipInstance> Problem<M> {
    /// Runs one tick: solves the highest-priority pending component once.
    ///
    /// Returns
    /// - [`PropResult::Cutoff`] if a component is infeasible, or if the last
    ///   pending component was solved and every component is merged
    /// - [`PropResult::Unbounded`] if a component is unbounded
    /// - [`PropResult::Delay`] while components remain queued
    /// - [`PropResult::DidNotFind`] if the budget is exhausted (the tick is a
    ///   no-op) or nothing is left to do
    ///
    /// # Errors
    ///
    /// Only [`DecompError::Instance`] escapes, when the parent refuses a
    /// fixing, deletion or bound change. The component stays queued.
    pub fn solve_step(&mut self, parent: &mut M) -> DecompResult<PropResult> {
        let Some(number) = self.queue.pop() else {
            return Ok(self.finished_result());
        };
        let last = self.queue.is_empty();

        match self.tick(number, last, parent) {
            Ok(()) => {}
            Err(DecompError::ResourceExhausted) => {
                log::debug!(
                    "problem <{}>: no budget left for component {number}",
                    self.name
                );
                self.queue.push(&self.components[number]);
                return Ok(PropResult::DidNotFind);
            }
            Err(e @ DecompError::Infeasible { .. }) => {
                log::debug!("problem <{}>: {e}", self.name);
                return Ok(PropResult::Cutoff);
            }
            Err(e @ DecompError::Unbounded { .. }) => {
                log::debug!("problem <{}>: {e}", self.name);
                return Ok(PropResult::Unbounded);
            }
            Err(e @ DecompError::ToleranceViolation { .. }) => {
                log::debug!("problem <{}>: {e}", self.name);
            }
            Err(e) => {
                if !self.components[number].is_solved() {
                    self.queue.push(&self.components[number]);
                }
                return Err(e);
            }
        }

        if !self.components[number].is_solved() {
            self.queue.push(&self.components[number]);
            Ok(PropResult::Delay)
        } else if self.queue.is_empty() {
            Ok(self.finished_result())
        } else {
            Ok(PropResult::Delay)
        }
    }

    fn finished_result(&self) -> PropResult {
        if self.all_merged() {
            PropResult::Cutoff
        } else {
            PropResult::DidNotFind
        }
    }

    fn tick(&mut self, number: usize, last: bool, parent: &mut M) -> DecompResult<()> {
        let limits = self.prepare(number, last, parent)?;
        let status = self.components[number].run(&limits)?;
        self.evaluate(number, status, parent)
    }

    /// Checks the budget, inherits the parent solution, and computes limits.
    ///
    /// Leaves the component untouched if the budget is exhausted.
    fn prepare(&mut self, number: usize, last: bool, parent: &M) -> DecompResult<SolveLimits> {
        let tol = self.tol;
        let component = &mut self.components[number];
        resource_budget(parent, component.sub_ref()?, &tol)?;
        component.inherit_parent_solution(parent.best_solution(), &tol);
        component.next_limits(parent, last, &tol)
    }
}

#[cfg(feature = "parallel")]
impl<M: MipInstance + Send> Problem<M> {
    /// Solves up to `width` components at once on the rayon pool.
    ///
    /// Components are popped and prepared in priority order, solved in
    /// parallel, and evaluated one after the other in pop order. After an
    /// infeasible or unbounded component the remaining ones of the round are
    /// re-enqueued without evaluation.
    pub fn solve_round(&mut self, parent: &mut M, width: usize) -> DecompResult<PropResult> {
        use crate::model::SolveStatus;
        use rayon::prelude::*;

        let mut batch = Vec::new();
        while batch.len() < width.max(1) {
            match self.queue.pop() {
                Some(number) => batch.push(number),
                None => break,
            }
        }
        if batch.is_empty() {
            return Ok(self.finished_result());
        }
        let last = batch.len() == 1 && self.queue.is_empty();

        let mut planned: Vec<(usize, SolveLimits)> = Vec::with_capacity(batch.len());
        for (i, &number) in batch.iter().enumerate() {
            match self.prepare(number, last, parent) {
                Ok(limits) => planned.push((number, limits)),
                Err(DecompError::ResourceExhausted) => {
                    self.queue.push(&self.components[number]);
                }
                Err(e) => {
                    for &(n, _) in &planned {
                        self.queue.push(&self.components[n]);
                    }
                    for &n in &batch[i..] {
                        self.queue.push(&self.components[n]);
                    }
                    return Err(e);
                }
            }
        }
        if planned.is_empty() {
            return Ok(PropResult::DidNotFind);
        }

        let statuses: Vec<(usize, DecompResult<SolveStatus>)> = self
            .components
            .par_iter_mut()
            .filter_map(|c| {
                planned
                    .iter()
                    .find(|(n, _)| *n == c.number)
                    .map(|(_, limits)| (c, *limits))
            })
            .map(|(c, limits)| (c.number, c.run(&limits)))
            .collect();

        let mut outcome = None;
        for (i, &(number, _)) in planned.iter().enumerate() {
            if outcome.is_some() {
                self.queue.push(&self.components[number]);
                continue;
            }
            let status = statuses
                .iter()
                .find(|(n, _)| *n == number)
                .map(|(_, s)| s.clone())
                .unwrap_or(Err(DecompError::ResourceExhausted));
            let evaluated = status.and_then(|s| self.evaluate(number, s, parent));
            match evaluated {
                Ok(()) => {}
                Err(DecompError::Infeasible { .. }) => outcome = Some(PropResult::Cutoff),
                Err(DecompError::Unbounded { .. }) => outcome = Some(PropResult::Unbounded),
                Err(e @ DecompError::ToleranceViolation { .. }) => {
                    log::debug!("problem <{}>: {e}", self.name);
                }
                Err(DecompError::ResourceExhausted) => {}
                Err(e) => {
                    for &(n, _) in &planned[i..] {
                        if !self.components[n].is_solved() {
                            self.queue.push(&self.components[n]);
                        }
                    }
                    return Err(e);
                }
            }
            if outcome.is_none() && !self.components[number].is_solved() {
                self.queue.push(&self.components[number]);
            }
        }

        if let Some(result) = outcome {
            return Ok(result);
        }
        if self.queue.is_empty() {
            Ok(self.finished_result())
        } else {
            Ok(PropResult::Delay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomp::{ComponentState, DecompConfig};
    use crate::model::{LinearConstraint, LinearMip, VarId, VarType};

    fn config() -> DecompConfig {
        DecompConfig::default()
            .with_min_absolute_component_size(2)
            .with_min_relative_component_size(0.0)
    }

    fn entry(number: usize, uncalled: bool, priority: f64) -> QueuedComponent {
        QueuedComponent {
            number,
            uncalled,
            priority,
        }
    }

    #[test]
    fn test_queue_order() {
        let mut heap = BinaryHeap::new();
        heap.push(entry(0, false, 4.0));
        heap.push(entry(1, true, 0.0));
        heap.push(entry(2, false, 9.0));
        heap.push(entry(3, true, 0.0));
        heap.push(entry(4, false, 9.0));
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|q| q.number)).collect();
        assert_eq!(order, vec![1, 3, 2, 4, 0]);
    }

    /// Two independent covering blocks of binaries.
    fn two_covers() -> (LinearMip, Vec<VarId>) {
        let mut mip = LinearMip::new("covers");
        let x: Vec<VarId> = (0..6)
            .map(|i| mip.add_var(format!("x{i}"), VarType::Binary, 0.0, 1.0, 1.0 + i as f64))
            .collect();
        mip.add_constraint(LinearConstraint::greater_equal(
            "a",
            vec![(x[0], 1.0), (x[1], 1.0), (x[2], 1.0)],
            2.0,
        ));
        mip.add_constraint(LinearConstraint::greater_equal(
            "b",
            vec![(x[3], 1.0), (x[4], 1.0), (x[5], 1.0)],
            1.0,
        ));
        (mip, x)
    }

    #[test]
    fn test_first_ticks_use_one_node() {
        let (mut mip, _) = two_covers();
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();

        assert_eq!(problem.solve_step(&mut mip).unwrap(), PropResult::Delay);
        assert_eq!(problem.solve_step(&mut mip).unwrap(), PropResult::Delay);
        for component in problem.components() {
            assert_eq!(component.ncalls(), 1);
            assert_eq!(component.last_node_limit(), 1);
        }
    }

    #[test]
    fn test_runs_to_completion() {
        let (mut mip, x) = two_covers();
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();

        let mut result = PropResult::Delay;
        let mut ticks = 0;
        while result == PropResult::Delay {
            result = problem.solve_step(&mut mip).unwrap();
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(result, PropResult::Cutoff);
        assert!(problem.all_merged());
        assert!(problem.is_finished());
        // a: x0 + x1 (1 + 2), b: x3 (4)
        assert!((problem.lower_bound() - 7.0).abs() < 1e-9);
        assert!((mip.primal_bound() - 7.0).abs() < 1e-9);
        assert_eq!(mip.local_bounds(x[0]).lower, 1.0);
        assert_eq!(mip.local_bounds(x[2]).upper, 0.0);
        assert_eq!(mip.constraint_count(), 0);

        // nothing left: further calls do not touch the parent
        assert_eq!(problem.solve_step(&mut mip).unwrap(), PropResult::Cutoff);
    }

    #[test]
    fn test_monotone_progress() {
        let (mut mip, _) = two_covers();
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();

        let n = problem.n_components();
        let mut limits = vec![0u64; n];
        let mut duals = vec![f64::NEG_INFINITY; n];
        let mut primals = vec![f64::INFINITY; n];
        loop {
            let result = problem.solve_step(&mut mip).unwrap();
            for c in problem.components() {
                let i = c.number();
                assert!(c.last_node_limit() >= limits[i]);
                assert!(c.last_dual_bound() >= duals[i]);
                assert!(c.last_primal_bound() <= primals[i]);
                limits[i] = c.last_node_limit();
                duals[i] = c.last_dual_bound();
                primals[i] = c.last_primal_bound();
            }
            if result != PropResult::Delay {
                break;
            }
        }
    }

    #[test]
    fn test_exhausted_budget_is_noop() {
        let (mut mip, _) = two_covers();
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();
        mip.set_time(5.0, 5.0);

        assert_eq!(problem.solve_step(&mut mip).unwrap(), PropResult::DidNotFind);
        assert_eq!(problem.n_pending(), 2);
        for c in problem.components() {
            assert_eq!(c.ncalls(), 0);
            assert_eq!(c.state(), ComponentState::Pending);
        }
    }

    #[test]
    fn test_infeasible_component_cuts_off() {
        let (mut mip, x) = two_covers();
        // propagation alone empties a domain on the first call
        mip.add_constraint(LinearConstraint::greater_equal(
            "clash",
            vec![(x[0], 1.0), (x[1], 1.0), (x[2], 1.0)],
            4.0,
        ));
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();
        assert_eq!(problem.solve_step(&mut mip).unwrap(), PropResult::Cutoff);

        let other = &problem.components()[1];
        assert_eq!(other.ncalls(), 0);
        assert_eq!(other.state(), ComponentState::Pending);
        assert_eq!(problem.components()[0].state(), ComponentState::Infeasible);
        for v in mip.variables() {
            let b = mip.local_bounds(v);
            assert!(b.lower < b.upper);
        }
    }

    #[test]
    fn test_rejected_merge_keeps_component_queued() {
        let mut mip = LinearMip::new("rejected");
        let x: Vec<VarId> = (0..6)
            .map(|i| mip.add_var(format!("x{i}"), VarType::Binary, 0.0, 1.0, 1.0))
            .collect();
        let forced = mip.add_constraint(LinearConstraint::greater_equal(
            "a",
            vec![(x[0], 1.0), (x[1], 1.0), (x[2], 1.0)],
            3.0,
        ));
        mip.add_constraint(LinearConstraint::greater_equal(
            "b",
            vec![(x[3], 1.0), (x[4], 1.0), (x[5], 1.0)],
            1.0,
        ));
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();
        // the parent drops the row behind the decomposition's back
        mip.delete_constraint(forced).unwrap();

        assert!(matches!(
            problem.solve_step(&mut mip),
            Err(DecompError::Instance(_))
        ));
        assert_eq!(problem.n_pending(), 2);
        assert_eq!(problem.components()[0].state(), ComponentState::Pending);
    }

    #[test]
    fn test_unbounded_component() {
        let mut mip = LinearMip::new("unb");
        let x: Vec<VarId> = (0..4)
            .map(|i| mip.add_var(format!("x{i}"), VarType::Binary, 0.0, 1.0, 1.0))
            .collect();
        let free = mip.add_var("free", VarType::Integer, 0.0, f64::INFINITY, -1.0);
        mip.add_constraint(LinearConstraint::greater_equal("a", vec![(x[0], 1.0), (x[1], 1.0)], 1.0));
        mip.add_constraint(LinearConstraint::greater_equal("b", vec![(x[2], 1.0), (x[3], 1.0)], 1.0));
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();
        // the free variable folds into the first component
        assert!(problem.components()[0].vars().contains(&free));
        assert_eq!(problem.solve_step(&mut mip).unwrap(), PropResult::Unbounded);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_round() {
        let (mut mip, _) = two_covers();
        let mut problem = Problem::create(&mip, &config()).unwrap().unwrap();
        let mut result = PropResult::Delay;
        let mut rounds = 0;
        while result == PropResult::Delay {
            result = problem.solve_round(&mut mip, 2).unwrap();
            rounds += 1;
            assert!(rounds < 100);
        }
        assert_eq!(result, PropResult::Cutoff);
        assert!((mip.primal_bound() - 7.0).abs() < 1e-9);
    }
}
