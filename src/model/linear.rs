//! A small pure-integer linear MIP used as reference instance.

use std::time::Instant;

use super::instance::MipInstance;
use super::types::{Bounds, ConsId, Solution, SolveLimits, SolveStatus, VarId, VarMap, VarType};
use crate::error::{DecompError, DecompResult};
use crate::num::Tolerances;

/// A linear constraint `lhs <= sum(coef * var) <= rhs`.
///
/// # Examples
///
/// ```
/// use u_decomp::model::{LinearConstraint, LinearMip, VarType};
///
/// let mut mip = LinearMip::new("knapsack");
/// let x = mip.add_var("x", VarType::Binary, 0.0, 1.0, -3.0);
/// let y = mip.add_var("y", VarType::Binary, 0.0, 1.0, -2.0);
/// mip.add_constraint(LinearConstraint::less_equal("cap", vec![(x, 2.0), (y, 2.0)], 3.0));
/// assert_eq!(mip.constraint_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    /// Constraint name.
    pub name: String,
    /// `(variable, coefficient)` terms; may reference aggregated variables.
    pub terms: Vec<(VarId, f64)>,
    /// Left-hand side (`-inf` if absent).
    pub lhs: f64,
    /// Right-hand side (`+inf` if absent).
    pub rhs: f64,
    /// Whether the constraint is checked for feasibility.
    pub checked: bool,
    /// Whether the constraint can report its variables.
    pub reports_variables: bool,
    /// Whether the constraint can be cloned into another instance.
    pub copyable: bool,
    deleted: bool,
}

impl LinearConstraint {
    pub fn new(name: impl Into<String>, terms: Vec<(VarId, f64)>, lhs: f64, rhs: f64) -> Self {
        Self {
            name: name.into(),
            terms,
            lhs,
            rhs,
            checked: true,
            reports_variables: true,
            copyable: true,
            deleted: false,
        }
    }

    pub fn less_equal(name: impl Into<String>, terms: Vec<(VarId, f64)>, rhs: f64) -> Self {
        Self::new(name, terms, f64::NEG_INFINITY, rhs)
    }

    pub fn greater_equal(name: impl Into<String>, terms: Vec<(VarId, f64)>, lhs: f64) -> Self {
        Self::new(name, terms, lhs, f64::INFINITY)
    }

    pub fn equal(name: impl Into<String>, terms: Vec<(VarId, f64)>, value: f64) -> Self {
        Self::new(name, terms, value, value)
    }

    /// Marks the constraint as not checked (ignored by decomposition).
    pub fn unchecked(mut self) -> Self {
        self.checked = false;
        self
    }

    /// Makes the constraint unable to report its variables.
    pub fn opaque(mut self) -> Self {
        self.reports_variables = false;
        self
    }

    /// Makes cloning the constraint fail.
    pub fn uncopyable(mut self) -> Self {
        self.copyable = false;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

#[derive(Debug, Clone)]
enum VarStatus {
    Active,
    /// `var = constant + sum(coef * rep)` over active representatives.
    Aggregated {
        terms: Vec<(VarId, f64)>,
        constant: f64,
    },
}

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    vtype: VarType,
    obj: f64,
    global: Bounds,
    local: Bounds,
    status: VarStatus,
}

/// Search context seen by decomposition when this instance is the parent.
#[derive(Debug, Clone)]
struct SearchContext {
    time_limit: f64,
    elapsed_offset: f64,
    memory_limit: f64,
    memory_used: f64,
    node_limit: u64,
    depth: usize,
    node_number: u64,
    stopped: bool,
    local_lower_bound: f64,
}

impl Default for SearchContext {
    fn default() -> Self {
        Self {
            time_limit: f64::INFINITY,
            elapsed_offset: 0.0,
            memory_limit: f64::INFINITY,
            memory_used: 0.0,
            node_limit: u64::MAX,
            depth: 0,
            node_number: 1,
            stopped: false,
            local_lower_bound: f64::NEG_INFINITY,
        }
    }
}

#[derive(Debug, Clone)]
struct Row {
    /// `(branching position, coefficient)`.
    terms: Vec<(usize, f64)>,
    lhs: f64,
    rhs: f64,
}

#[derive(Debug, Clone)]
struct OpenNode {
    /// Values of the first `values.len()` branching variables.
    values: Vec<f64>,
    bound: f64,
}

/// Resumable depth-first search state, kept between solve calls.
#[derive(Debug, Clone)]
struct Search {
    order: Vec<VarId>,
    domains: Vec<Bounds>,
    objs: Vec<f64>,
    /// Variables decided without branching, with their values.
    preset: Vec<(VarId, f64)>,
    rows: Vec<Row>,
    stack: Vec<OpenNode>,
}

/// A pure-integer linear MIP with a resumable depth-first branch-and-bound.
///
/// This is a reference implementation of [`MipInstance`] used to exercise the
/// decomposition end-to-end; it is not a production solver.
///
/// # Limitations
///
/// - Continuous variables must be fixed wherever they appear in constraints;
///   otherwise `solve` reports [`SolveStatus::Unknown`]
/// - Branching enumerates integer domains, so domains must be small
/// - A variable that appears in no constraint and can improve the objective
///   without limit makes the model unbounded (or infeasible-or-unbounded if
///   the rest of the model was not decided)
/// - Aggregated variables carry no objective of their own
#[derive(Debug, Clone)]
pub struct LinearMip {
    name: String,
    tol: Tolerances,
    vars: Vec<Variable>,
    conss: Vec<LinearConstraint>,
    plugins_copyable: bool,
    limits: SolveLimits,
    status: SolveStatus,
    search: Option<Search>,
    nodes: u64,
    solve_seconds: f64,
    solutions: Vec<Solution>,
    best: Option<usize>,
    next_solution_id: u64,
    context: SearchContext,
}

impl LinearMip {
    /// Creates an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tol: Tolerances::default(),
            vars: Vec::new(),
            conss: Vec::new(),
            plugins_copyable: true,
            limits: SolveLimits::default(),
            status: SolveStatus::Unknown,
            search: None,
            nodes: 0,
            solve_seconds: 0.0,
            solutions: Vec::new(),
            best: None,
            next_solution_id: 0,
            context: SearchContext::default(),
        }
    }

    pub fn with_tolerances(mut self, tol: Tolerances) -> Self {
        self.tol = tol;
        self
    }

    /// Adds an active variable.
    pub fn add_var(
        &mut self,
        name: impl Into<String>,
        vtype: VarType,
        lower: f64,
        upper: f64,
        obj: f64,
    ) -> VarId {
        let id = VarId(self.vars.len());
        let bounds = Bounds::new(lower, upper);
        self.vars.push(Variable {
            name: name.into(),
            vtype,
            obj,
            global: bounds,
            local: bounds,
            status: VarStatus::Active,
        });
        id
    }

    /// Adds a variable defined as `constant + sum(coef * rep)`.
    ///
    /// Representatives must be active variables.
    pub fn add_aggregated_var(
        &mut self,
        name: impl Into<String>,
        vtype: VarType,
        terms: Vec<(VarId, f64)>,
        constant: f64,
    ) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(Variable {
            name: name.into(),
            vtype,
            obj: 0.0,
            global: Bounds::new(f64::NEG_INFINITY, f64::INFINITY),
            local: Bounds::new(f64::NEG_INFINITY, f64::INFINITY),
            status: VarStatus::Aggregated { terms, constant },
        });
        id
    }

    pub fn add_constraint(&mut self, cons: LinearConstraint) -> ConsId {
        let id = ConsId(self.conss.len());
        self.conss.push(cons);
        id
    }

    pub fn var_name(&self, var: VarId) -> &str {
        &self.vars[var.0].name
    }

    pub fn constraint(&self, cons: ConsId) -> &LinearConstraint {
        &self.conss[cons.0]
    }

    /// Number of constraints that have not been deleted.
    pub fn constraint_count(&self) -> usize {
        self.conss.iter().filter(|c| !c.deleted).count()
    }

    /// Sets node-local bounds, as branching would.
    pub fn set_local_bounds(&mut self, var: VarId, lower: f64, upper: f64) {
        self.vars[var.0].local = Bounds::new(lower, upper);
    }

    /// Makes plugin copying (and therefore sub-instance creation) fail.
    pub fn set_plugins_copyable(&mut self, copyable: bool) {
        self.plugins_copyable = copyable;
    }

    /// Sets the time limit and the solving time already spent.
    pub fn set_time(&mut self, limit: f64, elapsed: f64) {
        self.context.time_limit = limit;
        self.context.elapsed_offset = elapsed;
    }

    pub fn set_memory(&mut self, limit: f64, used: f64) {
        self.context.memory_limit = limit;
        self.context.memory_used = used;
    }

    pub fn set_node_limit(&mut self, limit: u64) {
        self.context.node_limit = limit;
    }

    /// Moves the search context to node `number` at `depth`.
    pub fn set_node(&mut self, number: u64, depth: usize) {
        self.context.node_number = number;
        self.context.depth = depth;
        self.context.local_lower_bound = f64::NEG_INFINITY;
    }

    pub fn set_stopped(&mut self, stopped: bool) {
        self.context.stopped = stopped;
    }

    /// Lower bound of the current node, as raised by the decomposition.
    pub fn local_lower_bound(&self) -> f64 {
        self.context.local_lower_bound
    }

    fn is_active(&self, var: VarId) -> bool {
        matches!(self.vars[var.0].status, VarStatus::Active)
    }

    /// Terms of a constraint over active variables plus a constant offset.
    fn expanded_terms(&self, cons: &LinearConstraint) -> (Vec<(VarId, f64)>, f64) {
        let mut terms: Vec<(VarId, f64)> = Vec::new();
        let mut constant = 0.0;
        let push = |var: VarId, coef: f64, terms: &mut Vec<(VarId, f64)>| {
            if let Some(entry) = terms.iter_mut().find(|(v, _)| *v == var) {
                entry.1 += coef;
            } else {
                terms.push((var, coef));
            }
        };
        for &(var, coef) in &cons.terms {
            match &self.vars[var.0].status {
                VarStatus::Active => push(var, coef, &mut terms),
                VarStatus::Aggregated {
                    terms: reps,
                    constant: offset,
                } => {
                    constant += coef * offset;
                    for &(rep, weight) in reps {
                        push(rep, coef * weight, &mut terms);
                    }
                }
            }
        }
        terms.retain(|(_, coef)| *coef != 0.0);
        (terms, constant)
    }

    fn value_of(&self, solution: &Solution, var: VarId) -> f64 {
        match &self.vars[var.0].status {
            VarStatus::Active => solution.value(var),
            VarStatus::Aggregated { terms, constant } => {
                constant
                    + terms
                        .iter()
                        .map(|&(rep, coef)| coef * solution.value(rep))
                        .sum::<f64>()
            }
        }
    }

    fn store_solution(&mut self, solution: Solution) -> bool {
        let obj = self.solution_objective(&solution);
        let id = self.next_solution_id;
        self.next_solution_id += 1;
        self.solutions.push(solution.detached().with_id(id));
        let improves = match self.best {
            Some(best) => self.tol.approx_lt(obj, self.solution_objective(&self.solutions[best])),
            None => true,
        };
        if improves {
            self.best = Some(self.solutions.len() - 1);
        }
        true
    }

    fn tighten(&mut self, var: VarId, lower: f64, upper: f64) {
        let depth = self.context.depth;
        let v = &mut self.vars[var.0];
        v.local = Bounds::new(lower, upper);
        if depth == 0 {
            v.global = v.local;
        }
    }

    /// Activity-based bound tightening over all checked rows.
    ///
    /// Returns `false` if some domain became empty.
    fn propagate_bounds(&mut self) -> bool {
        let rows: Vec<(Vec<(VarId, f64)>, f64, f64)> = self
            .conss
            .iter()
            .filter(|c| !c.deleted && c.checked)
            .map(|c| {
                let (terms, constant) = self.expanded_terms(c);
                (terms, c.lhs - constant, c.rhs - constant)
            })
            .collect();

        for _ in 0..20 {
            let mut changed = false;
            for (terms, lhs, rhs) in &rows {
                let contrib = |b: Bounds, a: f64| {
                    if a > 0.0 {
                        (a * b.lower, a * b.upper)
                    } else {
                        (a * b.upper, a * b.lower)
                    }
                };
                let (min_act, max_act) = terms.iter().fold((0.0, 0.0), |(lo, hi), &(v, a)| {
                    let (cl, cu) = contrib(self.vars[v.0].local, a);
                    (lo + cl, hi + cu)
                });

                for &(var, a) in terms {
                    let b = self.vars[var.0].local;
                    let (cl, cu) = contrib(b, a);
                    let mut new = b;
                    if rhs.is_finite() && min_act.is_finite() {
                        let limit = (rhs - (min_act - cl)) / a;
                        if a > 0.0 {
                            new.upper = new.upper.min(limit);
                        } else {
                            new.lower = new.lower.max(limit);
                        }
                    }
                    if lhs.is_finite() && max_act.is_finite() {
                        let limit = (lhs - (max_act - cu)) / a;
                        if a > 0.0 {
                            new.lower = new.lower.max(limit);
                        } else {
                            new.upper = new.upper.min(limit);
                        }
                    }
                    if self.vars[var.0].vtype.is_integral() {
                        new.lower = (new.lower - self.tol.feastol).ceil();
                        new.upper = (new.upper + self.tol.feastol).floor();
                    }
                    if self.tol.feas_gt(new.lower, new.upper) {
                        return false;
                    }
                    if self.tol.feas_gt(new.lower, b.lower) || self.tol.feas_lt(new.upper, b.upper) {
                        let lower = new.lower.max(b.lower);
                        let upper = new.upper.min(b.upper).max(lower);
                        self.tighten(var, lower, upper);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        true
    }

    /// Prepares the search at the first solve call.
    fn start_search(&mut self) -> Result<Search, SolveStatus> {
        if !self.propagate_bounds() {
            return Err(SolveStatus::Infeasible);
        }

        let rows_src: Vec<(Vec<(VarId, f64)>, f64, f64)> = self
            .conss
            .iter()
            .filter(|c| !c.deleted && c.checked)
            .map(|c| {
                let (terms, constant) = self.expanded_terms(c);
                (terms, c.lhs - constant, c.rhs - constant)
            })
            .collect();

        let mut constrained = vec![false; self.vars.len()];
        for (terms, _, _) in &rows_src {
            for &(v, _) in terms {
                constrained[v.0] = true;
            }
        }

        let mut order = Vec::new();
        let mut preset = Vec::new();
        let mut unbounded = false;
        for id in self.variables() {
            let var = &self.vars[id.0];
            let b = var.local;
            if !constrained[id.0] {
                let value = if var.obj > 0.0 {
                    b.lower
                } else if var.obj < 0.0 {
                    b.upper
                } else {
                    b.clamp(0.0)
                };
                if !value.is_finite() {
                    unbounded = true;
                    preset.push((id, b.clamp(0.0)));
                } else {
                    preset.push((id, value));
                }
            } else if self.tol.feas_eq(b.lower, b.upper) {
                preset.push((id, b.lower));
            } else if !var.vtype.is_integral() || !b.lower.is_finite() || !b.upper.is_finite() {
                log::warn!(
                    "instance <{}>: variable <{}> cannot be enumerated",
                    self.name,
                    var.name
                );
                return Err(SolveStatus::Unknown);
            } else {
                order.push(id);
            }
        }
        if unbounded {
            return Err(if rows_src.is_empty() {
                SolveStatus::Unbounded
            } else {
                SolveStatus::InfeasibleOrUnbounded
            });
        }

        let mut position = vec![None; self.vars.len()];
        for (pos, id) in order.iter().enumerate() {
            position[id.0] = Some(pos);
        }
        let preset_value = |v: VarId| preset.iter().find(|(p, _)| *p == v).map(|&(_, x)| x);

        let mut rows = Vec::with_capacity(rows_src.len());
        for (terms, lhs, rhs) in rows_src {
            let mut row = Row {
                terms: Vec::new(),
                lhs,
                rhs,
            };
            for (v, a) in terms {
                match position[v.0] {
                    Some(pos) => row.terms.push((pos, a)),
                    None => {
                        let x = preset_value(v).unwrap_or(0.0);
                        row.lhs -= a * x;
                        row.rhs -= a * x;
                    }
                }
            }
            rows.push(row);
        }

        let domains: Vec<Bounds> = order.iter().map(|v| self.vars[v.0].local).collect();
        let objs: Vec<f64> = order.iter().map(|v| self.vars[v.0].obj).collect();
        let root_bound = preset
            .iter()
            .map(|&(v, x)| self.vars[v.0].obj * x)
            .sum::<f64>()
            + domains
                .iter()
                .zip(&objs)
                .map(|(b, &c)| (c * b.lower).min(c * b.upper))
                .sum::<f64>();

        Ok(Search {
            order,
            domains,
            objs,
            preset,
            rows,
            stack: vec![OpenNode {
                values: Vec::new(),
                bound: root_bound,
            }],
        })
    }

    fn node_feasible(&self, search: &Search, node: &OpenNode) -> bool {
        search.rows.iter().all(|row| {
            let (mut lo, mut hi) = (0.0, 0.0);
            for &(pos, a) in &row.terms {
                if pos < node.values.len() {
                    lo += a * node.values[pos];
                    hi += a * node.values[pos];
                } else {
                    let b = search.domains[pos];
                    if a > 0.0 {
                        lo += a * b.lower;
                        hi += a * b.upper;
                    } else {
                        lo += a * b.upper;
                        hi += a * b.lower;
                    }
                }
            }
            !(self.tol.feas_lt(hi, row.lhs) || self.tol.feas_gt(lo, row.rhs))
        })
    }

    fn run_search(&mut self, search: &mut Search, started: Instant) -> SolveStatus {
        loop {
            if search.stack.is_empty() {
                return if self.best.is_some() {
                    SolveStatus::Optimal
                } else {
                    SolveStatus::Infeasible
                };
            }
            if self.nodes >= self.limits.nodes {
                return SolveStatus::NodeLimit;
            }
            if self.solve_seconds + started.elapsed().as_secs_f64() >= self.limits.time {
                return SolveStatus::TimeLimit;
            }
            if self.limits.gap > 0.0 && self.best.is_some() {
                let dual = Self::open_bound(search).min(self.primal_bound());
                let gap = crate::num::relative_gap(&self.tol, self.primal_bound(), dual);
                if gap <= self.limits.gap {
                    return SolveStatus::GapLimit;
                }
            }

            let Some(node) = search.stack.pop() else {
                continue;
            };
            self.nodes += 1;

            if self.best.is_some() && self.tol.approx_ge(node.bound, self.primal_bound()) {
                continue;
            }
            if !self.node_feasible(search, &node) {
                continue;
            }

            let depth = node.values.len();
            if depth == search.order.len() {
                let mut sol = Solution::new(self.vars.len());
                for &(v, x) in &search.preset {
                    sol.set_value(v, x);
                }
                for (pos, &v) in search.order.iter().enumerate() {
                    sol.set_value(v, node.values[pos]);
                }
                self.store_solution(sol);
                continue;
            }

            let b = search.domains[depth];
            let c = search.objs[depth];
            let base = node.bound - (c * b.lower).min(c * b.upper);
            let lo = b.lower.round() as i64;
            let hi = b.upper.round() as i64;
            // Pushed so that the objective-preferred value is popped first.
            let values: Vec<i64> = if c >= 0.0 {
                (lo..=hi).rev().collect()
            } else {
                (lo..=hi).collect()
            };
            for value in values {
                let mut child = node.values.clone();
                child.push(value as f64);
                search.stack.push(OpenNode {
                    values: child,
                    bound: base + c * value as f64,
                });
            }
        }
    }

    fn open_bound(search: &Search) -> f64 {
        search
            .stack
            .iter()
            .map(|n| n.bound)
            .fold(f64::INFINITY, f64::min)
    }
}

impl MipInstance for LinearMip {
    fn name(&self) -> &str {
        &self.name
    }

    fn var_capacity(&self) -> usize {
        self.vars.len()
    }

    fn variables(&self) -> Vec<VarId> {
        (0..self.vars.len())
            .map(VarId)
            .filter(|&v| self.is_active(v))
            .collect()
    }

    fn var_type(&self, var: VarId) -> VarType {
        self.vars[var.0].vtype
    }

    fn objective(&self, var: VarId) -> f64 {
        self.vars[var.0].obj
    }

    fn local_bounds(&self, var: VarId) -> Bounds {
        self.vars[var.0].local
    }

    fn global_bounds(&self, var: VarId) -> Bounds {
        self.vars[var.0].global
    }

    fn checked_constraints(&self) -> Vec<ConsId> {
        self.conss
            .iter()
            .enumerate()
            .filter(|(_, c)| c.checked && !c.deleted)
            .map(|(i, _)| ConsId(i))
            .collect()
    }

    fn constraint_variables(&self, cons: ConsId) -> Option<Vec<VarId>> {
        let c = &self.conss[cons.0];
        if !c.reports_variables {
            return None;
        }
        let (terms, _) = self.expanded_terms(c);
        Some(terms.into_iter().map(|(v, _)| v).collect())
    }

    fn tolerances(&self) -> Tolerances {
        self.tol
    }

    fn create_sub_instance(&self, name: &str) -> DecompResult<Self> {
        if !self.plugins_copyable {
            return Err(DecompError::CopyFailed(format!(
                "plugins of <{}> cannot be copied",
                self.name
            )));
        }
        Ok(LinearMip::new(name).with_tolerances(self.tol))
    }

    fn clone_variable(
        &self,
        var: VarId,
        target: &mut Self,
        map: &mut VarMap,
    ) -> DecompResult<VarId> {
        if let Some(existing) = map.get(var) {
            return Ok(existing);
        }
        let v = &self.vars[var.0];
        if !self.is_active(var) {
            return Err(DecompError::CopyFailed(format!(
                "variable <{}> is not active",
                v.name
            )));
        }
        let clone = target.add_var(v.name.clone(), v.vtype, v.local.lower, v.local.upper, v.obj);
        map.insert(var, clone);
        Ok(clone)
    }

    fn clone_constraint(
        &self,
        cons: ConsId,
        target: &mut Self,
        map: &mut VarMap,
    ) -> DecompResult<ConsId> {
        let c = &self.conss[cons.0];
        if !c.copyable || c.deleted {
            return Err(DecompError::CopyFailed(format!(
                "constraint <{}> cannot be copied",
                c.name
            )));
        }
        let (terms, constant) = self.expanded_terms(c);
        let mut cloned = Vec::with_capacity(terms.len());
        for (var, coef) in terms {
            cloned.push((self.clone_variable(var, target, map)?, coef));
        }
        let mut copy = LinearConstraint::new(c.name.clone(), cloned, c.lhs - constant, c.rhs - constant);
        copy.checked = c.checked;
        Ok(target.add_constraint(copy))
    }

    fn set_limits(&mut self, limits: &SolveLimits) {
        self.limits = *limits;
    }

    fn solve(&mut self) -> SolveStatus {
        if self.status.is_conclusive() {
            return self.status;
        }
        if self.context.stopped {
            self.status = SolveStatus::UserInterrupt;
            return self.status;
        }

        let started = Instant::now();
        let mut search = match self.search.take() {
            Some(search) => search,
            None => match self.start_search() {
                Ok(search) => search,
                Err(status) => {
                    self.status = status;
                    self.solve_seconds += started.elapsed().as_secs_f64();
                    return status;
                }
            },
        };

        self.status = self.run_search(&mut search, started);
        self.search = Some(search);
        self.solve_seconds += started.elapsed().as_secs_f64();
        self.status
    }

    fn status(&self) -> SolveStatus {
        self.status
    }

    fn dual_bound(&self) -> f64 {
        match self.status {
            SolveStatus::Optimal => self.primal_bound(),
            SolveStatus::Infeasible => f64::INFINITY,
            SolveStatus::Unbounded | SolveStatus::InfeasibleOrUnbounded => f64::NEG_INFINITY,
            _ => match &self.search {
                Some(search) if !search.stack.is_empty() => {
                    Self::open_bound(search).min(self.primal_bound())
                }
                Some(_) => self.primal_bound(),
                None => f64::NEG_INFINITY,
            },
        }
    }

    fn primal_bound(&self) -> f64 {
        match self.best {
            Some(best) => self.solution_objective(&self.solutions[best]),
            None => f64::INFINITY,
        }
    }

    fn node_count(&self) -> u64 {
        self.nodes
    }

    fn solving_time(&self) -> f64 {
        self.solve_seconds + self.context.elapsed_offset
    }

    fn best_solution(&self) -> Option<&Solution> {
        self.best.map(|i| &self.solutions[i])
    }

    fn solution_count(&self) -> usize {
        self.solutions.len()
    }

    fn solution_objective(&self, solution: &Solution) -> f64 {
        self.variables()
            .into_iter()
            .map(|v| self.vars[v.0].obj * solution.value(v))
            .sum()
    }

    fn check_solution(&self, solution: &Solution) -> bool {
        for v in self.variables() {
            let var = &self.vars[v.0];
            let x = solution.value(v);
            if self.tol.feas_lt(x, var.local.lower) || self.tol.feas_gt(x, var.local.upper) {
                return false;
            }
            if var.vtype.is_integral() && !self.tol.is_feas_integral(x) {
                return false;
            }
        }
        self.conss
            .iter()
            .filter(|c| c.checked && !c.deleted)
            .all(|c| {
                let activity: f64 = c
                    .terms
                    .iter()
                    .map(|&(v, a)| a * self.value_of(solution, v))
                    .sum();
                !(self.tol.feas_lt(activity, c.lhs) || self.tol.feas_gt(activity, c.rhs))
            })
    }

    fn add_solution(&mut self, solution: Solution) -> bool {
        if !self.check_solution(&solution) {
            return false;
        }
        self.store_solution(solution)
    }

    fn fix_variable(&mut self, var: VarId, value: f64) -> DecompResult<()> {
        if !self.is_active(var) {
            return Err(DecompError::Instance(format!(
                "cannot fix inactive variable <{}>",
                self.vars[var.0].name
            )));
        }
        let tol = self.tol;
        let v = &mut self.vars[var.0];
        if tol.feas_lt(value, v.local.lower) || tol.feas_gt(value, v.local.upper) {
            return Err(DecompError::Instance(format!(
                "fixing <{}> to {} violates bounds [{}, {}]",
                v.name, value, v.local.lower, v.local.upper
            )));
        }
        let value = if v.vtype.is_integral() { value.round() } else { value };
        v.local = Bounds::new(value, value);
        v.global = v.local;
        Ok(())
    }

    fn delete_constraint(&mut self, cons: ConsId) -> DecompResult<()> {
        let c = &mut self.conss[cons.0];
        if c.deleted {
            return Err(DecompError::Instance(format!(
                "constraint <{}> already deleted",
                c.name
            )));
        }
        c.deleted = true;
        Ok(())
    }

    fn tighten_lower_bound(&mut self, var: VarId, value: f64) -> DecompResult<bool> {
        let tol = self.tol;
        let v = &self.vars[var.0];
        let value = if v.vtype.is_integral() {
            (value - tol.feastol).ceil()
        } else {
            value
        };
        if tol.feas_gt(value, v.local.upper) {
            return Err(DecompError::Instance(format!(
                "lower bound {} exceeds upper bound of <{}>",
                value, v.name
            )));
        }
        if !tol.approx_gt(value, v.local.lower) {
            return Ok(false);
        }
        let upper = v.local.upper;
        self.vars[var.0].local.lower = value.min(upper);
        Ok(true)
    }

    fn tighten_upper_bound(&mut self, var: VarId, value: f64) -> DecompResult<bool> {
        let tol = self.tol;
        let v = &self.vars[var.0];
        let value = if v.vtype.is_integral() {
            (value + tol.feastol).floor()
        } else {
            value
        };
        if tol.feas_lt(value, v.local.lower) {
            return Err(DecompError::Instance(format!(
                "upper bound {} is below lower bound of <{}>",
                value, v.name
            )));
        }
        if !tol.approx_lt(value, v.local.upper) {
            return Ok(false);
        }
        let lower = v.local.lower;
        self.vars[var.0].local.upper = value.max(lower);
        Ok(true)
    }

    fn update_local_lower_bound(&mut self, bound: f64) {
        if bound > self.context.local_lower_bound {
            self.context.local_lower_bound = bound;
        }
    }

    fn time_limit(&self) -> f64 {
        self.context.time_limit
    }

    fn memory_limit(&self) -> f64 {
        self.context.memory_limit
    }

    fn memory_used(&self) -> f64 {
        self.context.memory_used
    }

    fn node_limit(&self) -> u64 {
        self.context.node_limit
    }

    fn depth(&self) -> usize {
        self.context.depth
    }

    fn node_number(&self) -> u64 {
        self.context.node_number
    }

    fn is_stopped(&self) -> bool {
        self.context.stopped
    }
}
