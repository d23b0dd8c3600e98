//! Direct solving of small components before the search starts.

use super::aggregate::{clamp_to_parent, fix_and_delete, tighten_parent_bounds, validate_clamped};
use super::component::resource_budget;
use super::config::DecompConfig;
use super::factory::ComponentFactory;
use super::types::{ComponentState, PropResult};
use crate::detect::{ComponentDetector, IncidenceGraphBuilder};
use crate::error::{DecompError, DecompResult};
use crate::model::{MipInstance, SolveLimits, SolveStatus};

/// What one presolve run changed in the parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PresolveStats {
    /// Components found, including those too large to solve directly.
    pub n_components: usize,
    /// Components solved to optimality and removed.
    pub n_solved: usize,
    pub n_fixed_vars: usize,
    pub n_deleted_conss: usize,
    pub n_tightened_bounds: usize,
}

/// Solves the small components of `parent` to optimality and removes them.
///
/// Every variable takes part in detection, fixed ones included. Components
/// are taken in ascending complexity while their discrete weight stays
/// within `max_integer_vars_for_direct_solve`; the last remaining component
/// is never solved here.
///
/// # Errors
///
/// [`DecompError::InvalidConfig`] for a bad `config`, and
/// [`DecompError::Instance`] if the parent rejects a modification. Copy
/// failures and exhausted budgets end the run with whatever was achieved so
/// far.
pub fn presolve_components<M: MipInstance>(
    parent: &mut M,
    config: &DecompConfig,
) -> DecompResult<(PropResult, PresolveStats)> {
    config.validate().map_err(DecompError::InvalidConfig)?;
    let mut stats = PresolveStats::default();

    let graph = match IncidenceGraphBuilder::new().with_exclude_fixed(false).build(&*parent) {
        Ok(graph) => graph,
        Err(DecompError::CopyFailed(reason) | DecompError::Instance(reason)) => {
            log::debug!("presolve: no detection ({reason})");
            return Ok((PropResult::DidNotFind, stats));
        }
        Err(DecompError::ResourceExhausted) => return Ok((PropResult::DidNotFind, stats)),
        Err(e) => return Err(e),
    };
    let detection = ComponentDetector::from_config(config).detect(&*parent, &graph);
    stats.n_components = detection.n_components();
    let Some(max_weight) = config.max_integer_vars_for_direct_solve else {
        return Ok((PropResult::DidNotFind, stats));
    };
    if stats.n_components < 2 || detection.n_max_size == 0 {
        return Ok((PropResult::DidNotFind, stats));
    }
    log::info!(
        "presolve: found {} components, {} small enough to solve",
        stats.n_components,
        detection.n_max_size
    );

    let tol = config.tolerances;
    let name = parent.name().to_string();
    let mut result = PropResult::DidNotFind;

    for (number, block) in detection.blocks.iter().enumerate() {
        if parent.is_stopped() || stats.n_solved + 1 >= stats.n_components {
            break;
        }
        if block.conss.is_empty() || block.discrete_weight > max_weight as f64 {
            continue;
        }

        let mut component = match ComponentFactory::build(&*parent, &name, number, block, None) {
            Ok(component) => component,
            Err(e) => {
                log::debug!("presolve: component {number} skipped: {e}");
                continue;
            }
        };

        let (time, memory) = match resource_budget(&*parent, component.sub_ref()?, &tol) {
            Ok(budget) => budget,
            Err(DecompError::ResourceExhausted) => break,
            Err(e) => return Err(e),
        };
        let limits = SolveLimits {
            nodes: config.node_budget_for_presolve_attempts,
            gap: 0.0,
            time,
            memory,
        };

        match component.run(&limits)? {
            SolveStatus::Optimal => {
                let sub = component.sub_ref()?;
                let Some(best) = sub.best_solution() else {
                    continue;
                };
                let (values, clamped) =
                    clamp_to_parent(&*parent, &component.vars, &component.subvars, best, &tol);
                if clamped {
                    if let Err(reason) =
                        validate_clamped(sub, &component.subvars, &values, best, &tol)
                    {
                        log::debug!("presolve: component {number} not merged: {reason}");
                        continue;
                    }
                }
                fix_and_delete(parent, &component.vars, &values, &component.conss)?;
                stats.n_fixed_vars += values.len();
                stats.n_deleted_conss += component.conss.len();
                stats.n_solved += 1;
                component.release(ComponentState::Optimal);
                result = PropResult::Success;
            }
            SolveStatus::Infeasible => {
                log::debug!("presolve: component {number} is infeasible");
                result = PropResult::Cutoff;
                break;
            }
            SolveStatus::Unbounded | SolveStatus::InfeasibleOrUnbounded => {
                log::debug!("presolve: component {number} is unbounded");
                result = PropResult::Unbounded;
                break;
            }
            _ => {
                let sub = component.sub_ref()?;
                if sub.solution_count() == 0 {
                    match tighten_parent_bounds(
                        parent,
                        number,
                        &component.vars,
                        &component.subvars,
                        sub,
                    ) {
                        Ok(0) => {}
                        Ok(n) => {
                            stats.n_tightened_bounds += n;
                            result = PropResult::Success;
                        }
                        Err(DecompError::Infeasible { .. }) => {
                            log::debug!("presolve: component {number} contradicts the parent");
                            result = PropResult::Cutoff;
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    log::info!(
        "presolve: solved {} components, fixed {} vars, deleted {} conss, tightened {} bounds",
        stats.n_solved,
        stats.n_fixed_vars,
        stats.n_deleted_conss,
        stats.n_tightened_bounds
    );
    Ok((result, stats))
}
