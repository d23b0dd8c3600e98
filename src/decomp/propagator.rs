//! Entry points called by the parent search.

use super::config::DecompConfig;
use super::presolve::{presolve_components, PresolveStats};
use super::problem::Problem;
use super::types::PropResult;
use crate::error::{DecompError, DecompResult};
use crate::model::MipInstance;

/// Drives component decomposition from the parent's propagation and
/// presolving callbacks.
///
/// Holds at most one [`Problem`], for the node it was created at. At the
/// root, a call keeps ticking until the problem is decided, the parent
/// stops or its node limit is reached; below the root each call runs a
/// single tick and returns [`PropResult::Delay`] while work remains.
///
/// # Examples
///
/// ```
/// use u_decomp::decomp::{ComponentsPropagator, DecompConfig, PropResult};
/// use u_decomp::model::{LinearConstraint, LinearMip, MipInstance, VarType};
///
/// let mut mip = LinearMip::new("pairs");
/// let x: Vec<_> = (0..4)
///     .map(|i| mip.add_var(format!("x{i}"), VarType::Binary, 0.0, 1.0, 1.0))
///     .collect();
/// mip.add_constraint(LinearConstraint::greater_equal("a", vec![(x[0], 1.0), (x[1], 1.0)], 1.0));
/// mip.add_constraint(LinearConstraint::greater_equal("b", vec![(x[2], 1.0), (x[3], 1.0)], 1.0));
///
/// let config = DecompConfig::default()
///     .with_min_absolute_component_size(2)
///     .with_min_relative_component_size(0.0);
/// let mut propagator = ComponentsPropagator::new(config).unwrap();
///
/// assert_eq!(propagator.propagate(&mut mip).unwrap(), PropResult::Cutoff);
/// assert_eq!(mip.primal_bound(), 2.0);
/// ```
#[derive(Debug)]
pub struct ComponentsPropagator<M: MipInstance> {
    config: DecompConfig,
    problem: Option<Problem<M>>,
    last_presolve_nvars: Option<usize>,
    last_presolve_stats: Option<PresolveStats>,
}

impl<M: MipInstance> ComponentsPropagator<M> {
    /// # Errors
    ///
    /// [`DecompError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: DecompConfig) -> DecompResult<Self> {
        config.validate().map_err(DecompError::InvalidConfig)?;
        Ok(Self {
            config,
            problem: None,
            last_presolve_nvars: None,
            last_presolve_stats: None,
        })
    }

    pub fn config(&self) -> &DecompConfig {
        &self.config
    }

    /// The decomposition of the current node, if one is in progress.
    pub fn problem(&self) -> Option<&Problem<M>> {
        self.problem.as_ref()
    }

    /// Statistics of the last presolve run.
    pub fn last_presolve_stats(&self) -> Option<&PresolveStats> {
        self.last_presolve_stats.as_ref()
    }

    /// Decomposes the current node of `parent` (or continues a decomposition
    /// of it) and solves components.
    ///
    /// # Errors
    ///
    /// Only [`DecompError::Instance`] escapes; see
    /// [`Problem::solve_step`].
    pub fn propagate(&mut self, parent: &mut M) -> DecompResult<PropResult> {
        self.drive(parent, |problem, parent| problem.solve_step(parent))
    }

    fn drive<F>(&mut self, parent: &mut M, mut step: F) -> DecompResult<PropResult>
    where
        F: FnMut(&mut Problem<M>, &mut M) -> DecompResult<PropResult>,
    {
        if parent.variables().is_empty()
            || parent.is_stopped()
            || parent.depth() > self.config.max_decomposition_depth
        {
            return Ok(PropResult::DidNotRun);
        }

        if let Some(problem) = &self.problem {
            if problem.node_number() != parent.node_number() {
                log::debug!(
                    "dropping decomposition <{}> of node {}",
                    problem.name(),
                    problem.node_number()
                );
                self.problem = None;
            }
        }

        let problem = match self.problem.take() {
            Some(problem) => problem,
            None => match Problem::create(&*parent, &self.config) {
                Ok(Some(problem)) => problem,
                Ok(None) => return Ok(PropResult::DidNotFind),
                Err(DecompError::CopyFailed(reason)) => {
                    log::debug!("decomposition abandoned: {reason}");
                    return Ok(PropResult::DidNotFind);
                }
                Err(DecompError::ResourceExhausted) => return Ok(PropResult::DidNotFind),
                Err(e) => return Err(e),
            },
        };
        let problem = self.problem.insert(problem);

        let mut result = step(&mut *problem, &mut *parent)?;
        while result == PropResult::Delay
            && parent.depth() == 0
            && !parent.is_stopped()
            && parent.node_count() < parent.node_limit()
        {
            result = step(&mut *problem, &mut *parent)?;
        }

        if matches!(result, PropResult::Cutoff | PropResult::Unbounded) || problem.is_finished() {
            self.problem = None;
        }
        Ok(result)
    }

    /// Solves small components directly and removes them from `parent`.
    ///
    /// Runs on the first call, then again only once the number of variables
    /// dropped by `relative_var_decrease_before_retry` since the last run.
    ///
    /// # Errors
    ///
    /// Only [`DecompError::Instance`] escapes.
    pub fn presolve(&mut self, parent: &mut M) -> DecompResult<PropResult> {
        if parent.is_stopped() {
            return Ok(PropResult::DidNotRun);
        }
        let nvars = parent.variables().len();
        if let Some(last) = self.last_presolve_nvars {
            let limit = (1.0 - self.config.relative_var_decrease_before_retry) * last as f64;
            if nvars as f64 > limit {
                return Ok(PropResult::DidNotRun);
            }
        }

        let (result, stats) = presolve_components(parent, &self.config)?;
        self.last_presolve_nvars = Some(parent.variables().len());
        self.last_presolve_stats = Some(stats);
        Ok(result)
    }

    /// Forgets the decomposition of the current node.
    pub fn abandon_node(&mut self) {
        if let Some(problem) = self.problem.take() {
            log::debug!("abandoned decomposition <{}>", problem.name());
        }
    }
}

#[cfg(feature = "parallel")]
impl<M: MipInstance + Send> ComponentsPropagator<M> {
    /// Like [`propagate`](Self::propagate), solving `parallel_width`
    /// components per round.
    pub fn propagate_parallel(&mut self, parent: &mut M) -> DecompResult<PropResult> {
        let width = self.config.parallel_width;
        self.drive(parent, |problem, parent| problem.solve_round(parent, width))
    }
}
