//! The decomposition context of one search node.

use super::component::Component;
use super::config::DecompConfig;
use super::factory::ComponentFactory;
use super::scheduler::ComponentQueue;
use crate::detect::{Block, ComponentDetector, IncidenceGraphBuilder};
use crate::error::{DecompError, DecompResult};
use crate::model::{MipInstance, Solution};
use crate::num::Tolerances;

/// A decomposed node: its components, their queue and the aggregated results.
///
/// Created once per decomposition attempt and dropped when scheduling ends
/// or the node is abandoned. Components are owned exclusively by the
/// problem; the queue refers to them by number.
#[derive(Debug)]
pub struct Problem<M: MipInstance> {
    pub(crate) name: String,
    pub(crate) components: Vec<Component<M>>,
    pub(crate) queue: ComponentQueue,
    pub(crate) best_solution: Solution,
    pub(crate) fixed_obj_sum: f64,
    pub(crate) lower_bound: f64,
    pub(crate) n_inf_dual: usize,
    pub(crate) n_feasible_components: usize,
    pub(crate) n_solved_components: usize,
    pub(crate) node_number: u64,
    pub(crate) tol: Tolerances,
}

impl<M: MipInstance> Problem<M> {
    /// Detects components at the current node of `parent` and builds a
    /// problem from them.
    ///
    /// Returns `Ok(None)` if fewer than two components reach the minimum
    /// size; smaller components are folded into qualifying ones.
    ///
    /// # Errors
    ///
    /// - [`DecompError::InvalidConfig`] if `config` does not validate
    /// - [`DecompError::CopyFailed`] if a constraint hides its variables or any
    ///   component cannot be cloned; nothing is kept in that case
    /// - [`DecompError::ResourceExhausted`] if the parent stops meanwhile
    pub fn create(parent: &M, config: &DecompConfig) -> DecompResult<Option<Self>> {
        config.validate().map_err(DecompError::InvalidConfig)?;

        let graph = IncidenceGraphBuilder::new().build(parent)?;
        let detection = ComponentDetector::from_config(config).detect(parent, &graph);
        if detection.n_min_size < 2 {
            return Ok(None);
        }
        let Some(blocks) = detection.merged() else {
            return Ok(None);
        };

        log::info!(
            "found {} components ({} fulfilling the minsize requirement) at node {}, depth {}",
            detection.n_components(),
            detection.n_min_size,
            parent.node_number(),
            parent.depth()
        );

        Self::from_blocks(parent, &blocks, detection.fixed_obj_sum, config.tolerances).map(Some)
    }

    /// Builds a problem from an explicit partition.
    ///
    /// `blocks` must cover every graph variable and constraint exactly once.
    pub fn from_blocks(
        parent: &M,
        blocks: &[Block],
        fixed_obj_sum: f64,
        tol: Tolerances,
    ) -> DecompResult<Self> {
        let name = if parent.depth() == 0 {
            parent.name().to_string()
        } else {
            format!("{}_node_{}", parent.name(), parent.node_number())
        };

        let mut best_solution = Solution::new(parent.var_capacity());
        for var in parent.variables() {
            let bounds = parent.local_bounds(var);
            if tol.feas_eq(bounds.lower, bounds.upper) {
                best_solution.set_value(var, bounds.midpoint());
            }
        }

        let parent_best = parent.best_solution();
        let mut components = Vec::with_capacity(blocks.len());
        let mut queue = ComponentQueue::new(tol);
        for (number, block) in blocks.iter().enumerate() {
            if parent.is_stopped() {
                return Err(DecompError::ResourceExhausted);
            }
            let component = ComponentFactory::build(parent, &name, number, block, parent_best)
                .map_err(|e| {
                    log::debug!("problem <{name}>: component {number} could not be built: {e}");
                    e
                })?;
            queue.push(&component);
            components.push(component);
        }

        log::debug!(
            "initialized problem <{name}> with {} components, fixed objective {fixed_obj_sum}",
            components.len()
        );

        Ok(Self {
            name,
            n_inf_dual: components.len(),
            components,
            queue,
            best_solution,
            fixed_obj_sum,
            lower_bound: fixed_obj_sum,
            n_feasible_components: 0,
            n_solved_components: 0,
            node_number: parent.node_number(),
            tol,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> &[Component<M>] {
        &self.components
    }

    pub fn component(&self, number: usize) -> Option<&Component<M>> {
        self.components.get(number)
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Components still waiting in the queue.
    pub fn n_pending(&self) -> usize {
        self.queue.len()
    }

    /// Assembled solution over the parent's variables.
    pub fn best_solution(&self) -> &Solution {
        &self.best_solution
    }

    /// Objective contribution of variables fixed at this node.
    pub fn fixed_obj_sum(&self) -> f64 {
        self.fixed_obj_sum
    }

    /// `fixed_obj_sum` plus the finite component dual bounds.
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// Components without a finite dual bound yet.
    pub fn n_inf_dual(&self) -> usize {
        self.n_inf_dual
    }

    /// Components that have reported at least one feasible solution.
    pub fn n_feasible_components(&self) -> usize {
        self.n_feasible_components
    }

    /// Components solved to optimality and merged into the parent.
    pub fn n_solved_components(&self) -> usize {
        self.n_solved_components
    }

    /// Number of the node this problem was created at.
    pub fn node_number(&self) -> u64 {
        self.node_number
    }

    /// Whether no component is left to schedule.
    pub fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether every component was solved and merged.
    pub fn all_merged(&self) -> bool {
        self.n_solved_components == self.components.len()
    }
}
