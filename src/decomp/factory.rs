//! Builds components from detected blocks.

use std::collections::HashSet;

use super::component::Component;
use super::types::ComponentState;
use crate::detect::Block;
use crate::error::DecompResult;
use crate::model::{MipInstance, Solution, SolveStatus, VarMap};

/// Clones a block of the parent into an isolated sub-instance.
pub struct ComponentFactory;

impl ComponentFactory {
    /// Creates component `number` of `problem_name` from `block`.
    ///
    /// Variables are cloned first, in block order, then constraints. Any
    /// variable a constraint pulls in on top of those is recorded as
    /// collateral; globally fixed collateral variables contribute
    /// `bound * objective` to the component's collateral objective sum and get
    /// their bound in the working solution. The working solution is seeded
    /// from `parent_best` when given.
    ///
    /// # Errors
    ///
    /// [`DecompError::CopyFailed`](crate::DecompError::CopyFailed) if the
    /// sub-instance cannot be created or any entity cannot be cloned.
    pub fn build<M: MipInstance>(
        parent: &M,
        problem_name: &str,
        number: usize,
        block: &Block,
        parent_best: Option<&Solution>,
    ) -> DecompResult<Component<M>> {
        let name = format!("{problem_name}_comp_{number}");
        let mut sub = parent.create_sub_instance(&name)?;
        let mut map = VarMap::new();

        let mut subvars = Vec::with_capacity(block.vars.len());
        for &var in &block.vars {
            subvars.push(parent.clone_variable(var, &mut sub, &mut map)?);
        }
        for &cons in &block.conss {
            parent.clone_constraint(cons, &mut sub, &mut map)?;
        }

        let tol = sub.tolerances();
        let mut working = Solution::new(sub.var_capacity());
        let own: HashSet<_> = subvars.iter().copied().collect();
        let mut collateral_vars = Vec::new();
        let mut collateral_obj_sum = 0.0;
        for var in sub.variables() {
            if own.contains(&var) {
                continue;
            }
            let bounds = sub.global_bounds(var);
            if tol.approx_eq(bounds.lower, bounds.upper) {
                collateral_obj_sum += bounds.lower * sub.objective(var);
                working.set_value(var, bounds.lower);
            }
            collateral_vars.push(var);
        }
        if !collateral_vars.is_empty() {
            log::debug!(
                "component <{name}>: {} collateral variables, objective contribution {collateral_obj_sum}",
                collateral_vars.len()
            );
        }

        if let Some(best) = parent_best {
            for (&var, &subvar) in block.vars.iter().zip(&subvars) {
                working.set_value(subvar, best.value(var));
            }
        }

        log::debug!(
            "built sub-instance <{name}>: {} vars, {} conss",
            block.vars.len(),
            block.conss.len()
        );

        Ok(Component {
            number,
            name,
            vars: block.vars.clone(),
            subvars,
            conss: block.conss.clone(),
            collateral_vars,
            collateral_obj_sum,
            last_dual_bound: f64::NEG_INFINITY,
            last_primal_bound: f64::INFINITY,
            last_node_limit: 0,
            last_status: SolveStatus::Unknown,
            state: ComponentState::Pending,
            ncalls: 0,
            last_sol_seen: None,
            last_parent_sol: None,
            sub: Some(sub),
            working_solution: Some(working),
        })
    }
}
