//! Variable incidence graph.

use crate::error::{DecompError, DecompResult};
use crate::model::{ConsId, MipInstance, VarId};

/// Undirected graph over the active variables of an instance.
///
/// Two variables are adjacent when they share a checked constraint. Each
/// constraint contributes a star from its first graph variable to all of its
/// other graph variables, which is enough to preserve connectivity.
#[derive(Debug, Clone)]
pub struct IncidenceGraph {
    /// Graph nodes, in variable id order.
    pub vars: Vec<VarId>,
    /// All checked constraints, in id order.
    pub conss: Vec<ConsId>,
    /// For each entry of `conss`, the node of its first graph variable.
    pub first_node: Vec<Option<usize>>,
    /// Adjacency lists, one per node.
    pub adjacency: Vec<Vec<usize>>,
    /// Objective contribution of the variables left out as fixed.
    pub fixed_obj_sum: f64,
}

impl IncidenceGraph {
    /// Number of variables in the graph.
    pub fn node_count(&self) -> usize {
        self.vars.len()
    }

    /// Number of undirected edges, counting parallel edges separately.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    fn add_edge(&mut self, a: usize, b: usize) {
        if a != b {
            self.adjacency[a].push(b);
            self.adjacency[b].push(a);
        }
    }
}

/// Builds an [`IncidenceGraph`] from an instance.
///
/// By default, variables whose local bounds coincide are left out of the
/// graph and their `bound * objective` is summed into
/// [`fixed_obj_sum`](IncidenceGraph::fixed_obj_sum). Presolving keeps them.
#[derive(Debug, Clone)]
pub struct IncidenceGraphBuilder {
    exclude_fixed: bool,
}

impl Default for IncidenceGraphBuilder {
    fn default() -> Self {
        Self {
            exclude_fixed: true,
        }
    }
}

impl IncidenceGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether locally fixed variables are left out of the graph.
    pub fn with_exclude_fixed(mut self, exclude: bool) -> Self {
        self.exclude_fixed = exclude;
        self
    }

    /// Scans variables and checked constraints of `mip`.
    ///
    /// # Errors
    ///
    /// [`DecompError::CopyFailed`] if a constraint cannot report its variables,
    /// [`DecompError::ResourceExhausted`] if the instance is stopped while
    /// scanning.
    pub fn build<M: MipInstance>(&self, mip: &M) -> DecompResult<IncidenceGraph> {
        let tol = mip.tolerances();
        let mut node_of: Vec<Option<usize>> = vec![None; mip.var_capacity()];
        let mut vars = Vec::new();
        let mut fixed_obj_sum = 0.0;

        for var in mip.variables() {
            let bounds = mip.local_bounds(var);
            if self.exclude_fixed && !tol.approx_lt(bounds.lower, bounds.upper) {
                fixed_obj_sum += mip.objective(var) * bounds.lower;
            } else {
                node_of[var.0] = Some(vars.len());
                vars.push(var);
            }
        }

        let conss = mip.checked_constraints();
        let mut graph = IncidenceGraph {
            adjacency: vec![Vec::new(); vars.len()],
            first_node: vec![None; conss.len()],
            vars,
            conss,
            fixed_obj_sum,
        };

        for i in 0..graph.conss.len() {
            if i % 1000 == 0 && mip.is_stopped() {
                return Err(DecompError::ResourceExhausted);
            }
            let cons = graph.conss[i];
            let cons_vars = mip.constraint_variables(cons).ok_or_else(|| {
                log::debug!("constraint {} of <{}> does not report its variables", cons, mip.name());
                DecompError::CopyFailed(format!("constraint {cons} does not report its variables"))
            })?;

            let mut nodes = cons_vars
                .iter()
                .filter_map(|v| node_of.get(v.0).copied().flatten());
            let Some(first) = nodes.next() else {
                continue;
            };
            graph.first_node[i] = Some(first);
            let rest: Vec<usize> = nodes.collect();
            for other in rest {
                graph.add_edge(first, other);
            }
        }

        Ok(graph)
    }
}
