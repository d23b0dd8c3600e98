//! Connected components of the incidence graph.

use super::graph::IncidenceGraph;
use crate::decomp::DecompConfig;
use crate::model::{ConsId, MipInstance, VarId, VarType};

/// One connected piece of the instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Variables, in id order.
    pub vars: Vec<VarId>,
    /// Checked constraints whose first graph variable lies in this block.
    pub conss: Vec<ConsId>,
    /// Binary variables in `vars`.
    pub n_binary: usize,
    /// General integer variables in `vars`.
    pub n_integer: usize,
    /// Continuous variables in `vars`.
    pub n_continuous: usize,
    /// Sort key: discrete weight first, continuous count as tie-breaker.
    pub score: f64,
    /// `binary + int_factor * integer`.
    pub discrete_weight: f64,
}

impl Block {
    pub fn size(&self) -> usize {
        self.vars.len()
    }

    fn absorb(&mut self, other: Block) {
        self.vars.extend(other.vars);
        self.vars.sort_unstable();
        self.conss.extend(other.conss);
        self.conss.sort_unstable();
        self.n_binary += other.n_binary;
        self.n_integer += other.n_integer;
        self.n_continuous += other.n_continuous;
        self.score += other.score;
        self.discrete_weight += other.discrete_weight;
    }
}

/// Result of one detection run.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Raw components in ascending complexity.
    pub blocks: Vec<Block>,
    /// Variable count a block needs to be solved on its own.
    pub min_size: usize,
    /// Number of blocks with at least `min_size` variables.
    pub n_min_size: usize,
    /// Number of blocks small enough to be solved directly.
    pub n_max_size: usize,
    /// Objective contribution of variables left out as fixed.
    pub fixed_obj_sum: f64,
}

impl Detection {
    pub fn n_components(&self) -> usize {
        self.blocks.len()
    }

    /// Folds every block below `min_size` into the previous qualifying block.
    ///
    /// Small blocks that precede the first qualifying block go into that
    /// block. Returns `None` if no block qualifies. The result has exactly
    /// `n_min_size` blocks and still covers every variable and constraint.
    pub fn merged(&self) -> Option<Vec<Block>> {
        let mut accepted: Vec<Block> = Vec::with_capacity(self.n_min_size);
        let mut leading: Vec<Block> = Vec::new();

        for block in &self.blocks {
            if block.size() >= self.min_size {
                let mut block = block.clone();
                for small in leading.drain(..) {
                    block.absorb(small);
                }
                accepted.push(block);
            } else if let Some(last) = accepted.last_mut() {
                last.absorb(block.clone());
            } else {
                leading.push(block.clone());
            }
        }

        if accepted.is_empty() {
            None
        } else {
            Some(accepted)
        }
    }
}

/// Finds and orders the connected components of an [`IncidenceGraph`].
///
/// # Examples
///
/// ```
/// use u_decomp::decomp::DecompConfig;
/// use u_decomp::detect::{ComponentDetector, IncidenceGraphBuilder};
/// use u_decomp::model::{LinearConstraint, LinearMip, VarType};
///
/// let mut mip = LinearMip::new("two");
/// let x: Vec<_> = (0..4)
///     .map(|i| mip.add_var(format!("x{i}"), VarType::Binary, 0.0, 1.0, 1.0))
///     .collect();
/// mip.add_constraint(LinearConstraint::less_equal("a", vec![(x[0], 1.0), (x[1], 1.0)], 1.0));
/// mip.add_constraint(LinearConstraint::less_equal("b", vec![(x[2], 1.0), (x[3], 1.0)], 1.0));
///
/// let graph = IncidenceGraphBuilder::new().build(&mip).unwrap();
/// let detection = ComponentDetector::from_config(&DecompConfig::default()).detect(&mip, &graph);
/// assert_eq!(detection.n_components(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ComponentDetector {
    pub min_absolute_size: usize,
    pub min_relative_size: f64,
    pub int_factor: f64,
    pub max_integer_vars: Option<usize>,
}

impl ComponentDetector {
    pub fn from_config(config: &DecompConfig) -> Self {
        Self {
            min_absolute_size: config.min_absolute_component_size,
            min_relative_size: config.min_relative_component_size,
            int_factor: config.integer_variable_weight_factor,
            max_integer_vars: config.max_integer_vars_for_direct_solve,
        }
    }

    /// `max(min_relative_size * nvars, min_absolute_size)`.
    pub fn min_size(&self, nvars: usize) -> usize {
        let relative = (self.min_relative_size * nvars as f64) as usize;
        relative.max(self.min_absolute_size)
    }

    pub fn detect<M: MipInstance>(&self, mip: &M, graph: &IncidenceGraph) -> Detection {
        let mut detection = Detection {
            blocks: Vec::new(),
            min_size: self.min_size(mip.variables().len()),
            n_min_size: 0,
            n_max_size: 0,
            fixed_obj_sum: graph.fixed_obj_sum,
        };

        let nvars = graph.node_count();
        let (labels, count) = label_components(graph);

        let mut blocks: Vec<Block> = (0..count)
            .map(|_| Block {
                vars: Vec::new(),
                conss: Vec::new(),
                n_binary: 0,
                n_integer: 0,
                n_continuous: 0,
                score: 0.0,
                discrete_weight: 0.0,
            })
            .collect();

        for (node, &var) in graph.vars.iter().enumerate() {
            let block = &mut blocks[labels[node]];
            block.vars.push(var);
            match mip.var_type(var) {
                VarType::Binary => block.n_binary += 1,
                VarType::Integer => block.n_integer += 1,
                VarType::Continuous => block.n_continuous += 1,
            }
        }
        for (i, &cons) in graph.conss.iter().enumerate() {
            if let Some(node) = graph.first_node[i] {
                blocks[labels[node]].conss.push(cons);
            }
        }

        for block in &mut blocks {
            block.discrete_weight = block.n_binary as f64 + self.int_factor * block.n_integer as f64;
            block.score =
                1000.0 * block.discrete_weight + 950.0 * block.n_continuous as f64 / nvars as f64;
            if block.size() >= detection.min_size {
                detection.n_min_size += 1;
            }
            if let Some(max) = self.max_integer_vars {
                if block.discrete_weight <= max as f64 {
                    detection.n_max_size += 1;
                }
            }
        }

        // Stable: equal scores keep discovery order.
        blocks.sort_by(|a, b| a.score.total_cmp(&b.score));
        detection.blocks = blocks;
        detection
    }
}

/// Labels nodes with component numbers in order of first discovery.
fn label_components(graph: &IncidenceGraph) -> (Vec<usize>, usize) {
    let n = graph.node_count();
    let mut labels = vec![usize::MAX; n];
    let mut count = 0;
    let mut stack = Vec::new();

    for start in 0..n {
        if labels[start] != usize::MAX {
            continue;
        }
        labels[start] = count;
        stack.push(start);
        while let Some(node) = stack.pop() {
            for &next in &graph.adjacency[node] {
                if labels[next] == usize::MAX {
                    labels[next] = count;
                    stack.push(next);
                }
            }
        }
        count += 1;
    }

    (labels, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::IncidenceGraphBuilder;
    use crate::model::{LinearConstraint, LinearMip};

    fn detector(min_abs: usize) -> ComponentDetector {
        ComponentDetector::from_config(
            &DecompConfig::default()
                .with_min_absolute_component_size(min_abs)
                .with_min_relative_component_size(0.0),
        )
    }

    /// Blocks of the given sizes, each one covering constraint over its vars.
    fn blocks_model(sizes: &[usize]) -> LinearMip {
        let mut mip = LinearMip::new("blocks");
        for (b, &size) in sizes.iter().enumerate() {
            let vars: Vec<VarId> = (0..size)
                .map(|i| mip.add_var(format!("b{b}_{i}"), VarType::Binary, 0.0, 1.0, 1.0))
                .collect();
            let terms = vars.iter().map(|&v| (v, 1.0)).collect();
            mip.add_constraint(LinearConstraint::greater_equal(format!("cover{b}"), terms, 1.0));
        }
        mip
    }

    #[test]
    fn test_two_disjoint_constraints() {
        let mut mip = LinearMip::new("ten");
        let x: Vec<VarId> = (0..10)
            .map(|i| mip.add_var(format!("x{}", i + 1), VarType::Binary, 0.0, 1.0, 1.0))
            .collect();
        let c1 = mip.add_constraint(LinearConstraint::less_equal(
            "C1",
            x[..4].iter().map(|&v| (v, 1.0)).collect(),
            2.0,
        ));
        let c2 = mip.add_constraint(LinearConstraint::less_equal(
            "C2",
            x[4..].iter().map(|&v| (v, 1.0)).collect(),
            3.0,
        ));

        let graph = IncidenceGraphBuilder::new().build(&mip).unwrap();
        let detection = detector(1).detect(&mip, &graph);
        let sizes: Vec<usize> = detection.blocks.iter().map(Block::size).collect();
        assert_eq!(sizes, vec![4, 6]);
        assert_eq!(detection.blocks[0].conss, vec![c1]);
        assert_eq!(detection.blocks[1].conss, vec![c2]);
        assert_eq!(detection.n_min_size, 2);
    }

    #[test]
    fn test_score_orders_by_discrete_weight() {
        let mut mip = LinearMip::new("mixed");
        let a = mip.add_var("a", VarType::Integer, 0.0, 3.0, 1.0);
        let b = mip.add_var("b", VarType::Integer, 0.0, 3.0, 1.0);
        let c = mip.add_var("c", VarType::Binary, 0.0, 1.0, 1.0);
        let d = mip.add_var("d", VarType::Continuous, 0.0, 1.0, 1.0);
        mip.add_constraint(LinearConstraint::less_equal("ab", vec![(a, 1.0), (b, 1.0)], 4.0));
        mip.add_constraint(LinearConstraint::less_equal("cd", vec![(c, 1.0), (d, 1.0)], 1.0));

        let graph = IncidenceGraphBuilder::new().build(&mip).unwrap();
        let mut det = detector(1);
        det.int_factor = 2.0;
        let detection = det.detect(&mip, &graph);
        assert_eq!(detection.blocks[0].vars, vec![c, d]);
        assert!((detection.blocks[0].score - (1000.0 + 950.0 / 4.0)).abs() < 1e-9);
        assert!((detection.blocks[1].discrete_weight - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_size() {
        let det = ComponentDetector::from_config(&DecompConfig::default());
        assert_eq!(det.min_size(100), 50);
        assert_eq!(det.min_size(1000), 100);
    }

    #[test]
    fn test_merge_small_blocks() {
        let mip = blocks_model(&[2, 5, 3, 6, 1]);
        let graph = IncidenceGraphBuilder::new().build(&mip).unwrap();
        let detection = detector(5).detect(&mip, &graph);
        assert_eq!(detection.n_components(), 5);
        assert_eq!(detection.n_min_size, 2);

        let merged = detection.merged().unwrap();
        assert_eq!(merged.len(), 2);
        // sorted: 1, 2, 3, 5, 6 -> leading {1, 2, 3} join 5; nothing trails 6
        assert_eq!(merged[0].size(), 11);
        assert_eq!(merged[1].size(), 6);
        let total_conss: usize = merged.iter().map(|b| b.conss.len()).sum();
        assert_eq!(total_conss, 5);
    }

    #[test]
    fn test_trailing_small_block_joins_previous() {
        let mut mip = blocks_model(&[4, 4]);
        // two heavily weighted integers: small, but sorted last
        let p = mip.add_var("p", VarType::Integer, 0.0, 3.0, 1.0);
        let q = mip.add_var("q", VarType::Integer, 0.0, 3.0, 1.0);
        mip.add_constraint(LinearConstraint::less_equal("pq", vec![(p, 1.0), (q, 1.0)], 3.0));
        let graph = IncidenceGraphBuilder::new().build(&mip).unwrap();
        let mut det = detector(3);
        det.int_factor = 3.0;
        let detection = det.detect(&mip, &graph);
        assert_eq!(detection.blocks.last().unwrap().vars, vec![p, q]);

        let merged = detection.merged().unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merged[1].vars.contains(&p));
        assert_eq!(merged[1].conss.len(), 2);
    }

    #[test]
    fn test_none_qualify() {
        let mip = blocks_model(&[2, 3]);
        let graph = IncidenceGraphBuilder::new().build(&mip).unwrap();
        let detection = detector(10).detect(&mip, &graph);
        assert_eq!(detection.n_components(), 2);
        assert!(detection.merged().is_none());
    }

    #[test]
    fn test_single_constraint_is_one_block() {
        let mip = blocks_model(&[3]);
        let graph = IncidenceGraphBuilder::new().build(&mip).unwrap();
        let detection = detector(1).detect(&mip, &graph);
        assert_eq!(detection.n_components(), 1);
        assert_eq!(detection.blocks[0].vars, mip.variables());
        assert_eq!(detection.blocks[0].conss, mip.checked_constraints());
    }

    #[test]
    fn test_unconstrained_variables_are_own_blocks() {
        let mut mip = blocks_model(&[2]);
        let free = mip.add_var("free", VarType::Binary, 0.0, 1.0, 1.0);
        let graph = IncidenceGraphBuilder::new().build(&mip).unwrap();
        let detection = detector(1).detect(&mip, &graph);
        assert_eq!(detection.n_components(), 2);
        assert_eq!(detection.blocks[0].vars, vec![free]);
        assert!(detection.blocks[0].conss.is_empty());

        let empty = LinearMip::new("empty");
        let graph = IncidenceGraphBuilder::new().build(&empty).unwrap();
        assert_eq!(detector(1).detect(&empty, &graph).n_components(), 0);
    }

    #[test]
    fn test_max_size_count() {
        let mip = blocks_model(&[2, 8]);
        let graph = IncidenceGraphBuilder::new().build(&mip).unwrap();
        let mut det = detector(1);
        det.max_integer_vars = Some(4);
        assert_eq!(det.detect(&mip, &graph).n_max_size, 1);
        det.max_integer_vars = None;
        assert_eq!(det.detect(&mip, &graph).n_max_size, 0);
    }
}
