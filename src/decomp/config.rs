//! Decomposition configuration.

use crate::num::Tolerances;

/// Configuration for component decomposition and scheduling.
///
/// # Examples
///
/// ```
/// use u_decomp::decomp::DecompConfig;
///
/// let config = DecompConfig::default()
///     .with_max_decomposition_depth(5)
///     .with_min_absolute_component_size(20)
///     .with_integer_variable_weight_factor(1.5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecompConfig {
    /// Deepest tree node at which decomposition is attempted.
    pub max_decomposition_depth: usize,

    /// Largest discrete weight of a component solved directly during
    /// presolving. `None` disables presolve solving.
    pub max_integer_vars_for_direct_solve: Option<usize>,

    /// Minimum number of variables of a component solved on its own.
    pub min_absolute_component_size: usize,

    /// Minimum size relative to the number of variables of the instance.
    pub min_relative_component_size: f64,

    /// Node limit of a component solved during presolving.
    pub node_budget_for_presolve_attempts: u64,

    /// Weight of a general integer relative to a binary in component scores.
    pub integer_variable_weight_factor: f64,

    /// Relative drop in variable count after which presolving runs again.
    pub relative_var_decrease_before_retry: f64,

    /// Numeric tolerances for bounds, gaps and priorities.
    pub tolerances: Tolerances,

    /// Components solved per round when running in parallel.
    pub parallel_width: usize,
}

impl Default for DecompConfig {
    fn default() -> Self {
        Self {
            max_decomposition_depth: 10,
            max_integer_vars_for_direct_solve: Some(500),
            min_absolute_component_size: 50,
            min_relative_component_size: 0.1,
            node_budget_for_presolve_attempts: 10_000,
            integer_variable_weight_factor: 1.0,
            relative_var_decrease_before_retry: 0.2,
            tolerances: Tolerances::default(),
            parallel_width: 4,
        }
    }
}

impl DecompConfig {
    pub fn with_max_decomposition_depth(mut self, depth: usize) -> Self {
        self.max_decomposition_depth = depth;
        self
    }

    pub fn with_max_integer_vars_for_direct_solve(mut self, n: Option<usize>) -> Self {
        self.max_integer_vars_for_direct_solve = n;
        self
    }

    pub fn with_min_absolute_component_size(mut self, n: usize) -> Self {
        self.min_absolute_component_size = n;
        self
    }

    pub fn with_min_relative_component_size(mut self, fraction: f64) -> Self {
        self.min_relative_component_size = fraction;
        self
    }

    pub fn with_node_budget_for_presolve_attempts(mut self, nodes: u64) -> Self {
        self.node_budget_for_presolve_attempts = nodes;
        self
    }

    pub fn with_integer_variable_weight_factor(mut self, factor: f64) -> Self {
        self.integer_variable_weight_factor = factor;
        self
    }

    pub fn with_relative_var_decrease_before_retry(mut self, fraction: f64) -> Self {
        self.relative_var_decrease_before_retry = fraction;
        self
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    pub fn with_parallel_width(mut self, width: usize) -> Self {
        self.parallel_width = width;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_relative_component_size) {
            return Err(format!(
                "min_relative_component_size must be in [0, 1], got {}",
                self.min_relative_component_size
            ));
        }
        let factor = self.integer_variable_weight_factor;
        if factor.is_nan() || factor < 0.0 {
            return Err(format!(
                "integer_variable_weight_factor must be non-negative, got {}",
                self.integer_variable_weight_factor
            ));
        }
        if !(0.0..=1.0).contains(&self.relative_var_decrease_before_retry) {
            return Err(format!(
                "relative_var_decrease_before_retry must be in [0, 1], got {}",
                self.relative_var_decrease_before_retry
            ));
        }
        if self.node_budget_for_presolve_attempts == 0 {
            return Err("node_budget_for_presolve_attempts must be positive".into());
        }
        if self.parallel_width == 0 {
            return Err("parallel_width must be positive".into());
        }
        let tol = &self.tolerances;
        if !(tol.epsilon > 0.0 && tol.feastol >= tol.epsilon && tol.infinity > 1.0) {
            return Err(format!(
                "tolerances must satisfy 0 < epsilon <= feastol and infinity > 1, got {tol:?}"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DecompConfig::default();
        assert_eq!(config.max_decomposition_depth, 10);
        assert_eq!(config.max_integer_vars_for_direct_solve, Some(500));
        assert_eq!(config.min_absolute_component_size, 50);
        assert!((config.min_relative_component_size - 0.1).abs() < 1e-12);
        assert_eq!(config.node_budget_for_presolve_attempts, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        assert!(DecompConfig::default()
            .with_min_relative_component_size(1.5)
            .validate()
            .is_err());
        assert!(DecompConfig::default()
            .with_integer_variable_weight_factor(f64::NAN)
            .validate()
            .is_err());
        assert!(DecompConfig::default()
            .with_relative_var_decrease_before_retry(-0.1)
            .validate()
            .is_err());
        assert!(DecompConfig::default()
            .with_node_budget_for_presolve_attempts(0)
            .validate()
            .is_err());
        assert!(DecompConfig::default().with_parallel_width(0).validate().is_err());
        assert!(DecompConfig::default()
            .with_tolerances(Tolerances {
                epsilon: 1e-3,
                feastol: 1e-6,
                infinity: 1e20,
            })
            .validate()
            .is_err());
    }
}
