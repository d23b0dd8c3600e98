//! Plain data types shared by instances and the decomposition.

use std::collections::HashMap;
use std::fmt;

/// Identifies one variable inside one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarId(pub usize);

/// Identifies one constraint inside one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsId(pub usize);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl fmt::Display for ConsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Integrality class of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarType {
    /// Integer variable with bounds within [0, 1].
    Binary,
    /// General integer variable.
    Integer,
    /// Continuous variable.
    Continuous,
}

impl VarType {
    /// Whether the variable must take integral values.
    pub fn is_integral(self) -> bool {
        !matches!(self, VarType::Continuous)
    }
}

/// Lower and upper bound of a variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Midpoint of the bounds; used as the value of a fixed variable.
    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    /// Clamps `value` into the bounds.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }
}

/// Status reported by an instance after a solve call.
///
/// Modeled after the MIP status of a branch-and-bound tree: the first four
/// are conclusive, the limit variants mean the call was interrupted and may
/// be resumed with larger limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolveStatus {
    /// Not solved yet, or the solver could not handle the model.
    #[default]
    Unknown,
    /// Optimality was proven.
    Optimal,
    /// Infeasibility was proven.
    Infeasible,
    /// Unboundedness was proven.
    Unbounded,
    /// The model is infeasible or unbounded; which one is undecided.
    InfeasibleOrUnbounded,
    /// Node limit reached.
    NodeLimit,
    /// Time limit reached.
    TimeLimit,
    /// Memory limit reached.
    MemoryLimit,
    /// Gap limit reached.
    GapLimit,
    /// The solve was interrupted from outside.
    UserInterrupt,
}

impl SolveStatus {
    /// Whether the status ends the life of a component.
    pub fn is_conclusive(self) -> bool {
        matches!(
            self,
            SolveStatus::Optimal
                | SolveStatus::Infeasible
                | SolveStatus::Unbounded
                | SolveStatus::InfeasibleOrUnbounded
        )
    }
}

/// Resource limits for one solve call of a sub-instance.
///
/// `time` and `memory` are absolute limits for the instance, in seconds of
/// its own solving time and megabytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveLimits {
    /// Total number of nodes the instance may have processed after the call.
    pub nodes: u64,
    /// Relative gap at which the solve stops.
    pub gap: f64,
    /// Total solving time in seconds.
    pub time: f64,
    /// Memory limit in megabytes.
    pub memory: f64,
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self {
            nodes: u64::MAX,
            gap: 0.0,
            time: f64::INFINITY,
            memory: f64::INFINITY,
        }
    }
}

/// A (possibly partial) assignment of values to the variables of one instance.
///
/// Values are stored densely by [`VarId`]. The `id` is assigned by the
/// instance that stores the solution, so that callers can tell whether the
/// best solution changed since they last looked.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    values: Vec<f64>,
    id: Option<u64>,
}

impl Solution {
    /// Creates an all-zero solution over `n` variables.
    pub fn new(n: usize) -> Self {
        Self {
            values: vec![0.0; n],
            id: None,
        }
    }

    /// Creates a solution from explicit values.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values, id: None }
    }

    /// Value of `var`; variables beyond the stored range read as zero.
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.0).copied().unwrap_or(0.0)
    }

    /// Sets the value of `var`, growing the storage if needed.
    pub fn set_value(&mut self, var: VarId, value: f64) {
        if var.0 >= self.values.len() {
            self.values.resize(var.0 + 1, 0.0);
        }
        self.values[var.0] = value;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Identifier assigned by the instance storing this solution.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// A copy without the storage identifier.
    pub fn detached(&self) -> Self {
        Self {
            values: self.values.clone(),
            id: None,
        }
    }
}

/// Rename map from variables of a source instance to their clones.
#[derive(Debug, Clone, Default)]
pub struct VarMap {
    map: HashMap<VarId, VarId>,
}

impl VarMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: VarId) -> Option<VarId> {
        self.map.get(&source).copied()
    }

    pub fn insert(&mut self, source: VarId, target: VarId) {
        self.map.insert(source, target);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
