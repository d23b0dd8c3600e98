//! Tolerance-aware floating-point comparisons.
//!
//! All bound, gap and priority comparisons in the crate go through
//! [`Tolerances`], so that a single set of epsilons decides what "equal"
//! means for the parent search and its sub-instances alike.

use std::cmp::Ordering;

/// Numeric tolerances shared by the decomposition and the instances it drives.
///
/// Comparisons are relative: two values are considered equal when their
/// difference is at most `eps * max(1, |a|, |b|)`.
///
/// # Examples
///
/// ```
/// use u_decomp::num::Tolerances;
///
/// let tol = Tolerances::default();
/// assert!(tol.approx_eq(1.0, 1.0 + 1e-12));
/// assert!(tol.feas_le(1.0 + 1e-7, 1.0));
/// assert!(tol.is_infinity(1e20));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    /// Absolute/relative epsilon for exact comparisons.
    pub epsilon: f64,

    /// Feasibility tolerance for constraint and bound checks.
    pub feastol: f64,

    /// Values at or beyond this magnitude are treated as infinite.
    pub infinity: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            epsilon: 1e-9,
            feastol: 1e-6,
            infinity: 1e20,
        }
    }
}

impl Tolerances {
    /// Whether `x` is `+infinity` in the sense of these tolerances.
    pub fn is_infinity(&self, x: f64) -> bool {
        x >= self.infinity
    }

    /// Whether `x` is `-infinity` in the sense of these tolerances.
    pub fn is_neg_infinity(&self, x: f64) -> bool {
        x <= -self.infinity
    }

    /// Whether `x` is finite in the sense of these tolerances.
    pub fn is_finite(&self, x: f64) -> bool {
        !self.is_infinity(x) && !self.is_neg_infinity(x)
    }

    fn rel_diff(a: f64, b: f64) -> f64 {
        let scale = a.abs().max(b.abs()).max(1.0);
        (a - b) / scale
    }

    pub fn approx_eq(&self, a: f64, b: f64) -> bool {
        if a == b {
            return true;
        }
        if !a.is_finite() || !b.is_finite() {
            return false;
        }
        Self::rel_diff(a, b).abs() <= self.epsilon
    }

    pub fn approx_lt(&self, a: f64, b: f64) -> bool {
        a < b && !self.approx_eq(a, b)
    }

    pub fn approx_le(&self, a: f64, b: f64) -> bool {
        a <= b || self.approx_eq(a, b)
    }

    pub fn approx_gt(&self, a: f64, b: f64) -> bool {
        self.approx_lt(b, a)
    }

    pub fn approx_ge(&self, a: f64, b: f64) -> bool {
        self.approx_le(b, a)
    }

    pub fn feas_eq(&self, a: f64, b: f64) -> bool {
        if a == b {
            return true;
        }
        if !a.is_finite() || !b.is_finite() {
            return false;
        }
        Self::rel_diff(a, b).abs() <= self.feastol
    }

    pub fn feas_lt(&self, a: f64, b: f64) -> bool {
        a < b && !self.feas_eq(a, b)
    }

    pub fn feas_le(&self, a: f64, b: f64) -> bool {
        a <= b || self.feas_eq(a, b)
    }

    pub fn feas_gt(&self, a: f64, b: f64) -> bool {
        self.feas_lt(b, a)
    }

    pub fn feas_ge(&self, a: f64, b: f64) -> bool {
        self.feas_le(b, a)
    }

    /// Whether `x` is integral within the feasibility tolerance.
    pub fn is_feas_integral(&self, x: f64) -> bool {
        (x - x.round()).abs() <= self.feastol
    }

    /// Maps `x` onto the feastol grid so it can be compared with a total order.
    ///
    /// Values that are feasibly equal land on the same grid point (up to the
    /// rounding boundary), and the resulting order is transitive, which the
    /// tolerance comparisons are not.
    pub fn priority_key(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NEG_INFINITY;
        }
        if self.is_infinity(x) {
            return f64::INFINITY;
        }
        if self.is_neg_infinity(x) {
            return f64::NEG_INFINITY;
        }
        (x / self.feastol).round() * self.feastol
    }

    /// Total order on priority keys.
    pub fn priority_cmp(&self, a: f64, b: f64) -> Ordering {
        self.priority_key(a).total_cmp(&self.priority_key(b))
    }
}

/// Relative gap between a primal and a dual bound.
///
/// Zero when both coincide; infinite when either is infinite or when the
/// bounds have different signs; otherwise `|primal - dual| / min(|primal|, |dual|)`.
pub fn relative_gap(tol: &Tolerances, primal: f64, dual: f64) -> f64 {
    if tol.approx_eq(primal, dual) {
        return 0.0;
    }
    if !tol.is_finite(primal) || !tol.is_finite(dual) {
        return f64::INFINITY;
    }
    if primal * dual <= 0.0 {
        return f64::INFINITY;
    }
    (primal - dual).abs() / primal.abs().min(dual.abs())
}
