//! Problem traits consumed by the iteration drivers.
//!
//! A problem is an opaque evaluator owned by the caller and immutable for the
//! duration of a solve. Numerical failure (domain errors from `log`, `sqrt`
//! and friends) is signalled by NaN entries in the returned values rather
//! than by panicking; the drivers detect NaN and apply their retry or abort
//! policy.

use nalgebra::{DMatrix, DVector};

/// A vector-valued residual `F: R^n -> R^m` driven toward zero by the root
/// solvers, together with its Jacobian.
///
/// # Example
///
/// ```
/// use descent_solver::problem::Residual;
/// use nalgebra::{dvector, DMatrix, DVector};
///
/// struct Circle;
///
/// impl Residual for Circle {
///     fn dim(&self) -> usize {
///         2
///     }
///     fn evaluate(&self, x: &DVector<f64>) -> DVector<f64> {
///         dvector![x[0] * x[0] + x[1] * x[1] - 1.0, x[0] - x[1]]
///     }
///     fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
///         DMatrix::from_row_slice(2, 2, &[2.0 * x[0], 2.0 * x[1], 1.0, -1.0])
///     }
/// }
/// ```
pub trait Residual {
    /// Number of residual components `m`.
    fn dim(&self) -> usize;

    /// Evaluate the residual at `x`. NaN entries signal evaluation failure.
    fn evaluate(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Evaluate the Jacobian `dF/dx` at `x` (m rows, n columns).
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64>;
}

/// A scalar objective `f: R^n -> R` minimized by the optimizer, with its
/// gradient and an optional analytic Hessian.
pub trait Objective {
    /// Evaluate the objective at `x`. NaN signals evaluation failure.
    fn value(&self, x: &DVector<f64>) -> f64;

    /// Evaluate the gradient at `x`.
    fn gradient(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Evaluate the Hessian at `x`, if an analytic Hessian is available.
    ///
    /// Returning `None` (the default) restricts the optimizer to the
    /// quasi-Newton Hessian kinds.
    fn hessian(&self, _x: &DVector<f64>) -> Option<DMatrix<f64>> {
        None
    }
}

/// True if any entry of `v` is NaN.
pub(crate) fn has_nan(v: &DVector<f64>) -> bool {
    v.iter().any(|e| e.is_nan())
}
