//! Dense linear-solve backend.
//!
//! The iteration drivers hand linear systems `A·x = b` (Newton systems,
//! regularized Gauss-Newton systems) to an implementation of
//! [`DenseLinearSolver`]. Factorization and solve are separate entry points
//! so a driver running with a refactorization interval can reuse one
//! factorization across several right-hand sides.

pub mod lu;

use nalgebra::{DMatrix, DVector};
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinearSolverType {
    #[default]
    DenseLu,
}

impl Display for LinearSolverType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolverType::DenseLu => write!(f, "Dense LU"),
        }
    }
}

/// Linear algebra specific error types for descent-solver
#[derive(Debug, Clone, Error)]
pub enum LinAlgError {
    /// Matrix factorization failed
    #[error("Matrix factorization failed: {0}")]
    FactorizationFailed(String),

    /// Singular or near-singular matrix detected
    #[error("Singular matrix detected (matrix is not invertible)")]
    SingularMatrix,

    /// Solve requested before a factorization was computed
    #[error("No factorization available (call factorize first)")]
    NotFactorized,

    /// Dimensions of the matrix and right-hand side disagree
    #[error("Dimension mismatch: matrix is {rows}x{cols}, rhs has {rhs_len} entries")]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        rhs_len: usize,
    },
}

impl LinAlgError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error from a third-party
    /// library
    ///
    /// # Arguments
    /// * `source_error` - The original error from the third-party library
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Trait for dense direct solvers with separated factorize/solve phases.
///
/// Implementations must report singular systems as an error rather than
/// returning non-finite garbage, and must not retain references to their
/// inputs beyond the call.
pub trait DenseLinearSolver {
    /// Factorize the square system matrix `A`.
    ///
    /// # Errors
    /// Returns `LinAlgError` if the factorization fails or the matrix is
    /// detected to be singular.
    fn factorize(&mut self, a: &DMatrix<f64>) -> LinAlgResult<()>;

    /// Solve `A·x = b` using the most recent factorization.
    ///
    /// # Errors
    /// Returns `LinAlgError::NotFactorized` if no factorization is cached,
    /// `LinAlgError::SingularMatrix` if back-substitution produces
    /// non-finite entries.
    fn solve(&self, b: &DVector<f64>) -> LinAlgResult<DVector<f64>>;

    /// Factorize `A` and solve `A·x = b` in one call.
    fn solve_system(&mut self, a: &DMatrix<f64>, b: &DVector<f64>) -> LinAlgResult<DVector<f64>> {
        self.factorize(a)?;
        self.solve(b)
    }
}

pub use lu::DenseLuSolver;

/// Copy a nalgebra matrix into a faer matrix.
pub(crate) fn to_faer(a: &DMatrix<f64>) -> faer::Mat<f64> {
    faer::Mat::from_fn(a.nrows(), a.ncols(), |i, j| a[(i, j)])
}

/// Copy a nalgebra column vector into an n-by-1 faer matrix.
pub(crate) fn column_to_faer(v: &DVector<f64>) -> faer::Mat<f64> {
    faer::Mat::from_fn(v.len(), 1, |i, _| v[i])
}

/// Copy an n-by-1 faer matrix back into a nalgebra column vector.
pub(crate) fn column_from_faer(m: &faer::Mat<f64>) -> DVector<f64> {
    DVector::from_fn(m.nrows(), |i, _| m[(i, 0)])
}
