//! Dense LU solver backed by faer's partial-pivoting factorization.

use faer::linalg::solvers::{PartialPivLu, Solve};
use nalgebra::{DMatrix, DVector};

use crate::linalg::{
    column_from_faer, column_to_faer, to_faer, DenseLinearSolver, LinAlgError, LinAlgResult,
};

/// Dense partial-pivoting LU solver.
///
/// The factorization is cached between calls so that drivers running with a
/// refactorization interval can solve several right-hand sides against one
/// Jacobian.
///
/// Partial pivoting always produces a factorization; singularity surfaces as
/// non-finite entries during back-substitution, which this solver detects
/// and reports as [`LinAlgError::SingularMatrix`].
pub struct DenseLuSolver {
    factorization: Option<PartialPivLu<f64>>,
    dim: usize,
}

impl DenseLuSolver {
    pub fn new() -> Self {
        DenseLuSolver {
            factorization: None,
            dim: 0,
        }
    }

    /// True if a factorization is cached.
    pub fn is_factorized(&self) -> bool {
        self.factorization.is_some()
    }

    /// Drop the cached factorization.
    pub fn reset(&mut self) {
        self.factorization = None;
        self.dim = 0;
    }
}

impl Default for DenseLuSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DenseLinearSolver for DenseLuSolver {
    fn factorize(&mut self, a: &DMatrix<f64>) -> LinAlgResult<()> {
        if a.nrows() != a.ncols() {
            return Err(LinAlgError::FactorizationFailed(format!(
                "LU requires a square matrix, got {}x{}",
                a.nrows(),
                a.ncols()
            ))
            .log());
        }
        if a.iter().any(|e| !e.is_finite()) {
            return Err(LinAlgError::FactorizationFailed(
                "matrix contains non-finite entries".to_string(),
            )
            .log());
        }

        let dense = to_faer(a);
        self.factorization = Some(PartialPivLu::new(dense.as_ref()));
        self.dim = a.nrows();
        Ok(())
    }

    fn solve(&self, b: &DVector<f64>) -> LinAlgResult<DVector<f64>> {
        let lu = self.factorization.as_ref().ok_or(LinAlgError::NotFactorized)?;

        if b.len() != self.dim {
            return Err(LinAlgError::DimensionMismatch {
                rows: self.dim,
                cols: self.dim,
                rhs_len: b.len(),
            }
            .log());
        }

        let rhs = column_to_faer(b);
        let solution = lu.solve(rhs.as_ref());

        // A zero pivot propagates Inf/NaN through back-substitution.
        for i in 0..solution.nrows() {
            if !solution[(i, 0)].is_finite() {
                return Err(LinAlgError::SingularMatrix.log());
            }
        }

        Ok(column_from_faer(&solution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn solves_well_conditioned_system() {
        // A = [[2, 1], [1, 3]], b = [3, 5] -> x = [4/5, 7/5]
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let b = dvector![3.0, 5.0];

        let mut solver = DenseLuSolver::new();
        let x = solver.solve_system(&a, &b).unwrap();

        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn reuses_factorization_for_multiple_rhs() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 2.0]);
        let mut solver = DenseLuSolver::new();
        solver.factorize(&a).unwrap();

        let x1 = solver.solve(&dvector![4.0, 2.0]).unwrap();
        let x2 = solver.solve(&dvector![8.0, 6.0]).unwrap();

        assert!((x1[0] - 1.0).abs() < 1e-12 && (x1[1] - 1.0).abs() < 1e-12);
        assert!((x2[0] - 2.0).abs() < 1e-12 && (x2[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn reports_singular_matrix() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = dvector![1.0, 1.0];

        let mut solver = DenseLuSolver::new();
        let result = solver.solve_system(&a, &b);
        assert!(matches!(result, Err(LinAlgError::SingularMatrix)));
    }

    #[test]
    fn solve_before_factorize_is_an_error() {
        let solver = DenseLuSolver::new();
        assert!(matches!(
            solver.solve(&dvector![1.0]),
            Err(LinAlgError::NotFactorized)
        ));
    }
}
