//! Quasi-Newton inverse-Hessian approximations.
//!
//! The optimizer can run without second derivatives by maintaining a dense
//! approximation `Q` of the inverse Hessian, corrected after every accepted
//! step from the displacement `Δx = x - x̄` and the gradient difference
//! `Δg = g - ḡ`. Both supported updates (BFGS and DFP) are rank-2
//! corrections that keep `Q` exactly symmetric and, under the usual
//! step-size conditions, positive-definite.
//!
//! When the curvature denominator `Δx·Δg` is numerically zero the update is
//! skipped: near flat regions this is expected, and skipping preserves
//! positive-definiteness where dividing by the degenerate denominator would
//! destroy it.

use nalgebra::{DMatrix, DVector};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// Type of Hessian information used by the optimizer
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum HessianKind {
    /// Analytic Hessian from the problem, solved each iteration
    Exact,
    /// BFGS inverse-Hessian approximation
    #[default]
    Bfgs,
    /// DFP inverse-Hessian approximation
    Dfp,
}

impl Display for HessianKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            HessianKind::Exact => write!(f, "Exact"),
            HessianKind::Bfgs => write!(f, "BFGS"),
            HessianKind::Dfp => write!(f, "DFP"),
        }
    }
}

/// Dense approximate inverse Hessian with rank-2 quasi-Newton updates.
///
/// Initialized to the identity; [`InverseHessian::reset`] restores it, which
/// the optimizer uses when the approximation stops producing descent
/// directions.
#[derive(Debug, Clone)]
pub struct InverseHessian {
    kind: HessianKind,
    q: DMatrix<f64>,
}

impl InverseHessian {
    /// Create an identity approximation of dimension `n` for the given
    /// update rule. `HessianKind::Exact` yields an inert instance whose
    /// updates are no-ops; the optimizer does not construct one in that
    /// mode.
    pub fn new(kind: HessianKind, n: usize) -> Self {
        Self {
            kind,
            q: DMatrix::identity(n, n),
        }
    }

    pub fn kind(&self) -> HessianKind {
        self.kind
    }

    /// Current approximation matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.q
    }

    /// Restore the identity.
    pub fn reset(&mut self) {
        self.q.fill_with_identity();
    }

    /// Quasi-Newton search direction `-Q·g`.
    pub fn direction(&self, gradient: &DVector<f64>) -> DVector<f64> {
        -(&self.q * gradient)
    }

    /// Apply the rank-2 correction for one accepted step.
    ///
    /// Returns `true` if the matrix was updated, `false` if the update was
    /// skipped because the curvature denominator is degenerate.
    pub fn update(&mut self, dx: &DVector<f64>, dg: &DVector<f64>) -> bool {
        match self.kind {
            HessianKind::Exact => false,
            HessianKind::Bfgs => self.update_bfgs(dx, dg),
            HessianKind::Dfp => self.update_dfp(dx, dg),
        }
    }

    /// BFGS inverse update:
    /// `Q += (1 + ΔgᵗQΔg/s)·ΔxΔxᵗ/s − (QΔg·Δxᵗ + Δx·ΔgᵗQ)/s`, `s = Δx·Δg`.
    fn update_bfgs(&mut self, dx: &DVector<f64>, dg: &DVector<f64>) -> bool {
        let s = dx.dot(dg);
        if curvature_degenerate(s, dx, dg) {
            return false;
        }

        let qdg = &self.q * dg;
        let dg_q_dg = dg.dot(&qdg);
        let factor = (1.0 + dg_q_dg / s) / s;

        let n = self.q.nrows();
        // Elementwise symmetric form: Q stays exactly equal to its
        // transpose.
        for i in 0..n {
            for j in 0..n {
                self.q[(i, j)] +=
                    factor * dx[i] * dx[j] - (qdg[i] * dx[j] + dx[i] * qdg[j]) / s;
            }
        }
        true
    }

    /// DFP inverse update:
    /// `Q += ΔxΔxᵗ/s − (QΔg)(QΔg)ᵗ/ΔgᵗQΔg`, `s = Δx·Δg`.
    fn update_dfp(&mut self, dx: &DVector<f64>, dg: &DVector<f64>) -> bool {
        let s = dx.dot(dg);
        if curvature_degenerate(s, dx, dg) {
            return false;
        }

        let qdg = &self.q * dg;
        let dg_q_dg = dg.dot(&qdg);
        if dg_q_dg.abs() <= f64::EPSILON * dg.norm_squared() {
            return false;
        }

        let n = self.q.nrows();
        for i in 0..n {
            for j in 0..n {
                self.q[(i, j)] += dx[i] * dx[j] / s - qdg[i] * qdg[j] / dg_q_dg;
            }
        }
        true
    }
}

/// Scale-invariant test for a degenerate curvature denominator.
fn curvature_degenerate(s: f64, dx: &DVector<f64>, dg: &DVector<f64>) -> bool {
    !s.is_finite() || s.abs() <= f64::EPSILON.sqrt() * dx.norm() * dg.norm()
}
