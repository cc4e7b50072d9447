//! Newton and quasi-Newton root finding.
//!
//! Drives a square nonlinear system `F(x) = 0` by repeated linearization:
//! solve `J·δ = -F(x)`, pick a step length along `δ` with the configured
//! line search, advance, and test convergence on the residual norm. With a
//! refactorization interval above one the Jacobian (and its factorization)
//! is reused across iterations, trading convergence speed for linear-solve
//! cost.

use crate::{
    error::DescentResult,
    linalg::{DenseLinearSolver, DenseLuSolver},
    linesearch::{LineSearch, LineSearchConfig, LineSearchKind},
    options::SolverOptions,
    problem::{has_nan, Residual},
    solver::{
        merit, ConvergenceInfo, ConvergenceMonitor, IterationStats, ResidualRestriction,
        SolveStatus, SolverError, SolverResult,
    },
};
use nalgebra::DVector;
use std::time;
use tracing::debug;

/// Newton iteration driver for square nonlinear systems.
///
/// # Algorithm
///
/// At each iteration k:
/// 1. Refactorize `J(xₖ)` if the refactorization interval says so
/// 2. Solve `J·δ = -F(xₖ)` for the Newton direction
/// 3. Abort on NaN in `δ`; shrink `δ` and retry while the trial residual
///    evaluates to NaN
/// 4. Run the line search on the merit `½‖F‖²` along `δ` for a step `α`
/// 5. Advance `xₖ₊₁ = xₖ + α·δ` and update the convergence monitor
///
/// # Examples
///
/// ```no_run
/// use descent_solver::solver::newton::NewtonSolver;
/// use descent_solver::problem::Residual;
/// # use nalgebra::{dvector, DMatrix, DVector};
/// # struct Cube;
/// # impl Residual for Cube {
/// #     fn dim(&self) -> usize { 1 }
/// #     fn evaluate(&self, x: &DVector<f64>) -> DVector<f64> { dvector![x[0].powi(3) - 8.0] }
/// #     fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
/// #         DMatrix::from_element(1, 1, 3.0 * x[0] * x[0])
/// #     }
/// # }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut solver = NewtonSolver::new();
/// let result = solver.solve(&Cube, &dvector![1.0])?;
/// assert!(result.status.is_converged());
/// # Ok(())
/// # }
/// ```
pub struct NewtonSolver {
    options: SolverOptions,
    line_search: LineSearch,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NewtonSolver {
    /// Create a solver with default options and a full Newton step
    /// (static line search, `α = 1`).
    pub fn new() -> Self {
        Self::with_options(SolverOptions::default())
    }

    /// Create a solver with the given options.
    pub fn with_options(options: SolverOptions) -> Self {
        Self {
            options,
            line_search: LineSearch::new(LineSearchKind::Static),
        }
    }

    /// Replace the line-search controller.
    pub fn with_line_search(mut self, line_search: LineSearch) -> Self {
        self.line_search = line_search;
        self
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn line_search_config(&self) -> &LineSearchConfig {
        self.line_search.config()
    }

    /// Solve `F(x) = 0` starting from `x0`.
    ///
    /// All terminal iteration outcomes are reported through
    /// [`SolveStatus`]; the returned parameters always hold the last valid
    /// iterate.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or non-square system and when the
    /// linear backend fails to factorize or solve.
    pub fn solve<P: Residual>(
        &mut self,
        problem: &P,
        x0: &DVector<f64>,
    ) -> DescentResult<SolverResult<DVector<f64>>> {
        let start_time = time::Instant::now();
        let n = x0.len();

        if n == 0 {
            return Err(SolverError::EmptyProblem.log().into());
        }
        if problem.dim() != n {
            return Err(SolverError::DimensionMismatch {
                residuals: problem.dim(),
                unknowns: n,
            }
            .log()
            .into());
        }

        let mut x = x0.clone();
        let mut residual = problem.evaluate(&x);
        let mut residual_evaluations = 1;
        let mut jacobian_evaluations = 0;

        if has_nan(&residual) {
            return Ok(SolverResult {
                parameters: x,
                status: SolveStatus::InvalidNumericalValues,
                initial_norm: f64::NAN,
                final_norm: f64::NAN,
                iterations: 0,
                elapsed_time: start_time.elapsed(),
                convergence_info: None,
            });
        }

        let mut norm = residual.norm();
        let initial_norm = norm;
        let mut monitor = ConvergenceMonitor::new(norm);
        let mut linear_solver = DenseLuSolver::new();
        let mut scratch = DVector::zeros(n);
        let mut step_norm = 0.0;

        if tracing::enabled!(tracing::Level::DEBUG) {
            self.options.print_configuration();
            IterationStats::print_header();
        }

        let mut status = SolveStatus::Running;
        let mut iteration = 0;

        while status == SolveStatus::Running {
            let iter_start = time::Instant::now();

            // Refactorization policy: recompute the Jacobian every
            // `refactor_interval` iterations, reuse the factorization in
            // between.
            if iteration % self.options.refactor_interval == 0 {
                let jacobian = problem.jacobian(&x);
                jacobian_evaluations += 1;
                linear_solver.factorize(&jacobian).map_err(SolverError::from)?;
            }

            let rhs = -residual.clone();
            let mut delta = linear_solver.solve(&rhs).map_err(SolverError::from)?;

            if has_nan(&delta) {
                status = SolveStatus::DirectionFailure;
                break;
            }

            // Shrink-and-retry while the full trial step evaluates to NaN.
            let mut trial_valid = false;
            for _ in 0..=self.options.nan_retry_limit {
                scratch.copy_from(&x);
                scratch.axpy(1.0, &delta, 1.0);
                let trial = problem.evaluate(&scratch);
                residual_evaluations += 1;
                if !has_nan(&trial) {
                    trial_valid = true;
                    break;
                }
                delta *= self.options.nan_shrink_factor;
            }
            if !trial_valid {
                status = SolveStatus::TrialEvaluationFailure;
                break;
            }

            // Line search on the merit ½‖F‖². For a fresh factorization
            // the Newton direction satisfies Jδ = -F, so the initial slope
            // is -‖F‖² exactly; with a reused factorization it is the
            // same quantity up to staleness.
            let phi0 = merit(&residual);
            let slope0 = -norm * norm;
            let outcome = {
                let mut restriction = ResidualRestriction::new(problem, &x, &delta, &mut scratch);
                self.line_search.search(&mut restriction, phi0, slope0)
            };
            residual_evaluations += outcome.evaluations;

            let x_prev = x.clone();
            let norm_prev = norm;
            x.axpy(outcome.alpha, &delta, 1.0);
            residual = problem.evaluate(&x);
            residual_evaluations += 1;
            norm = residual.norm();
            step_norm = outcome.alpha * delta.norm();

            status = monitor.assess(&self.options, iteration, &x, norm, step_norm, None);

            if status.is_failure() {
                // Leave the iterate at its last valid value.
                x = x_prev;
                norm = norm_prev;
            }

            if tracing::enabled!(tracing::Level::DEBUG) {
                let stats = IterationStats {
                    iteration,
                    norm,
                    norm_change: norm_prev - norm,
                    step_norm,
                    control: outcome.alpha,
                    accepted: !status.is_failure(),
                    iter_time_ms: iter_start.elapsed().as_secs_f64() * 1000.0,
                    total_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
                };
                stats.print_line();
            }

            iteration += 1;
        }

        let result = SolverResult {
            parameters: x,
            status,
            initial_norm,
            final_norm: norm,
            iterations: iteration,
            elapsed_time: start_time.elapsed(),
            convergence_info: Some(ConvergenceInfo {
                final_norm: norm,
                final_step_norm: step_norm,
                residual_evaluations,
                jacobian_evaluations,
            }),
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!("{}", result);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linesearch::LineSearchConfig;
    use nalgebra::{dvector, DMatrix};

    /// F(x) = x² - 1, roots at ±1
    struct Parabola;

    impl Residual for Parabola {
        fn dim(&self) -> usize {
            1
        }
        fn evaluate(&self, x: &DVector<f64>) -> DVector<f64> {
            dvector![x[0] * x[0] - 1.0]
        }
        fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_element(1, 1, 2.0 * x[0])
        }
    }

    /// 2x2 linear system A x = b with A = [[3, 1], [1, 2]], b = [9, 8]
    struct LinearSystem;

    impl Residual for LinearSystem {
        fn dim(&self) -> usize {
            2
        }
        fn evaluate(&self, x: &DVector<f64>) -> DVector<f64> {
            dvector![3.0 * x[0] + x[1] - 9.0, x[0] + 2.0 * x[1] - 8.0]
        }
        fn jacobian(&self, _x: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 1.0, 2.0])
        }
    }

    /// F(x) = ln(x): NaN for negative trial points
    struct LogResidual;

    impl Residual for LogResidual {
        fn dim(&self) -> usize {
            1
        }
        fn evaluate(&self, x: &DVector<f64>) -> DVector<f64> {
            dvector![x[0].ln()]
        }
        fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_element(1, 1, 1.0 / x[0])
        }
    }

    #[test]
    fn converges_to_negative_root_from_negative_start() {
        let mut solver = NewtonSolver::new();
        let result = solver.solve(&Parabola, &dvector![-3.0]).unwrap();

        assert!(result.status.is_converged());
        assert!((result.parameters[0] + 1.0).abs() < 1e-8);
    }

    #[test]
    fn linear_system_converges_in_one_iteration() {
        let options = SolverOptions::new().with_min_iterations(1);
        let mut solver = NewtonSolver::with_options(options);
        let result = solver.solve(&LinearSystem, &dvector![0.0, 0.0]).unwrap();

        assert!(result.status.is_converged());
        assert_eq!(result.iterations, 1);
        assert!((result.parameters[0] - 2.0).abs() < 1e-10);
        assert!((result.parameters[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn refactor_interval_still_converges() {
        let options = SolverOptions::new()
            .with_refactor_interval(3)
            .with_max_iterations(200);
        let mut solver = NewtonSolver::with_options(options).with_line_search(
            LineSearch::with_config(LineSearchConfig::new(LineSearchKind::Backtracking)).unwrap(),
        );
        let result = solver.solve(&Parabola, &dvector![3.0]).unwrap();

        assert!(result.status.is_converged());
        assert!((result.parameters[0] - 1.0).abs() < 1e-8);
    }

    #[test]
    fn nan_trial_shrinks_direction_and_recovers() {
        // From x = 3 the full Newton step on ln(x) lands at
        // x - x·ln(x) ≈ -0.30, where the residual is NaN; one halving of
        // the direction recovers and the solve reaches the root at 1.
        let mut solver = NewtonSolver::new();
        let result = solver.solve(&LogResidual, &dvector![3.0]).unwrap();

        assert!(!result.status.is_failure());
        assert!((result.parameters[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_start_is_rejected() {
        let mut solver = NewtonSolver::new();
        let result = solver.solve(&Parabola, &DVector::zeros(0));
        assert!(result.is_err());
    }

    #[test]
    fn divergence_reports_last_valid_iterate() {
        let options = SolverOptions::new()
            .with_break_threshold(10.0)
            .with_allow_increase(true);
        let mut solver = NewtonSolver::with_options(options).with_line_search(
            LineSearch::with_config(
                LineSearchConfig::new(LineSearchKind::Static).with_initial_step(50.0),
            )
            .unwrap(),
        );
        let result = solver.solve(&Parabola, &dvector![2.0]).unwrap();

        assert_eq!(result.status, SolveStatus::Diverged);
        // The reported iterate is finite and pre-divergence
        assert!(result.parameters[0].is_finite());
        assert_eq!(result.parameters[0], 2.0);
    }
}
