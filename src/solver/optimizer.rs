//! Newton and quasi-Newton minimization.
//!
//! Minimizes a scalar objective by stepping along a descent direction
//! obtained from either the analytic Hessian (`H·δ = -g` through the linear
//! backend) or a maintained inverse-Hessian approximation (`δ = -Q·g`, no
//! linear solve). A line search picks the step length; BFGS/DFP corrections
//! are applied after every accepted step.

use crate::{
    error::DescentResult,
    linalg::{DenseLinearSolver, DenseLuSolver},
    linesearch::{LineSearch, LineSearchConfig, LineSearchKind},
    options::SolverOptions,
    problem::{has_nan, Objective},
    quasi_newton::{HessianKind, InverseHessian},
    solver::{
        ConvergenceInfo, ConvergenceMonitor, IterationStats, ObjectiveRestriction, SolveStatus,
        SolverError, SolverResult,
    },
};
use nalgebra::DVector;
use std::time;
use tracing::debug;

/// Minimization driver.
///
/// # Algorithm
///
/// At each iteration k:
/// 1. Compute the direction: solve `H·δ = -g` (exact mode) or multiply
///    `δ = -Q·g` (quasi-Newton mode)
/// 2. Fall back to steepest descent, resetting `Q`, if `δ` is not a
///    descent direction
/// 3. Abort on NaN in `δ`; shrink `δ` and retry while the trial objective
///    evaluates to NaN
/// 4. Run the line search along `δ` for a step `α`
/// 5. Advance, recompute the gradient, update `Q` from the displacement
///    and gradient difference, and test convergence
///
/// # Examples
///
/// ```no_run
/// use descent_solver::solver::optimizer::Optimizer;
/// use descent_solver::problem::Objective;
/// # use nalgebra::{dvector, DVector};
/// # struct Bowl;
/// # impl Objective for Bowl {
/// #     fn value(&self, x: &DVector<f64>) -> f64 { x.norm_squared() }
/// #     fn gradient(&self, x: &DVector<f64>) -> DVector<f64> { 2.0 * x }
/// # }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut optimizer = Optimizer::new();
/// let result = optimizer.minimize(&Bowl, &dvector![3.0, -2.0])?;
/// assert!(result.status.is_converged());
/// # Ok(())
/// # }
/// ```
pub struct Optimizer {
    options: SolverOptions,
    line_search: LineSearch,
    hessian_kind: HessianKind,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    /// Create an optimizer with default options: BFGS directions and a
    /// backtracking line search.
    pub fn new() -> Self {
        Self::with_options(SolverOptions::default())
    }

    /// Create an optimizer with the given options.
    pub fn with_options(options: SolverOptions) -> Self {
        Self {
            options,
            line_search: LineSearch::new(LineSearchKind::Backtracking),
            hessian_kind: HessianKind::default(),
        }
    }

    /// Replace the line-search controller.
    pub fn with_line_search(mut self, line_search: LineSearch) -> Self {
        self.line_search = line_search;
        self
    }

    /// Select the Hessian mode.
    pub fn with_hessian_kind(mut self, hessian_kind: HessianKind) -> Self {
        self.hessian_kind = hessian_kind;
        self
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn hessian_kind(&self) -> HessianKind {
        self.hessian_kind
    }

    pub fn line_search_config(&self) -> &LineSearchConfig {
        self.line_search.config()
    }

    /// Minimize the objective starting from `x0`.
    ///
    /// All terminal iteration outcomes are reported through
    /// [`SolveStatus`]; the returned parameters always hold the last valid
    /// iterate.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty starting point, a missing analytic
    /// Hessian in exact mode, and linear backend failures.
    pub fn minimize<P: Objective>(
        &mut self,
        problem: &P,
        x0: &DVector<f64>,
    ) -> DescentResult<SolverResult<DVector<f64>>> {
        let start_time = time::Instant::now();
        let n = x0.len();

        if n == 0 {
            return Err(SolverError::EmptyProblem.log().into());
        }

        let mut x = x0.clone();
        let mut value = problem.value(&x);
        let mut gradient = problem.gradient(&x);
        let mut residual_evaluations = 1;
        let mut jacobian_evaluations = 1;

        if value.is_nan() || has_nan(&gradient) {
            return Ok(SolverResult {
                parameters: x,
                status: SolveStatus::InvalidNumericalValues,
                initial_norm: value,
                final_norm: value,
                iterations: 0,
                elapsed_time: start_time.elapsed(),
                convergence_info: None,
            });
        }

        let initial_norm = value;
        let mut monitor = ConvergenceMonitor::new(value);
        let mut linear_solver = DenseLuSolver::new();
        let mut inverse_hessian = InverseHessian::new(self.hessian_kind, n);
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

            let mut delta = match self.hessian_kind {
                HessianKind::Exact => {
                    let hessian = problem
                        .hessian(&x)
                        .ok_or_else(|| SolverError::MissingHessian.log())?;
                    jacobian_evaluations += 1;
                    let rhs = -gradient.clone();
                    linear_solver
                        .solve_system(&hessian, &rhs)
                        .map_err(SolverError::from)?
                }
                HessianKind::Bfgs | HessianKind::Dfp => inverse_hessian.direction(&gradient),
            };

            if has_nan(&delta) {
                status = SolveStatus::DirectionFailure;
                break;
            }

            // A non-descent direction means the Hessian information has
            // gone bad: reset the approximation and fall back to steepest
            // descent.
            let mut slope0 = gradient.dot(&delta);
            if slope0 >= 0.0 {
                inverse_hessian.reset();
                delta = -gradient.clone();
                slope0 = -gradient.norm_squared();
            }

            // Shrink-and-retry while the full trial step evaluates to NaN.
            let mut trial_valid = false;
            for _ in 0..=self.options.nan_retry_limit {
                scratch.copy_from(&x);
                scratch.axpy(1.0, &delta, 1.0);
                let trial = problem.value(&scratch);
                residual_evaluations += 1;
                if !trial.is_nan() {
                    trial_valid = true;
                    break;
                }
                delta *= self.options.nan_shrink_factor;
            }
            if !trial_valid {
                status = SolveStatus::TrialEvaluationFailure;
                break;
            }

            let outcome = {
                let mut restriction = ObjectiveRestriction::new(problem, &x, &delta, &mut scratch);
                self.line_search.search(&mut restriction, value, slope0)
            };
            residual_evaluations += outcome.evaluations;

            let x_prev = x.clone();
            let gradient_prev = gradient.clone();
            let value_prev = value;

            x.axpy(outcome.alpha, &delta, 1.0);
            value = problem.value(&x);
            gradient = problem.gradient(&x);
            residual_evaluations += 1;
            jacobian_evaluations += 1;
            step_norm = outcome.alpha * delta.norm();

            // Rank-2 correction from the accepted displacement; skipped
            // internally when the curvature denominator is degenerate.
            let dx = &x - &x_prev;
            let dg = &gradient - &gradient_prev;
            inverse_hessian.update(&dx, &dg);

            status = monitor.assess(
                &self.options,
                iteration,
                &x,
                value,
                step_norm,
                Some(gradient.norm()),
            );

            if status.is_failure() {
                // Leave the iterate at its last valid value.
                x = x_prev;
                gradient = gradient_prev;
                value = value_prev;
            }

            if tracing::enabled!(tracing::Level::DEBUG) {
                let stats = IterationStats {
                    iteration,
                    norm: value,
                    norm_change: value_prev - value,
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
            final_norm: value,
            iterations: iteration,
            elapsed_time: start_time.elapsed(),
            convergence_info: Some(ConvergenceInfo {
                final_norm: value,
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
