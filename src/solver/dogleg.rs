//! Dog leg trust region solver for nonlinear residual problems.
//!
//! Powell's dog leg method constrains each step to a ball of radius `Δ` and
//! blends two directions inside it:
//!
//! 1. **Cauchy point** `p_c = -α·g`, the optimal steepest-descent step for
//!    the quadratic model, with `α = (gᵗg)/(gᵗHg)` and `H = JᵗJ`
//! 2. **Gauss-Newton step** `h_gn` solving `(JᵗJ + λI)·h = -Jᵗr`
//!
//! Step selection by trust region radius `Δ`:
//!
//! - `‖h_gn‖ ≤ Δ`: take the full Gauss-Newton step
//! - `‖p_c‖ ≥ Δ`: take steepest descent scaled to the boundary
//! - otherwise: walk from `p_c` toward `h_gn` to the point at distance
//!   exactly `Δ`, solving `‖p_c + β·(h_gn - p_c)‖² = Δ²` for `β` with the
//!   cancellation-free two-formula quadratic
//!
//! After each step the gain ratio `ρ` (actual over predicted cost
//! reduction) decides acceptance and adapts `Δ`; rejection shrinks `Δ` by
//! the configured factor and retries, which is the trust-region analogue of
//! a line search. A trial residual evaluating to NaN is treated as a failed
//! ratio test, so the same shrinking loop bounds NaN recovery.
//!
//! The regularization `λ` increases when the linear solve fails and decays
//! after good steps, keeping the Gauss-Newton system solvable for
//! rank-deficient Jacobians.

use crate::{
    error::DescentResult,
    linalg::{DenseLinearSolver, DenseLuSolver},
    options::SolverOptions,
    problem::{has_nan, Residual},
    solver::{
        merit, ConvergenceInfo, ConvergenceMonitor, IterationStats, SolveStatus, SolverError,
        SolverResult,
    },
};
use nalgebra::{DMatrix, DVector};
use std::{
    fmt,
    fmt::{Display, Formatter},
    time,
};
use tracing::debug;

/// Type of step taken inside the trust region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepType {
    /// Full Gauss-Newton step
    GaussNewton,
    /// Scaled steepest descent (Cauchy direction to the boundary)
    SteepestDescent,
    /// Dog leg interpolation
    DogLeg,
}

impl Display for StepType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StepType::GaussNewton => write!(f, "GN"),
            StepType::SteepestDescent => write!(f, "SD"),
            StepType::DogLeg => write!(f, "DL"),
        }
    }
}

/// Dog leg trust region solver.
///
/// Accepts overdetermined residuals (`m >= n`); the Gauss-Newton system is
/// formed from the normal equations. Trust region and regularization knobs
/// use the builder pattern:
///
/// ```
/// use descent_solver::solver::dogleg::DogLegSolver;
///
/// let solver = DogLegSolver::new()
///     .with_trust_region_radius(1.0)
///     .with_trust_region_bounds(1e-9, 1e6)
///     .with_decrease_factor(0.5);
/// ```
pub struct DogLegSolver {
    options: SolverOptions,
    initial_radius: f64,
    min_radius: f64,
    max_radius: f64,
    /// Radius shrink factor applied when the ratio test fails
    decrease_factor: f64,
    /// Gain ratio above which the radius grows
    good_quality: f64,
    /// Gain ratio below which the radius shrinks
    poor_quality: f64,
    /// Gain ratio a step must exceed to be accepted
    min_quality: f64,
    initial_lambda: f64,
    min_lambda: f64,
    max_lambda: f64,
    lambda_increase: f64,
}

impl Default for DogLegSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DogLegSolver {
    /// Create a solver with default options and trust region parameters.
    pub fn new() -> Self {
        Self::with_options(SolverOptions::default())
    }

    /// Create a solver with the given options.
    pub fn with_options(options: SolverOptions) -> Self {
        Self {
            options,
            initial_radius: 1e4,
            min_radius: 1e-12,
            max_radius: 1e12,
            decrease_factor: 0.5,
            good_quality: 0.75,
            poor_quality: 0.25,
            min_quality: 1e-4,
            initial_lambda: 1e-4,
            min_lambda: 1e-8,
            max_lambda: 1.0,
            lambda_increase: 10.0,
        }
    }

    /// Set the initial trust region radius.
    pub fn with_trust_region_radius(mut self, radius: f64) -> Self {
        self.initial_radius = radius;
        self
    }

    /// Set the trust region radius bounds.
    pub fn with_trust_region_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_radius = min;
        self.max_radius = max;
        self
    }

    /// Set the radius shrink factor used on rejected steps.
    pub fn with_decrease_factor(mut self, decrease_factor: f64) -> Self {
        self.decrease_factor = decrease_factor;
        self
    }

    /// Set the gain ratio thresholds (acceptance, poor, good).
    pub fn with_quality_thresholds(mut self, min: f64, poor: f64, good: f64) -> Self {
        self.min_quality = min;
        self.poor_quality = poor;
        self.good_quality = good;
        self
    }

    /// Set the regularization parameters.
    pub fn with_lambda_params(
        mut self,
        initial: f64,
        min: f64,
        max: f64,
        increase_factor: f64,
    ) -> Self {
        self.initial_lambda = initial;
        self.min_lambda = min;
        self.max_lambda = max;
        self.lambda_increase = increase_factor;
        self
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Cauchy point and its optimal step length along `-g` for the model
    /// `½‖r + J·h‖²`: `α = (gᵗg)/(gᵗHg)`.
    fn cauchy_point(gradient: &DVector<f64>, hessian: &DMatrix<f64>) -> (f64, DVector<f64>) {
        let g_norm_sq = gradient.norm_squared();
        let h_g = hessian * gradient;
        let g_h_g = gradient.dot(&h_g);

        let alpha = if g_h_g.abs() > 1e-15 {
            g_norm_sq / g_h_g
        } else {
            1.0
        };

        (alpha, gradient.scale(-alpha))
    }

    /// Blend the Cauchy point and the Gauss-Newton step inside the trust
    /// region; the returned step never has norm above `radius` (up to
    /// rounding) unless the full Gauss-Newton step already fits.
    fn dogleg_step(
        cauchy_point: &DVector<f64>,
        h_gn: &DVector<f64>,
        radius: f64,
    ) -> (DVector<f64>, StepType) {
        let gn_norm = h_gn.norm();
        if gn_norm <= radius {
            return (h_gn.clone(), StepType::GaussNewton);
        }

        let cauchy_norm = cauchy_point.norm();
        if cauchy_norm >= radius {
            return (
                cauchy_point.scale(radius / cauchy_norm),
                StepType::SteepestDescent,
            );
        }

        // Intersection of the segment p_c + β·v, v = h_gn - p_c, with the
        // boundary: a·β² + 2b·β + c = 0.
        let v = h_gn - cauchy_point;
        let a = v.norm_squared();
        let b = cauchy_point.dot(&v);
        let c = cauchy_norm * cauchy_norm - radius * radius;

        let discriminant = b * b - a * c;
        let beta = if discriminant < 0.0 || a.abs() < 1e-15 {
            // Geometrically impossible or degenerate segment
            1.0
        } else {
            let d = discriminant.sqrt();
            // Choose the formula without catastrophic cancellation.
            if b <= 0.0 { (-b + d) / a } else { -c / (b + d) }
        };
        let beta = beta.clamp(0.0, 1.0);

        (cauchy_point + v.scale(beta), StepType::DogLeg)
    }

    /// Predicted cost reduction of the quadratic model for a step:
    /// `-stepᵗg - ½·stepᵗHstep`.
    fn predicted_reduction(
        step: &DVector<f64>,
        gradient: &DVector<f64>,
        hessian: &DMatrix<f64>,
    ) -> f64 {
        let linear = step.dot(gradient);
        let quadratic = step.dot(&(hessian * step));
        -linear - 0.5 * quadratic
    }

    /// Gain ratio of actual versus predicted cost reduction.
    fn gain_ratio(current_cost: f64, new_cost: f64, predicted: f64) -> f64 {
        if !new_cost.is_finite() {
            return f64::NEG_INFINITY;
        }
        let actual = current_cost - new_cost;
        if predicted.abs() < 1e-15 {
            if actual > 0.0 { 1.0 } else { 0.0 }
        } else {
            actual / predicted
        }
    }

    /// Solve `F(x) = 0` (or the least-squares problem `min ½‖F‖²` for
    /// overdetermined residuals) starting from `x0`.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty starting point, an underdetermined
    /// system, and when the regularized Gauss-Newton solve fails at the
    /// maximum regularization.
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
        if problem.dim() < n {
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
        let mut cost = merit(&residual);
        let mut monitor = ConvergenceMonitor::new(norm);
        let mut linear_solver = DenseLuSolver::new();

        let mut radius = self.initial_radius;
        let mut lambda = self.initial_lambda;
        let mut step_norm = 0.0;

        if tracing::enabled!(tracing::Level::DEBUG) {
            self.options.print_configuration();
            IterationStats::print_header();
        }

        let mut status = SolveStatus::Running;
        let mut iteration = 0;

        while status == SolveStatus::Running {
            let iter_start = time::Instant::now();

            let jacobian = problem.jacobian(&x);
            jacobian_evaluations += 1;
            let gradient = jacobian.transpose() * &residual;
            let hessian = jacobian.transpose() * &jacobian;
            let gradient_norm = gradient.norm();

            // Regularized Gauss-Newton step, escalating lambda while the
            // normal equations refuse to factorize.
            let rhs = -gradient.clone();
            let mut h_gn = None;
            for _ in 0..10 {
                let mut regularized = hessian.clone();
                for i in 0..n {
                    regularized[(i, i)] += lambda;
                }
                match linear_solver.solve_system(&regularized, &rhs) {
                    Ok(step) => {
                        h_gn = Some(step);
                        break;
                    }
                    Err(_) if lambda < self.max_lambda => {
                        lambda = (lambda * self.lambda_increase).min(self.max_lambda);
                    }
                    Err(e) => {
                        return Err(SolverError::LinearSolveFailed(e.to_string()).log().into());
                    }
                }
            }
            let h_gn = match h_gn {
                Some(step) => step,
                None => {
                    return Err(SolverError::LinearSolveFailed(
                        "regularized normal equations remained singular".to_string(),
                    )
                    .log()
                    .into());
                }
            };

            let (_alpha, cauchy) = Self::cauchy_point(&gradient, &hessian);
            let (step, step_type) = Self::dogleg_step(&cauchy, &h_gn, radius);

            if has_nan(&step) {
                status = SolveStatus::DirectionFailure;
                break;
            }

            step_norm = step.norm();
            let trial = &x + &step;
            let trial_residual = problem.evaluate(&trial);
            residual_evaluations += 1;
            let new_cost = if has_nan(&trial_residual) {
                f64::NAN
            } else {
                merit(&trial_residual)
            };

            let predicted = Self::predicted_reduction(&step, &gradient, &hessian);
            let rho = Self::gain_ratio(cost, new_cost, predicted);
            let accepted = rho > self.min_quality;

            if accepted {
                x = trial;
                residual = trial_residual;
                cost = new_cost;
                let norm_prev = norm;
                norm = residual.norm();

                if rho > self.good_quality {
                    radius = radius.max(3.0 * step_norm).min(self.max_radius);
                    lambda = (lambda / (0.5 * self.lambda_increase)).max(self.min_lambda);
                } else if rho < self.poor_quality {
                    radius = (radius * self.decrease_factor).max(self.min_radius);
                }

                status = monitor.assess(
                    &self.options,
                    iteration,
                    &x,
                    norm,
                    step_norm,
                    Some(gradient_norm),
                );

                if tracing::enabled!(tracing::Level::DEBUG) {
                    debug!("accepted {} step, rho {:.3}", step_type, rho);
                    let stats = IterationStats {
                        iteration,
                        norm,
                        norm_change: norm_prev - norm,
                        step_norm,
                        control: radius,
                        accepted: true,
                        iter_time_ms: iter_start.elapsed().as_secs_f64() * 1000.0,
                        total_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
                    };
                    stats.print_line();
                }
            } else {
                // Failed ratio test (including NaN trials): shrink and
                // retry from the same iterate.
                radius = (radius * self.decrease_factor).max(self.min_radius);

                if tracing::enabled!(tracing::Level::DEBUG) {
                    debug!("rejected {} step, rho {:.3}", step_type, rho);
                    let stats = IterationStats {
                        iteration,
                        norm,
                        norm_change: 0.0,
                        step_norm,
                        control: radius,
                        accepted: false,
                        iter_time_ms: iter_start.elapsed().as_secs_f64() * 1000.0,
                        total_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
                    };
                    stats.print_line();
                }

                if radius <= self.min_radius {
                    status = SolveStatus::TrustRegionRadiusTooSmall;
                } else if iteration + 1 >= self.options.max_iterations {
                    status = SolveStatus::MaxIterationsReached;
                }
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
