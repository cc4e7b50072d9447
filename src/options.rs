//! Solver configuration.
//!
//! A single immutable [`SolverOptions`] value is constructed once (builder
//! pattern) and passed by reference into every component that needs it:
//! iteration drivers, the convergence monitor, and the trust region logic.
//! There is no process-wide default registry; defaults live in
//! [`SolverOptions::default`].

use std::fmt;
use tracing::debug;

/// Configuration parameters shared by all iteration drivers.
///
/// # Builder Pattern
///
/// All options can be set using the builder pattern:
///
/// ```
/// use descent_solver::options::SolverOptions;
///
/// let options = SolverOptions::new()
///     .with_max_iterations(100)
///     .with_residual_tolerances(1e-10, 1e-8)
///     .with_allow_increase(false);
/// ```
///
/// # Convergence Criteria
///
/// A driver stops successfully when ANY configured absolute or relative
/// tolerance is met AND at least `min_iterations` iterations have run:
///
/// - **Residual/objective tolerance**: `|F(x)| < f_abstol` or relative change
///   below `f_reltol`
/// - **Step tolerance**: `‖δ‖ / ‖x‖ < x_reltol`, or `‖δ‖ < x_abstol`
/// - **Gradient tolerance**: `‖g‖ < g_abstol` (optimizer only)
///
/// # Divergence
///
/// A solve fails when the residual norm exceeds `break_threshold`, when the
/// objective increases while `allow_increase` is false, or when NaN appears
/// in the iterate or residual.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Absolute tolerance on the step norm `‖δ‖`
    pub x_abstol: f64,
    /// Relative tolerance on the successive step norm `‖δ‖ / ‖x‖`
    pub x_reltol: f64,
    /// Absolute tolerance on the residual norm / objective value
    pub f_abstol: f64,
    /// Relative tolerance on the residual/objective change between iterates
    pub f_reltol: f64,
    /// Absolute tolerance on the gradient norm (minimization)
    pub g_abstol: f64,
    /// Minimum number of iterations before convergence may fire
    pub min_iterations: usize,
    /// Maximum number of iterations (soft stop)
    pub max_iterations: usize,
    /// Permit the residual norm / objective to increase between iterates
    pub allow_increase: bool,
    /// Residual norm above which the solve is declared divergent
    pub break_threshold: f64,
    /// Recompute and refactorize the Jacobian every `refactor_interval`
    /// iterations; 1 is the full Newton method
    pub refactor_interval: usize,
    /// Direction shrink factor applied when a trial evaluation returns NaN
    pub nan_shrink_factor: f64,
    /// Bound on NaN shrink-and-retry attempts per iteration
    pub nan_retry_limit: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            x_abstol: 1e-12,
            x_reltol: 1e-10,
            f_abstol: 1e-10,
            f_reltol: 1e-10,
            g_abstol: 1e-10,
            min_iterations: 1,
            max_iterations: 100,
            allow_increase: false,
            break_threshold: 1e10,
            refactor_interval: 1,
            nan_shrink_factor: 0.5,
            nan_retry_limit: 8,
        }
    }
}

impl SolverOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the absolute and relative step-norm tolerances.
    pub fn with_step_tolerances(mut self, x_abstol: f64, x_reltol: f64) -> Self {
        self.x_abstol = x_abstol;
        self.x_reltol = x_reltol;
        self
    }

    /// Set the absolute and relative residual/objective tolerances.
    pub fn with_residual_tolerances(mut self, f_abstol: f64, f_reltol: f64) -> Self {
        self.f_abstol = f_abstol;
        self.f_reltol = f_reltol;
        self
    }

    /// Set the gradient-norm tolerance.
    pub fn with_gradient_tolerance(mut self, g_abstol: f64) -> Self {
        self.g_abstol = g_abstol;
        self
    }

    /// Set the minimum iteration count required before convergence may fire.
    pub fn with_min_iterations(mut self, min_iterations: usize) -> Self {
        self.min_iterations = min_iterations;
        self
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Permit or forbid residual/objective increases between iterates.
    pub fn with_allow_increase(mut self, allow_increase: bool) -> Self {
        self.allow_increase = allow_increase;
        self
    }

    /// Set the divergence break threshold.
    pub fn with_break_threshold(mut self, break_threshold: f64) -> Self {
        self.break_threshold = break_threshold;
        self
    }

    /// Set the Jacobian refactorization interval (1 = every iteration).
    pub fn with_refactor_interval(mut self, refactor_interval: usize) -> Self {
        self.refactor_interval = refactor_interval.max(1);
        self
    }

    /// Set the NaN retry policy: shrink factor and attempt bound.
    pub fn with_nan_retry(mut self, shrink_factor: f64, retry_limit: usize) -> Self {
        self.nan_shrink_factor = shrink_factor;
        self.nan_retry_limit = retry_limit;
        self
    }

    /// Print configuration parameters (debug level logging)
    pub fn print_configuration(&self) {
        debug!(
            "Configuration:\n  Step tolerances:     abs {:.2e}, rel {:.2e}\n  Residual tolerances: abs {:.2e}, rel {:.2e}\n  Gradient tolerance:  {:.2e}\n  Iterations:          [{}, {}]\n  Allow increase:      {}\n  Break threshold:     {:.2e}\n  Refactor interval:   {}\n  NaN retry:           shrink {:.2}, limit {}",
            self.x_abstol,
            self.x_reltol,
            self.f_abstol,
            self.f_reltol,
            self.g_abstol,
            self.min_iterations,
            self.max_iterations,
            self.allow_increase,
            self.break_threshold,
            self.refactor_interval,
            self.nan_shrink_factor,
            self.nan_retry_limit
        );
    }
}

impl fmt::Display for SolverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tol(x: {:.1e}/{:.1e}, f: {:.1e}/{:.1e}, g: {:.1e}), iters [{}, {}]",
            self.x_abstol,
            self.x_reltol,
            self.f_abstol,
            self.f_reltol,
            self.g_abstol,
            self.min_iterations,
            self.max_iterations
        )
    }
}
