//! Iteration drivers for root finding and minimization.
//!
//! The drivers share one skeleton: evaluate the residual or objective and
//! its derivative, compute a search direction, run a line search (or the
//! trust-region analogue) along it, advance the iterate, and test the
//! stopping criteria tracked by [`ConvergenceMonitor`].
//!
//! Terminal outcomes are reported through [`SolveStatus`] inside an `Ok`
//! result whose parameters always hold the last valid iterate; `Err` is
//! reserved for setup and backend failures. [`SolveStatus::is_failure`]
//! separates divergence and NaN aborts from the soft max-iterations stop.

use crate::{
    linalg,
    linesearch::LineFunction,
    options::SolverOptions,
    problem::{has_nan, Objective, Residual},
};
use nalgebra::DVector;
use std::{
    fmt,
    fmt::{Display, Formatter},
    time,
};
use thiserror::Error;
use tracing::{debug, error, warn};

pub mod dogleg;
pub mod newton;
pub mod optimizer;

pub use dogleg::DogLegSolver;
pub use newton::NewtonSolver;
pub use optimizer::Optimizer;

/// Driver-specific error types for descent-solver
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    /// Problem dimensions do not form a solvable system
    #[error("Dimension mismatch: residual has {residuals} components, iterate has {unknowns}")]
    DimensionMismatch { residuals: usize, unknowns: usize },

    /// Starting point has no entries
    #[error("Initial iterate is empty")]
    EmptyProblem,

    /// Exact-Hessian mode requested but the problem provides none
    #[error("Problem provides no analytic Hessian (required by HessianKind::Exact)")]
    MissingHessian,

    /// Linear system solve failed during iteration
    #[error("Linear system solve failed: {0}")]
    LinearSolveFailed(String),

    /// Linear algebra operation failed
    #[error("Linear algebra error: {0}")]
    LinAlg(#[from] linalg::LinAlgError),
}

impl SolverError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, SolverError>;

/// Status of a solve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveStatus {
    /// Iteration in progress
    Running,
    /// Residual/objective magnitude fell below the absolute tolerance
    ResidualToleranceReached,
    /// Relative residual/objective change fell below tolerance
    RelativeToleranceReached,
    /// Step norm fell below tolerance
    StepToleranceReached,
    /// Gradient norm fell below tolerance
    GradientToleranceReached,
    /// Iteration budget exhausted (soft stop, best iterate returned)
    MaxIterationsReached,
    /// Trust region radius collapsed below its minimum
    TrustRegionRadiusTooSmall,
    /// Residual norm exceeded the break threshold
    Diverged,
    /// Residual/objective increased while increases are disallowed
    ObjectiveIncreased,
    /// NaN observed in the iterate or residual
    InvalidNumericalValues,
    /// NaN in the search direction; no retry can recover it
    DirectionFailure,
    /// Trial evaluations kept returning NaN through every shrink retry
    TrialEvaluationFailure,
}

impl SolveStatus {
    /// True for every tolerance-based success status.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            SolveStatus::ResidualToleranceReached
                | SolveStatus::RelativeToleranceReached
                | SolveStatus::StepToleranceReached
                | SolveStatus::GradientToleranceReached
        )
    }

    /// True for the fatal statuses a caller should treat as an error.
    /// `MaxIterationsReached` and `TrustRegionRadiusTooSmall` are soft
    /// stops, not failures.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SolveStatus::Diverged
                | SolveStatus::ObjectiveIncreased
                | SolveStatus::InvalidNumericalValues
                | SolveStatus::DirectionFailure
                | SolveStatus::TrialEvaluationFailure
        )
    }
}

impl Display for SolveStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Running => write!(f, "Running"),
            SolveStatus::ResidualToleranceReached => write!(f, "Residual tolerance reached"),
            SolveStatus::RelativeToleranceReached => write!(f, "Relative tolerance reached"),
            SolveStatus::StepToleranceReached => write!(f, "Step tolerance reached"),
            SolveStatus::GradientToleranceReached => write!(f, "Gradient tolerance reached"),
            SolveStatus::MaxIterationsReached => write!(f, "Maximum iterations reached"),
            SolveStatus::TrustRegionRadiusTooSmall => write!(f, "Trust region radius too small"),
            SolveStatus::Diverged => write!(f, "Diverged"),
            SolveStatus::ObjectiveIncreased => write!(f, "Objective increased"),
            SolveStatus::InvalidNumericalValues => {
                write!(f, "Invalid numerical values (NaN) detected")
            }
            SolveStatus::DirectionFailure => write!(f, "NaN in search direction"),
            SolveStatus::TrialEvaluationFailure => {
                write!(f, "Trial evaluation failed after every shrink retry")
            }
        }
    }
}

/// Detailed convergence information.
#[derive(Debug, Clone)]
pub struct ConvergenceInfo {
    /// Final residual norm / objective value
    pub final_norm: f64,
    /// Final step norm
    pub final_step_norm: f64,
    /// Residual/objective evaluation count
    pub residual_evaluations: usize,
    /// Jacobian/gradient evaluation count
    pub jacobian_evaluations: usize,
}

impl Display for ConvergenceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Final norm: {:.2e}, Final step norm: {:.2e}, Residual evaluations: {}, Jacobian evaluations: {}",
            self.final_norm,
            self.final_step_norm,
            self.residual_evaluations,
            self.jacobian_evaluations
        )
    }
}

/// Result of a solver execution.
#[derive(Debug, Clone)]
pub struct SolverResult<T> {
    /// Final parameters (last valid iterate for fatal statuses)
    pub parameters: T,
    /// Final status
    pub status: SolveStatus,
    /// Residual norm / objective value at the starting point
    pub initial_norm: f64,
    /// Residual norm / objective value at the final iterate
    pub final_norm: f64,
    /// Number of iterations performed
    pub iterations: usize,
    /// Total time elapsed
    pub elapsed_time: time::Duration,
    /// Convergence statistics
    pub convergence_info: Option<ConvergenceInfo>,
}

impl<T> Display for SolverResult<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solve Result")?;
        if self.status.is_converged() {
            writeln!(f, "CONVERGED ({})", self.status)?;
        } else if self.status.is_failure() {
            writeln!(f, "FAILED ({})", self.status)?;
        } else {
            writeln!(f, "STOPPED ({})", self.status)?;
        }
        writeln!(f)?;
        writeln!(f, "Norm:")?;
        writeln!(f, "  Initial:   {:.6e}", self.initial_norm)?;
        writeln!(f, "  Final:     {:.6e}", self.final_norm)?;
        writeln!(f, "Iterations:  {}", self.iterations)?;
        writeln!(
            f,
            "Time:        {:.2}ms",
            self.elapsed_time.as_secs_f64() * 1000.0
        )?;
        if let Some(info) = &self.convergence_info {
            writeln!(f, "{}", info)?;
        }
        Ok(())
    }
}

/// Per-iteration statistics for detailed logging.
///
/// Collected and printed only when DEBUG logging is enabled, in a fixed
/// column layout. `control` is the step length for line-search drivers and
/// the trust region radius for the dogleg driver.
#[derive(Debug, Clone)]
pub struct IterationStats {
    /// Iteration number (0-indexed)
    pub iteration: usize,
    /// Residual norm / objective value after this iteration
    pub norm: f64,
    /// Change from the previous iteration
    pub norm_change: f64,
    /// L2 norm of the parameter update
    pub step_norm: f64,
    /// Step length (line search) or trust region radius (dogleg)
    pub control: f64,
    /// Whether the step was accepted
    pub accepted: bool,
    /// Time taken for this iteration in milliseconds
    pub iter_time_ms: f64,
    /// Total elapsed time in milliseconds
    pub total_time_ms: f64,
}

impl IterationStats {
    /// Print table header
    pub fn print_header() {
        debug!(
            "{:>4}  {:>13}  {:>13}  {:>13}  {:>11}  {:>11}  {:>13}  {:>6}",
            "iter", "norm", "norm_change", "|step|", "alpha/radius", "iter_time", "total_time", "status"
        );
    }

    /// Print single iteration line
    pub fn print_line(&self) {
        let status = if self.accepted { "✓" } else { "✗" };
        debug!(
            "{:>4}  {:>13.6e}  {:>13.2e}  {:>13.2e}  {:>11.2e}  {:>9.2}ms  {:>11.2}ms  {:>6}",
            self.iteration,
            self.norm,
            self.norm_change,
            self.step_norm,
            self.control,
            self.iter_time_ms,
            self.total_time_ms,
            status
        );
    }
}

/// Stopping-criteria tracker shared by all drivers.
///
/// Holds the norm history a solve accumulates; each accepted step is passed
/// through [`ConvergenceMonitor::assess`], which applies the failure checks
/// first (NaN, break threshold, disallowed increase), then the tolerance
/// checks gated on the minimum iteration count, then the iteration budget.
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    initial_norm: f64,
    previous_norm: f64,
}

impl ConvergenceMonitor {
    pub fn new(initial_norm: f64) -> Self {
        Self {
            initial_norm,
            previous_norm: initial_norm,
        }
    }

    pub fn initial_norm(&self) -> f64 {
        self.initial_norm
    }

    pub fn previous_norm(&self) -> f64 {
        self.previous_norm
    }

    /// Assess the iteration that produced iterate `x` with the given norm
    /// and step norm. `iteration` is 0-indexed; `gradient_norm` is supplied
    /// by the minimization drivers only.
    pub fn assess(
        &mut self,
        options: &SolverOptions,
        iteration: usize,
        x: &DVector<f64>,
        norm: f64,
        step_norm: f64,
        gradient_norm: Option<f64>,
    ) -> SolveStatus {
        // Failure checks come first: a NaN iterate must never be reported
        // as converged.
        if norm.is_nan() || has_nan(x) {
            return SolveStatus::InvalidNumericalValues;
        }
        if norm > options.break_threshold {
            return SolveStatus::Diverged;
        }
        let previous = self.previous_norm;
        if norm > previous && !options.allow_increase {
            return SolveStatus::ObjectiveIncreased;
        }
        self.previous_norm = norm;

        let completed = iteration + 1;
        if completed >= options.min_iterations {
            if norm.abs() < options.f_abstol {
                return SolveStatus::ResidualToleranceReached;
            }
            if (previous - norm).abs() < options.f_reltol * previous.abs().max(1e-10) {
                return SolveStatus::RelativeToleranceReached;
            }
            if step_norm < options.x_abstol
                || step_norm < options.x_reltol * (x.norm() + options.x_reltol)
            {
                return SolveStatus::StepToleranceReached;
            }
            if let Some(g_norm) = gradient_norm {
                if g_norm < options.g_abstol {
                    return SolveStatus::GradientToleranceReached;
                }
            }
        }

        if completed >= options.max_iterations {
            warn!(
                "iteration budget ({}) exhausted, returning best iterate",
                options.max_iterations
            );
            return SolveStatus::MaxIterationsReached;
        }

        SolveStatus::Running
    }
}

/// One-dimensional restriction of an [`Objective`] along a direction.
///
/// `value(alpha)` is `f(origin + alpha * direction)`. The trial point lives
/// in a scratch buffer owned by the driver and borrowed here, so repeated
/// restrictions allocate nothing.
pub(crate) struct ObjectiveRestriction<'a, P: Objective> {
    problem: &'a P,
    origin: &'a DVector<f64>,
    direction: &'a DVector<f64>,
    trial: &'a mut DVector<f64>,
}

impl<'a, P: Objective> ObjectiveRestriction<'a, P> {
    pub fn new(
        problem: &'a P,
        origin: &'a DVector<f64>,
        direction: &'a DVector<f64>,
        trial: &'a mut DVector<f64>,
    ) -> Self {
        Self {
            problem,
            origin,
            direction,
            trial,
        }
    }

    fn move_to(&mut self, alpha: f64) {
        self.trial.copy_from(self.origin);
        self.trial.axpy(alpha, self.direction, 1.0);
    }
}

impl<P: Objective> LineFunction for ObjectiveRestriction<'_, P> {
    fn value(&mut self, alpha: f64) -> f64 {
        self.move_to(alpha);
        self.problem.value(self.trial)
    }

    fn slope(&mut self, alpha: f64) -> f64 {
        self.move_to(alpha);
        self.problem.gradient(self.trial).dot(self.direction)
    }
}

/// One-dimensional restriction of a [`Residual`] along a direction, using
/// the least-squares merit `½‖F‖²`.
///
/// The slope requires a Jacobian evaluation at the trial point; the
/// derivative-free policies never pay that cost.
pub(crate) struct ResidualRestriction<'a, P: Residual> {
    problem: &'a P,
    origin: &'a DVector<f64>,
    direction: &'a DVector<f64>,
    trial: &'a mut DVector<f64>,
}

impl<'a, P: Residual> ResidualRestriction<'a, P> {
    pub fn new(
        problem: &'a P,
        origin: &'a DVector<f64>,
        direction: &'a DVector<f64>,
        trial: &'a mut DVector<f64>,
    ) -> Self {
        Self {
            problem,
            origin,
            direction,
            trial,
        }
    }

    fn move_to(&mut self, alpha: f64) {
        self.trial.copy_from(self.origin);
        self.trial.axpy(alpha, self.direction, 1.0);
    }
}

impl<P: Residual> LineFunction for ResidualRestriction<'_, P> {
    fn value(&mut self, alpha: f64) -> f64 {
        self.move_to(alpha);
        let residual = self.problem.evaluate(self.trial);
        0.5 * residual.norm_squared()
    }

    fn slope(&mut self, alpha: f64) -> f64 {
        self.move_to(alpha);
        let residual = self.problem.evaluate(self.trial);
        let jacobian = self.problem.jacobian(self.trial);
        // d/dalpha ½‖F‖² = F · (J δ)
        residual.dot(&(jacobian * self.direction))
    }
}

/// Least-squares merit `½‖F(x)‖²` of a residual vector.
pub(crate) fn merit(residual: &DVector<f64>) -> f64 {
    0.5 * residual.norm_squared()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dvector, DMatrix};

    #[test]
    fn status_classification() {
        assert!(SolveStatus::ResidualToleranceReached.is_converged());
        assert!(SolveStatus::StepToleranceReached.is_converged());
        assert!(!SolveStatus::MaxIterationsReached.is_converged());
        assert!(!SolveStatus::MaxIterationsReached.is_failure());
        assert!(SolveStatus::Diverged.is_failure());
        assert!(SolveStatus::DirectionFailure.is_failure());
    }

    #[test]
    fn monitor_detects_divergence_and_nan() {
        let options = SolverOptions::new().with_break_threshold(100.0);
        let x = dvector![1.0, 1.0];

        let mut monitor = ConvergenceMonitor::new(1.0);
        assert_eq!(
            monitor.assess(&options, 0, &x, 1e3, 0.1, None),
            SolveStatus::Diverged
        );

        let mut monitor = ConvergenceMonitor::new(1.0);
        assert_eq!(
            monitor.assess(&options, 0, &x, f64::NAN, 0.1, None),
            SolveStatus::InvalidNumericalValues
        );
    }

    #[test]
    fn monitor_rejects_increase_unless_allowed() {
        let x = dvector![1.0];

        let strict = SolverOptions::new();
        let mut monitor = ConvergenceMonitor::new(1.0);
        assert_eq!(
            monitor.assess(&strict, 0, &x, 2.0, 0.5, None),
            SolveStatus::ObjectiveIncreased
        );

        let lenient = SolverOptions::new().with_allow_increase(true);
        let mut monitor = ConvergenceMonitor::new(1.0);
        assert_eq!(
            monitor.assess(&lenient, 0, &x, 2.0, 0.5, None),
            SolveStatus::Running
        );
    }

    #[test]
    fn monitor_waits_for_min_iterations() {
        let options = SolverOptions::new().with_min_iterations(3);
        let x = dvector![1.0];
        let mut monitor = ConvergenceMonitor::new(1.0);

        // Norm well below f_abstol, but only one iteration completed
        assert_eq!(
            monitor.assess(&options, 0, &x, 1e-14, 0.5, None),
            SolveStatus::Running
        );
        assert_eq!(
            monitor.assess(&options, 2, &x, 1e-15, 0.5, None),
            SolveStatus::ResidualToleranceReached
        );
    }

    #[test]
    fn monitor_reports_budget_exhaustion() {
        let options = SolverOptions::new()
            .with_max_iterations(2)
            .with_residual_tolerances(0.0, 0.0)
            .with_step_tolerances(0.0, 0.0);
        let x = dvector![1.0];
        let mut monitor = ConvergenceMonitor::new(10.0);

        assert_eq!(
            monitor.assess(&options, 0, &x, 9.0, 1.0, None),
            SolveStatus::Running
        );
        assert_eq!(
            monitor.assess(&options, 1, &x, 8.0, 1.0, None),
            SolveStatus::MaxIterationsReached
        );
    }

    struct Bowl;

    impl Objective for Bowl {
        fn value(&self, x: &DVector<f64>) -> f64 {
            0.5 * x.norm_squared()
        }
        fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
            x.clone()
        }
    }

    #[test]
    fn objective_restriction_composes_correctly() {
        let origin = dvector![1.0, 0.0];
        let direction = dvector![-1.0, 0.0];
        let mut scratch = DVector::zeros(2);
        let mut restriction = ObjectiveRestriction::new(&Bowl, &origin, &direction, &mut scratch);

        // f(origin + alpha * d) = ½(1 - alpha)²
        assert!((restriction.value(0.0) - 0.5).abs() < 1e-15);
        assert!(restriction.value(1.0).abs() < 1e-15);
        assert!((restriction.slope(0.0) + 1.0).abs() < 1e-15);
    }

    struct Linear;

    impl Residual for Linear {
        fn dim(&self) -> usize {
            1
        }
        fn evaluate(&self, x: &DVector<f64>) -> DVector<f64> {
            dvector![2.0 * x[0] - 4.0]
        }
        fn jacobian(&self, _x: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_element(1, 1, 2.0)
        }
    }

    #[test]
    fn residual_restriction_uses_merit() {
        let origin = dvector![0.0];
        let direction = dvector![1.0];
        let mut scratch = DVector::zeros(1);
        let mut restriction = ResidualRestriction::new(&Linear, &origin, &direction, &mut scratch);

        // merit(alpha) = ½(2 alpha - 4)², slope = (2 alpha - 4) * 2
        assert!((restriction.value(0.0) - 8.0).abs() < 1e-15);
        assert!((restriction.value(2.0)).abs() < 1e-15);
        assert!((restriction.slope(0.0) + 8.0).abs() < 1e-15);
    }
}
