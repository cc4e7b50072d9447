//! Line-search step-length controllers.
//!
//! Every outer iteration reduces to a one-dimensional sub-problem: given the
//! restriction `f(alpha)` of the objective (or residual merit) along the
//! search direction, with derivative `d(alpha)`, pick a step length. This
//! module provides five interchangeable policies behind a single dispatch
//! type:
//!
//! - **Static**: always the configured constant step
//! - **Backtracking**: geometric shrink until the Armijo condition (and
//!   optionally a Wolfe curvature condition) holds
//! - **Bisection**: derivative sign-change bisection
//! - **Quadratic**: one-sample quadratic interpolation with Kelley's
//!   stagnation safeguard
//! - **BierlaireQuadratic**: three-point quadratic refinement of a
//!   bracketing triple
//!
//! Policies never fail hard: exhaustion returns the last trial step so the
//! outer loop can proceed, and a vanishing initial slope returns the initial
//! step immediately.

pub mod backtracking;
pub mod bierlaire;
pub mod bisection;
pub mod bracket;
pub mod quadratic;

use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;

pub use bracket::{bracket_minimum, bracket_minimum_with_fixed_point, bracket_root, Bracket};

/// A one-dimensional restriction of the outer problem along a direction.
///
/// `value(alpha)` is `f(x + alpha * delta)` and `slope(alpha)` its
/// derivative with respect to `alpha`. Implementations may mutate internal
/// scratch state; NaN return values signal evaluation failure.
pub trait LineFunction {
    fn value(&mut self, alpha: f64) -> f64;
    fn slope(&mut self, alpha: f64) -> f64;
}

/// [`LineFunction`] backed by a pair of closures. Mostly useful in tests and
/// for driving the policies on standalone scalar problems.
pub struct ScalarLine<F, D> {
    value_fn: F,
    slope_fn: D,
}

impl<F, D> ScalarLine<F, D>
where
    F: FnMut(f64) -> f64,
    D: FnMut(f64) -> f64,
{
    pub fn new(value_fn: F, slope_fn: D) -> Self {
        Self { value_fn, slope_fn }
    }
}

impl<F, D> LineFunction for ScalarLine<F, D>
where
    F: FnMut(f64) -> f64,
    D: FnMut(f64) -> f64,
{
    fn value(&mut self, alpha: f64) -> f64 {
        (self.value_fn)(alpha)
    }

    fn slope(&mut self, alpha: f64) -> f64 {
        (self.slope_fn)(alpha)
    }
}

/// Type of line-search policy to use
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LineSearchKind {
    /// Constant step length
    Static,
    /// Geometric backtracking under the Armijo condition
    #[default]
    Backtracking,
    /// Derivative sign-change bisection
    Bisection,
    /// Quadratic interpolation with Kelley's safeguard
    Quadratic,
    /// Bierlaire three-point quadratic refinement
    BierlaireQuadratic,
}

impl Display for LineSearchKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LineSearchKind::Static => write!(f, "Static"),
            LineSearchKind::Backtracking => write!(f, "Backtracking"),
            LineSearchKind::Bisection => write!(f, "Bisection"),
            LineSearchKind::Quadratic => write!(f, "Quadratic"),
            LineSearchKind::BierlaireQuadratic => write!(f, "Bierlaire quadratic"),
        }
    }
}

/// Curvature condition checked in addition to sufficient decrease
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CurvatureKind {
    /// Armijo condition only
    #[default]
    None,
    /// Standard Wolfe: `d(alpha) >= c2 * d(0)`
    Standard,
    /// Strong Wolfe: `|d(alpha)| <= c2 * |d(0)|`
    Strong,
}

/// Line search specific error types for descent-solver
#[derive(Debug, Clone, Error)]
pub enum LineSearchError {
    /// Configuration violates a mathematical requirement
    #[error("Invalid line search parameter: {0}")]
    InvalidParameter(String),

    /// Bracketing gave up without finding the required interval
    #[error("Bracketing exhausted after {iterations} expansions")]
    BracketExhausted { iterations: usize },
}

impl LineSearchError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for line search operations
pub type LineSearchResult<T> = Result<T, LineSearchError>;

/// Outcome of a step-length search.
///
/// `converged` is false when the policy exhausted its iteration budget; the
/// step is still usable (the last trial) and the outer loop proceeds.
#[derive(Debug, Clone, Copy)]
pub struct LineSearchOutcome {
    /// Accepted (or last trial) step length
    pub alpha: f64,
    /// Restriction value at `alpha`, when the policy evaluated it
    pub value: f64,
    /// Function and slope evaluations spent
    pub evaluations: usize,
    /// True if the policy's acceptance criterion fired
    pub converged: bool,
}

/// Configuration parameters shared by all line-search policies.
///
/// # Builder Pattern
///
/// ```
/// use descent_solver::linesearch::{CurvatureKind, LineSearchConfig, LineSearchKind};
///
/// let config = LineSearchConfig::new(LineSearchKind::Backtracking)
///     .with_armijo_constant(1e-4)
///     .with_curvature(CurvatureKind::Strong, 0.9)
///     .with_max_iterations(30);
/// ```
#[derive(Debug, Clone)]
pub struct LineSearchConfig {
    /// Which policy to run
    pub kind: LineSearchKind,
    /// Initial (and, for Static, final) step length
    pub initial_step: f64,
    /// Armijo constant `c1` in `(0, 1)`
    pub c1: f64,
    /// Curvature constant `c2` in `(c1, 1)`
    pub c2: f64,
    /// Curvature condition checked after sufficient decrease
    pub curvature: CurvatureKind,
    /// Backtracking shrink factor in `(0, 1)`
    pub shrink_factor: f64,
    /// Lower safeguard bound for the quadratic policy, fraction of the
    /// bracketing sample
    pub sigma0: f64,
    /// Upper safeguard bound for the quadratic policy
    pub sigma1: f64,
    /// Bracket-width tolerance (bisection)
    pub alpha_tolerance: f64,
    /// Slope magnitude below which a trial counts as a minimum
    pub slope_tolerance: f64,
    /// Bierlaire termination width/spread `epsilon`
    pub epsilon: f64,
    /// Iteration bound applied to every internal loop
    pub max_iterations: usize,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            kind: LineSearchKind::default(),
            initial_step: 1.0,
            c1: 1e-4,
            c2: 0.9,
            curvature: CurvatureKind::None,
            shrink_factor: 0.5,
            // Kelley's safeguard interval
            sigma0: 0.1,
            sigma1: 0.5,
            alpha_tolerance: 1e-8,
            slope_tolerance: 1e-8,
            epsilon: 1e-9,
            max_iterations: 40,
        }
    }
}

impl LineSearchConfig {
    /// Create a configuration for the given policy with default parameters.
    pub fn new(kind: LineSearchKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Set the initial step length (the constant step for Static).
    pub fn with_initial_step(mut self, initial_step: f64) -> Self {
        self.initial_step = initial_step;
        self
    }

    /// Set the Armijo sufficient-decrease constant.
    pub fn with_armijo_constant(mut self, c1: f64) -> Self {
        self.c1 = c1;
        self
    }

    /// Set the curvature condition and its constant.
    pub fn with_curvature(mut self, curvature: CurvatureKind, c2: f64) -> Self {
        self.curvature = curvature;
        self.c2 = c2;
        self
    }

    /// Set the backtracking shrink factor.
    pub fn with_shrink_factor(mut self, shrink_factor: f64) -> Self {
        self.shrink_factor = shrink_factor;
        self
    }

    /// Set the quadratic-policy safeguard bounds.
    pub fn with_safeguard(mut self, sigma0: f64, sigma1: f64) -> Self {
        self.sigma0 = sigma0;
        self.sigma1 = sigma1;
        self
    }

    /// Set the width and slope tolerances.
    pub fn with_tolerances(mut self, alpha_tolerance: f64, slope_tolerance: f64) -> Self {
        self.alpha_tolerance = alpha_tolerance;
        self.slope_tolerance = slope_tolerance;
        self
    }

    /// Set the Bierlaire termination epsilon.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the iteration bound for every internal loop.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Validate the configuration against its mathematical requirements.
    ///
    /// # Errors
    ///
    /// Returns [`LineSearchError::InvalidParameter`] if the step is not
    /// positive, the Wolfe constants violate `0 < c1 < c2 < 1`, the shrink
    /// factor or safeguard bounds leave `(0, 1)`, or the iteration bound is
    /// zero.
    pub fn validate(&self) -> LineSearchResult<()> {
        if self.initial_step <= 0.0 || !self.initial_step.is_finite() {
            return Err(LineSearchError::InvalidParameter(
                "initial step must be positive and finite".to_string(),
            ));
        }
        if self.c1 <= 0.0 || self.c1 >= 1.0 {
            return Err(LineSearchError::InvalidParameter(
                "Armijo constant c1 must be in (0, 1)".to_string(),
            ));
        }
        if self.curvature != CurvatureKind::None && (self.c2 <= self.c1 || self.c2 >= 1.0) {
            return Err(LineSearchError::InvalidParameter(
                "curvature constant c2 must satisfy c1 < c2 < 1".to_string(),
            ));
        }
        if self.shrink_factor <= 0.0 || self.shrink_factor >= 1.0 {
            return Err(LineSearchError::InvalidParameter(
                "shrink factor must be in (0, 1)".to_string(),
            ));
        }
        if self.sigma0 <= 0.0 || self.sigma0 >= self.sigma1 || self.sigma1 > 1.0 {
            return Err(LineSearchError::InvalidParameter(
                "safeguard bounds must satisfy 0 < sigma0 < sigma1 <= 1".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(LineSearchError::InvalidParameter(
                "maximum iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sufficient-decrease (Armijo) condition:
/// `f(alpha) <= f(0) + c1 * alpha * d(0)`.
///
/// NaN trial values fail the condition.
pub fn sufficient_decrease(value: f64, f0: f64, slope0: f64, alpha: f64, c1: f64) -> bool {
    value <= f0 + c1 * alpha * slope0
}

/// Curvature (Wolfe) condition at the trial point.
///
/// Standard: `d(alpha) >= c2 * d(0)`; strong: `|d(alpha)| <= c2 * |d(0)|`.
/// `CurvatureKind::None` always holds. NaN slopes fail.
pub fn curvature_holds(slope: f64, slope0: f64, c2: f64, kind: CurvatureKind) -> bool {
    match kind {
        CurvatureKind::None => true,
        CurvatureKind::Standard => slope >= c2 * slope0,
        CurvatureKind::Strong => slope.abs() <= c2 * slope0.abs(),
    }
}

/// A line-search step-length controller.
///
/// Dispatches over [`LineSearchKind`]; the policy set is closed, and adding
/// a policy means adding a variant here rather than implementing an open
/// trait.
#[derive(Debug, Clone)]
pub struct LineSearch {
    config: LineSearchConfig,
}

impl LineSearch {
    /// Create a controller for the given policy with default parameters.
    pub fn new(kind: LineSearchKind) -> Self {
        Self {
            config: LineSearchConfig::new(kind),
        }
    }

    /// Create a controller from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LineSearchError::InvalidParameter`] if the configuration
    /// fails [`LineSearchConfig::validate`].
    pub fn with_config(config: LineSearchConfig) -> LineSearchResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn kind(&self) -> LineSearchKind {
        self.config.kind
    }

    pub fn config(&self) -> &LineSearchConfig {
        &self.config
    }

    /// Run the configured policy on the restriction `f`.
    ///
    /// `f0` and `slope0` are the caller's values of `f(0)` and `d(0)`; the
    /// drivers already have both, so the policies never re-evaluate the
    /// origin. A non-negative or vanishing `slope0` (no descent direction
    /// left, typically at a near-converged point) returns the initial step
    /// immediately so no policy divides by it.
    pub fn search(&self, f: &mut dyn LineFunction, f0: f64, slope0: f64) -> LineSearchOutcome {
        let alpha0 = self.config.initial_step;

        if !(slope0 < -f64::EPSILON) {
            return LineSearchOutcome {
                alpha: alpha0,
                value: f0,
                evaluations: 0,
                converged: true,
            };
        }

        match self.config.kind {
            LineSearchKind::Static => LineSearchOutcome {
                alpha: alpha0,
                value: f0,
                evaluations: 0,
                converged: true,
            },
            LineSearchKind::Backtracking => backtracking::search(f, &self.config, f0, slope0),
            LineSearchKind::Bisection => bisection::search(f, &self.config, f0, slope0),
            LineSearchKind::Quadratic => quadratic::search(f, &self.config, f0, slope0),
            LineSearchKind::BierlaireQuadratic => bierlaire::search(f, &self.config, f0, slope0),
        }
    }
}

impl Default for LineSearch {
    fn default() -> Self {
        Self::new(LineSearchKind::default())
    }
}
