//! Quadratic-interpolation line search with Kelley's stagnation safeguard.
//!
//! Fits `p(alpha) = f(0) + d(0)·alpha + p2·alpha²` through the origin data
//! and one decreasing sample found by one-sided bracketing, then steps to
//! the vertex of the parabola, clamped to `[sigma0·alpha_s, sigma1·alpha_s]`
//! so the iteration cannot stagnate at either end of the sample interval.
//! The clamp makes the trial sequence monotonically decreasing: this is a
//! safeguarded backtracking scheme, not a minimizer of the restriction.
//!
//! The loop is bounded; on exhaustion the best trial seen (lowest value) is
//! returned.

use crate::linesearch::{
    bracket::bracket_minimum_with_fixed_point, LineFunction, LineSearchConfig, LineSearchOutcome,
};

pub(crate) fn search(
    f: &mut dyn LineFunction,
    config: &LineSearchConfig,
    f0: f64,
    slope0: f64,
) -> LineSearchOutcome {
    // One additional sample below f(0); the bracketing interval may contain
    // more than one minimum of the restriction, which is accepted here.
    let (mut alpha_s, mut value_s, bracket_evals) = match bracket_minimum_with_fixed_point(
        &mut |a| f.value(a),
        f0,
        config.initial_step,
        config.max_iterations,
    ) {
        Ok(sample) => sample,
        Err(_) => {
            // No decrease found anywhere: hand the initial step back to the
            // outer loop.
            return LineSearchOutcome {
                alpha: config.initial_step,
                value: f0,
                evaluations: config.max_iterations,
                converged: false,
            };
        }
    };
    let mut evaluations = bracket_evals;

    let mut best_alpha = alpha_s;
    let mut best_value = value_s;

    for _ in 0..config.max_iterations {
        // p2 from the interpolation conditions p(0)=f0, p'(0)=d0,
        // p(alpha_s)=f(alpha_s)
        let p2 = (value_s - f0 - slope0 * alpha_s) / (alpha_s * alpha_s);

        let mut alpha_t = if p2 > 0.0 {
            -slope0 / (2.0 * p2)
        } else {
            // Concave or flat fit: the model has no interior minimum, step
            // to the safeguard upper bound.
            config.sigma1 * alpha_s
        };

        // Kelley's safeguard: keep the trial inside the sample interval.
        let lower = config.sigma0 * alpha_s;
        let upper = config.sigma1 * alpha_s;
        if alpha_t < lower {
            alpha_t = lower;
        }
        if alpha_t > upper {
            alpha_t = upper;
        }

        let slope_t = f.slope(alpha_t);
        let value_t = f.value(alpha_t);
        evaluations += 2;

        if value_t.is_finite() && value_t < best_value {
            best_alpha = alpha_t;
            best_value = value_t;
        }

        if slope_t.abs() <= config.slope_tolerance {
            return LineSearchOutcome {
                alpha: alpha_t,
                value: value_t,
                evaluations,
                converged: true,
            };
        }
        if !value_t.is_finite() {
            break;
        }

        alpha_s = alpha_t;
        value_s = value_t;
    }

    LineSearchOutcome {
        alpha: best_alpha,
        value: best_value,
        evaluations,
        converged: false,
    }
}
