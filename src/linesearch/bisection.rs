//! Bisection line search on the derivative of the restriction.
//!
//! A minimum of `f(alpha)` along a descent direction is a sign change of
//! the slope `d(alpha)`: negative at zero, positive past the minimum. The
//! policy first expands the trial step until the slope turns non-negative,
//! then bisects the sign-change interval.

use crate::linesearch::{LineFunction, LineSearchConfig, LineSearchOutcome};

pub(crate) fn search(
    f: &mut dyn LineFunction,
    config: &LineSearchConfig,
    f0: f64,
    slope0: f64,
) -> LineSearchOutcome {
    let mut evaluations = 0;

    // Expansion: find b with d(b) >= 0. d(0) < 0 is guaranteed by the
    // dispatcher.
    let mut a = 0.0;
    let mut slope_a = slope0;
    let mut b = config.initial_step;
    let mut slope_b = f.slope(b);
    evaluations += 1;

    let mut expansions = 0;
    while slope_b < 0.0 && slope_b.is_finite() {
        if expansions >= config.max_iterations {
            // Still descending at every probe: take the largest trial.
            let value = f.value(b);
            evaluations += 1;
            return LineSearchOutcome {
                alpha: b,
                value,
                evaluations,
                converged: false,
            };
        }
        a = b;
        slope_a = slope_b;
        b *= 2.0;
        slope_b = f.slope(b);
        evaluations += 1;
        expansions += 1;
    }

    if !slope_b.is_finite() {
        // The expansion walked out of the evaluable region; fall back to
        // the last point with a finite slope, or the trial itself when the
        // very first probe already failed.
        let alpha = if a > 0.0 { a } else { b };
        let value = f.value(alpha);
        evaluations += 1;
        return LineSearchOutcome {
            alpha,
            value,
            evaluations,
            converged: false,
        };
    }

    // Bisection on [a, b] with d(a) < 0 <= d(b).
    let mut mid = 0.5 * (a + b);
    for _ in 0..config.max_iterations {
        mid = 0.5 * (a + b);
        let slope_mid = f.slope(mid);
        evaluations += 1;

        if !slope_mid.is_finite() {
            break;
        }
        if slope_mid.abs() <= config.slope_tolerance || (b - a) <= config.alpha_tolerance {
            let value = f.value(mid);
            evaluations += 1;
            return LineSearchOutcome {
                alpha: mid,
                value,
                evaluations,
                converged: true,
            };
        }

        // Keep the half whose endpoint slopes have opposite signs.
        if slope_a * slope_mid < 0.0 {
            b = mid;
        } else {
            a = mid;
            slope_a = slope_mid;
        }
    }

    let value = f.value(mid);
    evaluations += 1;
    LineSearchOutcome {
        alpha: mid,
        value,
        evaluations,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use crate::linesearch::{LineSearch, LineSearchConfig, LineSearchKind, ScalarLine};

    #[test]
    fn finds_interior_minimum() {
        // f(alpha) = (alpha - 3)^2, minimum at alpha = 3
        let mut line = ScalarLine::new(
            |a: f64| (a - 3.0) * (a - 3.0),
            |a: f64| 2.0 * (a - 3.0),
        );
        let search = LineSearch::new(LineSearchKind::Bisection);

        let outcome = search.search(&mut line, 9.0, -6.0);
        assert!(outcome.converged);
        assert!((outcome.alpha - 3.0).abs() < 1e-6);
    }

    #[test]
    fn slope_at_result_is_within_tolerance() {
        let mut line = ScalarLine::new(|a: f64| (a - 0.7) * (a - 0.7), |a: f64| 2.0 * (a - 0.7));
        let search = LineSearch::with_config(
            LineSearchConfig::new(LineSearchKind::Bisection).with_tolerances(1e-10, 1e-6),
        )
        .unwrap();

        let outcome = search.search(&mut line, 0.49, -1.4);
        assert!(outcome.converged);
        assert!((2.0 * (outcome.alpha - 0.7)).abs() <= 1e-6 || (outcome.alpha - 0.7).abs() < 1e-6);
    }

    #[test]
    fn monotone_decreasing_returns_largest_trial() {
        // d(alpha) = -1 everywhere: no minimum to bracket
        let mut line = ScalarLine::new(|a: f64| -a, |_| -1.0);
        let search = LineSearch::with_config(
            LineSearchConfig::new(LineSearchKind::Bisection).with_max_iterations(10),
        )
        .unwrap();

        let outcome = search.search(&mut line, 0.0, -1.0);
        assert!(!outcome.converged);
        // ten doublings of the unit initial step
        assert_eq!(outcome.alpha, 1024.0);
    }
}
