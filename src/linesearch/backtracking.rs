//! Backtracking line search under the Armijo and Wolfe conditions.

use crate::linesearch::{
    curvature_holds, sufficient_decrease, CurvatureKind, LineFunction, LineSearchConfig,
    LineSearchOutcome,
};

/// Shrink the step geometrically until the sufficient-decrease condition
/// holds, optionally followed by a curvature check.
///
/// On exhaustion the last trial step is returned with `converged` false;
/// a stalled line search is not fatal to the outer iteration.
pub(crate) fn search(
    f: &mut dyn LineFunction,
    config: &LineSearchConfig,
    f0: f64,
    slope0: f64,
) -> LineSearchOutcome {
    let mut alpha = config.initial_step;
    let mut last_alpha = alpha;
    let mut last_value = f0;
    let mut evaluations = 0;

    for _ in 0..config.max_iterations {
        let value = f.value(alpha);
        evaluations += 1;
        last_alpha = alpha;
        last_value = value;

        if sufficient_decrease(value, f0, slope0, alpha, config.c1) {
            if config.curvature == CurvatureKind::None {
                return LineSearchOutcome {
                    alpha,
                    value,
                    evaluations,
                    converged: true,
                };
            }

            let slope = f.slope(alpha);
            evaluations += 1;
            if curvature_holds(slope, slope0, config.c2, config.curvature) {
                return LineSearchOutcome {
                    alpha,
                    value,
                    evaluations,
                    converged: true,
                };
            }
        }

        alpha *= config.shrink_factor;
    }

    LineSearchOutcome {
        alpha: last_alpha,
        value: last_value,
        evaluations,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use crate::linesearch::{
        sufficient_decrease, CurvatureKind, LineSearch, LineSearchConfig, LineSearchKind,
        ScalarLine,
    };

    fn quadratic_line() -> ScalarLine<impl FnMut(f64) -> f64, impl FnMut(f64) -> f64> {
        // f(alpha) = (alpha - 1)^2, descending at zero with slope -2
        ScalarLine::new(
            |a: f64| (a - 1.0) * (a - 1.0),
            |a: f64| 2.0 * (a - 1.0),
        )
    }

    #[test]
    fn returned_step_satisfies_armijo() {
        let mut line = quadratic_line();
        let search = LineSearch::with_config(
            LineSearchConfig::new(LineSearchKind::Backtracking).with_initial_step(8.0),
        )
        .unwrap();

        let f0 = 1.0;
        let slope0 = -2.0;
        let outcome = search.search(&mut line, f0, slope0);

        assert!(outcome.converged);
        assert!(outcome.alpha <= 8.0);
        assert!(sufficient_decrease(
            outcome.value,
            f0,
            slope0,
            outcome.alpha,
            search.config().c1
        ));
    }

    #[test]
    fn shrinks_monotonically_from_initial_step() {
        let mut line = quadratic_line();
        let search = LineSearch::with_config(
            LineSearchConfig::new(LineSearchKind::Backtracking).with_initial_step(64.0),
        )
        .unwrap();

        let outcome = search.search(&mut line, 1.0, -2.0);
        assert!(outcome.alpha <= 64.0);
        // 64 * 0.5^k for some k
        let ratio = 64.0 / outcome.alpha;
        assert!((ratio.log2() - ratio.log2().round()).abs() < 1e-12);
    }

    #[test]
    fn strong_wolfe_accepts_near_minimum_step() {
        let mut line = quadratic_line();
        let search = LineSearch::with_config(
            LineSearchConfig::new(LineSearchKind::Backtracking)
                .with_initial_step(1.0)
                .with_curvature(CurvatureKind::Strong, 0.9),
        )
        .unwrap();

        // alpha = 1 is the exact minimizer: zero slope, both conditions hold
        let outcome = search.search(&mut line, 1.0, -2.0);
        assert!(outcome.converged);
        assert_eq!(outcome.alpha, 1.0);
    }

    #[test]
    fn exhaustion_returns_last_trial() {
        // Function that never satisfies Armijo: constant, slope reported
        // negative at zero
        let mut line = ScalarLine::new(|_| 1.0, |_| 0.0);
        let search = LineSearch::with_config(
            LineSearchConfig::new(LineSearchKind::Backtracking)
                .with_initial_step(1.0)
                .with_max_iterations(5),
        )
        .unwrap();

        let outcome = search.search(&mut line, 1.0, -1.0);
        assert!(!outcome.converged);
        // five halvings, last evaluated trial
        assert!((outcome.alpha - 0.0625).abs() < 1e-15);
    }
}
