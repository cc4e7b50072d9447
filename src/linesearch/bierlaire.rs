//! Bierlaire three-point quadratic line search.
//!
//! Maintains a bracketing triple `(a, b, c)` with `f(a) >= f(b) <= f(c)`,
//! fits the unique quadratic through the three points, and moves the triple
//! toward the vertex. Works on function values only, no derivatives.

use crate::linesearch::{
    bracket::bracket_minimum, LineFunction, LineSearchConfig, LineSearchOutcome,
};

/// Vertex of the quadratic through `(a, fa)`, `(b, fb)`, `(c, fc)` in
/// closed form. `None` when the three points are collinear to working
/// precision.
fn quadratic_vertex(a: f64, b: f64, c: f64, fa: f64, fb: f64, fc: f64) -> Option<f64> {
    let denominator = fa * (b - c) + fb * (c - a) + fc * (a - b);
    if denominator.abs() <= f64::EPSILON * (fa.abs() + fb.abs() + fc.abs()).max(1.0) {
        return None;
    }
    let numerator = fa * (b * b - c * c) + fb * (c * c - a * a) + fc * (a * a - b * b);
    Some(0.5 * numerator / denominator)
}

pub(crate) fn search(
    f: &mut dyn LineFunction,
    config: &LineSearchConfig,
    f0: f64,
    _slope0: f64,
) -> LineSearchOutcome {
    // Initial triple from golden-ratio expansion along the direction. The
    // descent guarantee at zero makes (0, initial_step) a downhill pair.
    let bracket = match bracket_minimum(
        &mut |alpha| f.value(alpha),
        0.0,
        config.initial_step,
        config.max_iterations,
    ) {
        Ok(bracket) => bracket,
        Err(_) => {
            return LineSearchOutcome {
                alpha: config.initial_step,
                value: f0,
                evaluations: config.max_iterations,
                converged: false,
            };
        }
    };

    let (mut a, mut b, mut c) = (bracket.a, bracket.b, bracket.c);
    let (mut fa, mut fb, mut fc) = (bracket.fa, bracket.fb, bracket.fc);
    let mut evaluations = bracket.evaluations;
    let mut converged = false;

    for _ in 0..config.max_iterations {
        let width = c - a;
        let spread = fa.max(fc) - fb;
        if width < config.epsilon && spread < config.epsilon {
            converged = true;
            break;
        }

        let mut chi = match quadratic_vertex(a, b, c, fa, fb, fc) {
            Some(chi) => chi,
            // Collinear values: the model is flat, stop at the incumbent.
            None => break,
        };

        // A vertex landing on b would leave the triple unchanged and stall
        // the iteration: perturb it half an epsilon toward the wider side.
        if (chi - b).abs() <= f64::EPSILON * b.abs().max(1.0) {
            chi = if (c - b) >= (b - a) {
                b + 0.5 * config.epsilon
            } else {
                b - 0.5 * config.epsilon
            };
        }

        let fchi = f.value(chi);
        evaluations += 1;
        if !fchi.is_finite() {
            break;
        }

        // Four update cases keyed on the side of b and on f(chi) vs f(b);
        // each preserves f(a) >= f(b) <= f(c).
        if chi > b {
            if fchi > fb {
                c = chi;
                fc = fchi;
            } else {
                a = b;
                fa = fb;
                b = chi;
                fb = fchi;
            }
        } else if fchi > fb {
            a = chi;
            fa = fchi;
        } else {
            c = b;
            fc = fb;
            b = chi;
            fb = fchi;
        }
    }

    LineSearchOutcome {
        alpha: b,
        value: fb,
        evaluations,
        converged,
    }
}
