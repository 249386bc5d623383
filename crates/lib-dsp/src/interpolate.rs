//! 1-D interpolation kinds for spectral resampling.
//!
//! Detector spectra live on a non-uniform frequency grid (uniform in
//! wavelength); resampling interpolates them onto the uniform frequency
//! axis. Targets outside the measured range take a caller-supplied fill
//! value. The quadratic and cubic kinds evaluate a local Lagrange
//! polynomial over the bracketing 3- or 4-point window, which reproduces
//! polynomials of the matching degree exactly.

use crate::error::{DspError, DspResult};
use lib_types::InterpMethod;

/// Interpolate `y(x)` onto `x_new`.
///
/// `x` must be strictly monotonic; a descending axis is handled by
/// flipping internally.
pub fn interp1d(
    x: &[f64],
    y: &[f64],
    x_new: &[f64],
    method: InterpMethod,
    fill: f64,
) -> DspResult<Vec<f64>> {
    if x.len() != y.len() {
        return Err(DspError::LengthMismatch {
            expected: x.len(),
            actual: y.len(),
        });
    }
    let needed = match method {
        InterpMethod::Linear | InterpMethod::Slinear => 2,
        InterpMethod::Quadratic => 3,
        InterpMethod::Cubic => 4,
    };
    if x.len() < needed {
        return Err(DspError::InsufficientData {
            needed,
            got: x.len(),
        });
    }

    let descending = x[0] > x[x.len() - 1];
    let (xs, ys): (Vec<f64>, Vec<f64>) = if descending {
        (
            x.iter().rev().copied().collect(),
            y.iter().rev().copied().collect(),
        )
    } else {
        (x.to_vec(), y.to_vec())
    };

    Ok(x_new
        .iter()
        .map(|&t| interp_single(&xs, &ys, t, method, fill))
        .collect())
}

fn interp_single(x: &[f64], y: &[f64], target: f64, method: InterpMethod, fill: f64) -> f64 {
    let n = x.len();
    if target < x[0] || target > x[n - 1] {
        return fill;
    }

    // Bracketing index: x[lower] <= target <= x[lower + 1]
    let mut lower = 0;
    let mut upper = n - 1;
    while upper - lower > 1 {
        let mid = (lower + upper) / 2;
        if x[mid] <= target {
            lower = mid;
        } else {
            upper = mid;
        }
    }

    match method {
        InterpMethod::Linear | InterpMethod::Slinear => {
            let frac = (target - x[lower]) / (x[upper] - x[lower]);
            y[lower] + frac * (y[upper] - y[lower])
        }
        InterpMethod::Quadratic => lagrange(x, y, target, lower.saturating_sub(1).min(n - 3), 3),
        InterpMethod::Cubic => lagrange(x, y, target, lower.saturating_sub(1).min(n - 4), 4),
    }
}

/// Evaluate the Lagrange polynomial through `order` points starting at
/// `start`.
fn lagrange(x: &[f64], y: &[f64], target: f64, start: usize, order: usize) -> f64 {
    let mut acc = 0.0;
    for j in start..start + order {
        let mut basis = 1.0;
        for m in start..start + order {
            if m != j {
                basis *= (target - x[m]) / (x[j] - x[m]);
            }
        }
        acc += y[j] * basis;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_midpoint() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 10.0, 0.0];
        let out = interp1d(&x, &y, &[0.5, 1.5], InterpMethod::Linear, 0.0).unwrap();
        assert!((out[0] - 5.0).abs() < 1e-12);
        assert!((out[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_takes_fill() {
        let x = [0.0, 1.0];
        let y = [1.0, 2.0];
        let out = interp1d(&x, &y, &[-0.5, 0.5, 1.5], InterpMethod::Linear, 0.0).unwrap();
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 1.5).abs() < 1e-12);
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn test_quadratic_reproduces_parabola() {
        let x: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| 2.0 * v * v - 3.0 * v + 1.0).collect();
        let targets = [0.25, 3.7, 6.99];
        let out = interp1d(&x, &y, &targets, InterpMethod::Quadratic, 0.0).unwrap();
        for (&t, &v) in targets.iter().zip(out.iter()) {
            let exact = 2.0 * t * t - 3.0 * t + 1.0;
            assert!((v - exact).abs() < 1e-10, "at {t}: {v} vs {exact}");
        }
    }

    #[test]
    fn test_cubic_reproduces_cubic() {
        let x: Vec<f64> = (0..8).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|&v| v * v * v - v).collect();
        let targets = [0.1, 1.3, 3.4];
        let out = interp1d(&x, &y, &targets, InterpMethod::Cubic, 0.0).unwrap();
        for (&t, &v) in targets.iter().zip(out.iter()) {
            let exact = t * t * t - t;
            assert!((v - exact).abs() < 1e-9, "at {t}: {v} vs {exact}");
        }
    }

    #[test]
    fn test_descending_axis() {
        let x = [2.0, 1.0, 0.0];
        let y = [4.0, 1.0, 0.0];
        let out = interp1d(&x, &y, &[0.5], InterpMethod::Linear, 0.0).unwrap();
        assert!((out[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_points() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 2.0];
        assert!(matches!(
            interp1d(&x, &y, &[0.5], InterpMethod::Cubic, 0.0),
            Err(DspError::InsufficientData { needed: 4, got: 3 })
        ));
    }
}
