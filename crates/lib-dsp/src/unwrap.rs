//! Phase unwrapping.
//!
//! Spectral phases come out of `atan2` wrapped to `(-π, π]`; unwrapping
//! removes the 2π jumps so the phase can be differenced, interpolated,
//! and calibrated across cells. Non-finite samples (dead fiber cells)
//! are left in place and the running correction carries across them.

use ndarray::{Array2, Array3};
use std::f64::consts::PI;

/// Unwrap a phase sequence in place, NumPy-style: any jump larger than π
/// between consecutive finite samples is folded back by a multiple of 2π.
pub fn unwrap_inplace(phase: &mut [f64]) {
    let tau = 2.0 * PI;
    let mut offset = 0.0;
    let mut prev_raw: Option<f64> = None;

    for v in phase.iter_mut() {
        if !v.is_finite() {
            continue;
        }
        let raw = *v;
        if let Some(p) = prev_raw {
            let jump = raw - p;
            let k = ((jump + PI) / tau).floor();
            offset -= k * tau;
        }
        prev_raw = Some(raw);
        *v = raw + offset;
    }
}

/// Unwrapped copy of a phase sequence.
pub fn unwrapped(phase: &[f64]) -> Vec<f64> {
    let mut out = phase.to_vec();
    unwrap_inplace(&mut out);
    out
}

/// Unwrap along the last (frequency) axis of a `(rows, cols, n)` phase
/// array, each cell independently.
pub fn unwrap_last_axis(phase: &mut Array3<f64>) {
    let (ny, nx, _) = phase.dim();
    for r in 0..ny {
        for c in 0..nx {
            let mut row: Vec<f64> = phase.slice(ndarray::s![r, c, ..]).to_vec();
            unwrap_inplace(&mut row);
            phase
                .slice_mut(ndarray::s![r, c, ..])
                .assign(&ndarray::ArrayView1::from(&row));
        }
    }
}

/// Itoh-style 2-D unwrap of one spatial slice: rows first, then columns.
///
/// Exact when the true phase gradient stays below π per cell in both
/// directions, which holds for the smooth wavefronts seen across a fiber
/// bundle. NaN cells are skipped and stay NaN.
pub fn unwrap_2d(phase: &mut Array2<f64>) {
    let (ny, nx) = phase.dim();

    for r in 0..ny {
        let mut row: Vec<f64> = (0..nx).map(|c| phase[[r, c]]).collect();
        unwrap_inplace(&mut row);
        for c in 0..nx {
            phase[[r, c]] = row[c];
        }
    }
    for c in 0..nx {
        let mut col: Vec<f64> = (0..ny).map(|r| phase[[r, c]]).collect();
        unwrap_inplace(&mut col);
        for r in 0..ny {
            phase[[r, c]] = col[r];
        }
    }
}

/// Wrap a phase value back to `(-π, π]`.
#[inline]
pub fn wrap(phase: f64) -> f64 {
    // angle(exp(i*phase))
    phase.sin().atan2(phase.cos())
}
