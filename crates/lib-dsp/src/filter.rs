//! Super-Gaussian bandpass windows for time-domain gating.
//!
//! FTSI isolates the DC and AC components of the interferogram by
//! multiplying the time-domain trace with `exp(-((t - c)/w)^order)`.
//! Higher (even) orders give a flatter passband with steeper skirts than
//! a plain Gaussian, which keeps the spectral phase of the gated beat
//! intact.

use crate::error::{DspError, DspResult};
use ndarray::Array1;

/// Width at which the filter value has fallen to this fraction, used to
/// derive the width from a detected delay.
const EDGE_ATTENUATION: f64 = 1e-3;

/// Super-Gaussian window `exp(-((t - center)/width)^order)` over a time
/// axis. The order must be even so the window is symmetric and positive.
pub fn supergaussian(
    t_axis: &Array1<f64>,
    center: f64,
    width: f64,
    order: u32,
) -> DspResult<Array1<f64>> {
    if order % 2 != 0 || order == 0 {
        return Err(DspError::OddFilterOrder(order));
    }
    Ok(t_axis.mapv(|t| (-((t - center) / width).powi(order as i32)).exp()))
}

/// Filter width for a detected delay: the value reaches `1e-3` at
/// `delay/2`, so the DC and AC windows meet halfway with negligible
/// overlap.
pub fn width_for_delay(delay: f64, order: u32) -> f64 {
    (-EDGE_ATTENUATION.ln()).powf(-1.0 / order as f64) * delay / 2.0
}
