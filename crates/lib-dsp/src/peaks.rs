//! Peak detection and trace rescaling.
//!
//! Used twice in the reconstruction: locating the interferometric beat in
//! a time-domain trace, and locating fiber signals along the detector
//! pixel axis. Only interior local maxima count; a maximum at the first
//! or last sample cannot be confirmed as a peak.

/// A detected local maximum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    /// Sample index of the peak.
    pub index: usize,

    /// Trace value at the peak.
    pub height: f64,
}

/// Find interior local maxima of `trace`.
///
/// `min_height` drops peaks below a floor; `min_distance` enforces a
/// minimum spacing by keeping the taller of two crowding peaks.
pub fn find_peaks(trace: &[f64], min_height: Option<f64>, min_distance: Option<usize>) -> Vec<Peak> {
    let mut peaks = Vec::new();

    for i in 1..trace.len().saturating_sub(1) {
        if !trace[i].is_finite() {
            continue;
        }
        if trace[i] > trace[i - 1] && trace[i] >= trace[i + 1] {
            if let Some(h) = min_height {
                if trace[i] < h {
                    continue;
                }
            }
            peaks.push(Peak {
                index: i,
                height: trace[i],
            });
        }
    }

    if let Some(dist) = min_distance {
        peaks = enforce_distance(peaks, dist);
    }
    peaks
}

/// Keep the tallest peaks first, discarding any peak within `dist`
/// samples of an already-kept one, then restore index order.
fn enforce_distance(mut peaks: Vec<Peak>, dist: usize) -> Vec<Peak> {
    peaks.sort_by(|a, b| b.height.total_cmp(&a.height));

    let mut kept: Vec<Peak> = Vec::with_capacity(peaks.len());
    for p in peaks {
        if kept
            .iter()
            .all(|q| p.index.abs_diff(q.index) >= dist.max(1))
        {
            kept.push(p);
        }
    }
    kept.sort_by_key(|p| p.index);
    kept
}

/// The tallest peak, if any.
pub fn strongest(peaks: &[Peak]) -> Option<Peak> {
    peaks
        .iter()
        .copied()
        .max_by(|a, b| a.height.total_cmp(&b.height))
}

/// Rescale a trace to `[0, 1]`, ignoring non-finite samples.
///
/// A flat trace maps to all zeros. Non-finite samples pass through
/// unchanged.
pub fn rescale(trace: &[f64]) -> Vec<f64> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in trace {
        if v.is_finite() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    if !lo.is_finite() || hi - lo == 0.0 {
        return trace.iter().map(|&v| if v.is_finite() { 0.0 } else { v }).collect();
    }
    trace.iter().map(|&v| (v - lo) / (hi - lo)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interior_peaks_only() {
        // Maxima at the ends must not register
        let trace = [5.0, 1.0, 3.0, 1.0, 0.5, 2.0, 0.1, 9.0];
        let peaks = find_peaks(&trace, None, None);
        let indices: Vec<usize> = peaks.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![2, 5]);
    }

    #[test]
    fn test_height_floor() {
        let trace = [0.0, 0.005, 0.0, 0.5, 0.0];
        let peaks = find_peaks(&trace, Some(0.01), None);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 3);
    }

    #[test]
    fn test_distance_keeps_taller() {
        let trace = [0.0, 1.0, 0.9, 2.0, 0.0, 0.0, 0.0, 1.5, 0.0];
        let peaks = find_peaks(&trace, None, Some(4));
        let indices: Vec<usize> = peaks.iter().map(|p| p.index).collect();
        // index 1 is within 4 samples of the taller peak at 3
        assert_eq!(indices, vec![3, 7]);
    }

    #[test]
    fn test_strongest() {
        let trace = [0.0, 1.0, 0.0, 3.0, 0.0, 2.0, 0.0];
        let peaks = find_peaks(&trace, None, None);
        assert_eq!(strongest(&peaks).unwrap().index, 3);
        assert!(strongest(&[]).is_none());
    }

    #[test]
    fn test_rescale() {
        let out = rescale(&[2.0, 4.0, 6.0]);
        assert_eq!(out, vec![0.0, 0.5, 1.0]);

        let flat = rescale(&[3.0, 3.0]);
        assert_eq!(flat, vec![0.0, 0.0]);

        let with_nan = rescale(&[0.0, f64::NAN, 1.0]);
        assert!(with_nan[1].is_nan());
        assert_eq!(with_nan[2], 1.0);
    }
}
