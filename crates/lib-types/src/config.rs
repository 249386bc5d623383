//! Mode enumerations and acquisition inputs.
//!
//! Each acquisition mode carries exactly the channels it requires, so a
//! reconstruction can match exhaustively instead of probing for optional
//! attributes at runtime.

use crate::geometry::ReferenceGeometry;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Interpolation kind used for resampling and reference-phase transfer.
///
/// `Slinear` is the order-1 spline; on a monotonic grid it produces the
/// same values as `Linear` and shares its code path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpMethod {
    #[default]
    Linear,
    Slinear,
    Quadratic,
    Cubic,
}

/// Acquisition-mode tag, kept in the parameter record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquireMode {
    #[default]
    Single,
    Double,
    Triple,
}

/// Camera frames for a spatial acquisition.
///
/// Axis 0 is the detector pixel row, axis 1 the spectral channel.
#[derive(Clone, Debug)]
pub enum AcquiredFrames {
    /// Interference frame only; the unknown spectrum is recovered by FTSI.
    Single { interference: Array2<f64> },

    /// Interference plus a directly measured unknown spectrum.
    Double {
        interference: Array2<f64>,
        unknown: Array2<f64>,
    },

    /// Interference, unknown, and reference spectra all measured.
    Triple {
        interference: Array2<f64>,
        unknown: Array2<f64>,
        reference: Array2<f64>,
    },
}

impl AcquiredFrames {
    pub fn mode(&self) -> AcquireMode {
        match self {
            Self::Single { .. } => AcquireMode::Single,
            Self::Double { .. } => AcquireMode::Double,
            Self::Triple { .. } => AcquireMode::Triple,
        }
    }

    pub fn interference(&self) -> &Array2<f64> {
        match self {
            Self::Single { interference }
            | Self::Double { interference, .. }
            | Self::Triple { interference, .. } => interference,
        }
    }

    pub fn unknown(&self) -> Option<&Array2<f64>> {
        match self {
            Self::Single { .. } => None,
            Self::Double { unknown, .. } | Self::Triple { unknown, .. } => Some(unknown),
        }
    }

    pub fn reference(&self) -> Option<&Array2<f64>> {
        match self {
            Self::Triple { reference, .. } => Some(reference),
            _ => None,
        }
    }

    /// Frame used for fiber-position detection: the unknown channel when
    /// measured (no interference fringes on it), else the interference.
    pub fn detection_frame(&self) -> &Array2<f64> {
        match self {
            Self::Single { interference } => interference,
            Self::Double { unknown, .. } | Self::Triple { unknown, .. } => unknown,
        }
    }
}

/// Single-point spectra for a self-referenced acquisition.
#[derive(Clone, Debug)]
pub enum AcquiredSpectra {
    Single { interference: Array1<f64> },
    Double {
        interference: Array1<f64>,
        unknown: Array1<f64>,
    },
    Triple {
        interference: Array1<f64>,
        unknown: Array1<f64>,
        reference: Array1<f64>,
    },
}

impl AcquiredSpectra {
    pub fn mode(&self) -> AcquireMode {
        match self {
            Self::Single { .. } => AcquireMode::Single,
            Self::Double { .. } => AcquireMode::Double,
            Self::Triple { .. } => AcquireMode::Triple,
        }
    }

    pub fn interference(&self) -> &Array1<f64> {
        match self {
            Self::Single { interference }
            | Self::Double { interference, .. }
            | Self::Triple { interference, .. } => interference,
        }
    }

    pub fn unknown(&self) -> Option<&Array1<f64>> {
        match self {
            Self::Single { .. } => None,
            Self::Double { unknown, .. } | Self::Triple { unknown, .. } => Some(unknown),
        }
    }

    pub fn reference(&self) -> Option<&Array1<f64>> {
        match self {
            Self::Triple { reference, .. } => Some(reference),
            _ => None,
        }
    }
}

/// How fiber positions on the detector are established.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum FiberPositionSource {
    /// Externally calibrated pixel row per fiber cell, row-major.
    Calibration { pixels: Vec<usize> },

    /// Detect peaks and assign them by expected spacing.
    Calculation { first_pixel: f64, spacing: f64 },
}

/// Where the reference-sphere geometry comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GeometrySource {
    /// Fit the sphere to this instance's own delay map (`as_calibration`).
    Fit,

    /// Use a previously fit record supplied by the caller.
    Provided(ReferenceGeometry),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_frames_channel_access() {
        let interference = Array2::<f64>::zeros((4, 8));
        let unknown = Array2::<f64>::ones((4, 8));

        let single = AcquiredFrames::Single {
            interference: interference.clone(),
        };
        assert_eq!(single.mode(), AcquireMode::Single);
        assert!(single.unknown().is_none());
        assert!(single.reference().is_none());

        let double = AcquiredFrames::Double {
            interference,
            unknown,
        };
        assert_eq!(double.mode(), AcquireMode::Double);
        assert!(double.unknown().is_some());
        // Position detection prefers the fringe-free unknown channel
        assert!((double.detection_frame()[[0, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_interp_method_default() {
        assert_eq!(InterpMethod::default(), InterpMethod::Linear);
    }
}
