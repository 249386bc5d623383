//! Physical units and optical constants.
//!
//! These newtypes provide compile-time unit checking to prevent
//! mixing incompatible quantities (e.g., adding nanometers to
//! femtoseconds). All spectral math in the workspace runs in the
//! (nm, fs, rad/fs) system; spatial geometry uses millimeters.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Div, Mul, Sub};

/// Speed of light in nm/fs (the natural unit for optical spectra).
pub const SPEED_OF_LIGHT_NM_FS: f64 = 299.792458;

/// Speed of light in mm/fs (the natural unit for bench geometry).
pub const SPEED_OF_LIGHT_MM_FS: f64 = SPEED_OF_LIGHT_NM_FS * 1e-6;

/// Time duration in femtoseconds.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Femtoseconds(pub f64);

impl Femtoseconds {
    pub const ZERO: Self = Self(0.0);

    #[inline]
    pub fn from_ps(ps: f64) -> Self {
        Self(ps * 1e3)
    }

    #[inline]
    pub fn as_ps(&self) -> f64 {
        self.0 * 1e-3
    }
}

impl Add for Femtoseconds {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Femtoseconds {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<f64> for Femtoseconds {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<f64> for Femtoseconds {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self(self.0 / rhs)
    }
}

/// Wavelength in nanometers.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Nanometers(pub f64);

impl Nanometers {
    #[inline]
    pub fn from_um(um: f64) -> Self {
        Self(um * 1e3)
    }

    #[inline]
    pub fn as_um(&self) -> f64 {
        self.0 * 1e-3
    }

    /// Absolute angular frequency, `ω = 2πc/λ`, in rad/fs.
    #[inline]
    pub fn angular_frequency(&self) -> RadiansPerFemtosecond {
        RadiansPerFemtosecond(2.0 * PI * SPEED_OF_LIGHT_NM_FS / self.0)
    }
}

impl Add for Nanometers {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Nanometers {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<f64> for Nanometers {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<f64> for Nanometers {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self(self.0 / rhs)
    }
}

/// Angular frequency in rad/fs.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct RadiansPerFemtosecond(pub f64);

impl RadiansPerFemtosecond {
    /// Wavelength for an absolute angular frequency, `λ = 2πc/ω`.
    #[inline]
    pub fn wavelength(&self) -> Nanometers {
        Nanometers(2.0 * PI * SPEED_OF_LIGHT_NM_FS / self.0)
    }
}

impl Add for RadiansPerFemtosecond {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for RadiansPerFemtosecond {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

/// Relative angular frequency of a wavelength sample with respect to a
/// carrier, `ω = 2πc/λ − ω_center`, in rad/fs.
#[inline]
pub fn relative_angular_frequency(wavelength_nm: f64, omega_center: f64) -> f64 {
    2.0 * PI * SPEED_OF_LIGHT_NM_FS / wavelength_nm - omega_center
}

/// Wavelength corresponding to a relative angular frequency.
#[inline]
pub fn wavelength_from_relative(omega: f64, omega_center: f64) -> f64 {
    2.0 * PI * SPEED_OF_LIGHT_NM_FS / (omega + omega_center)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrier_frequency_800nm() {
        // 800 nm Ti:sapphire carrier is about 2.355 rad/fs
        let omega = Nanometers(800.0).angular_frequency();
        assert!((omega.0 - 2.3546).abs() < 1e-3);
        assert!((omega.wavelength().0 - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_relative_frequency_roundtrip() {
        let omega_center = Nanometers(793.0).angular_frequency().0;
        let omega = relative_angular_frequency(750.0, omega_center);
        assert!(omega > 0.0, "shorter wavelength maps to positive offset");
        let back = wavelength_from_relative(omega, omega_center);
        assert!((back - 750.0).abs() < 1e-9);
    }
}
