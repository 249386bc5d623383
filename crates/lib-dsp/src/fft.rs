//! Centered Fourier transforms between the retained band and the working grid.
//!
//! All transforms in this workspace are centered: zero frequency and zero
//! time sit in the middle of their axes, so every FFT is wrapped in a
//! shift on the way in and on the way out. The forward transform crops the
//! working grid of `n_fft` samples down to the retained `n_omega`-sample
//! band; the inverse pads the band back up symmetrically. The pair is an
//! exact round trip only for signals already confined to the retained
//! band; otherwise the crop is deliberately lossy.

use crate::error::{DspError, DspResult};
use ndarray::{Array2, Array3, Axis};
use num_complex::Complex64;
use rustfft::FftPlanner;

/// Move the zero bin to the center of the buffer.
pub fn fftshift<T>(buf: &mut [T]) {
    let n = buf.len();
    if n > 1 {
        buf.rotate_left((n + 1) / 2);
    }
}

/// Inverse of [`fftshift`] (identical for even lengths).
pub fn ifftshift<T>(buf: &mut [T]) {
    let n = buf.len();
    if n > 1 {
        buf.rotate_left(n / 2);
    }
}

/// Transform engine with cached FFT plans.
pub struct TransformKernel {
    planner: FftPlanner<f64>,
}

impl TransformKernel {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    fn check_sizes(n_omega: usize, n_fft: usize) -> DspResult<()> {
        if n_omega < 2 || n_fft < n_omega || (n_fft - n_omega) % 2 != 0 {
            return Err(DspError::PadMismatch { n_omega, n_fft });
        }
        Ok(())
    }

    /// Forward transform of one time-domain row, cropped to the central
    /// `n_omega` frequency samples.
    pub fn ft_row(
        &mut self,
        et: &[Complex64],
        n_omega: usize,
        n_fft: usize,
    ) -> DspResult<Vec<Complex64>> {
        Self::check_sizes(n_omega, n_fft)?;
        if et.len() != n_fft {
            return Err(DspError::LengthMismatch {
                expected: n_fft,
                actual: et.len(),
            });
        }

        let mut buf = et.to_vec();
        fftshift(&mut buf);
        self.planner.plan_fft_forward(n_fft).process(&mut buf);
        fftshift(&mut buf);

        let start = (n_fft - n_omega) / 2;
        Ok(buf[start..start + n_omega].to_vec())
    }

    /// Inverse transform of one `n_omega`-sample spectrum, zero-padded
    /// symmetrically to the `n_fft` working grid.
    pub fn ift_row(
        &mut self,
        ew: &[Complex64],
        n_omega: usize,
        n_fft: usize,
    ) -> DspResult<Vec<Complex64>> {
        Self::check_sizes(n_omega, n_fft)?;
        if ew.len() != n_omega {
            return Err(DspError::LengthMismatch {
                expected: n_omega,
                actual: ew.len(),
            });
        }

        let pad = (n_fft - n_omega) / 2;
        let mut buf = vec![Complex64::default(); n_fft];
        buf[pad..pad + n_omega].copy_from_slice(ew);

        fftshift(&mut buf);
        self.planner.plan_fft_inverse(n_fft).process(&mut buf);
        let scale = 1.0 / n_fft as f64;
        for x in buf.iter_mut() {
            *x *= scale;
        }
        fftshift(&mut buf);

        Ok(buf)
    }

    /// Forward transform along the last axis of a `(rows, cols, n_fft)`
    /// field, cropped to `(rows, cols, n_omega)`.
    pub fn ft(
        &mut self,
        et: &Array3<Complex64>,
        n_omega: usize,
        n_fft: usize,
    ) -> DspResult<Array3<Complex64>> {
        let (ny, nx, n) = et.dim();
        if n != n_fft {
            return Err(DspError::LengthMismatch {
                expected: n_fft,
                actual: n,
            });
        }
        Self::check_sizes(n_omega, n_fft)?;

        let mut out = Array3::default((ny, nx, n_omega));
        for r in 0..ny {
            for c in 0..nx {
                let row: Vec<Complex64> = et.slice(ndarray::s![r, c, ..]).to_vec();
                let sw = self.ft_row(&row, n_omega, n_fft)?;
                out.slice_mut(ndarray::s![r, c, ..])
                    .assign(&ndarray::ArrayView1::from(&sw));
            }
        }
        Ok(out)
    }

    /// Inverse transform along the last axis of a `(rows, cols, n_omega)`
    /// spectrum, padded to `(rows, cols, n_fft)`.
    pub fn ift(
        &mut self,
        ew: &Array3<Complex64>,
        n_omega: usize,
        n_fft: usize,
    ) -> DspResult<Array3<Complex64>> {
        let (ny, nx, n) = ew.dim();
        if n != n_omega {
            return Err(DspError::LengthMismatch {
                expected: n_omega,
                actual: n,
            });
        }
        Self::check_sizes(n_omega, n_fft)?;

        let mut out = Array3::default((ny, nx, n_fft));
        for r in 0..ny {
            for c in 0..nx {
                let row: Vec<Complex64> = ew.slice(ndarray::s![r, c, ..]).to_vec();
                let st = self.ift_row(&row, n_omega, n_fft)?;
                out.slice_mut(ndarray::s![r, c, ..])
                    .assign(&ndarray::ArrayView1::from(&st));
            }
        }
        Ok(out)
    }

    /// Centered 2-D forward transform of one spatial slice.
    pub fn f2_slice(&mut self, exy: &Array2<Complex64>) -> Array2<Complex64> {
        let mut out = exy.clone();
        shift2(&mut out, true);
        self.fft2_inplace(&mut out, true);
        shift2(&mut out, false);
        out
    }

    /// Centered 2-D inverse transform of one spatial slice.
    pub fn if2_slice(&mut self, exy: &Array2<Complex64>) -> Array2<Complex64> {
        let mut out = exy.clone();
        shift2(&mut out, true);
        self.fft2_inplace(&mut out, false);
        shift2(&mut out, false);
        out
    }

    /// Centered 2-D forward transform over the two leading (spatial) axes,
    /// applied per frequency sample.
    pub fn f2(&mut self, field: &Array3<Complex64>) -> Array3<Complex64> {
        self.map_slices(field, true)
    }

    /// Centered 2-D inverse transform over the two leading (spatial) axes,
    /// applied per frequency sample.
    pub fn if2(&mut self, field: &Array3<Complex64>) -> Array3<Complex64> {
        self.map_slices(field, false)
    }

    fn map_slices(&mut self, field: &Array3<Complex64>, forward: bool) -> Array3<Complex64> {
        let mut out = field.clone();
        for k in 0..field.len_of(Axis(2)) {
            let slice = field.index_axis(Axis(2), k).to_owned();
            let transformed = if forward {
                self.f2_slice(&slice)
            } else {
                self.if2_slice(&slice)
            };
            out.index_axis_mut(Axis(2), k).assign(&transformed);
        }
        out
    }

    fn fft2_inplace(&mut self, data: &mut Array2<Complex64>, forward: bool) {
        let (ny, nx) = data.dim();

        let row_plan = if forward {
            self.planner.plan_fft_forward(nx)
        } else {
            self.planner.plan_fft_inverse(nx)
        };
        for mut row in data.rows_mut() {
            let mut buf: Vec<Complex64> = row.to_vec();
            row_plan.process(&mut buf);
            row.assign(&ndarray::ArrayView1::from(&buf));
        }

        let col_plan = if forward {
            self.planner.plan_fft_forward(ny)
        } else {
            self.planner.plan_fft_inverse(ny)
        };
        for mut col in data.columns_mut() {
            let mut buf: Vec<Complex64> = col.to_vec();
            col_plan.process(&mut buf);
            col.assign(&ndarray::ArrayView1::from(&buf));
        }

        if !forward {
            let scale = 1.0 / (ny * nx) as f64;
            data.mapv_inplace(|x| x * scale);
        }
    }
}

impl Default for TransformKernel {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply [`fftshift`]/[`ifftshift`] along both axes of a 2-D array.
fn shift2(data: &mut Array2<Complex64>, forward: bool) {
    let (ny, nx) = data.dim();
    let row_shift = if forward { (ny + 1) / 2 } else { ny / 2 };
    let col_shift = if forward { (nx + 1) / 2 } else { nx / 2 };

    let shifted = Array2::from_shape_fn((ny, nx), |(r, c)| {
        data[[(r + row_shift) % ny, (c + col_shift) % nx]]
    });
    data.assign(&shifted);
}
