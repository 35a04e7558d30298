//! FFT kernel, spec.md section 4.C.
//!
//! Wraps forward/inverse complex FFT plans over a fixed `fft_size`,
//! reused across dwells and never reallocated on the hot path (spec.md
//! section 9, "FFT ownership"). Mirrors the teacher's convention of one
//! `FftPlanner` owned per channel (`channel.rs`, `acquisition.rs`), but
//! keeps forward/inverse plans pre-built instead of re-querying the
//! planner on every call.
//!
//! Normalization: neither direction of `rustfft` scales its output, so
//! callers compensate explicitly (see `crate::acquisition`).

use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{GnssError, Result};

pub struct FftKernel {
    fft_size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex64>,
}

impl FftKernel {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            fft_size,
            forward,
            inverse,
            scratch: vec![Complex64::default(); scratch_len],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// In-place forward FFT. `buf.len()` must equal `fft_size`.
    pub fn forward(&mut self, buf: &mut [Complex64]) -> Result<()> {
        if buf.len() != self.fft_size {
            return Err(GnssError::FftSizeMismatch {
                expected: self.fft_size,
                actual: buf.len(),
            });
        }
        self.forward
            .process_with_scratch(buf, &mut self.scratch);
        Ok(())
    }

    /// In-place inverse FFT, unnormalized (per spec.md section 4.C, the
    /// acquisition engine compensates by dividing by `fft_size^2`
    /// elsewhere rather than scaling here).
    pub fn inverse(&mut self, buf: &mut [Complex64]) -> Result<()> {
        if buf.len() != self.fft_size {
            return Err(GnssError::FftSizeMismatch {
                expected: self.fft_size,
                actual: buf.len(),
            });
        }
        self.inverse
            .process_with_scratch(buf, &mut self.scratch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::Rng;

    #[test]
    fn idempotence_roundtrip() {
        // spec.md section 8, property 2.
        let n = 256;
        let mut kernel = FftKernel::new(n);
        let mut rng = rand::thread_rng();
        let original: Vec<Complex64> = (0..n)
            .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
            .collect();

        let mut buf = original.clone();
        kernel.forward(&mut buf).unwrap();
        kernel.inverse(&mut buf).unwrap();
        for (a, b) in buf.iter().zip(original.iter()) {
            assert_abs_diff_eq!(a.re / n as f64, b.re, epsilon = 1e-9);
            assert_abs_diff_eq!(a.im / n as f64, b.im, epsilon = 1e-9);
        }
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let mut kernel = FftKernel::new(64);
        let mut buf = vec![Complex64::default(); 32];
        assert!(kernel.forward(&mut buf).is_err());
    }
}
