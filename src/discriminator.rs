//! Stateless discriminators, spec.md section 4.D.

use rustfft::num_complex::Complex32;

/// Two-quadrant arctan PLL discriminator: Hz-normalized residual carrier
/// phase from the prompt correlator.
pub fn pll_cloop_two_quadrant_atan(prompt: Complex32) -> f64 {
    (prompt.im as f64).atan2(prompt.re as f64) / (2.0 * std::f64::consts::PI)
}

/// Non-coherent normalized early-minus-late DLL discriminator.
pub fn dll_nc_e_minus_l_normalized(early: Complex32, late: Complex32) -> f64 {
    let e = early.norm() as f64;
    let l = late.norm() as f64;
    if e + l == 0.0 {
        return 0.0;
    }
    (e - l) / (e + l)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pll_discriminator_zero_on_real_axis() {
        let prompt = Complex32::new(1.0, 0.0);
        assert_abs_diff_eq!(pll_cloop_two_quadrant_atan(prompt), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn pll_discriminator_quarter_turn_on_imaginary_axis() {
        let prompt = Complex32::new(0.0, 1.0);
        assert_abs_diff_eq!(pll_cloop_two_quadrant_atan(prompt), 0.25, epsilon = 1e-9);
    }

    #[test]
    fn dll_discriminator_zero_when_balanced() {
        let early = Complex32::new(0.7, 0.1);
        let late = Complex32::new(0.7, -0.1);
        assert_abs_diff_eq!(dll_nc_e_minus_l_normalized(early, late), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn dll_discriminator_sign_tracks_early_late_imbalance() {
        let early = Complex32::new(1.0, 0.0);
        let late = Complex32::new(0.2, 0.0);
        assert!(dll_nc_e_minus_l_normalized(early, late) > 0.0);

        let early = Complex32::new(0.2, 0.0);
        let late = Complex32::new(1.0, 0.0);
        assert!(dll_nc_e_minus_l_normalized(early, late) < 0.0);
    }
}
