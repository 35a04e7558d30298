//! Tuning parameters, spec.md section 6.

use crate::constants::{DEFAULT_CADLL_SECONDARY_SEED_OFFSET_SAMPLES, DEFAULT_EARLY_LATE_SPACE_CHIPS};

#[derive(Debug, Clone, Copy)]
pub struct AcquisitionConfig {
    pub sampled_ms: usize,
    pub max_dwells: u32,
    pub doppler_max_hz: f64,
    pub doppler_step_hz: f64,
    pub freq_if_hz: f64,
    pub fs_in_hz: f64,
    pub samples_per_ms: usize,
    pub samples_per_code: usize,
    pub bit_transition_flag: bool,
    /// Number of disjoint peaks to resolve; `1` disables auxiliary-peak
    /// search.
    pub peak: usize,
    pub threshold: f64,
}

impl AcquisitionConfig {
    pub fn fft_size(&self) -> usize {
        self.sampled_ms * self.samples_per_ms
    }

    pub fn num_doppler_bins(&self) -> usize {
        (2.0 * self.doppler_max_hz / self.doppler_step_hz) as usize + 1
    }

    /// Frequency, in Hz, of Doppler grid bin `k`.
    pub fn doppler_at(&self, k: usize) -> f64 {
        -self.doppler_max_hz + k as f64 * self.doppler_step_hz
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sampled_ms: 1,
            max_dwells: 5,
            doppler_max_hz: 5000.0,
            doppler_step_hz: 500.0,
            freq_if_hz: 0.0,
            fs_in_hz: 2_048_000.0,
            samples_per_ms: 2048,
            samples_per_code: 2048,
            bit_transition_flag: false,
            peak: 1,
            threshold: 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrackingConfig {
    pub fs_in_hz: f64,
    pub freq_if_hz: f64,
    pub pll_bw_hz: f64,
    pub dll_bw_hz: f64,
    pub early_late_space_chips: f64,
    /// Upper bound on `current_prn_length_samples`; spec.md section 6.
    pub vector_length: usize,
    pub cadll_secondary_seed_offset_samples: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            fs_in_hz: 2_048_000.0,
            freq_if_hz: 0.0,
            pll_bw_hz: 25.0,
            dll_bw_hz: 2.0,
            early_late_space_chips: DEFAULT_EARLY_LATE_SPACE_CHIPS,
            vector_length: 4096,
            cadll_secondary_seed_offset_samples: DEFAULT_CADLL_SECONDARY_SEED_OFFSET_SAMPLES,
        }
    }
}
