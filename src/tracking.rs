//! Tracking engine (CADLL), spec.md section 4.G.
//!
//! Grounded on the teacher's `channel.rs` (`run_pll`/`run_dll`/
//! `compute_correlation`/`update_cn0`/`get_code_and_carrier_phase` shape:
//! one channel struct owning NCO state, updated once per PRN period) but
//! replaces the single-DLL loop with the coupled-amplitude dual-DLL the
//! specification calls for, and the heuristic `run_pll`/`run_dll` math
//! with the tau1/tau2 loop filters in [`crate::loop_filter`].

use rustfft::num_complex::Complex32;

use crate::carrier::complex_exp_gen_conj_with_phase;
use crate::cn0::{Cn0LockDetector, LockStatus};
use crate::code;
use crate::config::TrackingConfig;
use crate::constants::{GPS_L1_CA_CODE_LENGTH_CHIPS, GPS_L1_CA_CODE_RATE_HZ, GPS_L1_FREQ_HZ};
use crate::discriminator::{dll_nc_e_minus_l_normalized, pll_cloop_two_quadrant_atan};
use crate::error::Result;
use crate::loop_filter::{AmplitudeLoopFilter, DllLoopFilter, LoopFilter, PllLoopFilter};
use crate::types::{ControlMessage, GnssSignal, Prn, SynchronizationRecord};

/// Amplitude ratio between the CADLL primary and secondary paths assumed
/// before the first amplitude-loop measurement, spec.md 4.G step 6.
const INITIAL_AMPLITUDE_RATIO: f64 = 1.284025416687741;

#[derive(Debug, Clone, Copy, Default)]
struct CodeNco {
    rem_code_phase_samples: f64,
    current_prn_length_samples: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct CarrierNco {
    rem_carr_phase_rad: f64,
    acc_carrier_phase_rad: f64,
    carrier_doppler_hz: f64,
    code_freq_chips: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct CorrelatorBank {
    early: Complex32,
    prompt: Complex32,
    late: Complex32,
    early_m: Complex32,
    prompt_m: Complex32,
    late_m: Complex32,
}

/// Result of one `TrackingChannel::step` call.
pub enum StepOutcome {
    Record(SynchronizationRecord),
    Control(ControlMessage),
    /// The block was skipped (NaN samples); no state advanced.
    Skipped,
}

/// Per-channel CADLL tracking state: one carrier loop, two parallel code
/// loops (primary/secondary), and the loop filters, amplitude estimates
/// and lock detector that drive them.
pub struct TrackingChannel {
    prn: Prn,
    config: TrackingConfig,
    ca_code: Vec<Complex32>,

    carrier: CarrierNco,
    primary: CodeNco,
    secondary: CodeNco,
    code_error_filt_secs: f64,
    code_error_filt_secs_m: f64,

    a1: f64,
    a2: f64,

    pll_filter: PllLoopFilter,
    dll_filter: DllLoopFilter,
    dll_filter_m: DllLoopFilter,
    amp_filter: AmplitudeLoopFilter,
    amp_filter_m: AmplitudeLoopFilter,

    cn0: Cn0LockDetector,

    sample_counter: u64,
    acq_delay_samples: f64,
    acq_doppler_hz: f64,
    acq_samplestamp_samples: u64,

    pull_in: bool,
    enable_tracking: bool,
    cadll_init: bool,
    tracking_timestamp_secs: f64,
}

fn gen_code_replica(
    ca_code: &[Complex32],
    rem_code_phase_samples: f64,
    chip_offset: f64,
    code_phase_step_chips: f64,
    n: usize,
) -> Vec<Complex32> {
    let mut out = Vec::with_capacity(n);
    let mut chip = -rem_code_phase_samples * code_phase_step_chips + chip_offset;
    for _ in 0..n {
        let wrapped = chip.rem_euclid(GPS_L1_CA_CODE_LENGTH_CHIPS);
        let table_idx = (wrapped.floor() as usize + 1).min(ca_code.len() - 1);
        out.push(ca_code[table_idx]);
        chip += code_phase_step_chips;
    }
    out
}

impl TrackingChannel {
    /// `start_tracking`, spec.md 4.G. Derives the initial code frequency
    /// from the acquisition Doppler and marks the channel as pending
    /// pull-in; call [`Self::pull_in_offset`] before the first [`Self::step`].
    pub fn start_tracking(
        prn: Prn,
        signal: GnssSignal,
        config: TrackingConfig,
        acq_delay_samples: f64,
        acq_doppler_hz: f64,
        acq_samplestamp_samples: u64,
    ) -> Self {
        let code_freq_chips = GPS_L1_CA_CODE_RATE_HZ * (1.0 + acq_doppler_hz / GPS_L1_FREQ_HZ);
        let t_prn_mod_samples = (GPS_L1_CA_CODE_LENGTH_CHIPS / code_freq_chips) * config.fs_in_hz;
        let initial_len = t_prn_mod_samples.round().max(1.0) as usize;

        Self {
            prn,
            ca_code: code::gen_guarded_code_complex(signal, prn)
                .expect("GPS L1 C/A is the only supported signal"),
            carrier: CarrierNco {
                carrier_doppler_hz: acq_doppler_hz,
                code_freq_chips,
                ..Default::default()
            },
            primary: CodeNco {
                current_prn_length_samples: initial_len,
                ..Default::default()
            },
            secondary: CodeNco {
                current_prn_length_samples: initial_len,
                ..Default::default()
            },
            code_error_filt_secs: 0.0,
            code_error_filt_secs_m: 0.0,
            a1: 0.0,
            a2: 0.0,
            pll_filter: PllLoopFilter::new(config.pll_bw_hz, 1e-3),
            dll_filter: DllLoopFilter::second_order(config.dll_bw_hz, 1e-3),
            dll_filter_m: DllLoopFilter::second_order(config.dll_bw_hz, 1e-3),
            amp_filter: AmplitudeLoopFilter::new(crate::constants::ALL_BW, 1e-3),
            amp_filter_m: AmplitudeLoopFilter::new(crate::constants::ALL_BW, 1e-3),
            cn0: Cn0LockDetector::new(1e-3),
            sample_counter: acq_samplestamp_samples,
            acq_delay_samples,
            acq_doppler_hz,
            acq_samplestamp_samples,
            pull_in: true,
            enable_tracking: true,
            cadll_init: true,
            tracking_timestamp_secs: 0.0,
            config,
        }
    }

    pub fn prn(&self) -> Prn {
        self.prn
    }

    pub fn enabled(&self) -> bool {
        self.enable_tracking
    }

    pub fn is_cadll_converged(&self) -> bool {
        !self.cadll_init
    }

    pub fn primary_code_phase_samples(&self) -> f64 {
        self.primary.rem_code_phase_samples
    }

    pub fn secondary_code_phase_samples(&self) -> f64 {
        self.secondary.rem_code_phase_samples
    }

    /// Number of samples the next `step` call expects.
    pub fn samples_needed(&self) -> usize {
        self.primary.current_prn_length_samples
    }

    /// Aligns the upstream stream to the next PRN boundary: reprojects
    /// `acq_delay_samples` forward by the elapsed samples since
    /// acquisition (mod the true PRN period) and returns the number of
    /// samples the caller should discard before the first `step` call.
    pub fn pull_in_offset(&mut self, current_sample_counter: u64) -> usize {
        let code_freq_chips = self.carrier.code_freq_chips;
        let t_prn_mod_samples = (GPS_L1_CA_CODE_LENGTH_CHIPS / code_freq_chips) * self.config.fs_in_hz;

        let acq_trk_diff_samples = current_sample_counter.saturating_sub(self.acq_samplestamp_samples) as f64;
        let reprojected_delay = (self.acq_delay_samples + acq_trk_diff_samples).rem_euclid(t_prn_mod_samples);

        let current_prn_length_samples = t_prn_mod_samples.round().max(1.0) as usize;
        self.primary.current_prn_length_samples = current_prn_length_samples;
        self.secondary.current_prn_length_samples = current_prn_length_samples;
        self.pull_in = false;

        (t_prn_mod_samples - reprojected_delay).round().max(0.0) as usize
    }

    pub fn stop_tracking(&mut self) {
        self.enable_tracking = false;
    }

    /// Advance one PRN period. `samples.len()` must equal
    /// `samples_needed()`.
    pub fn step(&mut self, samples: &[Complex32], sample_counter: u64) -> Result<StepOutcome> {
        if !self.enable_tracking {
            return Ok(StepOutcome::Control(ControlMessage::LossOfLock));
        }
        self.pull_in = false;

        if samples.iter().any(|s| s.re.is_nan() || s.im.is_nan()) {
            log::warn!("tracking: NaN sample for PRN {}, skipping block", self.prn);
            return Ok(StepOutcome::Skipped);
        }

        let n = samples.len();
        let fs_in = self.config.fs_in_hz;
        let code_phase_step_chips = self.carrier.code_freq_chips / fs_in;
        let spc = self.config.early_late_space_chips;

        let mut carr_sign = vec![Complex32::default(); n];
        complex_exp_gen_conj_with_phase(
            &mut carr_sign,
            self.carrier.rem_carr_phase_rad,
            self.carrier.carrier_doppler_hz + self.config.freq_if_hz,
            fs_in,
            n,
        );

        let primary_early = gen_code_replica(&self.ca_code, self.primary.rem_code_phase_samples, -spc, code_phase_step_chips, n);
        let primary_prompt = gen_code_replica(&self.ca_code, self.primary.rem_code_phase_samples, 0.0, code_phase_step_chips, n);
        let primary_late = gen_code_replica(&self.ca_code, self.primary.rem_code_phase_samples, spc, code_phase_step_chips, n);
        let secondary_early = gen_code_replica(&self.ca_code, self.secondary.rem_code_phase_samples, -spc, code_phase_step_chips, n);
        let secondary_prompt = gen_code_replica(&self.ca_code, self.secondary.rem_code_phase_samples, 0.0, code_phase_step_chips, n);
        let secondary_late = gen_code_replica(&self.ca_code, self.secondary.rem_code_phase_samples, spc, code_phase_step_chips, n);

        let wiped: Vec<Complex32> = samples.iter().zip(&carr_sign).map(|(&s, &c)| s * c).collect();
        let dot = |replica: &[Complex32]| -> Complex32 {
            wiped.iter().zip(replica).fold(Complex32::default(), |acc, (&w, &r)| acc + w * r)
        };

        let bank = CorrelatorBank {
            early: dot(&primary_early),
            prompt: dot(&primary_prompt),
            late: dot(&primary_late),
            early_m: dot(&secondary_early),
            prompt_m: dot(&secondary_prompt),
            late_m: dot(&secondary_late),
        };

        let input_power = samples.iter().map(|s| s.norm_sqr() as f64).sum::<f64>() / n as f64;

        // Step 4: PLL.
        let carr_error_hz = pll_cloop_two_quadrant_atan(bank.prompt);
        let carr_error_filt_hz = self.pll_filter.update(carr_error_hz);
        self.carrier.carrier_doppler_hz = self.acq_doppler_hz + carr_error_filt_hz;
        self.carrier.code_freq_chips = GPS_L1_CA_CODE_RATE_HZ * (1.0 + self.carrier.carrier_doppler_hz / GPS_L1_FREQ_HZ);

        // Step 5: DLL, primary always, secondary only once CADLL has split.
        let code_error_chips = dll_nc_e_minus_l_normalized(bank.early, bank.late);
        let code_error_filt_chips = self.dll_filter.update(code_error_chips);
        self.code_error_filt_secs = code_error_filt_chips / self.carrier.code_freq_chips;

        if !self.cadll_init {
            let code_error_chips_m = dll_nc_e_minus_l_normalized(bank.early_m, bank.late_m);
            let code_error_filt_chips_m = self.dll_filter_m.update(code_error_chips_m);
            self.code_error_filt_secs_m = code_error_filt_chips_m / self.carrier.code_freq_chips;
        } else {
            self.code_error_filt_secs_m = self.code_error_filt_secs;
        }

        // Step 6: amplitude loops.
        if self.cadll_init {
            self.a1 = self.amp_filter.update(input_power / 0.99);
            self.a2 = self.a1 / INITIAL_AMPLITUDE_RATIO;
        } else {
            let t = bank.prompt.re as f64 + bank.prompt_m.re as f64;
            let d = if t.abs() > 1e-12 { input_power / t } else { 0.0 };
            self.a1 = self.amp_filter.update(d * bank.prompt.re as f64 / 0.99);
            self.a2 = self.amp_filter_m.update(d * bank.prompt_m.re as f64 / 0.99);
        }

        // Step 7: buffer-length update.
        let t_prn_samples = (GPS_L1_CA_CODE_LENGTH_CHIPS / self.carrier.code_freq_chips) * fs_in;
        let k_blk = t_prn_samples + self.primary.rem_code_phase_samples + self.code_error_filt_secs * fs_in;
        self.primary.current_prn_length_samples = k_blk.round() as usize;
        self.primary.rem_code_phase_samples = k_blk - self.primary.current_prn_length_samples as f64;

        if self.cadll_init {
            self.secondary.current_prn_length_samples = self.primary.current_prn_length_samples;
            self.secondary.rem_code_phase_samples = self.primary.rem_code_phase_samples;
        } else {
            let k_blk_m = t_prn_samples + self.secondary.rem_code_phase_samples + self.code_error_filt_secs_m * fs_in;
            self.secondary.current_prn_length_samples = k_blk_m.round() as usize;
            self.secondary.rem_code_phase_samples = k_blk_m - self.secondary.current_prn_length_samples as f64;
        }

        let carrier_step_rad = n as f64 * 2.0 * std::f64::consts::PI * (self.carrier.carrier_doppler_hz + self.config.freq_if_hz) / fs_in;
        self.carrier.rem_carr_phase_rad = (self.carrier.rem_carr_phase_rad + carrier_step_rad).rem_euclid(2.0 * std::f64::consts::PI);
        self.carrier.acc_carrier_phase_rad += carrier_step_rad;

        self.sample_counter = sample_counter + n as u64;
        self.tracking_timestamp_secs = (self.sample_counter as f64 + self.primary.rem_code_phase_samples) / fs_in;

        // Step 8: one-shot CADLL promotion.
        if self.cadll_init && self.tracking_timestamp_secs > 1.0 {
            self.cadll_init = false;
            self.secondary.rem_code_phase_samples =
                self.primary.rem_code_phase_samples + self.config.cadll_secondary_seed_offset_samples;
        }

        self.cn0.push(bank.prompt.re as f64, bank.prompt.im as f64);
        if self.cn0.evaluate() == LockStatus::Lost {
            self.enable_tracking = false;
            return Ok(StepOutcome::Control(ControlMessage::LossOfLock));
        }

        let record = SynchronizationRecord {
            prn: self.prn,
            acq_delay_samples: self.acq_delay_samples,
            acq_doppler_hz: self.acq_doppler_hz,
            acq_samplestamp_samples: self.acq_samplestamp_samples,
            prompt_i: bank.prompt.re as f64,
            prompt_q: bank.prompt.im as f64,
            tracking_timestamp_secs: self.tracking_timestamp_secs,
            carrier_phase_rads: self.carrier.acc_carrier_phase_rad,
            carrier_doppler_hz: self.carrier.carrier_doppler_hz,
            code_phase_secs: self.primary.rem_code_phase_samples / fs_in,
            cn0_db_hz: self.cn0.cn0_db_hz(),
            flag_valid_tracking: true,
        };
        Ok(StepOutcome::Record(record))
    }
}
