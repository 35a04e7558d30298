//! CN0 & lock detectors, spec.md section 4.E.

use std::collections::VecDeque;

use crate::constants::{CARRIER_LOCK_THRESHOLD, CN0_ESTIMATION_SAMPLES, MAXIMUM_LOCK_FAIL_COUNTER, MINIMUM_VALID_CN0};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Locked,
    Lost,
}

/// Rolling window over the last `CN0_ESTIMATION_SAMPLES` prompt
/// correlator outputs, producing a CN0 estimate (SNV estimator) and a
/// carrier phase lock test, plus the persistence counter that turns
/// transient excursions into a loss-of-lock decision.
pub struct Cn0LockDetector {
    prompt_i: VecDeque<f64>,
    prompt_q: VecDeque<f64>,
    capacity: usize,
    coherent_integration_secs: f64,
    fail_counter: u32,
}

impl Cn0LockDetector {
    pub fn new(coherent_integration_secs: f64) -> Self {
        Self {
            prompt_i: VecDeque::with_capacity(CN0_ESTIMATION_SAMPLES),
            prompt_q: VecDeque::with_capacity(CN0_ESTIMATION_SAMPLES),
            capacity: CN0_ESTIMATION_SAMPLES,
            coherent_integration_secs,
            fail_counter: 0,
        }
    }

    pub fn push(&mut self, prompt_i: f64, prompt_q: f64) {
        if self.prompt_i.len() == self.capacity {
            self.prompt_i.pop_front();
            self.prompt_q.pop_front();
        }
        self.prompt_i.push_back(prompt_i);
        self.prompt_q.push_back(prompt_q);
    }

    fn ready(&self) -> bool {
        self.prompt_i.len() == self.capacity
    }

    /// SNV (signal-to-noise-variance) CN0 estimator, spec.md section 4.E.
    /// Uses total prompt power (I^2 + Q^2), not I alone, so a PLL with
    /// residual phase error that has rotated energy into Q doesn't read
    /// as a CN0 drop.
    pub fn cn0_db_hz(&self) -> f64 {
        if self.prompt_i.is_empty() {
            return 0.0;
        }
        let n = self.prompt_i.len() as f64;
        let abs_mean = self
            .prompt_i
            .iter()
            .zip(self.prompt_q.iter())
            .map(|(i, q)| (i * i + q * q).sqrt())
            .sum::<f64>()
            / n;
        let p_s = abs_mean * abs_mean;
        let mean_sq = self
            .prompt_i
            .iter()
            .zip(self.prompt_q.iter())
            .map(|(i, q)| i * i + q * q)
            .sum::<f64>()
            / n;
        let p_n = (mean_sq - p_s).max(1e-12);
        let snr = p_s / p_n;
        10.0 * (snr / self.coherent_integration_secs).log10()
    }

    /// Squared cosine of the average phase over the window.
    pub fn carrier_lock_test(&self) -> f64 {
        if self.prompt_i.is_empty() {
            return 0.0;
        }
        let n = self.prompt_i.len() as f64;
        let mean_i: f64 = self.prompt_i.iter().sum::<f64>() / n;
        let mean_q: f64 = self.prompt_q.iter().sum::<f64>() / n;
        let avg_phase = mean_q.atan2(mean_i);
        avg_phase.cos().powi(2)
    }

    /// Evaluate the current window and update the persistence counter.
    /// Only meaningful once the window is full; returns `Locked` until
    /// then.
    pub fn evaluate(&mut self) -> LockStatus {
        if !self.ready() {
            return LockStatus::Locked;
        }
        let failing = self.cn0_db_hz() < MINIMUM_VALID_CN0 || self.carrier_lock_test() < CARRIER_LOCK_THRESHOLD;
        if failing {
            self.fail_counter += 1;
        } else {
            self.fail_counter = 0;
        }
        if self.fail_counter > MAXIMUM_LOCK_FAIL_COUNTER {
            LockStatus::Lost
        } else {
            LockStatus::Locked
        }
    }

    pub fn fail_counter(&self) -> u32 {
        self.fail_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_in_phase_signal_yields_high_cn0_and_lock() {
        let mut det = Cn0LockDetector::new(1e-3);
        for _ in 0..CN0_ESTIMATION_SAMPLES {
            det.push(1.0, 0.0);
        }
        assert!(det.carrier_lock_test() > CARRIER_LOCK_THRESHOLD);
        assert_eq!(det.evaluate(), LockStatus::Locked);
    }

    #[test]
    fn pure_noise_eventually_declares_loss() {
        // spec.md section 8, property 7: lock-loss determinism. A
        // correlator output that has collapsed to zero (signal gone,
        // no residual correlation) reports CN0 of negative infinity
        // every window, so the fail counter advances deterministically.
        let mut det = Cn0LockDetector::new(1e-3);
        for _ in 0..CN0_ESTIMATION_SAMPLES {
            det.push(0.0, 0.0);
        }
        let mut status = LockStatus::Locked;
        for _ in 0..(MAXIMUM_LOCK_FAIL_COUNTER as usize + 2) {
            det.push(0.0, 0.0);
            status = det.evaluate();
            if status == LockStatus::Lost {
                break;
            }
        }
        assert_eq!(status, LockStatus::Lost);
    }

    #[test]
    fn window_not_yet_full_reports_locked() {
        let mut det = Cn0LockDetector::new(1e-3);
        det.push(0.0, 0.0);
        assert_eq!(det.evaluate(), LockStatus::Locked);
    }
}
