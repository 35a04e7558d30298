/// Chips in one full GPS L1 C/A period.
pub const GPS_L1_CA_CODE_LENGTH_CHIPS: f64 = 1023.0;
pub const GPS_L1_CA_CODE_RATE_HZ: f64 = 1_023_000.0;
pub const GPS_L1_FREQ_HZ: f64 = 1_575_420_000.0;

/// CN0 estimator & lock detector, spec.md 4.E.
pub const CN0_ESTIMATION_SAMPLES: usize = 20;
pub const MINIMUM_VALID_CN0: f64 = 25.0;
pub const CARRIER_LOCK_THRESHOLD: f64 = 0.85;
pub const MAXIMUM_LOCK_FAIL_COUNTER: u32 = 50;

/// Amplitude loop filter bandwidth, spec.md 4.D.
pub const ALL_BW: f64 = 10.0;

/// Empirically tuned multipath code-phase seed for the CADLL secondary
/// loop, spec.md 4.G step 8 / 9 Open Question (i). Kept as a default on
/// `TrackingConfig::cadll_secondary_seed_offset_samples`, not hard-coded.
pub const DEFAULT_CADLL_SECONDARY_SEED_OFFSET_SAMPLES: f64 = -27.0;

/// Canonical early/prompt/late correlator spacing.
pub const DEFAULT_EARLY_LATE_SPACE_CHIPS: f64 = 0.5;
