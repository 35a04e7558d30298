//! Shared data model, spec.md section 3.

use std::collections::HashMap;

use rustfft::num_complex::Complex32;
use serde::{Deserialize, Serialize};

/// A GNSS system identifier. Only `Gps` is populated today; spec.md's
/// Non-goals exclude other constellations from this core, but the field
/// is kept on the synchronization record since it's part of the shared
/// data model external consumers (telemetry decoder, PVT solver) key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GnssSystem {
    Gps,
}

/// Signal identifier within a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GnssSignal {
    L1Ca,
}

/// GPS PRN number, 1..=32.
pub type Prn = u8;

/// One block of interleaved complex baseband samples as delivered by the
/// upstream sample source (out of scope for this core).
#[derive(Debug, Clone)]
pub struct IQSample {
    pub iq_vec: Vec<Complex32>,
    pub sample_rate: f64,
    /// Sample index of `iq_vec[0]` since stream start.
    pub sample_counter: u64,
}

/// Synchronization record shared between acquisition and tracking,
/// spec.md section 3. Acquisition writes the `Acq_*` fields; tracking
/// writes the remainder once per PRN period. Owned by the channel
/// controller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SynchronizationRecord {
    pub prn: Prn,

    pub acq_delay_samples: f64,
    pub acq_doppler_hz: f64,
    pub acq_samplestamp_samples: u64,

    pub prompt_i: f64,
    pub prompt_q: f64,
    pub tracking_timestamp_secs: f64,
    pub carrier_phase_rads: f64,
    pub carrier_doppler_hz: f64,
    pub code_phase_secs: f64,
    pub cn0_db_hz: f64,
    pub flag_valid_tracking: bool,
}

impl SynchronizationRecord {
    pub fn new(prn: Prn) -> Self {
        Self {
            prn,
            ..Default::default()
        }
    }
}

/// Control message codes, spec.md section 6: integers
/// `0=STOP_CHANNEL 1=ACQ_SUCCESS 2=ACQ_FAIL/LOSS_OF_LOCK`, modeled here as
/// a typed enum per spec.md section 9 ("Message queues... avoid untyped
/// integer codes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    StopChannel,
    AcqSuccess,
    AcqFail,
    LossOfLock,
}

impl ControlMessage {
    /// The wire code documented in spec.md section 6, kept for dump-file
    /// and cross-process compatibility.
    pub fn code(self) -> u8 {
        match self {
            ControlMessage::StopChannel => 0,
            ControlMessage::AcqSuccess => 1,
            ControlMessage::AcqFail => 2,
            ControlMessage::LossOfLock => 2,
        }
    }
}

/// Diagnostic record for the process-wide code-phase map, spec.md
/// section 9 ("Global mutable map"). Cross-channel de-duplication only;
/// never consulted from the hot correlation loop.
#[derive(Debug, Clone, Copy)]
pub struct CodePhaseEntry {
    pub code_phase_samples: f64,
    pub sample_stamp: u64,
}

/// `PRN -> {code_phase, sample_stamp}`, guarded by an external mutex at
/// the call site (see [`crate::channel::SharedCodePhaseMap`]).
pub type CodePhaseMap = HashMap<Prn, CodePhaseEntry>;
