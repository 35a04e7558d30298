//! Channel controller, spec.md section 4.H.
//!
//! Grounded on the teacher's `channel.rs`: one struct per channel
//! dispatching on a state enum (`TrackState` there, [`ChannelState`]
//! here) and driving the acquisition/tracking engines in lockstep with
//! the upstream sample scheduler. Replaces the teacher's direct
//! acquisition/tracking inlining with the two standalone engines in
//! [`crate::acquisition`] and [`crate::tracking`], and its ad hoc
//! control flow with the typed message queue spec.md section 9 calls
//! for.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use rustfft::num_complex::Complex32;

use crate::acquisition::{AcqOutcome, AcquisitionEngine};
use crate::config::{AcquisitionConfig, TrackingConfig};
use crate::error::Result;
use crate::tracking::{StepOutcome, TrackingChannel};
use crate::types::{CodePhaseEntry, CodePhaseMap, ControlMessage, GnssSignal, Prn, SynchronizationRecord};

/// Process-wide `PRN -> code_phase` diagnostic map, spec.md section 9
/// ("Global mutable map"). Shared across channels; written only from
/// control-message dispatch (acquisition success, tracking update),
/// never from the hot correlation loop.
#[derive(Clone, Default)]
pub struct SharedCodePhaseMap(Arc<Mutex<CodePhaseMap>>);

impl SharedCodePhaseMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, prn: Prn, entry: CodePhaseEntry) {
        self.0.lock().insert(prn, entry);
    }

    pub fn get(&self, prn: Prn) -> Option<CodePhaseEntry> {
        self.0.lock().get(&prn).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Acquiring,
    Tracking,
    Stopped,
}

/// Sequences ACQ -> TRK -> loss-of-lock -> re-ACQ for one PRN hypothesis.
/// Owns the acquisition and tracking engines and the shared
/// synchronization record; posts control messages on an internal MPSC
/// queue rather than returning untyped integer codes.
pub struct Channel {
    prn: Prn,
    signal: GnssSignal,
    acq_config: AcquisitionConfig,
    trk_config: TrackingConfig,

    state: ChannelState,
    acquisition: AcquisitionEngine,
    tracking: Option<TrackingChannel>,

    record: SynchronizationRecord,
    code_phase_map: SharedCodePhaseMap,

    /// Samples still to be discarded to reach the next PRN boundary
    /// after a fresh acquisition success, per
    /// [`crate::tracking::TrackingChannel::pull_in_offset`].
    pending_discard: usize,

    control_tx: Sender<ControlMessage>,
    control_rx: Receiver<ControlMessage>,
}

impl Channel {
    pub fn new(
        prn: Prn,
        signal: GnssSignal,
        acq_config: AcquisitionConfig,
        trk_config: TrackingConfig,
        code_phase_map: SharedCodePhaseMap,
    ) -> Self {
        let (control_tx, control_rx) = unbounded();
        Self {
            prn,
            signal,
            acq_config,
            trk_config,
            state: ChannelState::Acquiring,
            acquisition: AcquisitionEngine::new(prn, signal, acq_config),
            tracking: None,
            record: SynchronizationRecord::new(prn),
            code_phase_map,
            pending_discard: 0,
            control_tx,
            control_rx,
        }
    }

    pub fn prn(&self) -> Prn {
        self.prn
    }

    /// Single consumer handle for this channel's control messages,
    /// spec.md section 5 ("message queues are multi-producer
    /// single-consumer").
    pub fn control_receiver(&self) -> Receiver<ControlMessage> {
        self.control_rx.clone()
    }

    pub fn is_tracking(&self) -> bool {
        self.state == ChannelState::Tracking
    }

    pub fn is_stopped(&self) -> bool {
        self.state == ChannelState::Stopped
    }

    /// How many samples the next `process_samples` call expects.
    pub fn samples_needed(&self) -> usize {
        match self.state {
            ChannelState::Acquiring => self.acq_config.fft_size(),
            ChannelState::Tracking if self.pending_discard > 0 => self.pending_discard,
            ChannelState::Tracking => self
                .tracking
                .as_ref()
                .map(|t| t.samples_needed())
                .unwrap_or_else(|| self.acq_config.fft_size()),
            ChannelState::Stopped => 0,
        }
    }

    /// Feed one block of `samples_needed()` samples. Returns a freshly
    /// emitted synchronization record when tracking produces one this
    /// call; `None` otherwise (mid-acquisition, or a state transition
    /// just occurred).
    pub fn process_samples(&mut self, samples: &[Complex32], sample_counter: u64) -> Result<Option<SynchronizationRecord>> {
        match self.state {
            ChannelState::Stopped => Ok(None),
            ChannelState::Acquiring => {
                self.acquisition.activate();
                match self.acquisition.process_dwell(samples, sample_counter)? {
                    Some(outcome) => {
                        self.dispatch_acq_outcome(outcome, sample_counter);
                        Ok(None)
                    }
                    None => Ok(None),
                }
            }
            ChannelState::Tracking if self.pending_discard > 0 => {
                self.pending_discard = 0;
                Ok(None)
            }
            ChannelState::Tracking => {
                let tracking = self
                    .tracking
                    .as_mut()
                    .expect("Tracking state implies a live tracking engine");
                match tracking.step(samples, sample_counter)? {
                    StepOutcome::Record(record) => {
                        self.record = record;
                        self.code_phase_map.record(
                            self.prn,
                            CodePhaseEntry {
                                code_phase_samples: record.code_phase_secs * self.trk_config.fs_in_hz,
                                sample_stamp: sample_counter,
                            },
                        );
                        Ok(Some(record))
                    }
                    StepOutcome::Control(ControlMessage::LossOfLock) => {
                        let _ = self.control_tx.send(ControlMessage::LossOfLock);
                        self.tracking = None;
                        self.acquisition = AcquisitionEngine::new(self.prn, self.signal, self.acq_config);
                        self.state = ChannelState::Acquiring;
                        Ok(None)
                    }
                    StepOutcome::Control(_) | StepOutcome::Skipped => Ok(None),
                }
            }
        }
    }

    fn dispatch_acq_outcome(&mut self, outcome: AcqOutcome, sample_counter: u64) {
        match outcome.control {
            ControlMessage::AcqSuccess => {
                let code_phase = outcome.code_phase_samples.unwrap_or(0.0);
                let doppler = outcome.doppler_hz.unwrap_or(0.0);

                self.record.acq_delay_samples = code_phase;
                self.record.acq_doppler_hz = doppler;
                self.record.acq_samplestamp_samples = outcome.sample_stamp;

                self.code_phase_map.record(
                    self.prn,
                    CodePhaseEntry {
                        code_phase_samples: code_phase,
                        sample_stamp: outcome.sample_stamp,
                    },
                );

                let mut tracking = TrackingChannel::start_tracking(
                    self.prn,
                    self.signal,
                    self.trk_config,
                    code_phase,
                    doppler,
                    outcome.sample_stamp,
                );
                self.pending_discard = tracking.pull_in_offset(sample_counter);
                self.tracking = Some(tracking);
                self.state = ChannelState::Tracking;
                let _ = self.control_tx.send(ControlMessage::AcqSuccess);
            }
            ControlMessage::AcqFail => {
                let _ = self.control_tx.send(ControlMessage::AcqFail);
            }
            _ => {}
        }
    }

    /// Cooperative stop: clears tracking and posts `StopChannel` on the
    /// next boundary, spec.md section 5.
    pub fn stop(&mut self) {
        if let Some(tracking) = self.tracking.as_mut() {
            tracking.stop_tracking();
        }
        self.state = ChannelState::Stopped;
        let _ = self.control_tx.send(ControlMessage::StopChannel);
    }

    pub fn record(&self) -> SynchronizationRecord {
        self.record
    }
}
