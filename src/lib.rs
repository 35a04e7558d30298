pub mod acquisition;
pub mod carrier;
pub mod channel;
pub mod cn0;
pub mod code;
pub mod config;
pub mod constants;
pub mod discriminator;
#[cfg(feature = "dump")]
pub mod dump;
pub mod error;
pub mod fft;
pub mod loop_filter;
pub mod tracking;
pub mod types;

pub use channel::{Channel, SharedCodePhaseMap};
pub use config::{AcquisitionConfig, TrackingConfig};
pub use error::{GnssError, Result};
pub use types::{ControlMessage, GnssSignal, GnssSystem, IQSample, Prn, SynchronizationRecord};
