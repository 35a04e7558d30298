use thiserror::Error;

/// Error kinds for the acquisition/tracking core, spec.md section 7.
///
/// Negative acquisition and loss-of-lock are *not* represented here — both
/// are ordinary control messages (see [`crate::types::ControlMessage`]),
/// never errors.
#[derive(Error, Debug)]
pub enum GnssError {
    #[error("allocation failure: {0}")]
    Allocation(String),

    #[error("NaN sample encountered in block starting at sample {sample_counter}")]
    NanSample { sample_counter: u64 },

    #[error("FFT size mismatch: expected {expected}, got {actual}")]
    FftSizeMismatch { expected: usize, actual: usize },

    #[error("dump I/O failure: {0}")]
    DumpIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GnssError>;
