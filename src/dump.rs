//! Optional binary dump files, spec.md section 6.
//!
//! Grounded on the teacher's `recording.rs` byte-level I/O conventions
//! (little-endian primitives written one field at a time with
//! `byteorder`-free `to_le_bytes`), run in reverse: this module writes
//! tracking/acquisition diagnostics rather than reading recorded IQ.
//! Soft-fail per spec.md section 7: a write error disables dumping for
//! the channel and is logged, never propagated as a fatal error.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rustfft::num_complex::Complex32;

use crate::error::{GnssError, Result};

/// One tracking dump record, spec.md section 6's documented layout.
/// Binary, little-endian, `f32` unless noted.
pub struct TrackingDumpRecord<'a> {
    pub early: f32,
    pub prompt: f32,
    pub late: f32,
    pub prompt_i: f32,
    pub prompt_q: f32,
    pub sample_counter: u64,
    pub acc_carrier_phase_rad: f32,
    pub carrier_doppler_hz: f32,
    pub code_freq_chips: f32,
    pub carr_error_hz: f32,
    pub carr_error_filt_hz: f32,
    pub code_error_chips: f32,
    pub code_error_filt_chips: f32,
    pub cn0_db_hz: f32,
    pub carrier_lock_test: f32,
    pub rem_code_phase_samples: f32,
    pub next_sample_counter: f64,
    pub raw_iq: &'a [Complex32],
}

/// Appends tracking dump records for one channel to a single file,
/// disabling itself on the first I/O error.
pub struct TrackingDumpWriter {
    writer: Option<BufWriter<File>>,
}

impl TrackingDumpWriter {
    pub fn create(path: impl AsRef<Path>) -> Self {
        match File::create(path.as_ref()) {
            Ok(file) => Self {
                writer: Some(BufWriter::new(file)),
            },
            Err(e) => {
                log::warn!("tracking dump disabled, could not create {:?}: {e}", path.as_ref());
                Self { writer: None }
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn write_record(&mut self, record: &TrackingDumpRecord) {
        if let Err(e) = self.try_write_record(record) {
            log::warn!("tracking dump write failed, disabling: {e}");
            self.writer = None;
        }
    }

    fn try_write_record(&mut self, record: &TrackingDumpRecord) -> Result<()> {
        let Some(w) = self.writer.as_mut() else {
            return Ok(());
        };
        w.write_all(&record.early.to_le_bytes())?;
        w.write_all(&record.prompt.to_le_bytes())?;
        w.write_all(&record.late.to_le_bytes())?;
        w.write_all(&record.prompt_i.to_le_bytes())?;
        w.write_all(&record.prompt_q.to_le_bytes())?;
        w.write_all(&record.sample_counter.to_le_bytes())?;
        w.write_all(&record.acc_carrier_phase_rad.to_le_bytes())?;
        w.write_all(&record.carrier_doppler_hz.to_le_bytes())?;
        w.write_all(&record.code_freq_chips.to_le_bytes())?;
        w.write_all(&record.carr_error_hz.to_le_bytes())?;
        w.write_all(&record.carr_error_filt_hz.to_le_bytes())?;
        w.write_all(&record.code_error_chips.to_le_bytes())?;
        w.write_all(&record.code_error_filt_chips.to_le_bytes())?;
        w.write_all(&record.cn0_db_hz.to_le_bytes())?;
        w.write_all(&record.carrier_lock_test.to_le_bytes())?;
        w.write_all(&record.rem_code_phase_samples.to_le_bytes())?;
        w.write_all(&record.next_sample_counter.to_le_bytes())?;
        for iq in record.raw_iq {
            w.write_all(&iq.re.to_le_bytes())?;
            w.write_all(&iq.im.to_le_bytes())?;
        }
        Ok(())
    }
}

/// Writes one acquisition `|IFFT|^2` grid for a single Doppler bin to
/// `../data/test_statistics_<system>_<signal>_sat_<prn>_doppler_<d>.dat`,
/// spec.md section 6.
pub fn dump_acquisition_grid(dir: impl AsRef<Path>, system: &str, signal: &str, prn: u8, doppler_hz: f64, grid: &[f64]) {
    let path = dir.as_ref().join(format!(
        "test_statistics_{system}_{signal}_sat_{prn}_doppler_{doppler_hz:.0}.dat"
    ));
    if let Err(e) = write_grid(&path, grid) {
        log::warn!("acquisition grid dump failed for PRN {prn}: {e}");
    }
}

fn write_grid(path: &Path, grid: &[f64]) -> Result<()> {
    let file = File::create(path).map_err(GnssError::DumpIo)?;
    let mut w = BufWriter::new(file);
    for &v in grid {
        w.write_all(&(v as f32).to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonexistent_directory_disables_dumping_without_panicking() {
        let mut writer = TrackingDumpWriter::create("/nonexistent/path/for/a/unit/test/dump.bin");
        assert!(!writer.is_enabled());
        let record = TrackingDumpRecord {
            early: 0.0,
            prompt: 0.0,
            late: 0.0,
            prompt_i: 0.0,
            prompt_q: 0.0,
            sample_counter: 0,
            acc_carrier_phase_rad: 0.0,
            carrier_doppler_hz: 0.0,
            code_freq_chips: 0.0,
            carr_error_hz: 0.0,
            carr_error_filt_hz: 0.0,
            code_error_chips: 0.0,
            code_error_filt_chips: 0.0,
            cn0_db_hz: 0.0,
            carrier_lock_test: 0.0,
            rem_code_phase_samples: 0.0,
            next_sample_counter: 0.0,
            raw_iq: &[],
        };
        writer.write_record(&record);
        assert!(!writer.is_enabled());
    }

    #[test]
    fn writes_a_record_to_a_temp_file() {
        let path = std::env::temp_dir().join("gnss_core_dump_test.bin");
        let mut writer = TrackingDumpWriter::create(&path);
        assert!(writer.is_enabled());
        let record = TrackingDumpRecord {
            early: 1.0,
            prompt: 2.0,
            late: 3.0,
            prompt_i: 4.0,
            prompt_q: 5.0,
            sample_counter: 42,
            acc_carrier_phase_rad: 0.1,
            carrier_doppler_hz: 1500.0,
            code_freq_chips: 1_023_000.0,
            carr_error_hz: 0.01,
            carr_error_filt_hz: 0.01,
            code_error_chips: 0.02,
            code_error_filt_chips: 0.02,
            cn0_db_hz: 45.0,
            carrier_lock_test: 0.9,
            rem_code_phase_samples: 0.3,
            next_sample_counter: 2048.0,
            raw_iq: &[Complex32::new(1.0, -1.0)],
        };
        writer.write_record(&record);
        assert!(writer.is_enabled());
        let _ = std::fs::remove_file(&path);
    }
}
