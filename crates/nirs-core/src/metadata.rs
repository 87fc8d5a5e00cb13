//! Acquisition metadata attached to a pipeline run

use crate::error::{NirsError, NirsResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key-value record describing the acquisition context of one export.
///
/// Immutable once parsed; attached to the pipeline run, not to samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    /// Sampling rate in Hz
    pub sample_rate: f64,
    /// Path of the export file this recording was read from
    pub export_file: String,
    /// Original acquisition file named inside the export, if present
    pub original_file: Option<String>,
    /// Remaining preamble fields, keyed by their label
    pub extra: BTreeMap<String, String>,
}

impl RecordingMetadata {
    pub fn new(sample_rate: f64, export_file: impl Into<String>) -> NirsResult<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(NirsError::Format {
                reason: format!("invalid sample rate: {}", sample_rate),
            });
        }

        Ok(RecordingMetadata {
            sample_rate,
            export_file: export_file.into(),
            original_file: None,
            extra: BTreeMap::new(),
        })
    }

    /// Number of samples covering one second, used for the warm-up trim
    pub fn samples_per_second(&self) -> usize {
        self.sample_rate as usize
    }

    /// Seconds elapsed at a given row position
    pub fn time_at(&self, sample: usize) -> f64 {
        sample as f64 / self.sample_rate
    }
}
