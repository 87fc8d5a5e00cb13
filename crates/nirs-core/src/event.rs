//! Event markers delimiting the phases of a walking trial

use crate::error::NirsResult;
use crate::segmentation_error;
use serde::{Deserialize, Serialize};

/// Marker labels assigned in detection order: quiet-stance start, walk
/// start, walk end.
pub const MARKER_LABELS: [&str; 3] = ["S1", "W1", "S2"];

/// A raw (sample index, label) pair as found in the event column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMarker {
    /// Row position in the trimmed, re-zeroed table
    pub sample: usize,
    /// Label as recorded or synthesized
    pub label: String,
}

impl EventMarker {
    pub fn new(sample: usize, label: impl Into<String>) -> Self {
        EventMarker { sample, label: label.into() }
    }
}

/// The validated three markers of a canonical trial.
///
/// Several stages assume exactly three strictly increasing markers; any
/// other count is a hard failure for the current file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialMarkers {
    /// Start of the quiet-stance window
    pub stance_start: usize,
    /// Start of the walking window
    pub walk_start: usize,
    /// End of the walking window
    pub walk_end: usize,
}

impl TrialMarkers {
    /// Validate a marker list into the canonical triple.
    ///
    /// Labels are not interpreted; identity comes from time order.
    pub fn from_markers(markers: &[EventMarker], table_len: usize) -> NirsResult<Self> {
        if markers.len() != 3 {
            return Err(segmentation_error!(
                "expected exactly 3 event markers, found {}",
                markers.len()
            ));
        }

        let triple = TrialMarkers {
            stance_start: markers[0].sample,
            walk_start: markers[1].sample,
            walk_end: markers[2].sample,
        };
        triple.validate(table_len)?;
        Ok(triple)
    }

    /// Check strict ordering and table bounds
    pub fn validate(&self, table_len: usize) -> NirsResult<()> {
        if !(self.stance_start < self.walk_start && self.walk_start < self.walk_end) {
            return Err(segmentation_error!(
                "event markers must be strictly increasing: {}, {}, {}",
                self.stance_start,
                self.walk_start,
                self.walk_end
            ));
        }
        if self.walk_end > table_len {
            return Err(segmentation_error!(
                "event marker {} is out of bounds for table of {} samples",
                self.walk_end,
                table_len
            ));
        }
        Ok(())
    }
}
