//! Baseline normalization against the quiet-stance window

use crate::stage::TableStage;
use crate::statistics::nan_mean;
use nirs_core::{
    NirsError, NirsResult, SampleTable, TrialMarkers, WarningLog,
};
use nirs_core::segmentation_error;

/// Source of the reference mean subtracted from every signal column
enum Reference {
    /// Span between the first and second marker, end-inclusive
    QuietStance(TrialMarkers),
    /// Per-column mean over an explicit baseline table
    Table(SampleTable),
}

/// Subtracts a reference mean from every signal column; index and event
/// columns are untouched.
pub struct BaselineNormalizer {
    reference: Reference,
}

impl BaselineNormalizer {
    /// Reference the quiet-stance window of validated trial markers.
    ///
    /// The window runs from the first marker through the second marker's
    /// sample inclusive.
    pub fn from_markers(markers: TrialMarkers) -> Self {
        BaselineNormalizer {
            reference: Reference::QuietStance(markers),
        }
    }

    /// Reference an explicit baseline table, independent of markers
    pub fn from_baseline_table(baseline: SampleTable) -> Self {
        BaselineNormalizer {
            reference: Reference::Table(baseline),
        }
    }
}

impl TableStage for BaselineNormalizer {
    fn name(&self) -> &str {
        "baseline"
    }

    fn apply(&self, input: &SampleTable, warnings: &mut WarningLog) -> NirsResult<SampleTable> {
        match &self.reference {
            Reference::QuietStance(markers) => {
                let n = input.len();
                let start = markers.stance_start;
                let end = markers.walk_start;
                if start >= n || end >= n {
                    return Err(segmentation_error!(
                        "baseline window [{}, {}] is out of bounds for {} samples",
                        start,
                        end,
                        n
                    ));
                }

                input.map_columns(|id, values| {
                    let mean = nan_mean(&values[start..=end]);
                    if mean.is_nan() {
                        warnings.push(
                            "baseline",
                            format!("quiet-stance mean of {} is NaN", id),
                        );
                    }
                    Ok(values.iter().map(|v| v - mean).collect())
                })
            }
            Reference::Table(baseline) => input.map_columns(|id, values| {
                let reference = baseline.values(id).ok_or_else(|| NirsError::InvalidTable {
                    reason: format!("baseline table is missing column {}", id),
                })?;
                let mean = nan_mean(reference);
                if mean.is_nan() {
                    warnings.push("baseline", format!("baseline mean of {} is NaN", id));
                }
                Ok(values.iter().map(|v| v - mean).collect())
            }),
        }
    }
}
