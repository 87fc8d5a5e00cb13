//! TrialRecording: one parsed raw export, ready for the pipeline

use crate::metadata::RecordingMetadata;
use crate::table::SampleTable;
use uuid::Uuid;

/// A parsed recording: metadata plus the canonical sample table
#[derive(Debug, Clone)]
pub struct TrialRecording {
    /// Unique identifier for this pipeline run
    pub id: Uuid,
    /// Acquisition context
    pub metadata: RecordingMetadata,
    /// Canonical table (trimmed, re-zeroed)
    pub table: SampleTable,
}

impl TrialRecording {
    pub fn new(metadata: RecordingMetadata, table: SampleTable) -> Self {
        TrialRecording {
            id: Uuid::new_v4(),
            metadata,
            table,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.metadata.sample_rate
    }

    /// Trial duration in seconds
    pub fn duration(&self) -> f64 {
        self.table.len() as f64 / self.metadata.sample_rate
    }
}
