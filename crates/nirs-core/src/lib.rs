//! NIRS-Core: Foundation types for fNIRS walking-trial processing
//!
//! Canonical sample table, channel identity, event markers, segments and
//! the error/warning model shared by every pipeline stage.

pub mod channel;
pub mod error;
pub mod event;
pub mod metadata;
pub mod recording;
pub mod segment;
pub mod table;
pub mod trial;
pub mod warnings;

pub use channel::{ChannelId, ChannelLayout, Exclusion, ExclusionSet, Region, SignalKind, ZeroSide};
pub use error::{NirsError, NirsResult};
pub use event::{EventMarker, TrialMarkers, MARKER_LABELS};
pub use metadata::RecordingMetadata;
pub use recording::TrialRecording;
pub use segment::{Segment, SegmentName};
pub use table::{ColumnId, SampleTable, SignalColumn};
pub use trial::{Condition, Timepoint, TrialInfo};
pub use warnings::{Warning, WarningLog};
