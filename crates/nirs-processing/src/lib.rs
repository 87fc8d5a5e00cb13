//! NIRS-Processing: signal correction and segmentation for walking trials
//!
//! Raw-export parsing, short-channel regression, TDDR motion repair,
//! band-pass filtering, baseline normalization, channel averaging,
//! segmentation and per-segment statistics.

pub mod average;
pub mod baseline;
pub mod config;
pub mod filters;
pub mod pipeline;
pub mod read_mat;
pub mod read_txt;
pub mod scr;
pub mod segments;
pub mod session;
pub mod stage;
pub mod statistics;
pub mod tddr;

pub use average::ChannelAverager;
pub use baseline::BaselineNormalizer;
pub use config::{EventPolicy, ProcessingConfig};
pub use filters::{butter_lowpass_sos, sosfiltfilt, BandpassStage, Biquad, FirBandpass};
pub use pipeline::{TrialOutcome, TrialPipeline};
pub use read_mat::{parse_mat, read_mat_file};
pub use read_txt::{parse_txt, read_txt_file};
pub use scr::ShortChannelRegression;
pub use segments::{create_segments, segment_tables, synthetic_markers};
pub use session::{RatioRecord, SessionContext, SnrEntry};
pub use stage::TableStage;
pub use statistics::{
    calculate_snr, SegmentMetrics, SnrRecord, StatisticsExtractor, StatsEntry, StatsRecord,
};
pub use tddr::{tddr, TddrStage};
