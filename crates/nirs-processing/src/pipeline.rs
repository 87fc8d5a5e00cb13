//! Per-trial pipeline driver
//!
//! Wires the correction chain for one file: exclusion detection, short-
//! channel regression, TDDR, band-pass, baseline normalization, channel
//! averaging, segmentation and statistics. Purely functional per file;
//! the batch orchestrator owns looping, error logging and the session
//! context.

use crate::average::ChannelAverager;
use crate::baseline::BaselineNormalizer;
use crate::config::{EventPolicy, ProcessingConfig};
use crate::filters::{BandpassStage, FirBandpass};
use crate::scr::ShortChannelRegression;
use crate::segments::{segment_tables, synthetic_markers};
use crate::stage::TableStage;
use crate::statistics::{calculate_snr, SnrRecord, StatisticsExtractor, StatsRecord};
use crate::tddr::TddrStage;
use nirs_core::{
    ColumnId, ExclusionSet, NirsError, NirsResult, Region, SampleTable, Segment, SignalKind,
    TrialInfo, TrialMarkers, TrialRecording, WarningLog,
};

/// Everything the orchestrator needs back from one file
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub info: TrialInfo,
    pub markers: TrialMarkers,
    pub exclusions: ExclusionSet,
    /// Corrected, averaged table (aggregate columns only)
    pub averaged: SampleTable,
    pub segments: Vec<Segment>,
    pub stats: StatsRecord,
    /// Walking-window SNR of the corrected long channels
    pub snr: Vec<SnrRecord>,
    pub warnings: WarningLog,
}

impl TrialOutcome {
    /// Grand oxygenated signal over the walking window, for ST/DT linkage
    pub fn walking_grand_oxy(&self) -> NirsResult<Vec<f64>> {
        let walking = self
            .averaged
            .slice(self.markers.walk_start..self.markers.walk_end)?;
        walking
            .values(ColumnId::aggregate(Region::Grand, SignalKind::Oxy))
            .map(|v| v.to_vec())
            .ok_or_else(|| NirsError::InvalidTable {
                reason: "averaged table is missing the grand oxy column".to_string(),
            })
    }
}

/// Signal-correction and segmentation pipeline for one trial
pub struct TrialPipeline {
    config: ProcessingConfig,
}

impl TrialPipeline {
    pub fn new(config: ProcessingConfig) -> NirsResult<Self> {
        config.validate()?;
        Ok(TrialPipeline { config })
    }

    /// Standard walking-study pipeline
    pub fn walking_study() -> Self {
        TrialPipeline {
            config: ProcessingConfig::walking_study(),
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Resolve trial markers according to the event policy
    fn resolve_markers(
        &self,
        table: &mut SampleTable,
        sample_rate: f64,
    ) -> NirsResult<TrialMarkers> {
        match &self.config.event_policy {
            EventPolicy::Recorded => {
                TrialMarkers::from_markers(&table.event_markers(), table.len())
            }
            EventPolicy::Synthetic {
                stance_start_s,
                walk_start_s,
                end_guard_s,
            } => {
                table.clear_events();
                let markers = synthetic_markers(
                    table.len(),
                    sample_rate,
                    *stance_start_s,
                    *walk_start_s,
                    *end_guard_s,
                );
                for marker in &markers {
                    table.set_event(marker.sample, marker.label.clone())?;
                }
                TrialMarkers::from_markers(&markers, table.len())
            }
        }
    }

    /// Run the full pipeline on one parsed recording
    pub fn process(
        &self,
        recording: &TrialRecording,
        info: TrialInfo,
    ) -> NirsResult<TrialOutcome> {
        let mut warnings = WarningLog::new();
        let sample_rate = self
            .config
            .sample_rate_override
            .unwrap_or(recording.metadata.sample_rate);

        recording.table.validate_channel_pairs()?;

        // Channels that are a constant zero are dropped before correction;
        // downstream stages treat them as absent
        let exclusions = recording.table.detect_zero_channels();
        for exclusion in exclusions.entries() {
            warnings.push(
                "exclusion",
                format!(
                    "channel {} has zero data in {}; excluding both columns",
                    exclusion.channel, exclusion.zero_side
                ),
            );
        }
        let mut table = recording.table.drop_channels(&exclusions);
        if table.columns().is_empty() {
            return Err(NirsError::InvalidTable {
                reason: "no channels left to process after exclusion".to_string(),
            });
        }

        let markers = self.resolve_markers(&mut table, sample_rate)?;

        let bandpass = FirBandpass::new(
            self.config.fir_order,
            self.config.band_low_hz,
            self.config.band_high_hz,
        )?;
        let stages: Vec<Box<dyn TableStage>> = vec![
            Box::new(ShortChannelRegression::new(self.config.layout.clone())),
            Box::new(TddrStage::new(sample_rate)),
            Box::new(BandpassStage::new(bandpass, sample_rate)),
            Box::new(BaselineNormalizer::from_markers(markers)),
        ];

        let mut current = table;
        for stage in &stages {
            tracing::debug!(stage = stage.name(), rows = current.len(), "applying stage");
            current = stage.apply(&current, &mut warnings)?;
        }

        // SNR over the corrected long channels during walking
        let walking = current.slice(markers.walk_start..markers.walk_end)?;
        let snr = calculate_snr(&walking, &mut warnings);

        let averager = ChannelAverager::new(self.config.layout.clone(), exclusions.clone());
        tracing::debug!(stage = averager.name(), "applying stage");
        let averaged = averager.apply(&current, &mut warnings)?;

        let segmented = segment_tables(&averaged, markers)?;
        let segments: Vec<Segment> = segmented.iter().map(|(s, _)| s.clone()).collect();

        let stats = StatisticsExtractor::new(sample_rate).extract(
            &segmented,
            info.clone(),
            &recording.metadata.export_file,
            &mut warnings,
        );

        Ok(TrialOutcome {
            info,
            markers,
            exclusions,
            averaged,
            segments,
            stats,
            snr,
            warnings,
        })
    }
}
