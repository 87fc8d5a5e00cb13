//! Per-segment statistics extraction and SNR records

use nirs_core::{
    ColumnId, Region, SampleTable, Segment, SegmentName, SignalKind, TrialInfo, WarningLog,
};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Mean over the non-NaN entries; NaN when none remain
pub fn nan_mean<T: Float>(values: &[T]) -> T {
    let mut sum = T::zero();
    let mut count = 0usize;
    for &v in values {
        if !v.is_nan() {
            sum = sum + v;
            count += 1;
        }
    }
    match T::from(count) {
        Some(c) if count > 0 => sum / c,
        _ => T::nan(),
    }
}

/// Sample standard deviation (ddof = 1) over the non-NaN entries
pub fn nan_std<T: Float>(values: &[T]) -> T {
    let mean = nan_mean(values);
    let mut sum_sq = T::zero();
    let mut count = 0usize;
    for &v in values {
        if !v.is_nan() {
            let d = v - mean;
            sum_sq = sum_sq + d * d;
            count += 1;
        }
    }
    if count < 2 {
        return T::nan();
    }
    match T::from(count - 1) {
        Some(c) => (sum_sq / c).sqrt(),
        None => T::nan(),
    }
}

/// Population standard deviation (ddof = 0), NaN-propagating
pub fn population_std<T: Float>(values: &[T]) -> T {
    let n = match T::from(values.len()) {
        Some(n) if !values.is_empty() => n,
        _ => return T::nan(),
    };
    let mut sum = T::zero();
    for &v in values {
        sum = sum + v;
    }
    let mean = sum / n;
    let mut sum_sq = T::zero();
    for &v in values {
        let d = v - mean;
        sum_sq = sum_sq + d * d;
    }
    (sum_sq / n).sqrt()
}

/// Maximum over the non-NaN entries
fn nan_max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::max)
}

/// Minimum over the non-NaN entries
fn nan_min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::min)
}

/// Position of the maximum finite value, if any
fn peak_index(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Trapezoidal integration of y against x; NaN values propagate
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    y.windows(2)
        .zip(x.windows(2))
        .map(|(yw, xw)| 0.5 * (yw[0] + yw[1]) * (xw[1] - xw[0]))
        .sum()
}

/// Least-squares slope of y against x; NaN values propagate
pub fn linear_slope(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if x.is_empty() {
        return f64::NAN;
    }
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        num += (xi - mx) * (yi - my);
        den += (xi - mx) * (xi - mx);
    }
    num / den
}

/// Descriptive and derived metrics of one column within one segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetrics {
    pub mean: f64,
    pub std_dev: f64,
    /// max - min (peak-to-trough amplitude)
    pub peak_amplitude: f64,
    /// Seconds from the segment start to the column maximum
    pub time_to_peak: f64,
    /// Trapezoidal area under the curve against time
    pub auc: f64,
    /// Linear-trend slope against time
    pub slope: f64,
}

impl SegmentMetrics {
    /// Metric names of the documented column-naming scheme, in order
    pub fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("Mean", self.mean),
            ("StdDev", self.std_dev),
            ("Peak Amplitude", self.peak_amplitude),
            ("Time to Peak", self.time_to_peak),
            ("AUC", self.auc),
            ("Slope", self.slope),
        ]
    }
}

/// Metrics of one (segment, column) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsEntry {
    pub segment: SegmentName,
    pub column: ColumnId,
    pub metrics: SegmentMetrics,
}

/// One summary row per trial: identity plus all segment metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub info: TrialInfo,
    pub export_file: String,
    pub entries: Vec<StatsEntry>,
}

impl StatsRecord {
    /// Flatten to "<segment> <column> <metric>" named values, the stable
    /// scheme downstream tables key on.
    pub fn columns(&self) -> Vec<(String, f64)> {
        let mut out = Vec::with_capacity(self.entries.len() * 6);
        for entry in &self.entries {
            for (metric, value) in entry.metrics.named() {
                out.push((
                    format!("{} {} {}", entry.segment, entry.column, metric),
                    value,
                ));
            }
        }
        out
    }
}

/// Computes per-segment summaries over the grand oxygenated aggregate
pub struct StatisticsExtractor {
    sample_rate: f64,
}

impl StatisticsExtractor {
    pub fn new(sample_rate: f64) -> Self {
        StatisticsExtractor { sample_rate }
    }

    fn is_reported(id: ColumnId) -> bool {
        matches!(
            id,
            ColumnId::Aggregate {
                region: Region::Grand,
                kind: SignalKind::Oxy,
            }
        )
    }

    /// Summarize the named segments of one trial.
    ///
    /// Columns that are empty or entirely missing within a segment are
    /// skipped with a recorded warning, never an error.
    pub fn extract(
        &self,
        segments: &[(Segment, SampleTable)],
        info: TrialInfo,
        export_file: &str,
        warnings: &mut WarningLog,
    ) -> StatsRecord {
        let mut entries = Vec::new();

        for (segment, table) in segments {
            let time: Vec<f64> = table
                .index()
                .iter()
                .map(|&i| i as f64 / self.sample_rate)
                .collect();

            for column in table.columns() {
                if !Self::is_reported(column.id) {
                    continue;
                }
                let values = &column.values;
                if values.iter().all(|v| v.is_nan()) {
                    warnings.push(
                        "statistics",
                        format!(
                            "column {} in segment {} is empty or all NaN; skipped",
                            column.id, segment.name
                        ),
                    );
                    continue;
                }

                let time_to_peak = match peak_index(values) {
                    Some(i) => time[i] - time[0],
                    None => {
                        warnings.push(
                            "statistics",
                            format!(
                                "cannot locate peak of {} in segment {}",
                                column.id, segment.name
                            ),
                        );
                        f64::NAN
                    }
                };

                let slope = linear_slope(&time, values);
                if slope.is_nan() {
                    warnings.push(
                        "statistics",
                        format!(
                            "degenerate trend fit for {} in segment {}",
                            column.id, segment.name
                        ),
                    );
                }

                entries.push(StatsEntry {
                    segment: segment.name,
                    column: column.id,
                    metrics: SegmentMetrics {
                        mean: nan_mean(values),
                        std_dev: nan_std(values),
                        peak_amplitude: nan_max(values) - nan_min(values),
                        time_to_peak,
                        auc: trapezoid(values, &time),
                        slope,
                    },
                });
            }
        }

        StatsRecord {
            info,
            export_file: export_file.to_string(),
            entries,
        }
    }
}

/// Signal-to-noise ratio of one channel column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnrRecord {
    /// Column name ("CH3 HbO")
    pub column: String,
    /// Mean divided by population standard deviation; NaN when degenerate
    pub snr: f64,
}

/// SNR of every oxygenated channel column of the table.
///
/// A zero-variance column yields NaN with a recorded warning.
pub fn calculate_snr(table: &SampleTable, warnings: &mut WarningLog) -> Vec<SnrRecord> {
    let mut records = Vec::new();
    for column in table.columns() {
        let is_channel_oxy = matches!(
            column.id,
            ColumnId::Channel {
                kind: SignalKind::Oxy,
                ..
            }
        );
        if !is_channel_oxy {
            continue;
        }

        let n = column.values.len() as f64;
        let mean = if column.values.is_empty() {
            f64::NAN
        } else {
            column.values.iter().sum::<f64>() / n
        };
        let std = population_std(&column.values);
        let snr = if std == 0.0 {
            warnings.push(
                "snr",
                format!("column {} has zero variance; SNR undefined", column.id),
            );
            f64::NAN
        } else {
            mean / std
        };
        records.push(SnrRecord {
            column: column.id.to_string(),
            snr,
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use nirs_core::{Condition, SignalColumn, Timepoint};

    fn grand_oxy_table(values: Vec<f64>) -> SampleTable {
        SampleTable::from_columns(
            vec![SignalColumn::new(
                ColumnId::aggregate(Region::Grand, SignalKind::Oxy),
                values.clone(),
            )],
            vec![None; values.len()],
        )
        .unwrap()
    }

    fn info() -> TrialInfo {
        TrialInfo::new("S001", Condition::SingleTask, Timepoint::Baseline)
    }

    #[test]
    fn test_nan_helpers() {
        assert_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean::<f64>(&[]).is_nan());
        assert!((nan_std(&[1.0, 2.0, 3.0, f64::NAN]) - 1.0).abs() < 1e-12);
        assert!(nan_std(&[1.0]).is_nan());
        assert!((population_std(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_of_constant_signal() {
        // Constant c over a span of length T integrates to c * T
        let fs = 10.0;
        let table = grand_oxy_table(vec![2.5; 41]);
        let segments = vec![(
            Segment::new(SegmentName::Walking, 0..41),
            table.slice(0..41).unwrap(),
        )];
        let record = StatisticsExtractor::new(fs).extract(
            &segments,
            info(),
            "t.txt",
            &mut WarningLog::new(),
        );
        let auc = record.entries[0].metrics.auc;
        assert!((auc - 2.5 * 4.0).abs() < 1e-9, "auc {}", auc);
    }

    #[test]
    fn test_slope_of_linear_ramp() {
        let fs = 10.0;
        // y = 0.7 * t
        let values: Vec<f64> = (0..100).map(|i| 0.7 * i as f64 / fs).collect();
        let table = grand_oxy_table(values);
        let segments = vec![(
            Segment::new(SegmentName::Walking, 0..100),
            table.slice(0..100).unwrap(),
        )];
        let record = StatisticsExtractor::new(fs).extract(
            &segments,
            info(),
            "t.txt",
            &mut WarningLog::new(),
        );
        let m = &record.entries[0].metrics;
        assert!((m.slope - 0.7).abs() < 1e-9);
        // Peak of the ramp sits at its last sample
        assert!((m.time_to_peak - 9.9).abs() < 1e-9);
    }

    #[test]
    fn test_all_nan_column_skipped_with_warning() {
        let table = grand_oxy_table(vec![f64::NAN; 10]);
        let segments = vec![(
            Segment::new(SegmentName::QuietStance, 0..10),
            table.slice(0..10).unwrap(),
        )];
        let mut warnings = WarningLog::new();
        let record =
            StatisticsExtractor::new(10.0).extract(&segments, info(), "t.txt", &mut warnings);
        assert!(record.entries.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_column_naming_scheme() {
        let table = grand_oxy_table((0..20).map(|i| i as f64).collect());
        let segments = vec![(
            Segment::new(SegmentName::EarlyWalking, 0..20),
            table.slice(0..20).unwrap(),
        )];
        let record = StatisticsExtractor::new(10.0).extract(
            &segments,
            info(),
            "t.txt",
            &mut WarningLog::new(),
        );
        let names: Vec<String> = record.columns().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"Early Walking grand oxy Mean".to_string()));
        assert!(names.contains(&"Early Walking grand oxy AUC".to_string()));
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn test_snr_degenerate_and_normal() {
        let table = SampleTable::from_columns(
            vec![
                SignalColumn::new(ColumnId::channel(1, SignalKind::Oxy), vec![5.0; 10]),
                SignalColumn::new(
                    ColumnId::channel(2, SignalKind::Oxy),
                    (0..10).map(|i| i as f64).collect(),
                ),
                SignalColumn::new(ColumnId::channel(2, SignalKind::Deoxy), vec![1.0; 10]),
            ],
            vec![None; 10],
        )
        .unwrap();

        let mut warnings = WarningLog::new();
        let records = calculate_snr(&table, &mut warnings);
        // Deoxygenated columns are not reported
        assert_eq!(records.len(), 2);
        assert!(records[0].snr.is_nan());
        assert_eq!(warnings.len(), 1);
        assert!(records[1].snr > 0.0);
        assert_eq!(records[1].column, "CH2 HbO");
    }
}
