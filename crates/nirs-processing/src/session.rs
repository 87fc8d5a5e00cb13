//! Cross-file session context for ST/DT linkage
//!
//! The only state crossing files: the per-subject single-task reference
//! populated by ST trials and read by DT trials, plus the combined SNR and
//! ratio record accumulators. Owned by the batch orchestrator and passed
//! explicitly to each file-processing call.

use crate::statistics::{nan_mean, SnrRecord};
use nirs_core::{Condition, NirsError, NirsResult, Timepoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ST reference subtracted below this magnitude makes the ratio undefined
const RATIO_REFERENCE_FLOOR: f64 = 1e-6;

/// One SNR row of the combined cross-file table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnrEntry {
    pub subject_id: String,
    pub condition: Condition,
    pub timepoint: Timepoint,
    pub column: String,
    pub snr: f64,
}

/// DT-versus-ST comparison of one subject's dual-task trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioRecord {
    pub subject_id: String,
    pub timepoint: Timepoint,
    /// Mean of the ST-referenced grand oxy signal over the first walking half
    pub mean_first_half: f64,
    /// Mean over the second walking half
    pub mean_second_half: f64,
    /// Mean over the whole walking window
    pub mean_overall: f64,
    /// Overall mean divided by the ST reference; NaN when the reference is
    /// too close to zero
    pub ratio_dt_over_st: f64,
}

/// Explicit cross-file cache keyed by subject id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    st_reference: HashMap<String, f64>,
    snr_entries: Vec<SnrEntry>,
    ratio_records: Vec<RatioRecord>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a subject's single-task walking grand-oxy mean
    pub fn record_st_reference(&mut self, subject_id: &str, mean_grand_oxy: f64) {
        self.st_reference
            .insert(subject_id.to_string(), mean_grand_oxy);
    }

    pub fn st_reference(&self, subject_id: &str) -> Option<f64> {
        self.st_reference.get(subject_id).copied()
    }

    /// Accumulate SNR records of one trial into the combined table
    pub fn record_snr(
        &mut self,
        subject_id: &str,
        condition: Condition,
        timepoint: Timepoint,
        records: &[SnrRecord],
    ) {
        for record in records {
            self.snr_entries.push(SnrEntry {
                subject_id: subject_id.to_string(),
                condition,
                timepoint,
                column: record.column.clone(),
                snr: record.snr,
            });
        }
    }

    /// Relate a dual-task walking signal to the subject's ST reference.
    ///
    /// Fails fast with a diagnostic when the subject has no prior ST entry;
    /// the orchestrator logs it and moves on to the next file.
    pub fn dual_task_comparison(
        &mut self,
        subject_id: &str,
        timepoint: Timepoint,
        walking_grand_oxy: &[f64],
    ) -> NirsResult<RatioRecord> {
        let st_mean = self
            .st_reference(subject_id)
            .ok_or_else(|| NirsError::MissingStReference {
                subject: subject_id.to_string(),
            })?;

        let referenced: Vec<f64> = walking_grand_oxy.iter().map(|v| v - st_mean).collect();
        let mid = referenced.len() / 2;
        let mean_overall = nan_mean(&referenced);
        let ratio_dt_over_st = if st_mean.abs() > RATIO_REFERENCE_FLOOR {
            mean_overall / st_mean
        } else {
            f64::NAN
        };

        let record = RatioRecord {
            subject_id: subject_id.to_string(),
            timepoint,
            mean_first_half: nan_mean(&referenced[..mid]),
            mean_second_half: nan_mean(&referenced[mid..]),
            mean_overall,
            ratio_dt_over_st,
        };
        self.ratio_records.push(record.clone());
        Ok(record)
    }

    pub fn snr_entries(&self) -> &[SnrEntry] {
        &self.snr_entries
    }

    pub fn ratio_records(&self) -> &[RatioRecord] {
        &self.ratio_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dt_without_st_fails_fast() {
        let mut session = SessionContext::new();
        let err = session
            .dual_task_comparison("S001", Timepoint::Pre, &[1.0, 2.0])
            .unwrap_err();
        assert_eq!(
            err,
            NirsError::MissingStReference {
                subject: "S001".to_string()
            }
        );
    }

    #[test]
    fn test_dt_comparison_after_st() {
        let mut session = SessionContext::new();
        session.record_st_reference("S001", 2.0);

        let walking = [4.0, 4.0, 6.0, 6.0];
        let record = session
            .dual_task_comparison("S001", Timepoint::Post, &walking)
            .unwrap();

        // Referenced signal: [2, 2, 4, 4]
        assert_eq!(record.mean_first_half, 2.0);
        assert_eq!(record.mean_second_half, 4.0);
        assert_eq!(record.mean_overall, 3.0);
        assert_eq!(record.ratio_dt_over_st, 1.5);
        assert_eq!(session.ratio_records().len(), 1);
    }

    #[test]
    fn test_near_zero_reference_gives_nan_ratio() {
        let mut session = SessionContext::new();
        session.record_st_reference("S002", 1e-9);
        let record = session
            .dual_task_comparison("S002", Timepoint::Baseline, &[1.0, 1.0])
            .unwrap();
        assert!(record.ratio_dt_over_st.is_nan());
    }

    #[test]
    fn test_snr_accumulation() {
        let mut session = SessionContext::new();
        session.record_snr(
            "S003",
            Condition::DualTask,
            Timepoint::Pre,
            &[
                SnrRecord {
                    column: "CH1 HbO".to_string(),
                    snr: 1.2,
                },
                SnrRecord {
                    column: "CH2 HbO".to_string(),
                    snr: f64::NAN,
                },
            ],
        );
        assert_eq!(session.snr_entries().len(), 2);
        assert_eq!(session.snr_entries()[0].subject_id, "S003");
    }
}
