//! Trial identity: subject, condition and timepoint from the file layout

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Walking-task condition of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// Single-task walking (LongWalk_ST)
    SingleTask,
    /// Dual-task walking (LongWalk_DT)
    DualTask,
    Unknown,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::SingleTask => write!(f, "LongWalk_ST"),
            Condition::DualTask => write!(f, "LongWalk_DT"),
            Condition::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Visit timepoint of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timepoint {
    Baseline,
    Pre,
    Post,
    Unknown,
}

impl fmt::Display for Timepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timepoint::Baseline => write!(f, "Baseline"),
            Timepoint::Pre => write!(f, "Pre"),
            Timepoint::Post => write!(f, "Post"),
            Timepoint::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Identity of one trial for reporting and cross-file linkage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialInfo {
    pub subject_id: String,
    pub condition: Condition,
    pub timepoint: Timepoint,
}

impl TrialInfo {
    pub fn new(
        subject_id: impl Into<String>,
        condition: Condition,
        timepoint: Timepoint,
    ) -> Self {
        TrialInfo {
            subject_id: subject_id.into(),
            condition,
            timepoint,
        }
    }

    /// Derive identity from a file path relative to the study root.
    ///
    /// The subject id is the first path component, the timepoint any
    /// component named Baseline/Pre/Post, the condition a
    /// LongWalk_ST/LongWalk_DT substring of the file name.
    pub fn from_relative_path(relative: &Path) -> Self {
        let mut subject_id = String::from("Unknown");
        let mut timepoint = Timepoint::Unknown;

        for (i, part) in relative.components().enumerate() {
            let part = part.as_os_str().to_string_lossy();
            if i == 0 {
                subject_id = part.to_string();
            }
            match part.as_ref() {
                "Baseline" => timepoint = Timepoint::Baseline,
                "Pre" => timepoint = Timepoint::Pre,
                "Post" => timepoint = Timepoint::Post,
                _ => {}
            }
        }

        let file_name = relative
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let condition = if file_name.contains("LongWalk_ST") {
            Condition::SingleTask
        } else if file_name.contains("LongWalk_DT") {
            Condition::DualTask
        } else {
            Condition::Unknown
        };

        TrialInfo {
            subject_id,
            condition,
            timepoint,
        }
    }
}
