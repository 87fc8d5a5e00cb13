//! Named analysis windows derived from event markers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// The four analysis windows of a walking trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentName {
    QuietStance,
    Walking,
    EarlyWalking,
    LateWalking,
}

impl SegmentName {
    /// All segment names in reporting order
    pub fn all() -> [SegmentName; 4] {
        [
            SegmentName::QuietStance,
            SegmentName::Walking,
            SegmentName::EarlyWalking,
            SegmentName::LateWalking,
        ]
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentName::QuietStance => write!(f, "Quiet Stance"),
            SegmentName::Walking => write!(f, "Walking"),
            SegmentName::EarlyWalking => write!(f, "Early Walking"),
            SegmentName::LateWalking => write!(f, "Late Walking"),
        }
    }
}

/// A named half-open sample range of the trial table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub name: SegmentName,
    /// Half-open row range [start, end)
    pub range: Range<usize>,
}

impl Segment {
    pub fn new(name: SegmentName, range: Range<usize>) -> Self {
        Segment { name, range }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}
