//! Warning log for numerically degenerate computations
//!
//! Degenerate conditions (divide-by-zero, empty segments, all-NaN columns)
//! recover locally by propagating NaN; each occurrence is recorded here so
//! the batch orchestrator can write a per-file warnings artifact.

use serde::{Deserialize, Serialize};

/// One recorded warning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Pipeline stage that observed the condition
    pub stage: String,
    pub message: String,
}

/// Ordered collection of warnings for one file's pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarningLog {
    entries: Vec<Warning>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and emit it on the tracing subscriber
    pub fn push(&mut self, stage: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(stage, "{}", message);
        self.entries.push(Warning {
            stage: stage.to_string(),
            message,
        });
    }

    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Move all warnings from another log into this one
    pub fn absorb(&mut self, other: WarningLog) {
        self.entries.extend(other.entries);
    }
}
