//! Core stage trait for the signal-correction pipeline

use nirs_core::{NirsResult, SampleTable, WarningLog};

/// A pipeline stage over the canonical sample table.
///
/// Stages are purely functional: they take an input table and produce a new
/// table without mutating shared state, so per-file runs can be farmed out
/// one worker per file. Degenerate numeric conditions go to the warning log
/// and propagate NaN; fatal conditions abort the current file through the
/// returned error.
pub trait TableStage {
    /// Stage name used in logs and warning entries
    fn name(&self) -> &str;

    /// Transform the table. Index and event columns pass through untouched.
    fn apply(&self, input: &SampleTable, warnings: &mut WarningLog) -> NirsResult<SampleTable>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough;

    impl TableStage for Passthrough {
        fn name(&self) -> &str {
            "passthrough"
        }

        fn apply(
            &self,
            input: &SampleTable,
            _warnings: &mut WarningLog,
        ) -> NirsResult<SampleTable> {
            Ok(input.clone())
        }
    }

    #[test]
    fn test_stage_trait_object() {
        let stage: Box<dyn TableStage> = Box::new(Passthrough);
        let table = SampleTable::from_columns(vec![], vec![None; 3]).unwrap();
        let mut warnings = WarningLog::new();
        let out = stage.apply(&table, &mut warnings).unwrap();
        assert_eq!(out.len(), 3);
        assert!(warnings.is_empty());
    }
}
