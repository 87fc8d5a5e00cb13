//! Short-channel regression: superficial-component removal

use crate::stage::TableStage;
use crate::statistics::nan_mean;
use nirs_core::{ChannelLayout, ColumnId, NirsError, NirsResult, SampleTable, WarningLog};

/// Per-sample mean across the short reference columns (NaN-skipping rows)
fn reference_series(short: &SampleTable) -> Vec<f64> {
    let columns: Vec<&[f64]> = short.columns().iter().map(|c| c.values.as_slice()).collect();
    (0..short.len())
        .map(|row| {
            let row_values: Vec<f64> = columns.iter().map(|c| c[row]).collect();
            nan_mean(&row_values)
        })
        .collect()
}

/// Remove the systemic component from every long column.
///
/// For each long column Y and the reference X: β = (X·Y)/(X·X), output
/// Y − βX, with no intercept. A degenerate reference (X·X = 0) propagates
/// NaN and is reported as a warning, never an error.
pub fn regress(
    long: &SampleTable,
    short: &SampleTable,
    warnings: &mut WarningLog,
) -> NirsResult<SampleTable> {
    if long.len() != short.len() {
        return Err(NirsError::InvalidTable {
            reason: format!(
                "long and short tables are not aligned: {} vs {} rows",
                long.len(),
                short.len()
            ),
        });
    }

    let x = reference_series(short);
    let xx: f64 = x.iter().map(|v| v * v).sum();
    if xx == 0.0 {
        warnings.push("scr", "degenerate reference: X.X is zero, output is NaN");
    }

    long.map_columns(|_, y| {
        let xy: f64 = x.iter().zip(y).map(|(xi, yi)| xi * yi).sum();
        let beta = xy / xx;
        Ok(y.iter().zip(&x).map(|(yi, xi)| yi - beta * xi).collect())
    })
}

/// Stage splitting the table into long and short channels by layout.
///
/// Short columns are consumed by the regression; when no reference channel
/// is present the stage explicitly skips (recorded in the warning log) and
/// the long channels pass through unchanged.
pub struct ShortChannelRegression {
    layout: ChannelLayout,
}

impl ShortChannelRegression {
    pub fn new(layout: ChannelLayout) -> Self {
        ShortChannelRegression { layout }
    }
}

impl TableStage for ShortChannelRegression {
    fn name(&self) -> &str {
        "scr"
    }

    fn apply(&self, input: &SampleTable, warnings: &mut WarningLog) -> NirsResult<SampleTable> {
        let mut long_ids = Vec::new();
        let mut short_ids = Vec::new();
        for id in input.column_ids() {
            match id.channel_id() {
                Some(ch) if self.layout.is_short(ch) => short_ids.push(id),
                _ => long_ids.push(id),
            }
        }

        let long = input.select(&long_ids)?;
        if short_ids.is_empty() {
            warnings.push(
                "scr",
                "no short reference channels present; short-channel regression skipped",
            );
            return Ok(long);
        }
        let short = input.select(&short_ids)?;
        regress(&long, &short, warnings)
    }
}
