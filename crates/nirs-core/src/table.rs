//! SampleTable: canonical tabular form shared by every pipeline stage
//!
//! One row per acquisition sample; one column per channel-measure plus a
//! dense zero-based sample index and a nullable event-label column. Every
//! stage consumes and produces this shape.

use crate::channel::{ChannelId, ExclusionSet, Region, SignalKind, ZeroSide};
use crate::error::{NirsError, NirsResult};
use crate::event::EventMarker;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Typed identity of a signal column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnId {
    /// Per-channel measure ("CH3 HbO")
    Channel { channel: ChannelId, kind: SignalKind },
    /// Hemisphere-level or grand average ("grand oxy")
    Aggregate { region: Region, kind: SignalKind },
}

impl ColumnId {
    pub fn channel(id: u8, kind: SignalKind) -> Self {
        ColumnId::Channel { channel: ChannelId(id), kind }
    }

    pub fn aggregate(region: Region, kind: SignalKind) -> Self {
        ColumnId::Aggregate { region, kind }
    }

    /// Channel id if this is a per-channel column
    pub fn channel_id(&self) -> Option<ChannelId> {
        match self {
            ColumnId::Channel { channel, .. } => Some(*channel),
            ColumnId::Aggregate { .. } => None,
        }
    }

    pub fn kind(&self) -> SignalKind {
        match self {
            ColumnId::Channel { kind, .. } | ColumnId::Aggregate { kind, .. } => *kind,
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnId::Channel { channel, kind } => {
                write!(f, "{} {}", channel, kind.channel_suffix())
            }
            ColumnId::Aggregate { region, kind } => {
                write!(f, "{} {}", region, kind.aggregate_suffix())
            }
        }
    }
}

/// One named column of floating-point samples (NaN allowed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalColumn {
    pub id: ColumnId,
    pub values: Vec<f64>,
}

impl SignalColumn {
    pub fn new(id: ColumnId, values: Vec<f64>) -> Self {
        SignalColumn { id, values }
    }
}

/// Canonical sample table: dense zero-based index, signal columns, events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleTable {
    index: Vec<usize>,
    columns: Vec<SignalColumn>,
    events: Vec<Option<String>>,
}

impl SampleTable {
    /// Assemble a table, validating that all columns share the row count
    /// and no column id repeats.
    pub fn from_columns(
        columns: Vec<SignalColumn>,
        events: Vec<Option<String>>,
    ) -> NirsResult<Self> {
        let rows = events.len();
        for col in &columns {
            if col.values.len() != rows {
                return Err(NirsError::InvalidTable {
                    reason: format!(
                        "column {} has {} rows, expected {}",
                        col.id,
                        col.values.len(),
                        rows
                    ),
                });
            }
        }
        for (i, a) in columns.iter().enumerate() {
            if columns[..i].iter().any(|b| b.id == a.id) {
                return Err(NirsError::InvalidTable {
                    reason: format!("duplicate column {}", a.id),
                });
            }
        }

        Ok(SampleTable {
            index: (0..rows).collect(),
            columns,
            events,
        })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Dense sample index. Positions equal values only in a freshly
    /// re-zeroed table; slices keep the parent's index values.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn columns(&self) -> &[SignalColumn] {
        &self.columns
    }

    pub fn column_ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.columns.iter().map(|c| c.id)
    }

    pub fn column(&self, id: ColumnId) -> Option<&SignalColumn> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn values(&self, id: ColumnId) -> Option<&[f64]> {
        self.column(id).map(|c| c.values.as_slice())
    }

    pub fn events(&self) -> &[Option<String>] {
        &self.events
    }

    /// Place an event label on a row, replacing any previous label there
    pub fn set_event(&mut self, row: usize, label: impl Into<String>) -> NirsResult<()> {
        if row >= self.events.len() {
            return Err(NirsError::InvalidTable {
                reason: format!("event row {} out of bounds ({})", row, self.events.len()),
            });
        }
        self.events[row] = Some(label.into());
        Ok(())
    }

    /// Clear every event label (used when recorded events are unreliable)
    pub fn clear_events(&mut self) {
        for e in self.events.iter_mut() {
            *e = None;
        }
    }

    /// Collect (row, label) pairs in time order
    pub fn event_markers(&self) -> Vec<EventMarker> {
        self.events
            .iter()
            .enumerate()
            .filter_map(|(row, e)| e.as_ref().map(|label| EventMarker::new(row, label.clone())))
            .collect()
    }

    /// New table containing only the listed columns, same index and events
    pub fn select(&self, ids: &[ColumnId]) -> NirsResult<SampleTable> {
        let mut columns = Vec::with_capacity(ids.len());
        for id in ids {
            match self.column(*id) {
                Some(col) => columns.push(col.clone()),
                None => {
                    return Err(NirsError::InvalidTable {
                        reason: format!("column {} not present", id),
                    })
                }
            }
        }
        Ok(SampleTable {
            index: self.index.clone(),
            columns,
            events: self.events.clone(),
        })
    }

    /// New table without any column of the excluded channels
    pub fn drop_channels(&self, exclusions: &ExclusionSet) -> SampleTable {
        let columns = self
            .columns
            .iter()
            .filter(|c| match c.id.channel_id() {
                Some(ch) => !exclusions.contains(ch),
                None => true,
            })
            .cloned()
            .collect();
        SampleTable {
            index: self.index.clone(),
            columns,
            events: self.events.clone(),
        }
    }

    /// Row slice [start, end); index values are kept, not re-zeroed
    pub fn slice(&self, range: Range<usize>) -> NirsResult<SampleTable> {
        if range.end > self.len() || range.start > range.end {
            return Err(NirsError::InvalidTable {
                reason: format!(
                    "slice {}..{} out of bounds for {} rows",
                    range.start,
                    range.end,
                    self.len()
                ),
            });
        }
        Ok(SampleTable {
            index: self.index[range.clone()].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|c| SignalColumn::new(c.id, c.values[range.clone()].to_vec()))
                .collect(),
            events: self.events[range].to_vec(),
        })
    }

    /// Replace the signal columns, keeping this table's index and events.
    ///
    /// Used by stages that change the column set (regression, averaging).
    pub fn with_columns(&self, columns: Vec<SignalColumn>) -> NirsResult<SampleTable> {
        let rows = self.len();
        for col in &columns {
            if col.values.len() != rows {
                return Err(NirsError::InvalidTable {
                    reason: format!(
                        "column {} has {} rows, expected {}",
                        col.id,
                        col.values.len(),
                        rows
                    ),
                });
            }
        }
        Ok(SampleTable {
            index: self.index.clone(),
            columns,
            events: self.events.clone(),
        })
    }

    /// Apply a per-column transform, keeping index and events untouched.
    ///
    /// The transform must preserve length; this is checked.
    pub fn map_columns<F>(&self, mut f: F) -> NirsResult<SampleTable>
    where
        F: FnMut(ColumnId, &[f64]) -> NirsResult<Vec<f64>>,
    {
        let mut columns = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let values = f(col.id, &col.values)?;
            if values.len() != col.values.len() {
                return Err(NirsError::InvalidTable {
                    reason: format!(
                        "transform changed length of {}: {} -> {}",
                        col.id,
                        col.values.len(),
                        values.len()
                    ),
                });
            }
            columns.push(SignalColumn::new(col.id, values));
        }
        Ok(SampleTable {
            index: self.index.clone(),
            columns,
            events: self.events.clone(),
        })
    }

    /// Check that every channel id present carries both its oxygenated and
    /// deoxygenated column.
    pub fn validate_channel_pairs(&self) -> NirsResult<()> {
        let ids: Vec<ChannelId> = {
            let mut v: Vec<ChannelId> =
                self.columns.iter().filter_map(|c| c.id.channel_id()).collect();
            v.sort();
            v.dedup();
            v
        };
        for ch in ids {
            let oxy = self.column(ColumnId::Channel { channel: ch, kind: SignalKind::Oxy });
            let deoxy = self.column(ColumnId::Channel { channel: ch, kind: SignalKind::Deoxy });
            if oxy.is_none() || deoxy.is_none() {
                return Err(NirsError::InvalidTable {
                    reason: format!("channel {} is missing its {} column",
                        ch,
                        if oxy.is_none() { "HbO" } else { "HbR" }),
                });
            }
        }
        Ok(())
    }

    /// Flag channels whose oxygenated and/or deoxygenated column is a
    /// constant exact zero (sensor failure).
    pub fn detect_zero_channels(&self) -> ExclusionSet {
        let mut set = ExclusionSet::new();
        let ids: Vec<ChannelId> = {
            let mut v: Vec<ChannelId> =
                self.columns.iter().filter_map(|c| c.id.channel_id()).collect();
            v.sort();
            v.dedup();
            v
        };

        for ch in ids {
            let all_zero = |kind: SignalKind| {
                self.values(ColumnId::Channel { channel: ch, kind })
                    .map(|v| !v.is_empty() && v.iter().all(|x| *x == 0.0))
                    .unwrap_or(false)
            };
            let oxy_zero = all_zero(SignalKind::Oxy);
            let deoxy_zero = all_zero(SignalKind::Deoxy);
            match (oxy_zero, deoxy_zero) {
                (true, true) => set.insert(ch, ZeroSide::Both),
                (true, false) => set.insert(ch, ZeroSide::Oxy),
                (false, true) => set.insert(ch, ZeroSide::Deoxy),
                (false, false) => {}
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(values: Vec<(ColumnId, Vec<f64>)>) -> SampleTable {
        let rows = values.first().map(|(_, v)| v.len()).unwrap_or(0);
        let columns = values
            .into_iter()
            .map(|(id, v)| SignalColumn::new(id, v))
            .collect();
        SampleTable::from_columns(columns, vec![None; rows]).unwrap()
    }

    #[test]
    fn test_row_count_mismatch_rejected() {
        let columns = vec![
            SignalColumn::new(ColumnId::channel(1, SignalKind::Oxy), vec![0.0; 4]),
            SignalColumn::new(ColumnId::channel(1, SignalKind::Deoxy), vec![0.0; 3]),
        ];
        assert!(SampleTable::from_columns(columns, vec![None; 4]).is_err());
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let id = ColumnId::channel(1, SignalKind::Oxy);
        let columns = vec![
            SignalColumn::new(id, vec![0.0; 2]),
            SignalColumn::new(id, vec![1.0; 2]),
        ];
        assert!(SampleTable::from_columns(columns, vec![None; 2]).is_err());
    }

    #[test]
    fn test_event_markers_in_order() {
        let mut table = table_with(vec![(ColumnId::channel(1, SignalKind::Oxy), vec![0.0; 10])]);
        table.set_event(7, "S2").unwrap();
        table.set_event(2, "S1").unwrap();

        let markers = table.event_markers();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].sample, 2);
        assert_eq!(markers[0].label, "S1");
        assert_eq!(markers[1].sample, 7);
    }

    #[test]
    fn test_slice_keeps_index_values() {
        let table = table_with(vec![(
            ColumnId::channel(1, SignalKind::Oxy),
            (0..10).map(|i| i as f64).collect(),
        )]);
        let slice = table.slice(4..8).unwrap();
        assert_eq!(slice.len(), 4);
        assert_eq!(slice.index(), &[4, 5, 6, 7]);
        assert_eq!(
            slice.values(ColumnId::channel(1, SignalKind::Oxy)).unwrap(),
            &[4.0, 5.0, 6.0, 7.0]
        );
    }

    #[test]
    fn test_detect_zero_channels() {
        let table = table_with(vec![
            (ColumnId::channel(1, SignalKind::Oxy), vec![0.0, 0.0, 0.0]),
            (ColumnId::channel(1, SignalKind::Deoxy), vec![0.1, 0.2, 0.3]),
            (ColumnId::channel(2, SignalKind::Oxy), vec![1.0, 2.0, 3.0]),
            (ColumnId::channel(2, SignalKind::Deoxy), vec![0.5, 0.5, 0.5]),
            // Near-zero but not exactly zero: must not be excluded
            (ColumnId::channel(3, SignalKind::Oxy), vec![1e-12, 0.0, 0.0]),
            (ColumnId::channel(3, SignalKind::Deoxy), vec![0.0, 1e-12, 0.0]),
        ]);

        let set = table.detect_zero_channels();
        assert_eq!(set.len(), 1);
        assert!(set.contains(ChannelId(1)));
        assert_eq!(set.entries()[0].zero_side, ZeroSide::Oxy);
        assert!(!set.contains(ChannelId(3)));
    }

    #[test]
    fn test_drop_channels_removes_both_sides() {
        let table = table_with(vec![
            (ColumnId::channel(1, SignalKind::Oxy), vec![0.0; 3]),
            (ColumnId::channel(1, SignalKind::Deoxy), vec![0.0; 3]),
            (ColumnId::channel(2, SignalKind::Oxy), vec![1.0; 3]),
            (ColumnId::channel(2, SignalKind::Deoxy), vec![1.0; 3]),
        ]);
        let set = table.detect_zero_channels();
        let kept = table.drop_channels(&set);
        assert_eq!(kept.columns().len(), 2);
        assert!(kept.values(ColumnId::channel(1, SignalKind::Oxy)).is_none());
        assert!(kept.validate_channel_pairs().is_ok());
    }

    #[test]
    fn test_pair_invariant() {
        let table = table_with(vec![
            (ColumnId::channel(1, SignalKind::Oxy), vec![0.0; 3]),
            (ColumnId::channel(2, SignalKind::Oxy), vec![0.0; 3]),
            (ColumnId::channel(2, SignalKind::Deoxy), vec![0.0; 3]),
        ]);
        assert!(table.validate_channel_pairs().is_err());
    }

    #[test]
    fn test_column_display() {
        assert_eq!(ColumnId::channel(3, SignalKind::Oxy).to_string(), "CH3 HbO");
        assert_eq!(
            ColumnId::aggregate(Region::Grand, SignalKind::Oxy).to_string(),
            "grand oxy"
        );
        assert_eq!(
            ColumnId::aggregate(Region::Left, SignalKind::Deoxy).to_string(),
            "left deoxy"
        );
    }
}
