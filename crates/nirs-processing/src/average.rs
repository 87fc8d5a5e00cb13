//! Hemisphere-level and grand channel averaging

use crate::stage::TableStage;
use crate::statistics::nan_mean;
use nirs_core::{
    ChannelId, ChannelLayout, ColumnId, ExclusionSet, NirsResult, Region, SampleTable,
    SignalColumn, SignalKind, WarningLog,
};

/// Averages retained channel columns into left/right/grand aggregates.
///
/// Excluded channels are treated as absent; a hemisphere emptied by
/// exclusion yields an all-NaN aggregate, never an error.
pub struct ChannelAverager {
    layout: ChannelLayout,
    exclusions: ExclusionSet,
}

impl ChannelAverager {
    pub fn new(layout: ChannelLayout, exclusions: ExclusionSet) -> Self {
        ChannelAverager { layout, exclusions }
    }

    /// Channel ids of one hemisphere after exclusion
    fn retained(&self, region: Region) -> Vec<ChannelId> {
        let source: Vec<ChannelId> = match region {
            Region::Left => self.layout.left.clone(),
            Region::Right => self.layout.right.clone(),
            Region::Grand => {
                let mut all = self.layout.left.clone();
                all.extend(self.layout.right.iter().copied());
                all
            }
        };
        source
            .into_iter()
            .filter(|ch| !self.exclusions.contains(*ch))
            .collect()
    }

    /// Per-row NaN-skipping mean across the listed channels' columns.
    /// An empty column list yields all NaN.
    fn aggregate(
        &self,
        input: &SampleTable,
        channels: &[ChannelId],
        kind: SignalKind,
    ) -> Vec<f64> {
        let columns: Vec<&[f64]> = channels
            .iter()
            .filter_map(|&ch| input.values(ColumnId::Channel { channel: ch, kind }))
            .collect();
        (0..input.len())
            .map(|row| {
                let row_values: Vec<f64> = columns.iter().map(|c| c[row]).collect();
                nan_mean(&row_values)
            })
            .collect()
    }
}

impl TableStage for ChannelAverager {
    fn name(&self) -> &str {
        "average"
    }

    fn apply(&self, input: &SampleTable, warnings: &mut WarningLog) -> NirsResult<SampleTable> {
        let mut columns = Vec::with_capacity(6);
        for region in [Region::Left, Region::Right, Region::Grand] {
            let retained = self.retained(region);
            if retained.is_empty() {
                warnings.push(
                    "average",
                    format!("no channels left for the {} aggregate after exclusion", region),
                );
            }
            for kind in [SignalKind::Oxy, SignalKind::Deoxy] {
                columns.push(SignalColumn::new(
                    ColumnId::Aggregate { region, kind },
                    self.aggregate(input, &retained, kind),
                ));
            }
        }

        input.with_columns(columns)
    }
}
