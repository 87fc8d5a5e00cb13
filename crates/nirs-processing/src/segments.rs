//! Event-driven segmentation of the corrected trial

use nirs_core::{
    EventMarker, NirsResult, SampleTable, Segment, SegmentName, TrialMarkers, MARKER_LABELS,
};

/// Partition a table into the four named analysis windows.
///
/// Quiet Stance covers [stance_start, walk_start), Walking covers
/// [walk_start, walk_end); the walking halves split at the floor midpoint,
/// so an odd walking length gives Early Walking the smaller half.
pub fn create_segments(markers: TrialMarkers, table_len: usize) -> NirsResult<Vec<Segment>> {
    markers.validate(table_len)?;

    let mid = markers.walk_start + (markers.walk_end - markers.walk_start) / 2;
    Ok(vec![
        Segment::new(SegmentName::QuietStance, markers.stance_start..markers.walk_start),
        Segment::new(SegmentName::Walking, markers.walk_start..markers.walk_end),
        Segment::new(SegmentName::EarlyWalking, markers.walk_start..mid),
        Segment::new(SegmentName::LateWalking, mid..markers.walk_end),
    ])
}

/// Slice the table for each segment; segments keep the parent index values
pub fn segment_tables(
    table: &SampleTable,
    markers: TrialMarkers,
) -> NirsResult<Vec<(Segment, SampleTable)>> {
    create_segments(markers, table.len())?
        .into_iter()
        .map(|seg| table.slice(seg.range.clone()).map(|t| (seg, t)))
        .collect()
}

/// Synthesize the canonical three markers at fixed trial times.
///
/// Used when the recorded event column is unreliable: quiet stance at
/// `stance_start_s`, walk start at `walk_start_s`, walk end `end_guard_s`
/// seconds before the end of the trial. Markers falling outside the table
/// are dropped, which the downstream count check will then reject.
pub fn synthetic_markers(
    table_len: usize,
    sample_rate: f64,
    stance_start_s: f64,
    walk_start_s: f64,
    end_guard_s: f64,
) -> Vec<EventMarker> {
    let total_time = table_len as f64 / sample_rate;
    let times = [stance_start_s, walk_start_s, total_time - end_guard_s];

    times
        .iter()
        .zip(MARKER_LABELS)
        .filter_map(|(&t, label)| {
            let sample = (t * sample_rate) as i64;
            if sample >= 0 && (sample as usize) < table_len {
                Some(EventMarker::new(sample as usize, label))
            } else {
                None
            }
        })
        .collect()
}
