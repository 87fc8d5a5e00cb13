//! Reader for the tab-delimited OxySoft export format
//!
//! The export carries a fixed metadata preamble, a header block whose
//! column labels sit between the "(Sample number)" and "(Event)" sentinel
//! rows, and one tab-separated row per sample. Channel columns are renamed
//! to the canonical CH<i> HbO / CH<i> HbR scheme by pair order.

use nirs_core::format_error;
use nirs_core::{
    ColumnId, NirsResult, RecordingMetadata, SampleTable, SignalColumn, SignalKind, TrialRecording,
};
use std::fs;
use std::path::Path;

/// Rows of the preamble scanned for metadata
const PREAMBLE_ROWS: usize = 7;
/// Header rows between the last label row and the first data row
const HEADER_GAP: usize = 4;

/// Read and parse an OxySoft .txt export
pub fn read_txt_file(path: &Path) -> NirsResult<TrialRecording> {
    let text = fs::read_to_string(path)?;
    parse_txt(&text, &path.to_string_lossy())
}

/// Parse export text into a recording. The first second of samples is
/// discarded (sensor warm-up) and the sample index re-zeroed.
pub fn parse_txt(text: &str, export_file: &str) -> NirsResult<TrialRecording> {
    let rows: Vec<Vec<&str>> = text.split('\n').map(|l| l.split('\t').collect()).collect();

    let mut metadata = read_metadata(&rows, export_file)?;
    let (labels, header_end) = locate_labels(&rows, &mut metadata)?;
    let table = read_data(&rows, &labels, header_end, metadata.samples_per_second())?;

    Ok(TrialRecording::new(metadata, table))
}

fn read_metadata(rows: &[Vec<&str>], export_file: &str) -> NirsResult<RecordingMetadata> {
    if rows.len() < PREAMBLE_ROWS {
        return Err(format_error!(
            "file has only {} rows, expected a {}-row preamble",
            rows.len(),
            PREAMBLE_ROWS
        ));
    }

    // Sample rate is located by label, not by position
    let mut sample_rate = None;
    for row in rows {
        if row.iter().any(|c| *c == "Datafile sample rate:") {
            let value = row.get(1).ok_or_else(|| {
                format_error!("sample-rate row has no value cell")
            })?;
            let rate: f64 = value
                .trim()
                .parse()
                .map_err(|_| format_error!("cannot parse sample rate: {:?}", value))?;
            sample_rate = Some(rate.trunc());
            break;
        }
    }
    let sample_rate =
        sample_rate.ok_or_else(|| format_error!("sample rate not found in the preamble"))?;

    let mut metadata = RecordingMetadata::new(sample_rate, export_file)?;
    for row in rows.iter().take(PREAMBLE_ROWS) {
        if row.iter().any(|c| c.is_empty()) {
            continue;
        }
        if row.iter().any(|c| *c == "OxySoft export of:") {
            if let Some(value) = row.get(1) {
                metadata.original_file = Some(value.to_string());
            }
        } else if let (Some(key), Some(value)) = (row.first(), row.get(1)) {
            let key = key.split(':').next().unwrap_or(key).to_string();
            metadata.extra.insert(key, value.to_string());
        }
    }

    Ok(metadata)
}

/// Locate the label block by its sentinel rows and normalize labels.
/// Returns the normalized labels and the row index of the "(Event)" row.
fn locate_labels(
    rows: &[Vec<&str>],
    metadata: &mut RecordingMetadata,
) -> NirsResult<(Vec<String>, usize)> {
    let mut start = None;
    let mut end = None;
    for (idx, row) in rows.iter().enumerate() {
        if row.iter().any(|c| c.contains("(Sample number)")) {
            start = Some(idx);
        } else if row.iter().any(|c| c.contains("(Event)")) {
            end = Some(idx);
            break;
        }
    }
    let start = start.ok_or_else(|| format_error!("\"(Sample number)\" sentinel not found"))?;
    let end = end.ok_or_else(|| format_error!("\"(Event)\" sentinel not found"))?;

    let mut labels = Vec::with_capacity(end - start + 1);
    for (offset, row) in rows[start..=end].iter().enumerate() {
        let raw = row
            .get(1)
            .ok_or_else(|| format_error!("label row {} has no label cell", start + offset))?;
        labels.push(normalize_label(raw)?);
    }

    // Rename channel labels positionally: pairs of (HbO, HbR) per channel
    let channel_count = labels.len().saturating_sub(2);
    if channel_count % 2 != 0 {
        return Err(format_error!(
            "expected channel columns in oxy/deoxy pairs, found {}",
            channel_count
        ));
    }
    for (i, label) in labels.iter_mut().enumerate() {
        if i == 0 || i == channel_count + 1 {
            continue;
        }
        let channel = (i - 1) / 2 + 1;
        let kind = if (i - 1) % 2 == 0 { "HbO" } else { "HbR" };
        // Keep the device label for traceability
        metadata
            .extra
            .insert(format!("CH{} {} source", channel, kind), label.clone());
        *label = format!("CH{} {}", channel, kind);
    }

    Ok((labels, end))
}

/// Strip the device decorations from one raw label
fn normalize_label(raw: &str) -> NirsResult<String> {
    if raw.contains("O2Hb") || raw.contains("HHb") {
        let name = raw.split('(').next().unwrap_or(raw).trim_end();
        Ok(name.to_string())
    } else if raw.contains("(Sample number)") || raw.contains("(Event)") {
        let inner = raw
            .split('(')
            .nth(1)
            .and_then(|s| s.split(')').next())
            .ok_or_else(|| format_error!("malformed sentinel label: {:?}", raw))?;
        Ok(inner.to_string())
    } else {
        Err(format_error!("unexpected value in column labels: {:?}", raw))
    }
}

fn read_data(
    rows: &[Vec<&str>],
    labels: &[String],
    header_end: usize,
    trim_samples: usize,
) -> NirsResult<SampleTable> {
    let first_data = header_end + HEADER_GAP;
    if first_data >= rows.len() {
        return Err(format_error!("no data rows after the header block"));
    }
    // The export ends with an empty line; ignore it
    let data = &rows[first_data..rows.len() - 1];

    let channel_count = (labels.len() - 2) / 2;
    let mut channels: Vec<Vec<f64>> = vec![Vec::with_capacity(data.len()); channel_count * 2];
    let mut events: Vec<Option<String>> = Vec::with_capacity(data.len());

    for (idx, row) in data.iter().enumerate() {
        // Rows carrying an event marker have a trailing empty cell
        let width = if row.len() == labels.len() + 1 {
            labels.len()
        } else if row.len() == labels.len() {
            row.len()
        } else {
            return Err(format_error!(
                "unexpected number of items in row {}: expected {}, found {}",
                idx,
                labels.len(),
                row.len()
            ));
        };
        let row = &row[..width];

        for (col, cell) in row.iter().enumerate().take(channel_count * 2 + 1).skip(1) {
            // Coerce to floating point where possible
            let value = cell.trim().parse::<f64>().unwrap_or(f64::NAN);
            channels[col - 1].push(value);
        }

        let event_cell = row[channel_count * 2 + 1].trim();
        events.push(if event_cell.is_empty() {
            None
        } else {
            Some(event_cell.to_string())
        });
    }

    // Discard the first second of samples (sensor warm-up)
    let trim = trim_samples.min(events.len());
    let columns = channels
        .into_iter()
        .enumerate()
        .map(|(i, values)| {
            let channel = (i / 2 + 1) as u8;
            let kind = if i % 2 == 0 {
                SignalKind::Oxy
            } else {
                SignalKind::Deoxy
            };
            SignalColumn::new(ColumnId::channel(channel, kind), values[trim..].to_vec())
        })
        .collect();

    SampleTable::from_columns(columns, events[trim..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-channel export at 2 Hz with six data rows and one event marker
    fn sample_export() -> String {
        let mut text = String::new();
        text.push_str("OxySoft export of:\ttrial_042.oxy3\n");
        text.push_str("Export date:\t2023-04-01\n");
        text.push_str("Datafile sample rate:\t2.00\n");
        text.push_str("Optode distance:\t30 mm\n");
        text.push_str("\t\n");
        text.push_str("Legend:\t\n");
        text.push_str("\t\n");
        text.push_str("1\t1 (Sample number)\n");
        text.push_str("2\tRx1-Tx1 O2Hb (umol/l)\n");
        text.push_str("3\tRx1-Tx1 HHb (umol/l)\n");
        text.push_str("4\tRx1-Tx2 O2Hb (umol/l)\n");
        text.push_str("5\tRx1-Tx2 HHb (umol/l)\n");
        text.push_str("6\t6 (Event)\n");
        // Three filler rows inside the header gap
        text.push_str("\t\n");
        text.push_str("\t\n");
        text.push_str("\t\n");
        for i in 0..6 {
            let event = if i == 3 { "S1\t" } else { "" };
            text.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\n",
                i,
                i as f64 * 0.1,
                -(i as f64) * 0.1,
                1.0,
                -1.0,
                event
            ));
        }
        text
    }

    #[test]
    fn test_parse_canonical_export() {
        let recording = parse_txt(&sample_export(), "trial.txt").unwrap();

        assert_eq!(recording.metadata.sample_rate, 2.0);
        assert_eq!(
            recording.metadata.original_file.as_deref(),
            Some("trial_042.oxy3")
        );
        assert_eq!(
            recording.metadata.extra.get("CH1 HbO source").map(String::as_str),
            Some("Rx1-Tx1 O2Hb")
        );

        // 6 rows minus the 1-second (2-sample) warm-up trim
        let table = &recording.table;
        assert_eq!(table.len(), 4);
        assert_eq!(table.index(), &[0, 1, 2, 3]);

        let ch1 = table.values(ColumnId::channel(1, SignalKind::Oxy)).unwrap();
        assert!((ch1[0] - 0.2).abs() < 1e-12);
        let ch2 = table.values(ColumnId::channel(2, SignalKind::Deoxy)).unwrap();
        assert_eq!(ch2, &[-1.0, -1.0, -1.0, -1.0]);

        // The event lands on post-trim row 1
        let markers = table.event_markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].sample, 1);
        assert_eq!(markers[0].label, "S1");
    }

    #[test]
    fn test_missing_sample_rate() {
        let text = sample_export().replace("Datafile sample rate:", "Rate:");
        let err = parse_txt(&text, "trial.txt").unwrap_err();
        assert!(err.to_string().contains("sample rate"));
    }

    #[test]
    fn test_missing_sentinels() {
        let text = sample_export().replace("(Sample number)", "(Sample)");
        let err = parse_txt(&text, "trial.txt").unwrap_err();
        assert!(err.to_string().contains("Sample number"));

        let text = sample_export().replace("(Event)", "(Marker)");
        assert!(parse_txt(&text, "trial.txt").is_err());
    }

    #[test]
    fn test_row_width_mismatch() {
        let mut text = sample_export();
        text.push_str("9\t0.1\t0.2\n");
        // The appended short row displaces the trailing empty line
        text.push('\n');
        let err = parse_txt(&text, "trial.txt").unwrap_err();
        assert!(err.to_string().contains("row"));
    }

    #[test]
    fn test_unexpected_label_rejected() {
        let text = sample_export().replace("Rx1-Tx1 O2Hb (umol/l)", "Temperature (C)");
        let err = parse_txt(&text, "trial.txt").unwrap_err();
        assert!(err.to_string().contains("column labels"));
    }

    #[test]
    fn test_non_numeric_cell_becomes_nan() {
        let text = sample_export().replace("1\t-1", "bad\t-1");
        let recording = parse_txt(&text, "trial.txt").unwrap();
        let ch2 = recording
            .table
            .values(ColumnId::channel(2, SignalKind::Oxy))
            .unwrap();
        assert!(ch2.iter().any(|v| v.is_nan()));
    }
}
