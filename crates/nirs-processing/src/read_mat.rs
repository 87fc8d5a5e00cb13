//! Reader for the Artinis structured-array (.mat) export
//!
//! Parses the MAT level-5 container far enough to extract the `nirs_data`
//! struct: sample rate, channel labels, oxy/deoxy value matrices and the
//! auxiliary synchronization channel. Event markers come from peak
//! detection on the synchronization signal; a missing channel or zero
//! detected peaks yields an all-missing event column, not an error.

use byteorder::{LittleEndian, ReadBytesExt};
use nirs_core::format_error;
use nirs_core::{
    ColumnId, NirsResult, RecordingMetadata, SampleTable, SignalColumn, SignalKind, TrialRecording,
};
use std::fs;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

// MAT level-5 data type identifiers
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;

// MAT array class identifiers
const MX_CELL: u8 = 1;
const MX_STRUCT: u8 = 2;
const MX_CHAR: u8 = 4;
const MX_DOUBLE: u8 = 6;
const MX_SINGLE: u8 = 7;

/// Peak threshold of the synchronization pulse channel
const SYNC_PEAK_HEIGHT: f64 = 0.02;
/// Column index of the synchronization signal inside the auxiliary matrix
const SYNC_COLUMN: usize = 1;
/// Expected column count of the auxiliary matrix carrying events
const AUX_COLUMNS: usize = 3;

/// A decoded MAT array
enum MatValue {
    /// Column-major numeric matrix
    Numeric {
        rows: usize,
        cols: usize,
        data: Vec<f64>,
    },
    Char(String),
    Cell(Vec<MatValue>),
    Struct(Vec<(String, MatValue)>),
}

/// Read and parse an Artinis .mat export
pub fn read_mat_file(path: &Path) -> NirsResult<TrialRecording> {
    let bytes = fs::read(path)?;
    parse_mat(&bytes, &path.to_string_lossy())
}

/// Parse MAT container bytes into a recording. The first second of samples
/// is discarded and the sample index re-zeroed, as in the text path.
pub fn parse_mat(bytes: &[u8], export_file: &str) -> NirsResult<TrialRecording> {
    if bytes.len() < 128 {
        return Err(format_error!("file too small for a MAT level-5 header"));
    }
    let endian = &bytes[126..128];
    if endian == b"MI" {
        return Err(format_error!("big-endian MAT files are not supported"));
    }
    if endian != b"IM" {
        return Err(format_error!(
            "missing MAT endian indicator, found {:?}",
            endian
        ));
    }

    let mut cursor = Cursor::new(&bytes[128..]);
    let total = (bytes.len() - 128) as u64;
    let mut nirs_data = None;

    while cursor.position() < total {
        let (mat_type, payload) = read_element(&mut cursor)?;
        if mat_type == MI_COMPRESSED {
            return Err(format_error!(
                "compressed MAT element encountered; re-export uncompressed"
            ));
        }
        if mat_type != MI_MATRIX {
            continue;
        }
        let (name, value) = parse_matrix(&payload)?;
        if name == "nirs_data" {
            nirs_data = Some(value);
            break;
        }
    }

    let fields = match nirs_data {
        Some(MatValue::Struct(fields)) => fields,
        Some(_) => {
            return Err(format_error!("nirs_data is not a struct array"));
        }
        None => {
            return Err(format_error!("nirs_data struct not found in file"));
        }
    };

    build_recording(fields, export_file)
}

/// Read one tagged element, honoring the small-element format and the
/// 8-byte padding rule.
fn read_element(cursor: &mut Cursor<&[u8]>) -> NirsResult<(u32, Vec<u8>)> {
    let tag = cursor.read_u32::<LittleEndian>()?;
    let small_size = tag >> 16;
    if small_size != 0 {
        if small_size > 4 {
            return Err(format_error!("small element claims {} bytes", small_size));
        }
        let mat_type = tag & 0xFFFF;
        let mut data = vec![0u8; small_size as usize];
        cursor.read_exact(&mut data)?;
        cursor.seek(SeekFrom::Current(4 - small_size as i64))?;
        return Ok((mat_type, data));
    }

    let size = cursor.read_u32::<LittleEndian>()? as usize;
    let mut data = vec![0u8; size];
    cursor.read_exact(&mut data)?;
    let pad = (8 - size % 8) % 8;
    cursor.seek(SeekFrom::Current(pad as i64))?;
    Ok((tag, data))
}

/// Decode a miMATRIX payload into (array name, value)
fn parse_matrix(payload: &[u8]) -> NirsResult<(String, MatValue)> {
    let mut cursor = Cursor::new(payload);

    let (flags_type, flags) = read_element(&mut cursor)?;
    if flags_type != MI_UINT32 || flags.len() < 8 {
        return Err(format_error!("malformed array flags element"));
    }
    let class = flags[0];

    let (dims_type, dims_raw) = read_element(&mut cursor)?;
    if dims_type != MI_INT32 {
        return Err(format_error!("malformed dimensions element"));
    }
    let dims: Vec<usize> = dims_raw
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize)
        .collect();
    let count: usize = dims.iter().product();

    let (_, name_raw) = read_element(&mut cursor)?;
    let name = String::from_utf8_lossy(&name_raw).to_string();

    let value = match class {
        MX_DOUBLE | MX_SINGLE => {
            let (data_type, data_raw) = read_element(&mut cursor)?;
            let data = numeric_to_f64(data_type, &data_raw)?;
            if data.len() != count {
                return Err(format_error!(
                    "matrix {} has {} values for dimensions {:?}",
                    name,
                    data.len(),
                    dims
                ));
            }
            MatValue::Numeric {
                rows: dims.first().copied().unwrap_or(0),
                cols: count / dims.first().copied().unwrap_or(1).max(1),
                data,
            }
        }
        MX_CHAR => {
            let (data_type, data_raw) = read_element(&mut cursor)?;
            MatValue::Char(decode_char(data_type, &data_raw)?)
        }
        MX_CELL => {
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let (item_type, item) = read_element(&mut cursor)?;
                if item_type != MI_MATRIX {
                    return Err(format_error!("cell array {} holds a non-matrix", name));
                }
                items.push(parse_matrix(&item)?.1);
            }
            MatValue::Cell(items)
        }
        MX_STRUCT => {
            if count != 1 {
                return Err(format_error!(
                    "struct {} has {} elements; only scalar structs are supported",
                    name,
                    count
                ));
            }
            let (_, flen_raw) = read_element(&mut cursor)?;
            if flen_raw.len() < 4 {
                return Err(format_error!("malformed field-name length"));
            }
            let flen =
                i32::from_le_bytes([flen_raw[0], flen_raw[1], flen_raw[2], flen_raw[3]]) as usize;
            let (_, names_raw) = read_element(&mut cursor)?;
            if flen == 0 || names_raw.len() % flen != 0 {
                return Err(format_error!("malformed field names element"));
            }

            let field_names: Vec<String> = names_raw
                .chunks_exact(flen)
                .map(|c| {
                    let end = c.iter().position(|b| *b == 0).unwrap_or(flen);
                    String::from_utf8_lossy(&c[..end]).to_string()
                })
                .collect();

            let mut fields = Vec::with_capacity(field_names.len());
            for field_name in field_names {
                let (item_type, item) = read_element(&mut cursor)?;
                if item_type != MI_MATRIX {
                    return Err(format_error!("struct field {} is not a matrix", field_name));
                }
                fields.push((field_name, parse_matrix(&item)?.1));
            }
            MatValue::Struct(fields)
        }
        other => {
            return Err(format_error!(
                "unsupported array class {} for {}",
                other,
                name
            ));
        }
    };

    Ok((name, value))
}

fn numeric_to_f64(mat_type: u32, raw: &[u8]) -> NirsResult<Vec<f64>> {
    let values = match mat_type {
        MI_DOUBLE => raw
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect(),
        MI_SINGLE => raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
        MI_INT32 => raw
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
        MI_UINT32 => raw
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
        MI_INT16 => raw
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f64)
            .collect(),
        MI_UINT16 => raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]) as f64)
            .collect(),
        MI_INT8 => raw.iter().map(|b| *b as i8 as f64).collect(),
        MI_UINT8 => raw.iter().map(|b| *b as f64).collect(),
        other => {
            return Err(format_error!("unsupported numeric storage type {}", other));
        }
    };
    Ok(values)
}

fn decode_char(mat_type: u32, raw: &[u8]) -> NirsResult<String> {
    match mat_type {
        MI_UINT16 => {
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            Ok(String::from_utf16_lossy(&units))
        }
        MI_UINT8 | MI_UTF8 => Ok(String::from_utf8_lossy(raw).to_string()),
        other => Err(format_error!("unsupported char storage type {}", other)),
    }
}

/// Local maxima of the synchronization signal above the height threshold
fn find_peaks(signal: &[f64], height: f64) -> Vec<usize> {
    let mut peaks = Vec::new();
    for i in 1..signal.len().saturating_sub(1) {
        if signal[i] > signal[i - 1] && signal[i] > signal[i + 1] && signal[i] >= height {
            peaks.push(i);
        }
    }
    peaks
}

fn take_field<'a>(fields: &'a [(String, MatValue)], name: &str) -> Option<&'a MatValue> {
    fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn numeric_field<'a>(
    fields: &'a [(String, MatValue)],
    name: &str,
) -> NirsResult<(usize, usize, &'a [f64])> {
    match take_field(fields, name) {
        Some(MatValue::Numeric { rows, cols, data }) => Ok((*rows, *cols, data)),
        Some(_) => Err(format_error!("nirs_data.{} is not numeric", name)),
        None => Err(format_error!("nirs_data.{} missing", name)),
    }
}

fn build_recording(
    fields: Vec<(String, MatValue)>,
    export_file: &str,
) -> NirsResult<TrialRecording> {
    let (_, _, fs_data) = numeric_field(&fields, "Fs")?;
    let sample_rate = *fs_data
        .first()
        .ok_or_else(|| format_error!("nirs_data.Fs is empty"))?;

    let labels: Vec<String> = match take_field(&fields, "label") {
        Some(MatValue::Cell(items)) => items
            .iter()
            .map(|item| match item {
                MatValue::Char(s) => Ok(s.clone()),
                _ => Err(format_error!("nirs_data.label holds a non-char entry")),
            })
            .collect::<NirsResult<Vec<String>>>()?,
        Some(MatValue::Char(s)) => vec![s.clone()],
        Some(_) => return Err(format_error!("nirs_data.label is not a cell array")),
        None => return Err(format_error!("nirs_data.label missing")),
    };

    let (oxy_rows, oxy_cols, oxy) = numeric_field(&fields, "oxyvals")?;
    let (dxy_rows, dxy_cols, dxy) = numeric_field(&fields, "dxyvals")?;
    if oxy_rows != dxy_rows || oxy_cols != dxy_cols {
        return Err(format_error!(
            "oxyvals {}x{} and dxyvals {}x{} differ in shape",
            oxy_rows,
            oxy_cols,
            dxy_rows,
            dxy_cols
        ));
    }
    if oxy_cols != labels.len() {
        return Err(format_error!(
            "{} channel labels for {} value columns",
            labels.len(),
            oxy_cols
        ));
    }

    // Event markers from the synchronization pulse channel, when present
    let mut events: Vec<Option<String>> = vec![None; oxy_rows];
    if let Some(MatValue::Numeric { rows, cols, data }) = take_field(&fields, "ADvalues") {
        if *cols == AUX_COLUMNS {
            let sync = &data[SYNC_COLUMN * rows..(SYNC_COLUMN + 1) * rows];
            for (peak, label) in find_peaks(sync, SYNC_PEAK_HEIGHT)
                .into_iter()
                .zip(nirs_core::MARKER_LABELS)
            {
                if peak < events.len() {
                    events[peak] = Some(label.to_string());
                }
            }
        }
    }

    let mut metadata = RecordingMetadata::new(sample_rate, export_file)?;
    for (i, label) in labels.iter().enumerate() {
        metadata
            .extra
            .insert(format!("CH{} source", i + 1), label.clone());
    }

    // Column-major storage: channel j occupies rows [j*rows, (j+1)*rows)
    let trim = metadata.samples_per_second().min(oxy_rows);
    let mut columns = Vec::with_capacity(oxy_cols * 2);
    for j in 0..oxy_cols {
        let channel = (j + 1) as u8;
        columns.push(SignalColumn::new(
            ColumnId::channel(channel, SignalKind::Oxy),
            oxy[j * oxy_rows..(j + 1) * oxy_rows][trim..].to_vec(),
        ));
        columns.push(SignalColumn::new(
            ColumnId::channel(channel, SignalKind::Deoxy),
            dxy[j * dxy_rows..(j + 1) * dxy_rows][trim..].to_vec(),
        ));
    }

    let table = SampleTable::from_columns(columns, events[trim..].to_vec())?;
    Ok(TrialRecording::new(metadata, table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(mat_type: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&mat_type.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out.resize(out.len() + (8 - data.len() % 8) % 8, 0);
        out
    }

    fn matrix(class: u8, name: &str, dims: &[i32], body: &[u8]) -> Vec<u8> {
        let mut payload = Vec::new();
        let flags = [class as u32, 0u32];
        let mut flag_bytes = Vec::new();
        for f in flags {
            flag_bytes.extend_from_slice(&f.to_le_bytes());
        }
        payload.extend_from_slice(&element(MI_UINT32, &flag_bytes));
        let mut dim_bytes = Vec::new();
        for d in dims {
            dim_bytes.extend_from_slice(&d.to_le_bytes());
        }
        payload.extend_from_slice(&element(MI_INT32, &dim_bytes));
        payload.extend_from_slice(&element(MI_INT8, name.as_bytes()));
        payload.extend_from_slice(body);
        element(MI_MATRIX, &payload)
    }

    fn double_matrix(name: &str, rows: usize, cols: usize, data: &[f64]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for v in data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        matrix(
            MX_DOUBLE,
            name,
            &[rows as i32, cols as i32],
            &element(MI_DOUBLE, &bytes),
        )
    }

    fn char_matrix(text: &str) -> Vec<u8> {
        let mut bytes = Vec::new();
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        matrix(
            MX_CHAR,
            "",
            &[1, text.len() as i32],
            &element(MI_UINT16, &bytes),
        )
    }

    fn struct_matrix(name: &str, fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
        const FLEN: usize = 32;
        let mut body = Vec::new();
        body.extend_from_slice(&element(MI_INT32, &(FLEN as i32).to_le_bytes()));
        let mut names = Vec::new();
        for (field, _) in fields {
            let mut padded = field.as_bytes().to_vec();
            padded.resize(FLEN, 0);
            names.extend_from_slice(&padded);
        }
        body.extend_from_slice(&element(MI_INT8, &names));
        for (_, matrix_bytes) in fields {
            body.extend_from_slice(matrix_bytes);
        }
        matrix(MX_STRUCT, name, &[1, 1], &body)
    }

    fn mat_file(top_level: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; 128];
        let text = b"MATLAB 5.0 MAT-file, synthetic fixture";
        out[..text.len()].copy_from_slice(text);
        out[124] = 0x00;
        out[125] = 0x01;
        out[126] = b'I';
        out[127] = b'M';
        out.extend_from_slice(top_level);
        out
    }

    /// Two channels, six samples at 2 Hz, sync pulses at rows 2 and 4
    fn fixture() -> Vec<u8> {
        let rows = 6;
        let oxy: Vec<f64> = (0..rows)
            .map(|i| i as f64)
            .chain((0..rows).map(|i| 10.0 + i as f64))
            .collect();
        let dxy: Vec<f64> = oxy.iter().map(|v| -v).collect();
        let mut aux = vec![0.0; rows * 3];
        // Synchronization pulses on the second column
        aux[rows + 2] = 0.5;
        aux[rows + 4] = 0.5;

        let label = matrix(
            MX_CELL,
            "label",
            &[1, 2],
            &[char_matrix("Rx1-Tx1"), char_matrix("Rx1-Tx2")].concat(),
        );
        let nirs = struct_matrix(
            "nirs_data",
            &[
                ("Fs", double_matrix("", 1, 1, &[2.0])),
                ("label", label),
                ("oxyvals", double_matrix("", rows, 2, &oxy)),
                ("dxyvals", double_matrix("", rows, 2, &dxy)),
                ("ADvalues", double_matrix("", rows, 3, &aux)),
            ],
        );
        mat_file(&nirs)
    }

    #[test]
    fn test_parse_fixture() {
        let recording = parse_mat(&fixture(), "trial.mat").unwrap();
        assert_eq!(recording.metadata.sample_rate, 2.0);
        assert_eq!(
            recording.metadata.extra.get("CH1 source").map(String::as_str),
            Some("Rx1-Tx1")
        );

        // 6 rows minus the 2-sample warm-up trim
        let table = &recording.table;
        assert_eq!(table.len(), 4);
        let ch1 = table.values(ColumnId::channel(1, SignalKind::Oxy)).unwrap();
        assert_eq!(ch1, &[2.0, 3.0, 4.0, 5.0]);
        let ch2 = table.values(ColumnId::channel(2, SignalKind::Deoxy)).unwrap();
        assert_eq!(ch2, &[-12.0, -13.0, -14.0, -15.0]);

        // Peaks at rows 2 and 4 land on post-trim rows 0 and 2
        let markers = table.event_markers();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].sample, 0);
        assert_eq!(markers[0].label, "S1");
        assert_eq!(markers[1].sample, 2);
        assert_eq!(markers[1].label, "W1");
    }

    #[test]
    fn test_missing_sync_channel_means_no_events() {
        let rows = 6;
        let oxy: Vec<f64> = vec![1.0; rows * 2];
        let nirs = struct_matrix(
            "nirs_data",
            &[
                ("Fs", double_matrix("", 1, 1, &[2.0])),
                (
                    "label",
                    matrix(
                        MX_CELL,
                        "label",
                        &[1, 2],
                        &[char_matrix("A"), char_matrix("B")].concat(),
                    ),
                ),
                ("oxyvals", double_matrix("", rows, 2, &oxy)),
                ("dxyvals", double_matrix("", rows, 2, &oxy)),
                // Wrong auxiliary width: events must stay all-missing
                ("ADvalues", double_matrix("", rows, 2, &oxy)),
            ],
        );
        let recording = parse_mat(&mat_file(&nirs), "trial.mat").unwrap();
        assert!(recording.table.event_markers().is_empty());
    }

    #[test]
    fn test_missing_struct_rejected() {
        let other = double_matrix("something_else", 1, 1, &[1.0]);
        let err = parse_mat(&mat_file(&other), "trial.mat").unwrap_err();
        assert!(err.to_string().contains("nirs_data"));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let rows = 6;
        let nirs = struct_matrix(
            "nirs_data",
            &[
                ("Fs", double_matrix("", 1, 1, &[2.0])),
                (
                    "label",
                    matrix(MX_CELL, "label", &[1, 1], &char_matrix("A")),
                ),
                ("oxyvals", double_matrix("", rows, 1, &vec![1.0; rows])),
                ("dxyvals", double_matrix("", rows, 2, &vec![1.0; rows * 2])),
            ],
        );
        assert!(parse_mat(&mat_file(&nirs), "trial.mat").is_err());
    }

    #[test]
    fn test_compressed_element_rejected() {
        let payload = element(MI_COMPRESSED, &[0u8; 16]);
        let err = parse_mat(&mat_file(&payload), "trial.mat").unwrap_err();
        assert!(err.to_string().contains("compressed"));
    }

    #[test]
    fn test_truncated_header_rejected() {
        assert!(parse_mat(&[0u8; 64], "trial.mat").is_err());
    }

    #[test]
    fn test_find_peaks_threshold() {
        let signal = [0.0, 0.5, 0.0, 0.01, 0.0, 0.5, 0.4];
        let peaks = find_peaks(&signal, 0.02);
        assert_eq!(peaks, vec![1, 5]);
    }
}
