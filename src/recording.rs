//! CSV persistence of a [`TraceSet`].
//!
//! One row per frequency index: the frequency, then real and imaginary parts
//! of S11, S12, S21 and S22.

use chrono::Local;
use log::{debug, info};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::VnaError;
use crate::types::{SParameter, Sample, TraceSet};

pub const HEADER: [&str; 9] = [
    "Freq(Hz)", "S11_Real", "S11_Imag", "S12_Real", "S12_Imag", "S21_Real", "S21_Imag",
    "S22_Real", "S22_Imag",
];

/// Suggested file name for a new recording, e.g. `vna_data_20250101_120000.csv`
pub fn default_recording_name() -> String {
    format!("vna_data_{}.csv", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Write `traces` as CSV.
///
/// As many rows are written as the longest trace has samples. The frequency
/// of a row comes from the first parameter (S11, S12, S21, S22 order) that has
/// that index; parameters shorter than the row count contribute zeros.
pub fn write_csv<W: Write>(writer: W, traces: &TraceSet) -> Result<usize, VnaError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;

    let rows = traces.sweep_len();
    for index in 0..rows {
        let frequency = SParameter::ALL
            .iter()
            .find_map(|p| traces.get(*p).get(index))
            .map(|sample| sample.frequency_hz)
            .unwrap_or(0);

        let mut record = Vec::with_capacity(HEADER.len());
        record.push(frequency.to_string());
        for parameter in SParameter::ALL {
            let value = traces
                .get(parameter)
                .get(index)
                .map(|sample| sample.value)
                .unwrap_or_default();
            record.push(value.re.to_string());
            record.push(value.im.to_string());
        }
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(rows)
}

/// Read a recording written by [`write_csv`] (or any file with the same
/// column layout).
///
/// The header must have at least nine columns. Rows with fewer than nine
/// numeric fields are skipped. A file without a single valid row is an error.
pub fn read_csv<R: Read>(reader: R) -> Result<TraceSet, VnaError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header_len = csv.headers()?.len();
    if header_len < HEADER.len() {
        return Err(VnaError::InvalidConfiguration(format!(
            "CSV header has {header_len} columns, expected {}",
            HEADER.len()
        )));
    }

    let mut columns: [Vec<Sample>; 4] = Default::default();
    let mut skipped = 0usize;

    for (line, record) in csv.records().enumerate() {
        let record = record?;
        match parse_row(&record) {
            Some((frequency, values)) => {
                for (column, (re, im)) in columns.iter_mut().zip(values) {
                    column.push(Sample::new(frequency, re, im));
                }
            }
            None => {
                debug!("Skipping CSV row {}: {:?}", line + 2, record);
                skipped += 1;
            }
        }
    }

    if columns[0].is_empty() {
        return Err(VnaError::InvalidConfiguration(
            "no valid data rows in CSV".to_string(),
        ));
    }
    if skipped > 0 {
        info!("Skipped {skipped} invalid CSV rows");
    }

    let mut traces = TraceSet::new();
    for (parameter, samples) in SParameter::ALL.into_iter().zip(columns) {
        traces.insert(parameter, samples);
    }
    Ok(traces)
}

fn parse_row(record: &csv::StringRecord) -> Option<(u64, [(f64, f64); 4])> {
    if record.len() < HEADER.len() {
        return None;
    }
    let mut numbers = [0.0f64; 9];
    for (slot, field) in numbers.iter_mut().zip(record.iter()) {
        *slot = field.trim().parse().ok()?;
    }
    let frequency = numbers[0];
    if !(frequency.is_finite() && frequency >= 0.0) {
        return None;
    }
    Some((
        frequency as u64,
        [
            (numbers[1], numbers[2]),
            (numbers[3], numbers[4]),
            (numbers[5], numbers[6]),
            (numbers[7], numbers[8]),
        ],
    ))
}

/// Write `traces` to a new file at `path`.
pub fn save_csv(path: &Path, traces: &TraceSet) -> Result<usize, VnaError> {
    let file = File::create(path).map_err(|e| VnaError::Io {
        source: e,
        context: format!("Failed to create {}", path.display()),
    })?;
    let rows = write_csv(file, traces)?;
    info!("Saved {rows} rows to {}", path.display());
    Ok(rows)
}

pub fn load_csv(path: &Path) -> Result<TraceSet, VnaError> {
    let file = File::open(path).map_err(|e| VnaError::Io {
        source: e,
        context: format!("Failed to open {}", path.display()),
    })?;
    let traces = read_csv(file)?;
    info!("Loaded {} points from {}", traces.sweep_len(), path.display());
    Ok(traces)
}
