//! Record file format.
//!
//! One record per line, `latitude,longitude,altitude`, newline-terminated, no header and
//! no frame index. Values use the shortest round-trip float form with a trailing `.0`
//! for whole numbers, e.g. `12.345678,9.876543,120.0`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::decode::TelemetryRecord;

pub fn format_record(record: &TelemetryRecord) -> String {
    format!(
        "{:?},{:?},{:?}",
        record.latitude, record.longitude, record.altitude
    )
}

/// Write all records in order, creating the parent directory when needed.
pub fn write_records(path: &Path, records: &[TelemetryRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        writeln!(writer, "{}", format_record(record))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Parse one non-blank record line. `line_no` is 1-based and only used in errors.
pub fn parse_record_line(line: &str, line_no: usize) -> Result<TelemetryRecord> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    let [lat, lon, alt] = fields.as_slice() else {
        return Err(anyhow!(
            "line {}: expected 3 comma-separated values, found {}",
            line_no,
            fields.len()
        ));
    };
    let number = |value: &str, name: &str| -> Result<f64> {
        value
            .parse::<f64>()
            .map_err(|_| anyhow!("line {}: invalid {} '{}'", line_no, name, value))
    };
    Ok(TelemetryRecord {
        latitude: number(*lat, "latitude")?,
        longitude: number(*lon, "longitude")?,
        altitude: number(*alt, "altitude")?,
    })
}

/// Read a record file, skipping blank lines.
pub fn read_records(path: &Path) -> Result<Vec<TelemetryRecord>> {
    let file =
        File::open(path).with_context(|| format!("failed to open record file {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_record_line(&line, idx + 1)?);
    }
    Ok(records)
}
