//! Fixed coordinate offsets, used to mask the true location of a published track.

use std::path::Path;

use anyhow::Result;

use crate::decode::TelemetryRecord;
use crate::output::{read_records, write_records};

/// Degrees added to every latitude and longitude. Altitude is never touched.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CoordinateShift {
    pub latitude: f64,
    pub longitude: f64,
}

impl CoordinateShift {
    pub fn apply(&self, record: &TelemetryRecord) -> TelemetryRecord {
        TelemetryRecord {
            latitude: record.latitude + self.latitude,
            longitude: record.longitude + self.longitude,
            altitude: record.altitude,
        }
    }
}

/// Shift every record of `input` and write the result to `output`. Returns the count.
pub fn shift_file(input: &Path, output: &Path, shift: CoordinateShift) -> Result<usize> {
    let shifted: Vec<TelemetryRecord> = read_records(input)?
        .iter()
        .map(|record| shift.apply(record))
        .collect();
    write_records(output, &shifted)?;
    Ok(shifted.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_leaves_altitude_alone() {
        let shift = CoordinateShift {
            latitude: 0.5,
            longitude: -1.0,
        };
        let moved = shift.apply(&TelemetryRecord {
            latitude: 10.0,
            longitude: 20.0,
            altitude: 120.0,
        });
        assert_eq!(moved.latitude, 10.5);
        assert_eq!(moved.longitude, 19.0);
        assert_eq!(moved.altitude, 120.0);
    }

    #[test]
    fn zero_shift_is_identity() {
        let record = TelemetryRecord {
            latitude: 12.345678,
            longitude: 9.876543,
            altitude: 3.0,
        };
        assert_eq!(CoordinateShift::default().apply(&record), record);
    }
}
