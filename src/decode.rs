//! Telemetry decoding.
//!
//! Turns the accepted main-ROI reading into latitude/longitude and resolves altitude
//! against the value carried forward from earlier frames. Overlay fields are bare digit
//! runs with an implied decimal point after `integer_digits` characters, so
//! `"12345678"` reads as `12.345678` with the default layout.

use serde::{Deserialize, Serialize};

use crate::consensus::Reading;

/// One decoded position fix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Why a frame produced no record.
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// No text tuple reached the quorum on the main ROI.
    ConsensusFailure,
    /// The accepted tuple was not two all-digit fields.
    FormatMismatch { texts: Vec<String> },
    /// Both coordinate fields scored under the threshold.
    LowConfidence {
        latitude: String,
        longitude: String,
        lat_conf: f32,
        lon_conf: f32,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ConsensusFailure => write!(f, "OCR samples disagree"),
            SkipReason::FormatMismatch { texts } => {
                write!(f, "unexpected field layout {:?}", texts)
            }
            SkipReason::LowConfidence {
                latitude,
                longitude,
                lat_conf,
                lon_conf,
            } => write!(
                f,
                "low confidence (LAT_conf={:.2}, LON_conf={:.2}), {}, {}",
                lat_conf, lon_conf, latitude, longitude
            ),
        }
    }
}

/// Outcome of altitude resolution for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Altitude {
    /// A confident reading replaced the carried value.
    Fresh(f64),
    /// The previously carried value was reused.
    Carried(f64),
}

impl Altitude {
    pub fn value(self) -> f64 {
        match self {
            Altitude::Fresh(value) | Altitude::Carried(value) => value,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TelemetryDecoder {
    confidence_threshold: f32,
    integer_digits: usize,
}

impl TelemetryDecoder {
    pub fn new(confidence_threshold: f32, integer_digits: usize) -> Self {
        Self {
            confidence_threshold,
            integer_digits,
        }
    }

    /// Validate and decode the main-ROI reading into `(latitude, longitude)`.
    pub fn decode_position(&self, main: Option<&Reading>) -> Result<(f64, f64), SkipReason> {
        let reading = main.ok_or(SkipReason::ConsensusFailure)?;
        let format_mismatch = || SkipReason::FormatMismatch {
            texts: reading.texts.clone(),
        };

        let [lat, lon] = reading.texts.as_slice() else {
            return Err(format_mismatch());
        };
        if !is_digits(lat) || !is_digits(lon) {
            return Err(format_mismatch());
        }

        let lat_conf = reading.confidences.first().copied().unwrap_or(0.0);
        let lon_conf = reading.confidences.get(1).copied().unwrap_or(0.0);
        // Only a double miss skips; one weak field is still accepted.
        if lat_conf < self.confidence_threshold && lon_conf < self.confidence_threshold {
            return Err(SkipReason::LowConfidence {
                latitude: lat.clone(),
                longitude: lon.clone(),
                lat_conf,
                lon_conf,
            });
        }

        match (
            decode_digits(lat, self.integer_digits),
            decode_digits(lon, self.integer_digits),
        ) {
            (Some(latitude), Some(longitude)) => Ok((latitude, longitude)),
            _ => Err(format_mismatch()),
        }
    }

    /// Adopt a confident altitude reading, otherwise keep `carried`.
    pub fn resolve_altitude(&self, reading: Option<&Reading>, carried: f64) -> Altitude {
        let fresh = reading.and_then(|reading| {
            let text = reading.texts.first()?;
            let confidence = *reading.confidences.first()?;
            if confidence < self.confidence_threshold {
                return None;
            }
            text.parse::<f64>().ok().filter(|value| value.is_finite())
        });
        match fresh {
            Some(value) => Altitude::Fresh(value),
            None => Altitude::Carried(carried),
        }
    }

    /// Decode one frame. `carried_altitude` is updated when a confident altitude is read.
    pub fn decode(
        &self,
        main: Option<&Reading>,
        altitude: Option<&Reading>,
        carried_altitude: &mut f64,
    ) -> Result<(TelemetryRecord, Altitude), SkipReason> {
        let (latitude, longitude) = self.decode_position(main)?;
        let resolved = self.resolve_altitude(altitude, *carried_altitude);
        *carried_altitude = resolved.value();
        Ok((
            TelemetryRecord {
                latitude,
                longitude,
                altitude: resolved.value(),
            },
            resolved,
        ))
    }
}

/// Insert a decimal point after the first `integer_digits` characters of a digit run.
///
/// Returns `None` for empty or non-digit input.
pub fn decode_digits(field: &str, integer_digits: usize) -> Option<f64> {
    if !is_digits(field) {
        return None;
    }
    let split = integer_digits.min(field.len());
    let (whole, fraction) = field.split_at(split);
    if fraction.is_empty() {
        return whole.parse().ok();
    }
    format!("{}.{}", whole, fraction).parse().ok()
}

fn is_digits(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}
