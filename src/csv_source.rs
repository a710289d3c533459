// Sensor Align - Time-ordered alignment of wearable sensor logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! CSV record source
//!
//! Reads logs that were already decoded to text, one record per line:
//!
//! ```text
//! epoch,type,field,field,...
//! ```
//!
//! Lines have no header, blank lines and lines starting with `#` are ignored,
//! and cells are trimmed. The fields after `type` depend on the type:
//!
//! | type | fields |
//! |---|---|
//! | `device_motion` | roll, pitch, yaw, rotation x/y/z, user acceleration x/y/z, gravity x/y/z, [heading] |
//! | `accelerometer` | x, y, z |
//! | `location` | longitude, latitude, horizontal accuracy, altitude, vertical accuracy, course, speed, floor |
//! | `battery` | level, state |
//! | `response` | label |
//!
//! Location fields and the device-motion heading may be left empty.

use std::path::PathBuf;

use crate::error::{Result, SensorAlignError};
use crate::record::{
    Attitude, Battery, DeviceMotion, Location, Payload, Record, RecordType, Response, Vector3,
};
use crate::source::RecordSource;

/// [`RecordSource`] over decoded CSV logs on disk
#[derive(Debug, Clone, Default)]
pub struct CsvSource {
    /// Directory relative file ids are resolved against
    base_dir: Option<PathBuf>,
}

impl CsvSource {
    /// File ids are paths as given
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative file ids against `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, file: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(file),
            None => PathBuf::from(file),
        }
    }

    /// Parse CSV text, using `file` in error messages
    pub fn parse_str(file: &str, text: &str) -> Result<Vec<Record>> {
        parse(file, builder().from_reader(text.as_bytes()))
    }
}

impl RecordSource for CsvSource {
    fn load(&self, file: &str) -> Result<Vec<Record>> {
        let path = self.resolve(file);
        let reader = builder()
            .from_path(&path)
            .map_err(|e| SensorAlignError::source_error(file, e))?;
        parse(file, reader)
    }
}

fn builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All);
    builder
}

fn parse<R: std::io::Read>(file: &str, mut reader: csv::Reader<R>) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| SensorAlignError::source_error(file, e))?;
        let line = row.position().map_or(0, |p| p.line());
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let record = parse_row(&row).map_err(|err| match err {
            RowError::Type(e) => e,
            RowError::Field(reason) => SensorAlignError::MalformedRecord {
                file: file.to_string(),
                line,
                reason,
            },
        })?;
        records.push(record);
    }
    Ok(records)
}

enum RowError {
    Type(SensorAlignError),
    Field(String),
}

impl From<String> for RowError {
    fn from(reason: String) -> Self {
        RowError::Field(reason)
    }
}

fn parse_row(row: &csv::StringRecord) -> std::result::Result<Record, RowError> {
    let epoch: f64 = required(row, 0, "epoch")?;
    if !epoch.is_finite() || epoch < 0.0 {
        return Err(format!("epoch must be finite and non-negative, got {}", epoch).into());
    }
    let kind = row.get(1).ok_or_else(|| "missing type".to_string())?;
    let record_type: RecordType = kind.parse().map_err(RowError::Type)?;

    let fields = row.len() - 2;
    let payload = match record_type {
        RecordType::DeviceMotion => {
            expect_fields(record_type, fields, 12, 13)?;
            Payload::DeviceMotion(DeviceMotion {
                attitude: Attitude {
                    roll: required(row, 2, "roll")?,
                    pitch: required(row, 3, "pitch")?,
                    yaw: required(row, 4, "yaw")?,
                },
                rotation_rate: vector(row, 5)?,
                user_acceleration: vector(row, 8)?,
                gravity: vector(row, 11)?,
                heading: optional(row, 14, "heading")?,
            })
        }
        RecordType::Accelerometer => {
            expect_fields(record_type, fields, 3, 3)?;
            Payload::Accelerometer(vector(row, 2)?)
        }
        RecordType::Location => {
            expect_fields(record_type, fields, 8, 8)?;
            Payload::Location(Location {
                longitude: optional(row, 2, "longitude")?,
                latitude: optional(row, 3, "latitude")?,
                horizontal_accuracy: optional(row, 4, "horizontal accuracy")?,
                altitude: optional(row, 5, "altitude")?,
                vertical_accuracy: optional(row, 6, "vertical accuracy")?,
                course: optional(row, 7, "course")?,
                speed: optional(row, 8, "speed")?,
                floor: optional(row, 9, "floor")?,
            })
        }
        RecordType::Battery => {
            expect_fields(record_type, fields, 2, 2)?;
            Payload::Battery(Battery {
                level: required(row, 2, "level")?,
                state: row.get(3).unwrap_or_default().parse()?,
            })
        }
        RecordType::Response => {
            expect_fields(record_type, fields, 1, 1)?;
            Payload::Response(Response {
                label: row.get(2).unwrap_or_default().to_string(),
            })
        }
    };

    Ok(Record::new(epoch, payload))
}

fn expect_fields(
    record_type: RecordType,
    actual: usize,
    min: usize,
    max: usize,
) -> std::result::Result<(), String> {
    if actual < min || actual > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}-{}", min, max)
        };
        return Err(format!(
            "{} expects {} fields, got {}",
            record_type, expected, actual
        ));
    }
    Ok(())
}

fn optional<T: std::str::FromStr>(
    row: &csv::StringRecord,
    index: usize,
    name: &str,
) -> std::result::Result<Option<T>, String> {
    match row.get(index) {
        None | Some("") => Ok(None),
        Some(cell) => cell
            .parse()
            .map(Some)
            .map_err(|_| format!("invalid {} '{}'", name, cell)),
    }
}

fn required<T: std::str::FromStr>(
    row: &csv::StringRecord,
    index: usize,
    name: &str,
) -> std::result::Result<T, String> {
    optional(row, index, name)?.ok_or_else(|| format!("missing {}", name))
}

fn vector(row: &csv::StringRecord, start: usize) -> std::result::Result<Vector3, String> {
    Ok(Vector3 {
        x: required(row, start, "x")?,
        y: required(row, start + 1, "y")?,
        z: required(row, start + 2, "z")?,
    })
}
