//! CSV sensor exports: `timestamp, moisture, temperature, humidity[, light]`.
//!
//! Header names are matched case-insensitively and may appear in any order.
//! Rows that cannot be parsed or fail range validation are skipped and
//! recorded in the [`IngestReport`].

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use soilcast_core::{RawSample, SampleSource, SoilcastError};

use crate::validate::{parse_timestamp, validate_sample};

const REQUIRED_COLUMNS: [&str; 4] = ["timestamp", "moisture", "temperature", "humidity"];

/// One rejected row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    /// 1-based line in the file, header included.
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub rows_read: usize,
    pub rows_accepted: usize,
    pub errors: Vec<RowError>,
}

impl IngestReport {
    pub fn rows_rejected(&self) -> usize {
        self.rows_read - self.rows_accepted
    }
}

/// A CSV file of sensor readings.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every acceptable row and report the rejected ones.
    pub fn read(&self) -> Result<(Vec<RawSample>, IngestReport), SoilcastError> {
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| SoilcastError::Csv(format!("{}: {e}", self.path.display())))?
            .clone();
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_ascii_lowercase(), i))
            .collect();

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !columns.contains_key(*c))
            .collect();
        if !missing.is_empty() {
            return Err(SoilcastError::Csv(format!(
                "{}: missing column(s) {}",
                self.path.display(),
                missing.join(", ")
            )));
        }
        let col = |name: &str| columns.get(name).copied();
        let layout = Layout {
            timestamp: col("timestamp"),
            moisture: col("moisture"),
            temperature: col("temperature"),
            humidity: col("humidity"),
            light: col("light"),
        };

        let mut report = IngestReport {
            source: self.label(),
            ..IngestReport::default()
        };
        let mut samples = Vec::new();

        for (idx, result) in reader.records().enumerate() {
            // records() starts after the header line; lines are 1-based.
            let line = idx + 2;
            report.rows_read += 1;

            let parsed = result
                .map_err(|e| format!("CSV parse error: {e}"))
                .and_then(|record| layout.parse(&record))
                .and_then(|sample| validate_sample(&sample).map(|_| sample));

            match parsed {
                Ok(sample) => samples.push(sample),
                Err(message) => {
                    warn!(source = %report.source, line, %message, "row rejected");
                    report.errors.push(RowError { line, message });
                }
            }
        }

        report.rows_accepted = samples.len();
        debug!(
            source = %report.source,
            read = report.rows_read,
            accepted = report.rows_accepted,
            "csv source read"
        );
        Ok((samples, report))
    }
}

impl SampleSource for CsvSource {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn read_samples(&self) -> Result<Vec<RawSample>, SoilcastError> {
        self.read().map(|(samples, _)| samples)
    }
}

/// Column positions resolved from the header.
struct Layout {
    timestamp: Option<usize>,
    moisture: Option<usize>,
    temperature: Option<usize>,
    humidity: Option<usize>,
    light: Option<usize>,
}

impl Layout {
    fn parse(&self, record: &csv::StringRecord) -> Result<RawSample, String> {
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");
        let number = |name: &str, idx: Option<usize>| -> Result<f64, String> {
            let raw = field(idx);
            raw.parse::<f64>()
                .map_err(|_| format!("{name} '{raw}' is not a number"))
        };

        let raw_ts = field(self.timestamp);
        let timestamp =
            parse_timestamp(raw_ts).ok_or_else(|| format!("unparsable timestamp '{raw_ts}'"))?;

        let light = match field(self.light) {
            "" => None,
            s if s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null") => None,
            _ => Some(number("light", self.light)?),
        };

        Ok(RawSample {
            timestamp,
            moisture: number("moisture", self.moisture)?,
            temperature: number("temperature", self.temperature)?,
            humidity: number("humidity", self.humidity)?,
            light,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_rows_and_optional_light() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "a.csv",
            "timestamp,moisture,temperature,humidity,light\n\
             2025-06-01 00:00:00,41.5,20.1,60,300\n\
             2025-06-01 01:00:00,41.0,19.8,61,\n",
        );
        let (samples, report) = CsvSource::new(&path).read().unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].light, Some(300.0));
        assert_eq!(samples[1].light, None);
        assert_eq!(report.rows_read, 2);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn header_order_and_case_do_not_matter() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "b.csv",
            "Humidity,Timestamp,Temperature,Moisture\n60,2025-06-01T00:00:00Z,20,40\n",
        );
        let samples = CsvSource::new(&path).read_samples().unwrap();
        assert_eq!(samples[0].moisture, 40.0);
        assert_eq!(samples[0].humidity, 60.0);
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "c.csv",
            "timestamp,moisture,temperature,humidity\n\
             2025-06-01 00:00:00,40,20,60\n\
             2025-06-01 01:00:00,140,20,60\n\
             not-a-time,40,20,60\n\
             2025-06-01 03:00:00,dry,20,60\n",
        );
        let (samples, report) = CsvSource::new(&path).read().unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(report.rows_rejected(), 3);
        let lines: Vec<usize> = report.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert!(report.errors[0].message.contains("moisture"));
    }

    #[test]
    fn missing_required_column_is_csv_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "d.csv", "timestamp,moisture\n2025-06-01 00:00:00,40\n");
        let err = CsvSource::new(&path).read().unwrap_err();
        assert!(matches!(err, SoilcastError::Csv(ref m) if m.contains("temperature")));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CsvSource::new("/nonexistent/soilcast.csv").read().unwrap_err();
        assert!(matches!(err, SoilcastError::Io(_)));
    }
}
