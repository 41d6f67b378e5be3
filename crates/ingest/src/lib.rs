//! Ingestion boundary: reads sensor exports and rejects rows that are out of
//! physical range before they reach the aligner.

pub mod csv_source;
pub mod discover;
pub mod validate;

pub use csv_source::{CsvSource, IngestReport, RowError};
pub use discover::discover_csv_sources;
pub use validate::{parse_timestamp, validate_sample};
