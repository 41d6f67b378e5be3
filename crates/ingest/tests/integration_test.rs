/// Integration tests for CSV ingestion: discovery over a directory tree,
/// multi-file reads, and row rejection reporting.

use std::path::Path;

use soilcast_core::SampleSource;
use soilcast_ingest::{discover_csv_sources, CsvSource};

// ============================================================================
// Test Helpers
// ============================================================================

fn write(dir: &Path, rel: &str, body: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, body).unwrap();
}

const HEADER: &str = "timestamp,moisture,temperature,humidity,light\n";

// ============================================================================
// Tests
// ============================================================================

#[test]
fn reads_every_discovered_export() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "greenhouse/2025-06-01.csv",
        &format!("{HEADER}2025-06-01 00:00:00,45,21,60,0\n2025-06-01 01:00:00,44.5,20.5,61,0\n"),
    );
    write(
        dir.path(),
        "greenhouse/2025-06-02.csv",
        &format!("{HEADER}2025-06-02 00:00:00,40,19,65,0\n"),
    );
    write(dir.path(), "greenhouse/README.md", "not data");

    let sources = discover_csv_sources(dir.path());
    assert_eq!(sources.len(), 2);
    assert!(sources[0].label().ends_with("2025-06-01.csv"));

    let total: usize = sources
        .iter()
        .map(|s| s.read_samples().unwrap().len())
        .sum();
    assert_eq!(total, 3);
}

#[test]
fn rejected_rows_never_reach_callers() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "mixed.csv",
        &format!(
            "{HEADER}\
             2025-06-01 00:00:00,45,21,60,10\n\
             2025-06-01 01:00:00,45,21,101,10\n\
             2025-06-01 02:00:00,45,21,60,-3\n\
             2025-06-01 03:00:00,NaN,21,60,10\n\
             2025-06-01 04:00:00,46,21,60\n"
        ),
    );

    let (samples, report) = CsvSource::new(dir.path().join("mixed.csv")).read().unwrap();
    assert_eq!(report.rows_read, 5);
    assert_eq!(report.rows_accepted, 2);
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| (0.0..=100.0).contains(&s.humidity)));
    // short final row: light column absent, so no light value
    assert_eq!(samples[1].light, None);
}
