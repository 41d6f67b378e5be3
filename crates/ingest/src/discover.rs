use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::csv_source::CsvSource;

/// Every `.csv` file under `dir`, recursively, sorted by path.
/// A missing directory yields no sources.
pub fn discover_csv_sources(dir: &Path) -> Vec<CsvSource> {
    if !dir.exists() {
        return Vec::new();
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "walkdir error, skipping entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv {
            paths.push(path);
        }
    }

    paths.sort();
    debug!(dir = %dir.display(), files = paths.len(), "csv sources discovered");
    paths.into_iter().map(CsvSource::new).collect()
}
