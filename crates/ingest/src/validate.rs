use chrono::{DateTime, NaiveDateTime, Utc};

use soilcast_core::{Bounds, RawSample};

/// Naive formats accepted after RFC 3339; interpreted as UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Accept a reading only if every value is finite, moisture and humidity are
/// percentages and light is non-negative. Temperature may be below zero.
pub fn validate_sample(sample: &RawSample) -> Result<(), String> {
    let checks = [
        ("moisture", Some(sample.moisture), Some(Bounds::percent())),
        ("temperature", Some(sample.temperature), None),
        ("humidity", Some(sample.humidity), Some(Bounds::percent())),
        ("light", sample.light, Some(Bounds::non_negative())),
    ];
    for (name, value, bounds) in checks {
        let Some(v) = value else { continue };
        if !v.is_finite() {
            return Err(format!("{name} is not a finite number"));
        }
        if let Some(b) = bounds {
            if !b.contains(v) {
                return Err(format!("{name} {v} is out of range"));
            }
        }
    }
    Ok(())
}
