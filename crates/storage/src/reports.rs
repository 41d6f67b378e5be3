//! Documents handed to the reporting side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use soilcast_compute::{AnomalySummary, ForecastResult};
use soilcast_core::Channel;

/// Latest forecast as served to dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub predictor: String,
    pub channel: Channel,
    pub horizon: usize,
    pub dry_threshold: f64,
    /// Forecast values in physical units, one per step.
    pub values: Vec<f64>,
    /// 1-based step at which the forecast first drops below `dry_threshold`.
    pub first_crossing: Option<usize>,
    /// Timestamp of the last observed row the forecast starts from.
    #[serde(default)]
    pub origin: Option<DateTime<Utc>>,
}

impl ForecastReport {
    pub fn new(result: &ForecastResult, predictor: &str, origin: Option<DateTime<Utc>>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            predictor: predictor.to_owned(),
            channel: result.channel,
            horizon: result.horizon,
            dry_threshold: result.threshold,
            values: result.values.clone(),
            first_crossing: result.first_crossing,
            origin,
        }
    }
}

/// Anomaly summary of one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub predictor: String,
    pub k: f64,
    #[serde(flatten)]
    pub summary: AnomalySummary,
}

impl AnomalyReport {
    pub fn new(summary: AnomalySummary, predictor: &str, k: f64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            predictor: predictor.to_owned(),
            k,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soilcast_compute::RankedAnomaly;

    #[test]
    fn forecast_report_copies_result() {
        let result = ForecastResult {
            channel: Channel::Moisture,
            horizon: 3,
            normalized: vec![0.4, 0.3, 0.2],
            values: vec![40.0, 30.0, 20.0],
            threshold: 30.0,
            first_crossing: Some(3),
        };
        let report = ForecastReport::new(&result, "persistence", None);
        assert_eq!(report.values, result.values);
        assert_eq!(report.first_crossing, Some(3));
        assert_eq!(report.dry_threshold, 30.0);
    }

    #[test]
    fn anomaly_report_flattens_summary() {
        let summary = AnomalySummary {
            window_count: 10,
            anomaly_count: 1,
            threshold: 0.2,
            top: vec![RankedAnomaly { index: 7, error: 0.9 }],
        };
        let json = serde_json::to_value(AnomalyReport::new(summary, "linear", 3.0)).unwrap();
        assert_eq!(json["window_count"], 10);
        assert_eq!(json["top"][0]["index"], 7);
        assert_eq!(json["predictor"], "linear");
    }
}
