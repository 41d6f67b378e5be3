use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Pipeline run metrics, updated by each stage as it completes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineMetrics {
    /// When the most recent stage finished.
    pub last_run: Option<DateTime<Utc>>,

    // Preparation
    /// Raw samples read before alignment.
    pub samples_loaded: u64,
    /// Rows in the aligned series.
    pub rows_aligned: u64,
    /// Rows the scaler was fitted on.
    pub scaler_rows: u64,
    pub train_windows: u64,
    pub validation_windows: u64,

    // Detection
    pub windows_scored: u64,
    pub anomalies_found: u64,
    pub anomaly_threshold: Option<f64>,

    // Forecast
    pub forecast_steps: u64,

    /// Wall time of each completed stage in milliseconds, keyed by stage name.
    pub stage_ms: BTreeMap<String, u64>,
}

impl PipelineMetrics {
    /// Record the duration of a named stage.
    pub fn record_stage(&mut self, stage: &str, elapsed: Duration) {
        self.stage_ms
            .insert(stage.to_owned(), elapsed.as_millis() as u64);
        self.last_run = Some(Utc::now());
    }

    pub fn record_alignment(&mut self, samples: usize, rows: usize, elapsed: Duration) {
        self.samples_loaded = samples as u64;
        self.rows_aligned = rows as u64;
        self.record_stage("align", elapsed);
    }

    pub fn record_windows(
        &mut self,
        scaler_rows: usize,
        train: usize,
        validation: usize,
        elapsed: Duration,
    ) {
        self.scaler_rows = scaler_rows as u64;
        self.train_windows = train as u64;
        self.validation_windows = validation as u64;
        self.record_stage("window", elapsed);
    }

    pub fn record_detection(
        &mut self,
        scored: usize,
        anomalies: usize,
        threshold: f64,
        elapsed: Duration,
    ) {
        self.windows_scored = scored as u64;
        self.anomalies_found = anomalies as u64;
        self.anomaly_threshold = Some(threshold);
        self.record_stage("detect", elapsed);
    }

    pub fn record_forecast(&mut self, steps: usize, elapsed: Duration) {
        self.forecast_steps = steps as u64;
        self.record_stage("forecast", elapsed);
    }

    /// Sum of all recorded stage durations.
    pub fn total_ms(&self) -> u64 {
        self.stage_ms.values().sum()
    }

    /// Start timing a stage; finish with [`StageTimer::elapsed`].
    pub fn stage_timer(&self) -> StageTimer {
        StageTimer {
            start: Instant::now(),
        }
    }
}

/// Measures one stage.
pub struct StageTimer {
    start: Instant,
}

impl StageTimer {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
