//! Soil-moisture pipeline orchestrator.
//!
//! Wires the stages together from one [`Config`]:
//!
//! - **prepare**: align raw samples, fit the scaler on the training rows,
//!   normalize, build windows, split chronologically, take the forecast seed.
//! - **detect**: calibrate an error threshold on the train windows and score
//!   the validation windows.
//! - **forecast**: roll the predictor forward from the seed window.
//! - **evaluate**: MAE/RMSE on the validation windows in physical units.

pub mod align;
pub mod anomaly;
pub mod evaluate;
pub mod forecast;
pub mod metrics;
pub mod scaler;
pub mod split;
pub mod window;

use tracing::info;

use soilcast_core::config::{AnomalyConfig, ForecastConfig, PipelineConfig};
use soilcast_core::{AlignedSeries, Channel, Config, SampleSource, SoilcastError};

use crate::predictor::Predictor;

use self::align::Aligner;
use self::anomaly::{calibrate, compute_errors, AnomalyProfile};
use self::evaluate::EvaluationReport;
use self::forecast::{ForecastResult, ForecastRoller};
use self::metrics::PipelineMetrics;
use self::scaler::ScalerModel;
use self::window::{build_windows, latest_window, LabeledWindow, Window};

/// Everything `prepare` produces. The windows are in normalized space.
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Aligned series in physical units.
    pub series: AlignedSeries,
    pub scaler: ScalerModel,
    pub train: Vec<LabeledWindow>,
    pub validation: Vec<LabeledWindow>,
    /// Most recent `history_length` normalized rows.
    pub latest_window: Window,
}

impl PreparedData {
    pub fn channels(&self) -> &[Channel] {
        self.series.channels()
    }
}

/// Main pipeline orchestrator.
pub struct Pipeline {
    /// Stage metrics of the most recent calls.
    pub metrics: PipelineMetrics,
    pipeline: PipelineConfig,
    forecast: ForecastConfig,
    anomaly: AnomalyConfig,
    aligner: Aligner,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self, SoilcastError> {
        config.validate()?;
        Ok(Self {
            metrics: PipelineMetrics::default(),
            pipeline: config.pipeline.clone(),
            forecast: config.forecast.clone(),
            anomaly: config.anomaly.clone(),
            aligner: Aligner::new(&config.pipeline),
        })
    }

    pub fn target(&self) -> Channel {
        self.pipeline.target
    }

    /// Load and align every source, then prepare the aligned series.
    pub fn prepare<S: SampleSource>(&mut self, sources: &[S]) -> Result<PreparedData, SoilcastError> {
        let timer = self.metrics.stage_timer();
        let samples = self.aligner.load(sources)?;
        let series = self.aligner.align_samples(&samples)?;
        self.metrics
            .record_alignment(samples.len(), series.len(), timer.elapsed());
        self.prepare_series(series)
    }

    /// Fit, normalize, window and split an already-aligned series.
    ///
    /// The scaler sees only the rows covered by the train windows.
    pub fn prepare_series(&mut self, series: AlignedSeries) -> Result<PreparedData, SoilcastError> {
        let timer = self.metrics.stage_timer();
        let cfg = &self.pipeline;

        let fit_rows = split::train_row_count(
            series.len(),
            cfg.history_length,
            cfg.horizon,
            cfg.train_fraction,
        )?;
        let scaler = ScalerModel::fit_series(&series, fit_rows)?;
        let scaled = scaler.transform_series(&series)?;

        let windows = build_windows(&scaled, cfg.history_length, cfg.horizon, cfg.target)?;
        let parts = split::split(&windows, cfg.train_fraction)?;
        let (train, validation) = (parts.train.to_vec(), parts.validation.to_vec());

        let latest_window = latest_window(&scaled, cfg.history_length).ok_or_else(|| {
            SoilcastError::Data(format!(
                "series has {} rows, fewer than history length {}",
                scaled.len(),
                cfg.history_length
            ))
        })?;

        let elapsed = timer.elapsed();
        self.metrics
            .record_windows(fit_rows, train.len(), validation.len(), elapsed);
        info!(
            rows = series.len(),
            scaler_rows = fit_rows,
            train = train.len(),
            validation = validation.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "prepare completed"
        );

        Ok(PreparedData {
            series,
            scaler,
            train,
            validation,
            latest_window,
        })
    }

    /// Calibrate on the train windows, then score the validation windows.
    pub fn detect<P: Predictor + ?Sized>(
        &mut self,
        predictor: &P,
        train: &[LabeledWindow],
        validation: &[LabeledWindow],
        channels: &[Channel],
    ) -> Result<AnomalyProfile, SoilcastError> {
        let timer = self.metrics.stage_timer();
        let target_index = self.target_index(channels)?;

        let train_errors = compute_errors(predictor, train, target_index)?;
        let threshold = calibrate(&train_errors, self.anomaly.k)?;
        let val_errors = compute_errors(predictor, validation, target_index)?;
        let profile = AnomalyProfile::new(threshold, val_errors);

        let elapsed = timer.elapsed();
        self.metrics.record_detection(
            profile.window_count(),
            profile.anomaly_count(),
            threshold,
            elapsed,
        );
        info!(
            predictor = predictor.name(),
            train = train.len(),
            validation = validation.len(),
            threshold,
            anomalies = profile.anomaly_count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "detect completed"
        );
        Ok(profile)
    }

    /// Roll `horizon` steps forward from `seed`. Column order comes from the
    /// scaler, which was fitted on the same channels as the seed.
    pub fn forecast<P: Predictor + ?Sized>(
        &mut self,
        predictor: &P,
        seed: &Window,
        scaler: &ScalerModel,
    ) -> Result<ForecastResult, SoilcastError> {
        let timer = self.metrics.stage_timer();
        let channels: Vec<Channel> = scaler.ranges().iter().map(|r| r.channel).collect();

        let roller = ForecastRoller::new(seed.clone(), &channels, self.pipeline.target, predictor)?;
        let result = roller.forecast(
            self.forecast.horizon,
            scaler,
            self.forecast.dry_threshold,
        )?;

        let elapsed = timer.elapsed();
        self.metrics.record_forecast(result.horizon, elapsed);
        info!(
            predictor = predictor.name(),
            horizon = result.horizon,
            threshold = result.threshold,
            first_crossing = ?result.first_crossing,
            elapsed_ms = elapsed.as_millis() as u64,
            "forecast completed"
        );
        Ok(result)
    }

    pub fn evaluate<P: Predictor + ?Sized>(
        &mut self,
        predictor: &P,
        windows: &[LabeledWindow],
        scaler: &ScalerModel,
    ) -> Result<EvaluationReport, SoilcastError> {
        let timer = self.metrics.stage_timer();
        let report = evaluate::evaluate(predictor, windows, scaler, self.pipeline.target)?;
        let elapsed = timer.elapsed();
        self.metrics.record_stage("evaluate", elapsed);
        info!(
            predictor = predictor.name(),
            windows = report.windows,
            mae = report.mae,
            rmse = report.rmse,
            elapsed_ms = elapsed.as_millis() as u64,
            "evaluate completed"
        );
        Ok(report)
    }

    fn target_index(&self, channels: &[Channel]) -> Result<usize, SoilcastError> {
        let target = self.pipeline.target;
        channels
            .iter()
            .position(|c| *c == target)
            .ok_or_else(|| SoilcastError::Data(format!("data has no {target} channel")))
    }
}
