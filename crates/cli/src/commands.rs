use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use soilcast_compute::{
    LinearPredictor, PersistencePredictor, Pipeline, Predictor, ScalerModel,
};
use soilcast_core::{AlignedSeries, Channel, Config};
use soilcast_ingest::discover_csv_sources;
use soilcast_storage::{AnomalyReport, ArtifactStore, ForecastReport, StorageError};

const SERIES_FILE: &str = "series.json";

// ── Predictor selection ─────────────────────────────────────────────

/// Linear model from `model` if given, otherwise the persistence baseline on
/// the target channel.
fn load_predictor(
    model: Option<&Path>,
    scaler: &ScalerModel,
    target: Channel,
) -> Result<Box<dyn Predictor>> {
    match model {
        Some(path) => {
            let predictor = LinearPredictor::load(path)
                .with_context(|| format!("failed to load model: {}", path.display()))?;
            Ok(Box::new(predictor))
        }
        None => {
            let index = scaler
                .ranges()
                .iter()
                .position(|r| r.channel == target)
                .with_context(|| format!("saved data has no {target} channel"))?;
            Ok(Box::new(PersistencePredictor::new(index)))
        }
    }
}

fn channels(scaler: &ScalerModel) -> Vec<Channel> {
    scaler.ranges().iter().map(|r| r.channel).collect()
}

fn store(config: &Config) -> ArtifactStore {
    ArtifactStore::new(&config.data.processed_dir)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── process ─────────────────────────────────────────────────────────

pub fn process(config: &Config) -> Result<()> {
    let raw_dir = &config.data.raw_dir;
    let sources = discover_csv_sources(raw_dir);
    info!(dir = %raw_dir.display(), files = sources.len(), "raw sources discovered");

    let mut pipeline = Pipeline::new(config)?;
    let prepared = pipeline
        .prepare(&sources)
        .with_context(|| format!("failed to prepare data from {}", raw_dir.display()))?;

    let store = store(config);
    store.save_prepared(&prepared)?;
    store.save_json(SERIES_FILE, &prepared.series)?;

    println!(
        "Processed {} rows ({} → {}): {} train / {} validation windows → {}",
        prepared.series.len(),
        prepared.series.start(),
        prepared.series.end().map_or_else(|| "-".to_string(), |t| t.to_string()),
        prepared.train.len(),
        prepared.validation.len(),
        store.dir().display()
    );
    print_json(&pipeline.metrics)
}

// ── detect ──────────────────────────────────────────────────────────

pub fn detect(config: &Config, model: Option<&Path>) -> Result<()> {
    let store = store(config);
    let stored = store.load_windows()?;
    let predictor = load_predictor(model, &stored.scaler, config.pipeline.target)?;

    let mut pipeline = Pipeline::new(config)?;
    let profile = pipeline.detect(
        predictor.as_ref(),
        &stored.train,
        &stored.validation,
        &channels(&stored.scaler),
    )?;

    store.save_errors(&profile.errors, profile.threshold)?;
    let summary = profile.summary(config.anomaly.top_n);
    store.save_anomalies(&AnomalyReport::new(
        summary.clone(),
        predictor.name(),
        config.anomaly.k,
    ))?;

    println!("Anomaly threshold: {:.6}", summary.threshold);
    println!(
        "Anomalies: {} of {} validation windows",
        summary.anomaly_count, summary.window_count
    );
    for a in &summary.top {
        println!("  window {:>6}  error {:.6}", a.index, a.error);
    }
    Ok(())
}

// ── forecast ────────────────────────────────────────────────────────

pub fn forecast(config: &Config, model: Option<&Path>) -> Result<()> {
    let store = store(config);
    let scaler = store.load_scaler()?;
    let seed = store.load_array("latest_window")?.to_window()?;
    let predictor = load_predictor(model, &scaler, config.pipeline.target)?;

    let series: Option<AlignedSeries> = match store.load_json(SERIES_FILE) {
        Ok(s) => Some(s),
        Err(StorageError::NotFound(_)) => None,
        Err(e) => {
            warn!(error = %e, "could not read saved series, forecast has no origin time");
            None
        }
    };

    let mut pipeline = Pipeline::new(config)?;
    let result = pipeline.forecast(predictor.as_ref(), &seed, &scaler)?;
    let origin = series.as_ref().and_then(AlignedSeries::end);
    let report = ForecastReport::new(&result, predictor.name(), origin);
    store.save_forecast(&report)?;

    let step = config.pipeline.interval();
    for (i, v) in result.values.iter().enumerate() {
        match origin {
            Some(t) => println!("  {}  {:6.2} %", t + step * (i as i32 + 1), v),
            None => println!("  +{:<3} {:6.2} %", i + 1, v),
        }
    }
    match result.first_crossing {
        Some(n) => println!(
            "Moisture expected below {}% in {} step(s) (~{} min)",
            result.threshold,
            n,
            n as u64 * u64::from(config.pipeline.interval_minutes)
        ),
        None => println!(
            "Moisture stays at or above {}% for the next {} step(s)",
            result.threshold, result.horizon
        ),
    }
    Ok(())
}

// ── evaluate ────────────────────────────────────────────────────────

pub fn evaluate(config: &Config, model: Option<&Path>) -> Result<()> {
    let store = store(config);
    let stored = store.load_windows()?;
    if stored.validation.is_empty() {
        bail!("no validation windows saved; rerun `soilcast process` with more data");
    }
    let predictor = load_predictor(model, &stored.scaler, config.pipeline.target)?;

    let mut pipeline = Pipeline::new(config)?;
    let report = pipeline.evaluate(predictor.as_ref(), &stored.validation, &stored.scaler)?;
    print_json(&report)
}

// ── report ──────────────────────────────────────────────────────────

pub fn report(config: &Config) -> Result<()> {
    let store = store(config);
    let forecast = optional(store.load_forecast())?;
    let anomalies = optional(store.load_anomalies())?;
    if forecast.is_none() && anomalies.is_none() {
        bail!(
            "no reports in {}; run `soilcast forecast` or `soilcast detect` first",
            store.dir().display()
        );
    }
    print_json(&serde_json::json!({
        "forecast": forecast,
        "anomalies": anomalies,
    }))
}

fn optional<T>(loaded: Result<T, StorageError>) -> Result<Option<T>> {
    match loaded {
        Ok(v) => Ok(Some(v)),
        Err(StorageError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
