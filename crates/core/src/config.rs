use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SoilcastError;
use crate::sample::{Channel, PhysicalBounds};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub data: DataConfig,
    pub pipeline: PipelineConfig,
    pub forecast: ForecastConfig,
    pub anomaly: AnomalyConfig,
}

/// Well-known env keys that identify a profile when prefixed.
const PROFILE_MARKER_KEYS: &[&str] = &["RAW_DIR", "PROCESSED_DIR", "HISTORY_LENGTH", "HORIZON"];

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SOILCAST_PROFILE`. When set (e.g. `GREENHOUSE`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SOILCAST_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            data: DataConfig::from_env_profiled(p),
            pipeline: PipelineConfig::from_env_profiled(p),
            forecast: ForecastConfig::from_env_profiled(p),
            anomaly: AnomalyConfig::from_env_profiled(p),
        }
    }

    /// Load a TOML config file. Missing sections and keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, SoilcastError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            SoilcastError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Discover available profiles by scanning env vars for `{PREFIX}_{MARKER_KEY}` patterns.
    /// Always includes "default" (the unprefixed config).
    pub fn available_profiles() -> Vec<String> {
        let mut profiles = std::collections::BTreeSet::new();
        profiles.insert("default".to_string());

        for (key, _) in env::vars() {
            for marker in PROFILE_MARKER_KEYS {
                if let Some(prefix) = key.strip_suffix(&format!("_{}", marker)) {
                    if !prefix.is_empty()
                        && prefix.chars().all(|c| c.is_ascii_uppercase() || c == '_')
                    {
                        profiles.insert(prefix.to_string());
                    }
                }
            }
        }

        profiles.into_iter().collect()
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject settings no pipeline run can satisfy.
    pub fn validate(&self) -> Result<(), SoilcastError> {
        let p = &self.pipeline;
        if p.interval_minutes == 0 {
            return Err(SoilcastError::Config("interval_minutes must be > 0".into()));
        }
        if p.history_length == 0 {
            return Err(SoilcastError::Config("history_length must be > 0".into()));
        }
        if p.horizon == 0 {
            return Err(SoilcastError::Config("horizon must be > 0".into()));
        }
        if !(p.train_fraction > 0.0 && p.train_fraction <= 1.0) {
            return Err(SoilcastError::Config(format!(
                "train_fraction must be in (0, 1], got {}",
                p.train_fraction
            )));
        }
        if self.forecast.horizon == 0 {
            return Err(SoilcastError::Config("forecast horizon must be > 0".into()));
        }
        if !self.forecast.dry_threshold.is_finite() {
            return Err(SoilcastError::Config("dry_threshold must be finite".into()));
        }
        if !(self.anomaly.k.is_finite() && self.anomaly.k >= 0.0) {
            return Err(SoilcastError::Config(format!(
                "anomaly k must be finite and >= 0, got {}",
                self.anomaly.k
            )));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  data:      raw={}, processed={}, models={}",
            self.data.raw_dir.display(),
            self.data.processed_dir.display(),
            self.data.models_dir.display()
        );
        tracing::info!(
            "  pipeline:  interval={}m, max_gap={}, history={}, horizon={}, target={}, train_fraction={}",
            self.pipeline.interval_minutes,
            self.pipeline.max_gap,
            self.pipeline.history_length,
            self.pipeline.horizon,
            self.pipeline.target,
            self.pipeline.train_fraction
        );
        tracing::info!(
            "  forecast:  horizon={}, dry_threshold={}",
            self.forecast.horizon,
            self.forecast.dry_threshold
        );
        tracing::info!("  anomaly:   k={}, top_n={}", self.anomaly.k, self.anomaly.top_n);
    }

    /// Return a JSON view of the effective settings.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "data": {
                "raw_dir": self.data.raw_dir,
                "processed_dir": self.data.processed_dir,
                "models_dir": self.data.models_dir,
            },
            "pipeline": {
                "interval_minutes": self.pipeline.interval_minutes,
                "max_gap": self.pipeline.max_gap,
                "history_length": self.pipeline.history_length,
                "horizon": self.pipeline.horizon,
                "target": self.pipeline.target,
                "train_fraction": self.pipeline.train_fraction,
            },
            "forecast": { "horizon": self.forecast.horizon, "dry_threshold": self.forecast.dry_threshold },
            "anomaly": { "k": self.anomaly.k, "top_n": self.anomaly.top_n },
        })
    }
}

// ── Data locations ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory scanned recursively for raw CSV exports.
    pub raw_dir: PathBuf,
    /// Directory holding window arrays, scaler params and reports.
    pub processed_dir: PathBuf,
    /// Directory holding predictor model files.
    pub models_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            models_dir: PathBuf::from("data/models"),
        }
    }
}

impl DataConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            raw_dir: profiled_env_opt(p, "RAW_DIR").map(PathBuf::from).unwrap_or(d.raw_dir),
            processed_dir: profiled_env_opt(p, "PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.processed_dir),
            models_dir: profiled_env_opt(p, "MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.models_dir),
        }
    }
}

// ── Preprocessing ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Grid spacing of the aligned series, in minutes.
    pub interval_minutes: u32,
    /// Longest run of missing bins that interpolation may fill.
    pub max_gap: usize,
    /// Rows of history per window.
    pub history_length: usize,
    /// Steps between the last history row and the target row.
    pub horizon: usize,
    pub target: Channel,
    pub train_fraction: f64,
    pub bounds: PhysicalBounds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            max_gap: 6,
            history_length: 24,
            horizon: 6,
            target: Channel::Moisture,
            train_fraction: 0.8,
            bounds: PhysicalBounds::default(),
        }
    }
}

impl PipelineConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            interval_minutes: profiled_env_parse(p, "INTERVAL_MINUTES", d.interval_minutes),
            max_gap: profiled_env_parse(p, "MAX_GAP", d.max_gap),
            history_length: profiled_env_parse(p, "HISTORY_LENGTH", d.history_length),
            horizon: profiled_env_parse(p, "HORIZON", d.horizon),
            target: profiled_env_or(p, "TARGET_CHANNEL", d.target.as_str())
                .parse()
                .unwrap_or(d.target),
            train_fraction: profiled_env_parse(p, "TRAIN_FRACTION", d.train_fraction),
            bounds: d.bounds,
        }
    }

    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.interval_minutes))
    }
}

// ── Forecast ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of rolled steps per forecast.
    pub horizon: usize,
    /// Moisture level (denormalized, percent) below which the soil counts as dry.
    pub dry_threshold: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 6,
            dry_threshold: 30.0,
        }
    }
}

impl ForecastConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            horizon: profiled_env_parse(p, "FORECAST_HORIZON", d.horizon),
            dry_threshold: profiled_env_parse(p, "DRY_THRESHOLD", d.dry_threshold),
        }
    }
}

// ── Anomaly scoring ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Standard deviations above the mean training error.
    pub k: f64,
    /// Anomalies listed in summaries.
    pub top_n: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self { k: 3.0, top_n: 20 }
    }
}

impl AnomalyConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            k: profiled_env_parse(p, "ANOMALY_K", d.k),
            top_n: profiled_env_parse(p, "ANOMALY_TOP_N", d.top_n),
        }
    }
}
