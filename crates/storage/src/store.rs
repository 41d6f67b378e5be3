//! Directory-backed artifact store.
//!
//! Layout under the store directory:
//! - `x_train.json`, `y_train.json`, `x_val.json`, `y_val.json`, `latest_window.json`
//! - `scaler.json`
//! - `val_errors.json`, `anomaly_threshold.json`
//! - `forecast.json`, `anomalies.json`

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use soilcast_compute::{LabeledWindow, PreparedData, ScalerModel, ScalerParams, Window};

use crate::array::{labeled_windows, NumericArray};
use crate::error::StorageError;
use crate::reports::{AnomalyReport, ForecastReport};

pub const SCALER_FILE: &str = "scaler.json";
pub const FORECAST_FILE: &str = "forecast.json";
pub const ANOMALIES_FILE: &str = "anomalies.json";

/// Windows, seed and scaler written by `process`.
#[derive(Debug, Clone)]
pub struct StoredWindows {
    pub train: Vec<LabeledWindow>,
    pub validation: Vec<LabeledWindow>,
    pub latest_window: Window,
    pub scaler: ScalerModel,
}

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub fn save_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf, StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(file_name);
        let json = serde_json::to_string_pretty(value).map_err(|source| StorageError::Json {
            path: path.clone(),
            source,
        })?;
        // Write then rename so readers never see a half-written file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "artifact written");
        Ok(path)
    }

    pub fn load_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<T, StorageError> {
        let path = self.path(file_name);
        if !path.exists() {
            return Err(StorageError::NotFound(path));
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|source| StorageError::Json { path, source })
    }

    pub fn save_array(&self, array: &NumericArray) -> Result<PathBuf, StorageError> {
        array.validate()?;
        self.save_json(&format!("{}.json", array.name), array)
    }

    pub fn load_array(&self, name: &str) -> Result<NumericArray, StorageError> {
        let array: NumericArray = self.load_json(&format!("{name}.json"))?;
        if array.name != name {
            return Err(StorageError::Format {
                name: name.to_owned(),
                reason: format!("file holds array '{}'", array.name),
            });
        }
        array.validate()?;
        Ok(array)
    }

    pub fn save_scaler(&self, scaler: &ScalerModel) -> Result<PathBuf, StorageError> {
        self.save_json(SCALER_FILE, &scaler.params())
    }

    pub fn load_scaler(&self) -> Result<ScalerModel, StorageError> {
        let params: ScalerParams = self.load_json(SCALER_FILE)?;
        Ok(ScalerModel::from_params(params)?)
    }

    /// Persist everything `process` produces.
    pub fn save_prepared(&self, prepared: &PreparedData) -> Result<(), StorageError> {
        let arrays = [
            NumericArray::from_windows("x_train", &prepared.train)?,
            NumericArray::from_targets("y_train", &prepared.train),
            NumericArray::from_windows("x_val", &prepared.validation)?,
            NumericArray::from_targets("y_val", &prepared.validation),
            NumericArray::from_window("latest_window", &prepared.latest_window)?,
        ];
        for array in &arrays {
            self.save_array(array)?;
        }
        self.save_scaler(&prepared.scaler)?;
        info!(
            dir = %self.dir.display(),
            train = prepared.train.len(),
            validation = prepared.validation.len(),
            "prepared data saved"
        );
        Ok(())
    }

    pub fn load_windows(&self) -> Result<StoredWindows, StorageError> {
        let train = labeled_windows(&self.load_array("x_train")?, &self.load_array("y_train")?)?;
        let validation = labeled_windows(&self.load_array("x_val")?, &self.load_array("y_val")?)?;
        let latest_window = self.load_array("latest_window")?.to_window()?;
        let scaler = self.load_scaler()?;
        Ok(StoredWindows {
            train,
            validation,
            latest_window,
            scaler,
        })
    }

    /// Validation errors plus the threshold they were judged against.
    pub fn save_errors(&self, errors: &[f64], threshold: f64) -> Result<(), StorageError> {
        self.save_array(&NumericArray::vector("val_errors", errors))?;
        self.save_array(&NumericArray::scalar("anomaly_threshold", threshold))?;
        Ok(())
    }

    pub fn load_errors(&self) -> Result<(Vec<f64>, f64), StorageError> {
        let errors = self.load_array("val_errors")?.to_vector()?;
        let threshold = self.load_array("anomaly_threshold")?.to_scalar()?;
        Ok((errors, threshold))
    }

    pub fn save_forecast(&self, report: &ForecastReport) -> Result<PathBuf, StorageError> {
        self.save_json(FORECAST_FILE, report)
    }

    pub fn load_forecast(&self) -> Result<ForecastReport, StorageError> {
        self.load_json(FORECAST_FILE)
    }

    pub fn save_anomalies(&self, report: &AnomalyReport) -> Result<PathBuf, StorageError> {
        self.save_json(ANOMALIES_FILE, report)
    }

    pub fn load_anomalies(&self) -> Result<AnomalyReport, StorageError> {
        self.load_json(ANOMALIES_FILE)
    }
}
