//! Anomaly scoring: per-window prediction errors, a threshold calibrated on
//! the training errors, and strict-exceedance classification.
//!
//! The error of a window is `|prediction - last observed target value in the
//! window|`. The baseline is the newest value already inside the window, not a
//! held-out future value, so this is a reconstruction-style error rather than
//! a true forecast error.

pub mod stats;

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use soilcast_core::SoilcastError;

use super::window::Window;
use crate::predictor::{predict_checked, Predictor};

/// Default number of standard deviations above the mean.
pub const DEFAULT_K: f64 = 3.0;

/// Score every window in parallel. Output order matches `windows`; if any
/// prediction fails the whole call fails.
pub fn compute_errors<P, W>(
    predictor: &P,
    windows: &[W],
    target_index: usize,
) -> Result<Vec<f64>, SoilcastError>
where
    P: Predictor + ?Sized,
    W: AsRef<Window> + Sync,
{
    windows
        .par_iter()
        .map(|w| -> Result<f64, SoilcastError> {
            let window = w.as_ref();
            let predicted = predict_checked(predictor, window)?;
            let baseline = window.last_value(target_index)?;
            Ok((predicted - baseline).abs())
        })
        .collect()
}

/// `mean(errors) + k * std(errors)`, population std.
pub fn calibrate(errors: &[f64], k: f64) -> Result<f64, SoilcastError> {
    if !k.is_finite() {
        return Err(SoilcastError::Anomaly(format!("k must be finite, got {k}")));
    }
    if let Some(i) = errors.iter().position(|e| !e.is_finite()) {
        return Err(SoilcastError::Anomaly(format!("non-finite error at index {i}")));
    }
    let (mean, std) = stats::mean_std(errors)
        .ok_or_else(|| SoilcastError::Anomaly("cannot calibrate on an empty error set".into()))?;
    let threshold = mean + k * std;
    debug!(samples = errors.len(), mean, std, k, threshold, "threshold calibrated");
    Ok(threshold)
}

/// Indices whose error strictly exceeds `threshold`.
pub fn classify(errors: &[f64], threshold: f64) -> BTreeSet<usize> {
    errors
        .iter()
        .enumerate()
        .filter(|(_, e)| **e > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Errors of the scored windows with the threshold they were judged against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyProfile {
    pub threshold: f64,
    pub errors: Vec<f64>,
    pub anomalous_indices: BTreeSet<usize>,
}

impl AnomalyProfile {
    pub fn new(threshold: f64, errors: Vec<f64>) -> Self {
        let anomalous_indices = classify(&errors, threshold);
        Self {
            threshold,
            errors,
            anomalous_indices,
        }
    }

    pub fn window_count(&self) -> usize {
        self.errors.len()
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalous_indices.len()
    }

    pub fn is_anomalous(&self, index: usize) -> bool {
        self.anomalous_indices.contains(&index)
    }

    /// Anomalies ranked by descending error, ties by index, capped at `top_n`.
    pub fn ranked(&self, top_n: usize) -> Vec<RankedAnomaly> {
        let mut ranked: Vec<RankedAnomaly> = self
            .anomalous_indices
            .iter()
            .map(|&index| RankedAnomaly {
                index,
                error: self.errors[index],
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.error
                .partial_cmp(&a.error)
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        ranked.truncate(top_n);
        ranked
    }

    pub fn summary(&self, top_n: usize) -> AnomalySummary {
        AnomalySummary {
            window_count: self.window_count(),
            anomaly_count: self.anomaly_count(),
            threshold: self.threshold,
            top: self.ranked(top_n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedAnomaly {
    pub index: usize,
    pub error: f64,
}

/// What the reporting side shows about one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub window_count: usize,
    pub anomaly_count: usize,
    pub threshold: f64,
    pub top: Vec<RankedAnomaly>,
}
