//! The predictor capability: a normalized window in, one normalized target
//! value out.
//!
//! Training happens elsewhere. Anything that maps a window to a scalar
//! deterministically can be plugged in, including plain closures.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use soilcast_core::SoilcastError;

use crate::pipeline::window::Window;

/// Version of the [`LinearModelFile`] format.
pub const LINEAR_MODEL_VERSION: u32 = 1;

pub trait Predictor: Send + Sync {
    /// Predict the normalized target value for `window`. Must be deterministic
    /// for fixed parameters.
    fn predict(&self, window: &Window) -> Result<f64, SoilcastError>;

    fn name(&self) -> &str {
        "predictor"
    }
}

impl<F> Predictor for F
where
    F: Fn(&Window) -> Result<f64, SoilcastError> + Send + Sync,
{
    fn predict(&self, window: &Window) -> Result<f64, SoilcastError> {
        self(window)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Call the predictor and map any failure, or a non-finite output, to a
/// `PredictorError`.
pub fn predict_checked<P: Predictor + ?Sized>(
    predictor: &P,
    window: &Window,
) -> Result<f64, SoilcastError> {
    let value = predictor.predict(window).map_err(|e| match e {
        err @ SoilcastError::Predictor(_) => err,
        other => SoilcastError::Predictor(format!("{} failed: {other}", predictor.name())),
    })?;
    if !value.is_finite() {
        return Err(SoilcastError::Predictor(format!(
            "{} returned non-finite value {value}",
            predictor.name()
        )));
    }
    Ok(value)
}

/// Baseline that repeats the most recent target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistencePredictor {
    target_index: usize,
}

impl PersistencePredictor {
    pub fn new(target_index: usize) -> Self {
        Self { target_index }
    }
}

impl Predictor for PersistencePredictor {
    fn predict(&self, window: &Window) -> Result<f64, SoilcastError> {
        window.last_value(self.target_index)
    }

    fn name(&self) -> &str {
        "persistence"
    }
}

/// On-disk form of a [`LinearPredictor`], produced by an external trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModelFile {
    pub version: u32,
    pub history_length: usize,
    pub channel_count: usize,
    /// Row-major, `history_length * channel_count` entries.
    pub weights: Vec<f64>,
    pub bias: f64,
}

/// `bias + Σ w·x` over the flattened window.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPredictor {
    history_length: usize,
    channel_count: usize,
    weights: Vec<f64>,
    bias: f64,
}

impl LinearPredictor {
    pub fn from_model(model: LinearModelFile) -> Result<Self, SoilcastError> {
        if model.version != LINEAR_MODEL_VERSION {
            return Err(SoilcastError::Predictor(format!(
                "unsupported linear model version {} (expected {LINEAR_MODEL_VERSION})",
                model.version
            )));
        }
        let expected = model.history_length * model.channel_count;
        if expected == 0 || model.weights.len() != expected {
            return Err(SoilcastError::Predictor(format!(
                "linear model declares {}x{} but has {} weights",
                model.history_length,
                model.channel_count,
                model.weights.len()
            )));
        }
        if !model.bias.is_finite() || model.weights.iter().any(|w| !w.is_finite()) {
            return Err(SoilcastError::Predictor("linear model has non-finite parameters".into()));
        }
        Ok(Self {
            history_length: model.history_length,
            channel_count: model.channel_count,
            weights: model.weights,
            bias: model.bias,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SoilcastError> {
        let content = std::fs::read_to_string(path)?;
        let model: LinearModelFile = serde_json::from_str(&content)?;
        let predictor = Self::from_model(model)?;
        debug!(
            path = %path.display(),
            history_length = predictor.history_length,
            channel_count = predictor.channel_count,
            "linear model loaded"
        );
        Ok(predictor)
    }

    pub fn history_length(&self) -> usize {
        self.history_length
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }
}

impl Predictor for LinearPredictor {
    fn predict(&self, window: &Window) -> Result<f64, SoilcastError> {
        if window.len() != self.history_length || window.channel_count() != self.channel_count {
            return Err(SoilcastError::Predictor(format!(
                "window is {}x{}, model expects {}x{}",
                window.len(),
                window.channel_count(),
                self.history_length,
                self.channel_count
            )));
        }
        let dot: f64 = window
            .rows()
            .iter()
            .flatten()
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum();
        Ok(self.bias + dot)
    }

    fn name(&self) -> &str {
        "linear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window::new(vec![vec![0.2, 0.5], vec![0.4, 0.6]]).unwrap()
    }

    #[test]
    fn persistence_repeats_last_target() {
        assert_eq!(PersistencePredictor::new(0).predict(&window()).unwrap(), 0.4);
        assert_eq!(PersistencePredictor::new(1).predict(&window()).unwrap(), 0.6);
        assert!(PersistencePredictor::new(2).predict(&window()).is_err());
    }

    #[test]
    fn closures_are_predictors() {
        let p = |w: &Window| Ok::<_, SoilcastError>(w.last_row()[0] * 2.0);
        assert_eq!(predict_checked(&p, &window()).unwrap(), 0.8);
    }

    #[test]
    fn non_finite_output_is_predictor_error() {
        let p = |_: &Window| Ok::<_, SoilcastError>(f64::NAN);
        let err = predict_checked(&p, &window()).unwrap_err();
        assert!(matches!(err, SoilcastError::Predictor(_)));
    }

    #[test]
    fn failures_become_predictor_errors() {
        let p = |_: &Window| Err::<f64, _>(SoilcastError::Other("boom".into()));
        let err = predict_checked(&p, &window()).unwrap_err();
        assert!(matches!(err, SoilcastError::Predictor(ref m) if m.contains("boom")));
    }

    #[test]
    fn linear_is_weighted_sum() {
        let p = LinearPredictor::from_model(LinearModelFile {
            version: LINEAR_MODEL_VERSION,
            history_length: 2,
            channel_count: 2,
            weights: vec![0.0, 0.0, 1.0, 0.5],
            bias: 0.1,
        })
        .unwrap();
        let got = p.predict(&window()).unwrap();
        assert!((got - (0.1 + 0.4 + 0.3)).abs() < 1e-12);

        let short = Window::new(vec![vec![0.1, 0.2]]).unwrap();
        assert!(p.predict(&short).is_err());
    }

    #[test]
    fn linear_rejects_bad_shape_or_version() {
        let mut m = LinearModelFile {
            version: LINEAR_MODEL_VERSION,
            history_length: 2,
            channel_count: 2,
            weights: vec![1.0; 3],
            bias: 0.0,
        };
        assert!(LinearPredictor::from_model(m.clone()).is_err());
        m.weights.push(1.0);
        m.version = 7;
        assert!(LinearPredictor::from_model(m).is_err());
    }

    #[test]
    fn linear_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let m = LinearModelFile {
            version: LINEAR_MODEL_VERSION,
            history_length: 2,
            channel_count: 2,
            weights: vec![0.25; 4],
            bias: 0.0,
        };
        std::fs::write(&path, serde_json::to_string(&m).unwrap()).unwrap();
        let p = LinearPredictor::load(&path).unwrap();
        assert_eq!(p.history_length(), 2);
        assert!((p.predict(&window()).unwrap() - 0.425).abs() < 1e-12);
    }
}
