//! Error metrics in physical units on labeled windows.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use soilcast_core::{Channel, SoilcastError};

use super::scaler::ScalerModel;
use super::window::LabeledWindow;
use crate::predictor::{predict_checked, Predictor};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub channel: Channel,
    pub windows: usize,
    pub mae: f64,
    pub rmse: f64,
}

pub fn mae(predicted: &[f64], actual: &[f64]) -> Option<f64> {
    if predicted.is_empty() || predicted.len() != actual.len() {
        return None;
    }
    let sum: f64 = predicted.iter().zip(actual).map(|(p, a)| (p - a).abs()).sum();
    Some(sum / predicted.len() as f64)
}

pub fn rmse(predicted: &[f64], actual: &[f64]) -> Option<f64> {
    if predicted.is_empty() || predicted.len() != actual.len() {
        return None;
    }
    let sum: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a) * (p - a))
        .sum();
    Some((sum / predicted.len() as f64).sqrt())
}

/// Predict every window, map predictions and targets back to physical units
/// with `scaler`, and compare.
pub fn evaluate<P: Predictor + ?Sized>(
    predictor: &P,
    windows: &[LabeledWindow],
    scaler: &ScalerModel,
    channel: Channel,
) -> Result<EvaluationReport, SoilcastError> {
    if windows.is_empty() {
        return Err(SoilcastError::Data("no windows to evaluate".into()));
    }

    let pairs = windows
        .par_iter()
        .map(|w| -> Result<(f64, f64), SoilcastError> {
            let p = predict_checked(predictor, &w.window)?;
            Ok((scaler.inverse_value(channel, p)?, scaler.inverse_value(channel, w.target)?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (predicted, actual): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();

    let mismatch = || SoilcastError::Data("prediction and target counts differ".into());
    let mae = mae(&predicted, &actual).ok_or_else(mismatch)?;
    let rmse = rmse(&predicted, &actual).ok_or_else(mismatch)?;
    Ok(EvaluationReport {
        channel,
        windows: windows.len(),
        mae,
        rmse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::window::Window;

    #[test]
    fn metrics_on_known_values() {
        let p = [1.0, 2.0, 3.0, 4.0];
        let a = [1.0, 2.0, 3.0, 8.0];
        assert_eq!(mae(&p, &a), Some(1.0));
        assert_eq!(rmse(&p, &a), Some(2.0));
        assert_eq!(mae(&[], &[]), None);
        assert_eq!(rmse(&[1.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn evaluates_in_physical_units() {
        let scaler =
            ScalerModel::fit(&[Channel::Moisture], &[vec![0.0], vec![100.0]]).unwrap();
        let windows = vec![
            LabeledWindow {
                window: Window::new(vec![vec![0.5]]).unwrap(),
                target: 0.4,
            },
            LabeledWindow {
                window: Window::new(vec![vec![0.3]]).unwrap(),
                target: 0.3,
            },
        ];
        let last = |w: &Window| Ok::<_, SoilcastError>(w.last_row()[0]);
        let report = evaluate(&last, &windows, &scaler, Channel::Moisture).unwrap();

        assert_eq!(report.windows, 2);
        assert!((report.mae - 5.0).abs() < 1e-9);
        assert!((report.rmse - 50f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn empty_input_is_data_error() {
        let scaler = ScalerModel::fit(&[Channel::Moisture], &[vec![0.0]]).unwrap();
        let last = |w: &Window| Ok::<_, SoilcastError>(w.last_row()[0]);
        let err = evaluate(&last, &[], &scaler, Channel::Moisture).unwrap_err();
        assert!(matches!(err, SoilcastError::Data(_)));
    }
}
