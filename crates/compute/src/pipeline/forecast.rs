//! Autoregressive multi-step forecast.
//!
//! Each step feeds the previous prediction back in as the newest row of the
//! window. Non-target channels of those synthetic rows are copied from the
//! last real observation; they are not forecast independently.

use serde::{Deserialize, Serialize};
use tracing::debug;

use soilcast_core::{Channel, SoilcastError};

use super::scaler::ScalerModel;
use super::window::Window;
use crate::predictor::{predict_checked, Predictor};

/// Output of one forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub channel: Channel,
    pub horizon: usize,
    /// Predictions in normalized space, in step order.
    pub normalized: Vec<f64>,
    /// Predictions in physical units, in step order.
    pub values: Vec<f64>,
    pub threshold: f64,
    /// 1-based step at which `values` first drops below `threshold`.
    pub first_crossing: Option<usize>,
}

/// Drives a predictor step by step from a fixed initial window.
pub struct ForecastRoller<'p, P: Predictor + ?Sized> {
    initial: Window,
    target_channel: Channel,
    target_index: usize,
    predictor: &'p P,
}

impl<'p, P: Predictor + ?Sized> ForecastRoller<'p, P> {
    /// `channels` gives the column order of `initial`.
    pub fn new(
        initial: Window,
        channels: &[Channel],
        target_channel: Channel,
        predictor: &'p P,
    ) -> Result<Self, SoilcastError> {
        let target_index = channels
            .iter()
            .position(|c| *c == target_channel)
            .ok_or_else(|| SoilcastError::Data(format!("window has no {target_channel} channel")))?;
        if initial.channel_count() != channels.len() {
            return Err(SoilcastError::Data(format!(
                "window has {} channels, expected {}",
                initial.channel_count(),
                channels.len()
            )));
        }
        Ok(Self {
            initial,
            target_channel,
            target_index,
            predictor,
        })
    }

    pub fn initial(&self) -> &Window {
        &self.initial
    }

    /// One prediction and the window that follows from it.
    pub fn step(&self, window: &Window) -> Result<(f64, Window), SoilcastError> {
        let p = predict_checked(self.predictor, window)?;
        let next = window.roll_forward(self.target_index, p)?;
        Ok((p, next))
    }

    /// Exactly `horizon` normalized predictions. Any failed step fails the
    /// whole run.
    pub fn run(&self, horizon: usize) -> Result<Vec<f64>, SoilcastError> {
        let mut predictions = Vec::with_capacity(horizon);
        let mut window = self.initial.clone();
        for _ in 0..horizon {
            let (p, next) = self.step(&window)?;
            predictions.push(p);
            window = next;
        }
        Ok(predictions)
    }

    /// Run, map back to physical units and locate the first dry step.
    pub fn forecast(
        &self,
        horizon: usize,
        scaler: &ScalerModel,
        threshold: f64,
    ) -> Result<ForecastResult, SoilcastError> {
        let normalized = self.run(horizon)?;
        let values = denormalize(&normalized, scaler, self.target_channel)?;
        let crossing = first_crossing(&values, threshold);
        debug!(
            predictor = self.predictor.name(),
            horizon,
            threshold,
            first_crossing = ?crossing,
            "forecast rolled"
        );
        Ok(ForecastResult {
            channel: self.target_channel,
            horizon,
            normalized,
            values,
            threshold,
            first_crossing: crossing,
        })
    }
}

pub fn denormalize(
    predictions: &[f64],
    scaler: &ScalerModel,
    channel: Channel,
) -> Result<Vec<f64>, SoilcastError> {
    predictions
        .iter()
        .map(|&p| scaler.inverse_value(channel, p))
        .collect()
}

/// Smallest 1-based `i` with `forecast[i - 1] < threshold`.
pub fn first_crossing(forecast: &[f64], threshold: f64) -> Option<usize> {
    forecast.iter().position(|v| *v < threshold).map(|i| i + 1)
}
