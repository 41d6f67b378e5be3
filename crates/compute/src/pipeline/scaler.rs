//! Reversible per-channel min/max normalization.

use serde::{Deserialize, Serialize};

use soilcast_core::{AlignedSeries, Channel, SoilcastError};

/// Version of the persisted [`ScalerParams`] record.
pub const SCALER_PARAMS_VERSION: u32 = 1;

/// Fitted range of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub channel: Channel,
    pub min: f64,
    pub max: f64,
}

impl ChannelRange {
    /// Divisor used by the affine map. A constant channel maps with range 1,
    /// so every value lands at `x - min`.
    pub fn scale(&self) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            1.0
        } else {
            range
        }
    }

    pub fn forward(&self, v: f64) -> f64 {
        (v - self.min) / self.scale()
    }

    pub fn inverse(&self, v: f64) -> f64 {
        v * self.scale() + self.min
    }
}

/// Serialized scaler: enough to rebuild the model without the training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub version: u32,
    pub channels: Vec<ChannelRange>,
}

/// Frozen per-channel min/max normalization. Built once by [`ScalerModel::fit`];
/// refitting builds a new model.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerModel {
    ranges: Vec<ChannelRange>,
}

impl ScalerModel {
    /// Fit per-channel min/max over `rows`, columns ordered as `channels`.
    pub fn fit(channels: &[Channel], rows: &[Vec<f64>]) -> Result<Self, SoilcastError> {
        if rows.is_empty() {
            return Err(SoilcastError::Scaler("cannot fit on an empty partition".into()));
        }
        if channels.is_empty() {
            return Err(SoilcastError::Scaler("cannot fit without channels".into()));
        }

        let mut ranges: Vec<ChannelRange> = channels
            .iter()
            .map(|&channel| ChannelRange {
                channel,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            })
            .collect();

        for (i, row) in rows.iter().enumerate() {
            if row.len() != channels.len() {
                return Err(SoilcastError::Scaler(format!(
                    "row {i} has {} values, expected {}",
                    row.len(),
                    channels.len()
                )));
            }
            for (range, &v) in ranges.iter_mut().zip(row) {
                if !v.is_finite() {
                    return Err(SoilcastError::Scaler(format!(
                        "non-finite {} value at row {i}",
                        range.channel
                    )));
                }
                range.min = range.min.min(v);
                range.max = range.max.max(v);
            }
        }

        Ok(Self { ranges })
    }

    /// Fit on the first `rows` rows of a series.
    pub fn fit_series(series: &AlignedSeries, rows: usize) -> Result<Self, SoilcastError> {
        let end = rows.min(series.len());
        Self::fit(series.channels(), &series.rows()[..end])
    }

    pub fn from_params(params: ScalerParams) -> Result<Self, SoilcastError> {
        if params.version != SCALER_PARAMS_VERSION {
            return Err(SoilcastError::Scaler(format!(
                "unsupported scaler record version {} (expected {SCALER_PARAMS_VERSION})",
                params.version
            )));
        }
        if params.channels.is_empty() {
            return Err(SoilcastError::Scaler("scaler record has no channels".into()));
        }
        for r in &params.channels {
            if !r.min.is_finite() || !r.max.is_finite() || r.min > r.max {
                return Err(SoilcastError::Scaler(format!(
                    "invalid range for {}: [{}, {}]",
                    r.channel, r.min, r.max
                )));
            }
        }
        Ok(Self {
            ranges: params.channels,
        })
    }

    pub fn params(&self) -> ScalerParams {
        ScalerParams {
            version: SCALER_PARAMS_VERSION,
            channels: self.ranges.clone(),
        }
    }

    pub fn ranges(&self) -> &[ChannelRange] {
        &self.ranges
    }

    pub fn range(&self, channel: Channel) -> Option<&ChannelRange> {
        self.ranges.iter().find(|r| r.channel == channel)
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, SoilcastError> {
        self.check_width(row)?;
        Ok(self.ranges.iter().zip(row).map(|(r, &v)| r.forward(v)).collect())
    }

    pub fn inverse_transform(&self, row: &[f64]) -> Result<Vec<f64>, SoilcastError> {
        self.check_width(row)?;
        Ok(self.ranges.iter().zip(row).map(|(r, &v)| r.inverse(v)).collect())
    }

    /// Map one normalized value of `channel` back to physical units.
    pub fn inverse_value(&self, channel: Channel, v: f64) -> Result<f64, SoilcastError> {
        self.range(channel)
            .map(|r| r.inverse(v))
            .ok_or_else(|| SoilcastError::Scaler(format!("scaler was not fitted on {channel}")))
    }

    /// Normalize a whole series onto the same grid.
    pub fn transform_series(&self, series: &AlignedSeries) -> Result<AlignedSeries, SoilcastError> {
        let fitted: Vec<Channel> = self.ranges.iter().map(|r| r.channel).collect();
        if fitted != series.channels() {
            return Err(SoilcastError::Scaler(format!(
                "scaler channels {fitted:?} do not match series channels {:?}",
                series.channels()
            )));
        }
        let rows = series
            .rows()
            .iter()
            .map(|row| self.transform(row))
            .collect::<Result<Vec<_>, _>>()?;
        series.with_rows(rows)
    }

    fn check_width(&self, row: &[f64]) -> Result<(), SoilcastError> {
        if row.len() != self.ranges.len() {
            return Err(SoilcastError::Scaler(format!(
                "row has {} values, scaler has {} channels",
                row.len(),
                self.ranges.len()
            )));
        }
        Ok(())
    }
}
