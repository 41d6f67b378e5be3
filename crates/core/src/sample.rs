use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SoilcastError;

/// A measured sensor channel. The declaration order is the column order used
/// by every aligned series and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Moisture,
    Temperature,
    Humidity,
    Light,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Moisture,
        Channel::Temperature,
        Channel::Humidity,
        Channel::Light,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Moisture => "moisture",
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Light => "light",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = SoilcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "moisture" => Ok(Channel::Moisture),
            "temperature" => Ok(Channel::Temperature),
            "humidity" => Ok(Channel::Humidity),
            "light" => Ok(Channel::Light),
            other => Err(SoilcastError::Config(format!("unknown channel '{other}'"))),
        }
    }
}

/// One reading as accepted by the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp: DateTime<Utc>,
    /// Soil moisture, percent.
    pub moisture: f64,
    /// Temperature, degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Light level in lux, when the device has a light sensor.
    pub light: Option<f64>,
}

impl RawSample {
    pub fn value(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Moisture => Some(self.moisture),
            Channel::Temperature => Some(self.temperature),
            Channel::Humidity => Some(self.humidity),
            Channel::Light => self.light,
        }
    }
}

/// Anything that yields already-validated raw samples: a CSV export, a
/// backend dump, or an in-memory batch.
pub trait SampleSource {
    /// Human-readable origin for logs.
    fn label(&self) -> String;

    /// Read every sample from this source, in the order stored.
    fn read_samples(&self) -> Result<Vec<RawSample>, SoilcastError>;
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn read_samples(&self) -> Result<Vec<RawSample>, SoilcastError> {
        (**self).read_samples()
    }
}

impl SampleSource for Vec<RawSample> {
    fn label(&self) -> String {
        format!("memory({} samples)", self.len())
    }

    fn read_samples(&self) -> Result<Vec<RawSample>, SoilcastError> {
        Ok(self.clone())
    }
}

/// Closed lower bound with an optional closed upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Bounds {
    pub const fn non_negative() -> Self {
        Self { min: 0.0, max: None }
    }

    pub const fn percent() -> Self {
        Self {
            min: 0.0,
            max: Some(100.0),
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let v = value.max(self.min);
        match self.max {
            Some(max) => v.min(max),
            None => v,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }
}

/// Physical bounds enforced on aligned data, one entry per channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalBounds {
    pub moisture: Bounds,
    pub temperature: Bounds,
    pub humidity: Bounds,
    pub light: Bounds,
}

impl Default for PhysicalBounds {
    fn default() -> Self {
        Self {
            moisture: Bounds::percent(),
            temperature: Bounds::non_negative(),
            humidity: Bounds::percent(),
            light: Bounds::non_negative(),
        }
    }
}

impl PhysicalBounds {
    pub fn for_channel(&self, channel: Channel) -> Bounds {
        match channel {
            Channel::Moisture => self.moisture,
            Channel::Temperature => self.temperature,
            Channel::Humidity => self.humidity,
            Channel::Light => self.light,
        }
    }
}
