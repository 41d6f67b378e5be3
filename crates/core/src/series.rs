use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SoilcastError;
use crate::sample::{Channel, PhysicalBounds};

/// A gap-free multivariate series on a fixed interval grid.
///
/// Row `i` is the observation at `start + i * interval`. Every row holds one
/// finite value per entry of `channels`, in that order. A series is never
/// edited in place: transformations build a new series on the same grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesRecord")]
pub struct AlignedSeries {
    start: DateTime<Utc>,
    interval_secs: i64,
    channels: Vec<Channel>,
    rows: Vec<Vec<f64>>,
}

/// Serialized form, checked through [`AlignedSeries::new`] on load.
#[derive(Deserialize)]
struct SeriesRecord {
    start: DateTime<Utc>,
    interval_secs: i64,
    channels: Vec<Channel>,
    rows: Vec<Vec<f64>>,
}

impl TryFrom<SeriesRecord> for AlignedSeries {
    type Error = SoilcastError;

    fn try_from(record: SeriesRecord) -> Result<Self, Self::Error> {
        let interval = Duration::try_seconds(record.interval_secs).ok_or_else(|| {
            SoilcastError::Data(format!("interval {}s out of range", record.interval_secs))
        })?;
        Self::new(record.start, interval, record.channels, record.rows)
    }
}

impl AlignedSeries {
    pub fn new(
        start: DateTime<Utc>,
        interval: Duration,
        channels: Vec<Channel>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, SoilcastError> {
        let interval_secs = interval.num_seconds();
        if interval_secs <= 0 {
            return Err(SoilcastError::Data(format!(
                "interval must be positive, got {interval_secs}s"
            )));
        }
        if channels.is_empty() {
            return Err(SoilcastError::Data("series has no channels".into()));
        }
        let last = rows.len().saturating_sub(1) as i64;
        let span = interval_secs
            .checked_mul(last)
            .and_then(Duration::try_seconds)
            .and_then(|d| start.checked_add_signed(d));
        if span.is_none() {
            return Err(SoilcastError::Data(format!(
                "{} rows at {interval_secs}s intervals overflow the timestamp range",
                rows.len()
            )));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != channels.len() {
                return Err(SoilcastError::Data(format!(
                    "row {i} has {} values, expected {}",
                    row.len(),
                    channels.len()
                )));
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(SoilcastError::Data(format!(
                    "non-finite {} value at row {i}",
                    channels[j]
                )));
            }
        }
        Ok(Self {
            start,
            interval_secs,
            channels,
            rows,
        })
    }

    /// Build a series on the same grid and channels with replacement rows.
    pub fn with_rows(&self, rows: Vec<Vec<f64>>) -> Result<Self, SoilcastError> {
        Self::new(self.start, self.interval(), self.channels.clone(), rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(self.interval_secs)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_index(&self, channel: Channel) -> Option<usize> {
        self.channels.iter().position(|c| *c == channel)
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> Option<&[f64]> {
        self.rows.get(i).map(Vec::as_slice)
    }

    pub fn timestamp(&self, i: usize) -> DateTime<Utc> {
        self.start + Duration::seconds(self.interval_secs * i as i64)
    }

    /// Timestamp of the last row, if any.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.timestamp(self.rows.len() - 1))
        }
    }

    /// All values of one channel in row order.
    pub fn column(&self, channel: Channel) -> Option<Vec<f64>> {
        let idx = self.channel_index(channel)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Check every value against its channel's physical bounds.
    pub fn check_bounds(&self, bounds: &PhysicalBounds) -> Result<(), SoilcastError> {
        for (i, row) in self.rows.iter().enumerate() {
            for (channel, value) in self.channels.iter().zip(row) {
                if !bounds.for_channel(*channel).contains(*value) {
                    return Err(SoilcastError::Data(format!(
                        "{channel} value {value} at {} is outside physical bounds",
                        self.timestamp(i)
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn timestamps_follow_grid() {
        let s = AlignedSeries::new(
            t0(),
            Duration::hours(1),
            vec![Channel::Moisture],
            vec![vec![40.0], vec![39.0], vec![38.0]],
        )
        .unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.timestamp(2), t0() + Duration::hours(2));
        assert_eq!(s.end(), Some(t0() + Duration::hours(2)));
        assert_eq!(s.column(Channel::Moisture).unwrap(), vec![40.0, 39.0, 38.0]);
        assert!(s.column(Channel::Light).is_none());
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = AlignedSeries::new(
            t0(),
            Duration::hours(1),
            vec![Channel::Moisture, Channel::Temperature],
            vec![vec![40.0, 20.0], vec![39.0]],
        )
        .unwrap_err();
        assert!(matches!(err, SoilcastError::Data(_)));
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = AlignedSeries::new(
            t0(),
            Duration::hours(1),
            vec![Channel::Moisture],
            vec![vec![f64::NAN]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn rejects_zero_interval() {
        assert!(AlignedSeries::new(t0(), Duration::zero(), vec![Channel::Moisture], vec![]).is_err());
    }

    #[test]
    fn deserialize_goes_through_validation() {
        let s = AlignedSeries::new(
            t0(),
            Duration::hours(1),
            vec![Channel::Moisture],
            vec![vec![40.0], vec![39.0]],
        )
        .unwrap();
        let json = serde_json::to_value(&s).unwrap();
        let back: AlignedSeries = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, s);

        let mut ragged = json.clone();
        ragged["rows"] = serde_json::json!([[40.0], [39.0, 1.0]]);
        assert!(serde_json::from_value::<AlignedSeries>(ragged).is_err());

        let mut zero = json.clone();
        zero["interval_secs"] = serde_json::json!(0);
        assert!(serde_json::from_value::<AlignedSeries>(zero).is_err());

        let mut huge = json;
        huge["interval_secs"] = serde_json::json!(i64::MAX / 2);
        assert!(serde_json::from_value::<AlignedSeries>(huge).is_err());
    }

    #[test]
    fn bounds_check_reports_violation() {
        let s = AlignedSeries::new(
            t0(),
            Duration::hours(1),
            vec![Channel::Moisture, Channel::Light],
            vec![vec![50.0, 10.0], vec![101.0, 10.0]],
        )
        .unwrap();
        let err = s.check_bounds(&PhysicalBounds::default()).unwrap_err();
        assert!(err.to_string().contains("moisture"));
    }
}
