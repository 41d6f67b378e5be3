//! Aligner: turns raw readings into a gap-free series on a fixed grid.
//!
//! Stages, each producing a new value:
//! 1. `load`: concatenate sources, keep the latest row per timestamp, sort.
//! 2. `resample`: epoch-aligned bins, mean per channel.
//! 3. `interpolate`: fill short interior gaps, time-weighted.
//! 4. `clip`: enforce physical channel bounds.
//! 5. `finish`: drop incomplete bins, keep the most recent contiguous run.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use soilcast_core::config::PipelineConfig;
use soilcast_core::{AlignedSeries, Channel, PhysicalBounds, RawSample, SampleSource, SoilcastError};

/// Largest grid the aligner will allocate. A stray timestamp years away from
/// the rest of the data would otherwise blow up memory.
const MAX_BINS: i64 = 5_000_000;

/// Channels every reading carries. Light is appended only when present.
const BASE_CHANNELS: [Channel; 3] = [Channel::Moisture, Channel::Temperature, Channel::Humidity];

/// Intermediate grid where any cell may still be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedSeries {
    pub start: DateTime<Utc>,
    pub interval: Duration,
    pub channels: Vec<Channel>,
    /// One row per bin, one cell per channel. `None` = no value.
    pub cells: Vec<Vec<Option<f64>>>,
}

impl BinnedSeries {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn timestamp(&self, i: usize) -> DateTime<Utc> {
        self.start + self.interval * i as i32
    }

    pub fn missing_count(&self) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|c| c.is_none()).count())
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct Aligner {
    interval: Duration,
    max_gap: usize,
    bounds: PhysicalBounds,
    /// Shortest acceptable result (history length + horizon).
    min_rows: usize,
}

impl Aligner {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            interval: config.interval(),
            max_gap: config.max_gap,
            bounds: config.bounds,
            min_rows: config.history_length + config.horizon,
        }
    }

    /// Load, clean and regularize all sources in one go.
    pub fn align<S: SampleSource>(&self, sources: &[S]) -> Result<AlignedSeries, SoilcastError> {
        let samples = self.load(sources)?;
        self.align_samples(&samples)
    }

    /// Run every cleaning stage on already-loaded samples.
    pub fn align_samples(&self, samples: &[RawSample]) -> Result<AlignedSeries, SoilcastError> {
        let binned = self.resample(samples)?;
        let filled = self.interpolate(&binned);
        let clipped = self.clip(&filled);
        let series = self.finish(clipped)?;

        info!(
            samples = samples.len(),
            bins = binned.len(),
            rows = series.len(),
            channels = series.channel_count(),
            "series aligned"
        );
        Ok(series)
    }

    /// Concatenate all sources in order, keep the last-read row for each
    /// duplicated timestamp, and sort ascending.
    pub fn load<S: SampleSource>(&self, sources: &[S]) -> Result<Vec<RawSample>, SoilcastError> {
        if sources.is_empty() {
            return Err(SoilcastError::Data("no raw sources found".into()));
        }

        let mut all = Vec::new();
        for source in sources {
            let samples = source.read_samples()?;
            debug!(source = %source.label(), samples = samples.len(), "source read");
            all.extend(samples);
        }

        let total = all.len();
        // Stable sort: equal timestamps stay in read order, so the last one wins below.
        all.sort_by_key(|s| s.timestamp);

        let mut deduped: Vec<RawSample> = Vec::with_capacity(all.len());
        for sample in all {
            match deduped.last_mut() {
                Some(last) if last.timestamp == sample.timestamp => *last = sample,
                _ => deduped.push(sample),
            }
        }

        info!(
            sources = sources.len(),
            samples = total,
            duplicates = total - deduped.len(),
            "raw samples loaded"
        );
        Ok(deduped)
    }

    /// Bucket samples into epoch-aligned bins and average each channel.
    pub fn resample(&self, samples: &[RawSample]) -> Result<BinnedSeries, SoilcastError> {
        let step_ms = self.interval.num_milliseconds();
        if step_ms <= 0 {
            return Err(SoilcastError::Data(format!(
                "resample interval must be positive, got {step_ms}ms"
            )));
        }
        let bin_of = |ts: DateTime<Utc>| ts.timestamp_millis().div_euclid(step_ms);

        let (first_bin, last_bin) = samples
            .iter()
            .map(|s| bin_of(s.timestamp))
            .fold(None, |acc: Option<(i64, i64)>, b| match acc {
                Some((lo, hi)) => Some((lo.min(b), hi.max(b))),
                None => Some((b, b)),
            })
            .ok_or_else(|| SoilcastError::Data("no raw samples to align".into()))?;

        let n_bins = last_bin - first_bin + 1;
        if n_bins > MAX_BINS {
            return Err(SoilcastError::Data(format!(
                "samples span {n_bins} bins, more than the {MAX_BINS} allowed"
            )));
        }

        let channels = channels_present(samples);
        let width = channels.len();
        let n = n_bins as usize;
        let mut sums = vec![vec![0.0f64; width]; n];
        let mut counts = vec![vec![0usize; width]; n];

        for sample in samples {
            let b = (bin_of(sample.timestamp) - first_bin) as usize;
            for (j, channel) in channels.iter().enumerate() {
                if let Some(v) = sample.value(*channel) {
                    sums[b][j] += v;
                    counts[b][j] += 1;
                }
            }
        }

        let cells = sums
            .into_iter()
            .zip(counts)
            .map(|(row_sums, row_counts)| {
                row_sums
                    .into_iter()
                    .zip(row_counts)
                    .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
                    .collect()
            })
            .collect();

        let start = DateTime::from_timestamp_millis(first_bin * step_ms)
            .ok_or_else(|| SoilcastError::Data("first bin is out of the datetime range".into()))?;

        let binned = BinnedSeries {
            start,
            interval: self.interval,
            channels,
            cells,
        };
        debug!(bins = binned.len(), missing = binned.missing_count(), "samples resampled");
        Ok(binned)
    }

    /// Fill interior runs of at most `max_gap` missing bins per channel.
    ///
    /// Values are interpolated linearly in time between the bracketing
    /// observations. A trailing run of at most `max_gap` bins carries the last
    /// observation forward. Longer runs and leading runs stay missing.
    pub fn interpolate(&self, binned: &BinnedSeries) -> BinnedSeries {
        let mut cells = binned.cells.clone();
        let mut filled = 0usize;

        for j in 0..binned.channels.len() {
            let mut last_seen: Option<(usize, f64)> = None;
            for i in 0..cells.len() {
                let Some(value) = cells[i][j] else {
                    continue;
                };
                if let Some((l, left)) = last_seen {
                    let gap = i - l - 1;
                    if gap > 0 && gap <= self.max_gap {
                        // Bins are evenly spaced, so elapsed-time ratio == index ratio.
                        let span = (i - l) as f64;
                        for k in (l + 1)..i {
                            let frac = (k - l) as f64 / span;
                            cells[k][j] = Some(left + (value - left) * frac);
                        }
                        filled += gap;
                    }
                }
                last_seen = Some((i, value));
            }

            if let Some((l, last)) = last_seen {
                let trailing = cells.len() - l - 1;
                if trailing > 0 && trailing <= self.max_gap {
                    for row in &mut cells[l + 1..] {
                        row[j] = Some(last);
                    }
                    filled += trailing;
                }
            }
        }

        debug!(filled, max_gap = self.max_gap, "gaps interpolated");
        BinnedSeries {
            cells,
            ..binned.clone()
        }
    }

    /// Clamp every present value into its channel's physical bounds.
    /// Non-finite values are left untouched so `finish` can reject them.
    pub fn clip(&self, binned: &BinnedSeries) -> BinnedSeries {
        let mut clipped = 0usize;
        let cells = binned
            .cells
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&binned.channels)
                    .map(|(cell, channel)| {
                        cell.map(|v| {
                            if !v.is_finite() {
                                return v;
                            }
                            let c = self.bounds.for_channel(*channel).clamp(v);
                            if c != v {
                                clipped += 1;
                            }
                            c
                        })
                    })
                    .collect()
            })
            .collect();

        if clipped > 0 {
            debug!(clipped, "values clipped to physical bounds");
        }
        BinnedSeries {
            cells,
            ..binned.clone()
        }
    }

    /// Keep the most recent contiguous run of complete bins and validate it.
    pub fn finish(&self, binned: BinnedSeries) -> Result<AlignedSeries, SoilcastError> {
        let complete = |row: &Vec<Option<f64>>| row.iter().all(Option::is_some);

        let end = binned
            .cells
            .iter()
            .rposition(complete)
            .map(|i| i + 1)
            .ok_or_else(|| SoilcastError::Data("no complete rows after cleaning".into()))?;
        let begin = binned.cells[..end]
            .iter()
            .rposition(|row| !complete(row))
            .map_or(0, |i| i + 1);

        let kept = end - begin;
        let dropped = binned.len() - kept;
        if dropped > 0 {
            warn!(
                dropped,
                kept,
                "incomplete bins dropped, keeping the most recent contiguous run"
            );
        }

        if kept < self.min_rows {
            return Err(SoilcastError::Data(format!(
                "aligned series has {kept} rows, need at least {} (history + horizon)",
                self.min_rows
            )));
        }

        let rows: Vec<Vec<f64>> = binned.cells[begin..end]
            .iter()
            .map(|row| row.iter().flatten().copied().collect())
            .collect();

        let series = AlignedSeries::new(binned.timestamp(begin), binned.interval, binned.channels, rows)?;
        series.check_bounds(&self.bounds)?;
        Ok(series)
    }
}

/// Base channels, plus light when at least one sample carries it.
fn channels_present(samples: &[RawSample]) -> Vec<Channel> {
    let mut channels = BASE_CHANNELS.to_vec();
    if samples.iter().any(|s| s.light.is_some()) {
        channels.push(Channel::Light);
    }
    channels
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(hours: i64, minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
            + Duration::hours(hours)
            + Duration::minutes(minutes)
    }

    fn sample(hours: i64, moisture: f64, light: Option<f64>) -> RawSample {
        RawSample {
            timestamp: t(hours, 0),
            moisture,
            temperature: 20.0,
            humidity: 55.0,
            light,
        }
    }

    fn aligner(history: usize, horizon: usize, max_gap: usize) -> Aligner {
        Aligner::new(&PipelineConfig {
            history_length: history,
            horizon,
            max_gap,
            ..PipelineConfig::default()
        })
    }

    #[test]
    fn load_without_sources_is_data_error() {
        let sources: Vec<Vec<RawSample>> = Vec::new();
        let err = aligner(2, 1, 6).load(&sources).unwrap_err();
        assert!(matches!(err, SoilcastError::Data(_)));
    }

    #[test]
    fn load_keeps_latest_duplicate_and_sorts() {
        let first = vec![sample(2, 30.0, None), sample(0, 40.0, None)];
        let second = vec![sample(2, 50.0, None), sample(1, 35.0, None)];
        let loaded = aligner(2, 1, 6).load(&[first, second]).unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].timestamp, t(0, 0));
        assert_eq!(loaded[1].timestamp, t(1, 0));
        assert_eq!(loaded[2].moisture, 50.0);
    }

    #[test]
    fn resample_averages_within_bin() {
        let samples = vec![
            RawSample { timestamp: t(0, 10), ..sample(0, 40.0, None) },
            RawSample { timestamp: t(0, 50), ..sample(0, 44.0, None) },
            sample(1, 38.0, None),
        ];
        let binned = aligner(1, 1, 6).resample(&samples).unwrap();

        assert_eq!(binned.start, t(0, 0));
        assert_eq!(binned.len(), 2);
        assert_eq!(binned.channels, BASE_CHANNELS.to_vec());
        assert_eq!(binned.cells[0][0], Some(42.0));
        assert_eq!(binned.cells[1][0], Some(38.0));
    }

    #[test]
    fn resample_marks_empty_bins_missing() {
        let samples = vec![sample(0, 40.0, None), sample(3, 37.0, None)];
        let binned = aligner(1, 1, 6).resample(&samples).unwrap();
        assert_eq!(binned.len(), 4);
        assert_eq!(binned.cells[1][0], None);
        assert_eq!(binned.missing_count(), 2 * 3);
    }

    #[test]
    fn light_channel_only_when_present() {
        let without = aligner(1, 1, 6).resample(&[sample(0, 40.0, None)]).unwrap();
        assert!(!without.channels.contains(&Channel::Light));

        let with = aligner(1, 1, 6)
            .resample(&[sample(0, 40.0, None), sample(1, 39.0, Some(300.0))])
            .unwrap();
        assert_eq!(with.channels.last(), Some(&Channel::Light));
        assert_eq!(with.cells[0][3], None);
        assert_eq!(with.cells[1][3], Some(300.0));
    }

    #[test]
    fn interpolate_fills_short_gaps_linearly() {
        let samples = vec![sample(0, 40.0, None), sample(3, 34.0, None)];
        let a = aligner(1, 1, 2);
        let filled = a.interpolate(&a.resample(&samples).unwrap());

        assert_eq!(filled.cells[1][0], Some(38.0));
        assert_eq!(filled.cells[2][0], Some(36.0));
        assert_eq!(filled.missing_count(), 0);
    }

    #[test]
    fn interpolate_leaves_long_gaps_missing() {
        let samples = vec![sample(0, 40.0, None), sample(4, 32.0, None)];
        let a = aligner(1, 1, 2);
        let filled = a.interpolate(&a.resample(&samples).unwrap());

        for i in 1..4 {
            assert_eq!(filled.cells[i][0], None, "bin {i} should stay missing");
        }
    }

    #[test]
    fn interpolate_fills_trailing_but_not_leading_edge() {
        let samples = vec![sample(0, 40.0, None), sample(1, 39.0, Some(100.0)), sample(2, 38.0, None)];
        let a = aligner(1, 1, 6);
        let filled = a.interpolate(&a.resample(&samples).unwrap());
        assert_eq!(filled.cells[0][3], None);
        assert_eq!(filled.cells[2][3], Some(100.0));
    }

    #[test]
    fn trailing_run_longer_than_max_gap_stays_missing() {
        let samples: Vec<RawSample> = (0..6)
            .map(|h| sample(h, 50.0, if h < 2 { Some(10.0) } else { None }))
            .collect();
        let a = aligner(1, 1, 3);
        let filled = a.interpolate(&a.resample(&samples).unwrap());
        assert!((2..6).all(|i| filled.cells[i][3].is_none()));
    }

    #[test]
    fn newest_reading_kept_when_a_channel_lapses() {
        // light reported for hours 0-8 only; the hour-9 reading must survive
        let samples: Vec<RawSample> = (0..10)
            .map(|h| sample(h, 50.0 - h as f64, if h < 9 { Some(200.0) } else { None }))
            .collect();
        let series = aligner(4, 2, 6).align(&[samples]).unwrap();

        assert_eq!(series.len(), 10);
        assert_eq!(series.rows().last().unwrap()[0], 41.0);
        assert_eq!(series.rows().last().unwrap()[3], 200.0);
        assert_eq!(series.timestamp(9), series.start() + Duration::hours(9));
    }

    #[test]
    fn clip_enforces_physical_bounds() {
        let samples = vec![sample(0, 105.0, Some(-5.0)), sample(1, 50.0, Some(20.0))];
        let a = aligner(1, 1, 6);
        let clipped = a.clip(&a.resample(&samples).unwrap());

        assert_eq!(clipped.cells[0][0], Some(100.0));
        assert_eq!(clipped.cells[0][3], Some(0.0));
        assert_eq!(clipped.cells[1][0], Some(50.0));
    }

    #[test]
    fn align_produces_gap_free_grid() {
        let samples: Vec<RawSample> = (0..10)
            .filter(|h| *h != 4)
            .map(|h| sample(h, 50.0 - h as f64, Some(10.0)))
            .collect();
        let series = aligner(4, 2, 6).align(&[samples]).unwrap();

        assert_eq!(series.len(), 10);
        assert_eq!(series.start(), t(0, 0));
        assert_eq!(series.interval(), Duration::hours(1));
        assert_eq!(series.row(4).unwrap()[0], 46.0);
    }

    #[test]
    fn finish_keeps_latest_contiguous_run() {
        // Hours 0-2, a 5-bin hole (longer than max_gap), then hours 8-12.
        let mut samples: Vec<RawSample> = (0..3).map(|h| sample(h, 40.0, None)).collect();
        samples.extend((8..13).map(|h| sample(h, 30.0, None)));
        let series = aligner(3, 1, 2).align_samples(&samples).unwrap();

        assert_eq!(series.len(), 5);
        assert_eq!(series.start(), t(8, 0));
    }

    #[test]
    fn too_short_series_is_data_error() {
        let samples: Vec<RawSample> = (0..5).map(|h| sample(h, 40.0, None)).collect();
        let err = aligner(24, 6, 6).align_samples(&samples).unwrap_err();
        assert!(err.to_string().contains("need at least 30"));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut samples: Vec<RawSample> = (0..4).map(|h| sample(h, 40.0, None)).collect();
        samples[2].temperature = f64::NAN;
        let err = aligner(2, 1, 6).align_samples(&samples).unwrap_err();
        assert!(matches!(err, SoilcastError::Data(_)));
    }
}
