//! Fixed-length windows over a normalized series.

use serde::{Deserialize, Serialize};

use soilcast_core::{AlignedSeries, Channel, SoilcastError};

/// `history_length` consecutive rows, oldest first. Never mutated: rolling
/// forward builds a new window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    rows: Vec<Vec<f64>>,
}

impl Window {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, SoilcastError> {
        let width = match rows.first() {
            Some(first) if !first.is_empty() => first.len(),
            _ => return Err(SoilcastError::Data("window needs at least one non-empty row".into())),
        };
        if let Some(i) = rows.iter().position(|r| r.len() != width) {
            return Err(SoilcastError::Data(format!(
                "window row {i} has {} values, expected {width}",
                rows[i].len()
            )));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn last_row(&self) -> &[f64] {
        self.rows.last().map_or(&[], Vec::as_slice)
    }

    /// Value of column `index` in the most recent row.
    pub fn last_value(&self, index: usize) -> Result<f64, SoilcastError> {
        self.last_row().get(index).copied().ok_or_else(|| {
            SoilcastError::Data(format!(
                "column {index} out of range for a window with {} channels",
                self.channel_count()
            ))
        })
    }

    /// Drop the oldest row and append a copy of the last row whose column
    /// `target` holds `value`. Other columns carry over unchanged.
    pub fn roll_forward(&self, target: usize, value: f64) -> Result<Window, SoilcastError> {
        let mut next_row = self.last_row().to_vec();
        let slot = next_row.get_mut(target).ok_or_else(|| {
            SoilcastError::Data(format!(
                "target column {target} out of range for a window with {} channels",
                self.channel_count()
            ))
        })?;
        *slot = value;

        let mut rows = Vec::with_capacity(self.rows.len());
        rows.extend(self.rows.iter().skip(1).cloned());
        rows.push(next_row);
        Ok(Window { rows })
    }

    /// Row-major copy of every value.
    pub fn flatten(&self) -> Vec<f64> {
        self.rows.iter().flatten().copied().collect()
    }
}

impl AsRef<Window> for Window {
    fn as_ref(&self) -> &Window {
        self
    }
}

/// A window plus the target value `horizon` steps after its last row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledWindow {
    pub window: Window,
    pub target: f64,
}

impl AsRef<Window> for LabeledWindow {
    fn as_ref(&self) -> &Window {
        &self.window
    }
}

/// Number of windows a series of `len` rows yields.
pub fn window_count(len: usize, history_length: usize, horizon: usize) -> usize {
    (len + 1).saturating_sub(history_length + horizon)
}

/// Slide a stride-1 window over `series`.
///
/// Window `i` covers rows `[i, i + history_length)`; its target is the
/// `target` value at row `i + history_length + horizon - 1`. A series too
/// short for a single window yields an empty vector.
pub fn build_windows(
    series: &AlignedSeries,
    history_length: usize,
    horizon: usize,
    target: Channel,
) -> Result<Vec<LabeledWindow>, SoilcastError> {
    if history_length == 0 || horizon == 0 {
        return Err(SoilcastError::Data(format!(
            "history length and horizon must be positive, got {history_length} and {horizon}"
        )));
    }
    let target_idx = series
        .channel_index(target)
        .ok_or_else(|| SoilcastError::Data(format!("series has no {target} channel")))?;

    let rows = series.rows();
    let count = window_count(rows.len(), history_length, horizon);
    let windows = (0..count)
        .map(|i| LabeledWindow {
            window: Window {
                rows: rows[i..i + history_length].to_vec(),
            },
            target: rows[i + history_length + horizon - 1][target_idx],
        })
        .collect();
    Ok(windows)
}

/// The last `history_length` rows as an unlabeled window, the forecast seed.
pub fn latest_window(series: &AlignedSeries, history_length: usize) -> Option<Window> {
    if history_length == 0 || series.len() < history_length {
        return None;
    }
    Some(Window {
        rows: series.rows()[series.len() - history_length..].to_vec(),
    })
}
