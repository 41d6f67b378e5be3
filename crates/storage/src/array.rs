//! Self-describing numeric arrays.
//!
//! Each array is a JSON document `{name, version, shape, data}` with `data`
//! in row-major order. `f64` values round-trip exactly.

use serde::{Deserialize, Serialize};

use soilcast_compute::{LabeledWindow, Window};

use crate::error::StorageError;

pub const ARRAY_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericArray {
    pub name: String,
    pub version: u32,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl NumericArray {
    pub fn new(name: &str, shape: Vec<usize>, data: Vec<f64>) -> Result<Self, StorageError> {
        let array = Self {
            name: name.to_owned(),
            version: ARRAY_FORMAT_VERSION,
            shape,
            data,
        };
        array.validate()?;
        Ok(array)
    }

    /// A zero-dimensional array holding one value.
    pub fn scalar(name: &str, value: f64) -> Self {
        Self {
            name: name.to_owned(),
            version: ARRAY_FORMAT_VERSION,
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn vector(name: &str, values: &[f64]) -> Self {
        Self {
            name: name.to_owned(),
            version: ARRAY_FORMAT_VERSION,
            shape: vec![values.len()],
            data: values.to_vec(),
        }
    }

    /// `[n, history_length, channels]` from window histories. An empty
    /// collection is stored with shape `[0, 0, 0]`.
    pub fn from_windows<W: AsRef<Window>>(name: &str, windows: &[W]) -> Result<Self, StorageError> {
        let (h, c) = windows
            .first()
            .map(|w| (w.as_ref().len(), w.as_ref().channel_count()))
            .unwrap_or((0, 0));
        let mut data = Vec::with_capacity(windows.len() * h * c);
        for w in windows {
            data.extend(w.as_ref().flatten());
        }
        Self::new(name, vec![windows.len(), h, c], data)
    }

    pub fn from_window(name: &str, window: &Window) -> Result<Self, StorageError> {
        Self::new(name, vec![window.len(), window.channel_count()], window.flatten())
    }

    pub fn from_targets(name: &str, windows: &[LabeledWindow]) -> Self {
        let targets: Vec<f64> = windows.iter().map(|w| w.target).collect();
        Self::vector(name, &targets)
    }

    /// Check the format version and that `shape` accounts for every value.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.version != ARRAY_FORMAT_VERSION {
            return Err(self.invalid(format!(
                "unsupported version {} (expected {ARRAY_FORMAT_VERSION})",
                self.version
            )));
        }
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(self.invalid(format!(
                "shape {:?} needs {expected} values, found {}",
                self.shape,
                self.data.len()
            )));
        }
        Ok(())
    }

    pub fn to_scalar(&self) -> Result<f64, StorageError> {
        match (self.shape.as_slice(), self.data.as_slice()) {
            ([], [v]) => Ok(*v),
            _ => Err(self.invalid(format!("expected a scalar, shape is {:?}", self.shape))),
        }
    }

    pub fn to_vector(&self) -> Result<Vec<f64>, StorageError> {
        match self.shape.as_slice() {
            [_] => Ok(self.data.clone()),
            _ => Err(self.invalid(format!("expected a vector, shape is {:?}", self.shape))),
        }
    }

    pub fn to_window(&self) -> Result<Window, StorageError> {
        match *self.shape.as_slice() {
            [h, c] if h > 0 && c > 0 => {
                let rows = self.data.chunks(c).map(<[f64]>::to_vec).collect();
                Ok(Window::new(rows)?)
            }
            _ => Err(self.invalid(format!("expected a [h, c] window, shape is {:?}", self.shape))),
        }
    }

    pub fn to_windows(&self) -> Result<Vec<Window>, StorageError> {
        match *self.shape.as_slice() {
            [0, _, _] => Ok(Vec::new()),
            [_, h, c] if h > 0 && c > 0 => self
                .data
                .chunks(h * c)
                .map(|chunk| {
                    let rows = chunk.chunks(c).map(<[f64]>::to_vec).collect();
                    Window::new(rows).map_err(StorageError::from)
                })
                .collect(),
            _ => Err(self.invalid(format!("expected [n, h, c] windows, shape is {:?}", self.shape))),
        }
    }

    fn invalid(&self, reason: String) -> StorageError {
        StorageError::Format {
            name: self.name.clone(),
            reason,
        }
    }
}

/// Pair window histories with their targets.
pub fn labeled_windows(x: &NumericArray, y: &NumericArray) -> Result<Vec<LabeledWindow>, StorageError> {
    let windows = x.to_windows()?;
    let targets = y.to_vector()?;
    if windows.len() != targets.len() {
        return Err(StorageError::Format {
            name: y.name.clone(),
            reason: format!(
                "{} targets for {} windows in {}",
                targets.len(),
                windows.len(),
                x.name
            ),
        });
    }
    Ok(windows
        .into_iter()
        .zip(targets)
        .map(|(window, target)| LabeledWindow { window, target })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(n: usize) -> Vec<LabeledWindow> {
        (0..n)
            .map(|i| LabeledWindow {
                window: Window::new(vec![vec![i as f64, 0.1], vec![i as f64 + 0.5, 0.2]]).unwrap(),
                target: i as f64 / 3.0,
            })
            .collect()
    }

    #[test]
    fn windows_keep_shape() {
        let x = NumericArray::from_windows("x_train", &labeled(3)).unwrap();
        assert_eq!(x.shape, vec![3, 2, 2]);
        assert_eq!(x.data.len(), 12);

        let y = NumericArray::from_targets("y_train", &labeled(3));
        let back = labeled_windows(&x, &y).unwrap();
        assert_eq!(back, labeled(3));
    }

    #[test]
    fn empty_windows_round_trip() {
        let x = NumericArray::from_windows::<LabeledWindow>("x_val", &[]).unwrap();
        assert_eq!(x.shape, vec![0, 0, 0]);
        assert!(x.to_windows().unwrap().is_empty());
    }

    #[test]
    fn json_preserves_exact_floats() {
        let values = [0.1 + 0.2, 1.0 / 3.0, 2.0f64.sqrt(), 1e-300];
        let a = NumericArray::vector("val_errors", &values);
        let json = serde_json::to_string(&a).unwrap();
        let back: NumericArray = serde_json::from_str(&json).unwrap();
        assert_eq!(back.data, values.to_vec());
    }

    #[test]
    fn shape_mismatch_rejected() {
        let err = NumericArray::new("bad", vec![2, 3], vec![1.0; 5]).unwrap_err();
        assert!(err.to_string().contains("needs 6 values"));
    }

    #[test]
    fn scalar_and_vector_are_distinct() {
        let s = NumericArray::scalar("anomaly_threshold", 0.25);
        assert_eq!(s.to_scalar().unwrap(), 0.25);
        assert!(s.to_vector().is_err());
        assert!(NumericArray::vector("v", &[1.0]).to_scalar().is_err());
    }

    #[test]
    fn mismatched_targets_rejected() {
        let x = NumericArray::from_windows("x", &labeled(3)).unwrap();
        let y = NumericArray::from_targets("y", &labeled(2));
        assert!(labeled_windows(&x, &y).is_err());
    }
}
