//! Chronological train/validation cut.

use soilcast_core::SoilcastError;

use super::window::window_count;

/// Borrowed, order-preserving partition of a window collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split<'a, T> {
    pub train: &'a [T],
    pub validation: &'a [T],
}

fn check_fraction(fraction: f64) -> Result<(), SoilcastError> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(SoilcastError::Data(format!(
            "train fraction must be in (0, 1], got {fraction}"
        )));
    }
    Ok(())
}

/// `floor(fraction * n)`.
pub fn train_count(n: usize, fraction: f64) -> Result<usize, SoilcastError> {
    check_fraction(fraction)?;
    Ok(((n as f64) * fraction).floor() as usize)
}

/// First `floor(fraction * n)` items are train, the rest validation.
pub fn split<T>(items: &[T], fraction: f64) -> Result<Split<'_, T>, SoilcastError> {
    let cut = train_count(items.len(), fraction)?;
    let (train, validation) = items.split_at(cut);
    Ok(Split { train, validation })
}

/// Leading series rows touched by the train windows, histories and targets
/// both. Fitting the scaler on these rows keeps validation data out of it.
pub fn train_row_count(
    len: usize,
    history_length: usize,
    horizon: usize,
    fraction: f64,
) -> Result<usize, SoilcastError> {
    let n_train = train_count(window_count(len, history_length, horizon), fraction)?;
    if n_train == 0 {
        return Ok(0);
    }
    Ok(n_train + history_length + horizon - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_windows_split_eighty_twenty() {
        let items: Vec<usize> = (0..100).collect();
        let s = split(&items, 0.8).unwrap();
        assert_eq!(s.train.len(), 80);
        assert_eq!(s.validation.len(), 20);
        assert_eq!(s.train.first(), Some(&0));
        assert_eq!(s.train.last(), Some(&79));
        assert_eq!(s.validation.first(), Some(&80));
        assert_eq!(s.validation.last(), Some(&99));
    }

    #[test]
    fn floor_applies() {
        let items = [1, 2, 3];
        let s = split(&items, 0.5).unwrap();
        assert_eq!(s.train, &[1]);
        assert_eq!(s.validation, &[2, 3]);
    }

    #[test]
    fn empty_input_splits_empty() {
        let items: [u8; 0] = [];
        let s = split(&items, 0.8).unwrap();
        assert!(s.train.is_empty() && s.validation.is_empty());
    }

    #[test]
    fn fraction_out_of_range_rejected() {
        assert!(split(&[1, 2], 0.0).is_err());
        assert!(split(&[1, 2], 1.5).is_err());
        assert!(split(&[1, 2], f64::NAN).is_err());
    }

    #[test]
    fn full_fraction_leaves_validation_empty() {
        let items: Vec<usize> = (0..10).collect();
        let s = split(&items, 1.0).unwrap();
        assert_eq!(s.train.len(), 10);
        assert!(s.validation.is_empty());
        // 100 rows, H=24, Z=6 -> 71 windows, all train; every row is used.
        assert_eq!(train_row_count(100, 24, 6, 1.0).unwrap(), 100);
    }

    #[test]
    fn train_rows_cover_train_targets() {
        // 100 rows, H=24, Z=6 -> 71 windows, 56 train; last train target row = 55+29 = 84.
        assert_eq!(train_row_count(100, 24, 6, 0.8).unwrap(), 85);
        assert_eq!(train_row_count(10, 24, 6, 0.8).unwrap(), 0);
    }
}
