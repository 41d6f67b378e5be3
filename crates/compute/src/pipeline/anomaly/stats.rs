//! Population statistics over error samples.

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`, not `n - 1`).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - m;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    Some(variance.sqrt())
}

/// `(mean, population std)` in one call.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    Some((mean(values)?, population_std(values)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_stats() {
        assert!(mean(&[]).is_none());
        assert!(mean_std(&[]).is_none());
    }

    #[test]
    fn constant_values_have_zero_spread() {
        assert_eq!(mean_std(&[1.0, 1.0, 1.0, 1.0]), Some((1.0, 0.0)));
    }

    #[test]
    fn population_not_sample_std() {
        // sqrt(((1-2)^2 + (3-2)^2) / 2) = 1
        let s = population_std(&[1.0, 3.0]).unwrap();
        assert!((s - 1.0).abs() < 1e-12);
        let s = population_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((s - 2.0).abs() < 1e-12);
    }
}
