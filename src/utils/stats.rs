//! Descriptive statistics over plain slices

use std::collections::HashMap;

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    let n = values.len();
    if n <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (n - ddof) as f64).sqrt())
}

/// Adjusted Fisher-Pearson skewness (G1).
///
/// Returns `None` for fewer than three values and `Some(0.0)` for a
/// constant column.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let m = mean(values)?;
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nf;
    if m2 <= f64::EPSILON {
        return Some(0.0);
    }
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / nf;
    let g1 = m3 / m2.powf(1.5);
    Some(g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0))
}

/// Most frequent value. Ties resolve to the smallest value.
pub fn numeric_mode(values: &[f64]) -> Option<f64> {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in values {
        counts.entry(v.to_bits()).or_insert((v, 0)).1 += 1;
    }
    counts
        .into_values()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.total_cmp(&a.0)))
        .map(|(v, _)| v)
}

/// Most frequent string. Ties resolve to the lexicographically smallest.
pub fn string_mode<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
        .map(|(v, _)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), Some(5.0));
        assert!((std_dev(&v, 0).unwrap() - 2.0).abs() < 1e-12);
        assert!(std_dev(&[1.0], 1).is_none());
    }

    #[test]
    fn test_skewness_sign() {
        let right = [1.0, 1.0, 1.0, 2.0, 10.0];
        assert!(skewness(&right).unwrap() > 0.0);
        assert_eq!(skewness(&[3.0, 3.0, 3.0]), Some(0.0));
        assert!(skewness(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_modes_break_ties_low() {
        assert_eq!(numeric_mode(&[3.0, 1.0, 3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(string_mode(["b", "a", "b", "a"]), Some("a".to_string()));
        assert_eq!(string_mode(["x", "y", "y"]), Some("y".to_string()));
    }
}
