//! Train/test partitioning

use crate::error::{AutoMlError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Row indices of a train/test partition, each sorted ascending
#[derive(Debug, Clone, PartialEq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Number of test rows for `n` samples: `ceil(n * fraction)`, leaving at
/// least one row on each side
pub fn test_size(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).ceil() as usize).clamp(1, n.saturating_sub(1).max(1))
}

/// Shuffle-split `n` rows. When `strata` is given (one class id per row) the
/// split preserves each class's share in both partitions.
pub fn train_test_split(
    n: usize,
    test_fraction: f64,
    strata: Option<&[usize]>,
    seed: u64,
) -> Result<SplitIndices> {
    if n < 2 {
        return Err(AutoMlError::DataError(format!(
            "Need at least 2 rows to split, got {}",
            n
        )));
    }
    let n_test = test_size(n, test_fraction);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let (mut train, mut test) = match strata {
        None => {
            let mut indices: Vec<usize> = (0..n).collect();
            indices.shuffle(&mut rng);
            let test = indices.split_off(n - n_test);
            (indices, test)
        }
        Some(labels) => stratified(labels, n_test, &mut rng)?,
    };

    train.sort_unstable();
    test.sort_unstable();
    Ok(SplitIndices { train, test })
}

fn stratified(
    labels: &[usize],
    n_test: usize,
    rng: &mut ChaCha8Rng,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n = labels.len();
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }

    if let Some((class, _)) = groups.iter().find(|(_, rows)| rows.len() < 2) {
        return Err(AutoMlError::DataError(format!(
            "The least populated class ({}) has only 1 member; stratified split needs at least 2",
            class
        )));
    }

    // Largest-remainder allocation of test rows across classes
    let mut alloc: Vec<(usize, usize, f64)> = groups
        .iter()
        .map(|(&class, rows)| {
            let exact = rows.len() as f64 * n_test as f64 / n as f64;
            (class, exact.floor() as usize, exact - exact.floor())
        })
        .collect();

    let assigned: usize = alloc.iter().map(|a| a.1).sum();
    let mut order: Vec<usize> = (0..alloc.len()).collect();
    order.sort_by(|&a, &b| alloc[b].2.total_cmp(&alloc[a].2).then(a.cmp(&b)));
    for &k in order.iter().take(n_test.saturating_sub(assigned)) {
        alloc[k].1 += 1;
    }

    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (class, class_test, _) in alloc {
        let mut rows = groups.remove(&class).unwrap_or_default();
        rows.shuffle(rng);
        let class_test = class_test.min(rows.len() - 1);
        let held_out = rows.split_off(rows.len() - class_test);
        train.extend(rows);
        test.extend(held_out);
    }
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_and_disjoint() {
        let split = train_test_split(100, 0.2, None, 42).unwrap();
        assert_eq!(split.train.len(), 80);
        assert_eq!(split.test.len(), 20);
        assert!(split.test.iter().all(|i| !split.train.contains(i)));
    }

    #[test]
    fn test_rounds_test_size_up() {
        let split = train_test_split(11, 0.2, None, 1).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn test_stratified_preserves_proportions() {
        let labels: Vec<usize> = (0..100).map(|i| if i < 70 { 0 } else { 1 }).collect();
        let split = train_test_split(100, 0.2, Some(&labels), 42).unwrap();

        let test_ones = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(split.test.len(), 20);
        assert_eq!(test_ones, 6);
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = train_test_split(50, 0.3, None, 7).unwrap();
        let b = train_test_split(50, 0.3, None, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_singleton_class_rejected() {
        let labels = vec![0, 0, 0, 1];
        assert!(train_test_split(4, 0.25, Some(&labels), 0).is_err());
    }
}
