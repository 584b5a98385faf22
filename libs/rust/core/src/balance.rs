//! Synthetic minority oversampling (SMOTE).
//!
//! Minority classes are grown to the majority count by interpolating between
//! each minority sample and one of its k nearest same-class neighbors.
//! Balancing is best-effort: when a class has fewer than two samples, or
//! synthesis fails for any reason, the original dataset is returned unchanged
//! and class weighting compensates downstream.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::dataset::{ClassDistribution, Dataset};

const MAX_NEIGHBORS: usize = 3;
const OVERSAMPLE_SEED: u64 = 42;

pub fn balance(dataset: Dataset) -> Dataset {
    let dist = dataset.class_distribution();
    info!(distribution = ?dist, "class distribution before balancing");

    let Some(&min_count) = dist.values().min() else {
        return dataset;
    };
    if min_count < 2 {
        warn!(
            min_count,
            "a class has fewer than 2 samples, skipping oversampling and relying on class weights"
        );
        return dataset;
    }

    let max_count = dist.values().copied().max().unwrap_or(0);
    let k = MAX_NEIGHBORS.min(min_count - 1);
    info!(k_neighbors = k, min_count, "oversampling minority classes");

    match synthesize(&dataset, &dist, max_count, k) {
        Some(balanced) => {
            info!(distribution = ?balanced.class_distribution(), "class distribution after balancing");
            balanced
        }
        None => {
            warn!("synthetic oversampling failed, falling back to the original dataset");
            dataset
        }
    }
}

fn synthesize(
    dataset: &Dataset,
    dist: &ClassDistribution,
    target: usize,
    k: usize,
) -> Option<Dataset> {
    let mut rng = StdRng::seed_from_u64(OVERSAMPLE_SEED);
    let mut features: Vec<Vec<f32>> = dataset.features().to_vec();
    let mut labels: Vec<u32> = dataset.labels().to_vec();

    for (&class, &count) in dist {
        if count >= target {
            continue;
        }
        let members: Vec<usize> = dataset
            .labels()
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        let neighbors = nearest_neighbors(dataset, &members, k)?;

        for n in 0..(target - count) {
            let slot = n % members.len();
            let base = members[slot];
            let pool = &neighbors[slot];
            if pool.is_empty() {
                return None;
            }
            let partner = pool[rng.gen_range(0..pool.len())];
            let gap: f32 = rng.gen();
            let row: Vec<f32> = dataset
                .row(base)
                .iter()
                .zip(dataset.row(partner))
                .map(|(a, b)| a + gap * (b - a))
                .collect();
            features.push(row);
            labels.push(class);
        }
    }

    Dataset::new(features, labels).ok()
}

/// For each member index, its k nearest other members by Euclidean distance.
fn nearest_neighbors(dataset: &Dataset, members: &[usize], k: usize) -> Option<Vec<Vec<usize>>> {
    let mut out = Vec::with_capacity(members.len());
    for &i in members {
        let mut dists: Vec<(f32, usize)> = members
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| (euclidean(dataset.row(i), dataset.row(j)), j))
            .collect();
        if dists.is_empty() {
            return None;
        }
        dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        dists.truncate(k);
        out.push(dists.into_iter().map(|(_, j)| j).collect());
    }
    Some(out)
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(rows: Vec<Vec<f32>>, labels: Vec<u32>) -> Dataset {
        Dataset::new(rows, labels).unwrap()
    }

    #[test]
    fn balances_every_class_to_the_majority_count() {
        let ds = dataset(
            vec![
                vec![0.0, 0.0],
                vec![0.1, 0.1],
                vec![0.2, 0.0],
                vec![0.0, 0.2],
                vec![5.0, 5.0],
                vec![5.1, 5.2],
            ],
            vec![0, 0, 0, 0, 1, 1],
        );
        let before = ds.class_distribution();
        let balanced = balance(ds);
        let after = balanced.class_distribution();

        assert_eq!(after[&0], 4);
        assert_eq!(after[&1], 4);
        for (class, count) in &before {
            assert!(after[class] >= *count, "class {class} shrank");
        }
        assert_eq!(balanced.len(), 8);
    }

    #[test]
    fn synthetic_rows_interpolate_within_the_class() {
        let ds = dataset(
            vec![
                vec![0.0],
                vec![1.0],
                vec![2.0],
                vec![10.0],
                vec![11.0],
            ],
            vec![0, 0, 0, 1, 1],
        );
        let balanced = balance(ds);
        for (row, &label) in balanced.features().iter().zip(balanced.labels()) {
            if label == 1 {
                assert!(row[0] >= 10.0 && row[0] <= 11.0, "off-manifold sample {}", row[0]);
            }
        }
    }

    #[test]
    fn singleton_class_returns_input_unchanged() {
        let ds = dataset(
            vec![
                vec![0.0],
                vec![0.1],
                vec![0.2],
                vec![0.3],
                vec![0.4],
                vec![9.0],
            ],
            vec![0, 0, 0, 0, 0, 1],
        );
        let original = ds.clone();
        let out = balance(ds);
        assert_eq!(out, original);
    }

    #[test]
    fn already_balanced_dataset_is_untouched_in_size() {
        let ds = dataset(
            vec![vec![0.0], vec![0.5], vec![4.0], vec![4.5]],
            vec![0, 0, 1, 1],
        );
        let out = balance(ds);
        assert_eq!(out.len(), 4);
    }
}
