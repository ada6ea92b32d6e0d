//! Deterministic fit/hold-out and stratified fold partitioning.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::error::ForestError;

/// Index partition of a dataset into a fit part and a hold-out part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldoutSplit {
    /// Row indices used for fitting.
    pub train: Vec<usize>,
    /// Row indices held out for reporting.
    pub test: Vec<usize>,
}

/// Shuffle `0..n_samples` with `seed` and hold out `ceil(test_fraction * n)` rows.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ForestError::InvalidTestFraction`] | `test_fraction` outside (0.0, 1.0) |
/// | [`ForestError::EmptyDataset`] | either side of the split would be empty |
pub fn train_test_split(
    n_samples: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<HoldoutSplit, ForestError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ForestError::InvalidTestFraction {
            fraction: test_fraction,
        });
    }
    let n_test = (n_samples as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(ForestError::EmptyDataset);
    }

    let mut order: Vec<usize> = (0..n_samples).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    let train = order.split_off(n_test);
    Ok(HoldoutSplit { train, test: order })
}

/// Assign every row to one of `n_folds` folds, keeping the class balance.
///
/// Rows are grouped by label, shuffled within each group and dealt
/// round-robin.
pub(crate) fn stratified_folds(
    labels: &[bool],
    n_folds: usize,
    seed: u64,
) -> Result<Vec<usize>, ForestError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut negative: Vec<usize> = Vec::new();
    let mut positive: Vec<usize> = Vec::new();
    for (i, &label) in labels.iter().enumerate() {
        if label {
            positive.push(i);
        } else {
            negative.push(i);
        }
    }

    for (class, group) in [("negative", &negative), ("positive", &positive)] {
        if !group.is_empty() && group.len() < n_folds {
            return Err(ForestError::TooFewSamplesForFolds {
                class,
                count: group.len(),
                n_folds,
            });
        }
    }

    let mut assignment = vec![0usize; labels.len()];
    for group in [&mut negative, &mut positive] {
        group.shuffle(&mut rng);
        for (j, &idx) in group.iter().enumerate() {
            assignment[idx] = j % n_folds;
        }
    }
    Ok(assignment)
}
