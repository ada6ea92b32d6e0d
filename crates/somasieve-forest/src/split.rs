use rand::Rng;

use crate::node::{ClassCounts, FeatureIndex, Impurity};

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// An empty node is pure.
    #[must_use]
    pub fn impurity(&self, counts: ClassCounts) -> Impurity {
        let n = counts.total();
        if n == 0 {
            return Impurity::new(0.0);
        }
        let p = [
            counts.negative as f64 / n as f64,
            counts.positive as f64 / n as f64,
        ];
        let value = match self {
            SplitCriterion::Gini => 1.0 - p.iter().map(|q| q * q).sum::<f64>(),
            SplitCriterion::Entropy => -p
                .iter()
                .filter(|&&q| q > 0.0)
                .map(|q| q * q.ln())
                .sum::<f64>(),
        };
        Impurity::new(value)
    }
}

impl std::fmt::Display for SplitCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitCriterion::Gini => f.write_str("gini"),
            SplitCriterion::Entropy => f.write_str("entropy"),
        }
    }
}

/// How candidate thresholds are chosen at each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    /// Scan every midpoint between sorted distinct values (CART).
    Exact,
    /// Draw one uniform threshold per candidate feature between the node's
    /// minimum and maximum (extremely randomized trees).
    ExtraTrees,
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    /// Weighted impurity decrease from this split (MDI formula).
    pub(crate) impurity_decrease: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Shared inputs for the split search at one node.
pub(crate) struct SplitContext<'a> {
    /// Column-major: `features[feature_idx][sample_idx]`.
    pub(crate) features: &'a [Vec<f64>],
    pub(crate) labels: &'a [bool],
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_features: usize,
    pub(crate) min_samples_leaf: usize,
}

/// Find the best split for the samples at `sample_indices`.
///
/// Returns `None` when no valid split exists (all candidate features
/// constant, or every split would violate `min_samples_leaf`).
pub(crate) fn find_split(
    ctx: &SplitContext<'_>,
    method: SplitMethod,
    sample_indices: &[usize],
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    if sample_indices.is_empty() || ctx.features.is_empty() {
        return None;
    }
    let parent = ClassCounts::tally(ctx.labels, sample_indices);
    let best = match method {
        SplitMethod::Exact => best_exact(ctx, sample_indices, parent, rng),
        SplitMethod::ExtraTrees => best_random(ctx, sample_indices, parent, rng),
    };
    let (feature, threshold, impurity_decrease) = best?;

    let column = &ctx.features[feature.index()];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .partition(|&&si| column[si] <= threshold);

    Some(SplitResult {
        feature,
        threshold,
        impurity_decrease,
        left_indices,
        right_indices,
    })
}

/// Weighted impurity decrease of a parent split into `left`/`right`.
fn decrease(criterion: SplitCriterion, parent: ClassCounts, left: ClassCounts, right: ClassCounts) -> f64 {
    parent.total() as f64 * criterion.impurity(parent).value()
        - left.total() as f64 * criterion.impurity(left).value()
        - right.total() as f64 * criterion.impurity(right).value()
}

/// Feature indices in a random order.
fn shuffled_features(n_features: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n_features).collect();
    for i in 0..n_features {
        let j = rng.gen_range(i..n_features);
        order.swap(i, j);
    }
    order
}

fn best_exact(
    ctx: &SplitContext<'_>,
    sample_indices: &[usize],
    parent: ClassCounts,
    rng: &mut impl Rng,
) -> Option<(FeatureIndex, f64, f64)> {
    let n_samples = sample_indices.len();
    let order = shuffled_features(ctx.features.len(), rng);
    let take = ctx.max_features.min(order.len());

    let mut best: Option<(FeatureIndex, f64, f64)> = None;
    for &feat_idx in &order[..take] {
        let column = &ctx.features[feat_idx];
        let mut sorted: Vec<(f64, usize)> =
            sample_indices.iter().map(|&si| (column[si], si)).collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = ClassCounts::default();
        let mut right = parent;
        for i in 0..n_samples - 1 {
            let (value, si) = sorted[i];
            left.add(ctx.labels[si]);
            right.remove(ctx.labels[si]);

            let next = sorted[i + 1].0;
            if value == next {
                continue;
            }
            if left.total() < ctx.min_samples_leaf || right.total() < ctx.min_samples_leaf {
                continue;
            }
            let gain = decrease(ctx.criterion, parent, left, right);
            if best.is_none_or(|(_, _, g)| gain > g) {
                best = Some((FeatureIndex::new(feat_idx), (value + next) / 2.0, gain));
            }
        }
    }
    best
}

fn best_random(
    ctx: &SplitContext<'_>,
    sample_indices: &[usize],
    parent: ClassCounts,
    rng: &mut impl Rng,
) -> Option<(FeatureIndex, f64, f64)> {
    let order = shuffled_features(ctx.features.len(), rng);

    let mut best: Option<(FeatureIndex, f64, f64)> = None;
    let mut visited = 0usize;
    for feat_idx in order {
        if visited >= ctx.max_features {
            break;
        }
        let column = &ctx.features[feat_idx];
        let (lo, hi) = sample_indices
            .iter()
            .map(|&si| column[si])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        // Constant features do not count towards max_features.
        if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
            continue;
        }
        visited += 1;

        let mut threshold = rng.gen_range(lo..hi);
        if threshold >= hi {
            threshold = lo;
        }

        let mut left = ClassCounts::default();
        let mut right = ClassCounts::default();
        for &si in sample_indices {
            if column[si] <= threshold {
                left.add(ctx.labels[si]);
            } else {
                right.add(ctx.labels[si]);
            }
        }
        if left.total() < ctx.min_samples_leaf || right.total() < ctx.min_samples_leaf {
            continue;
        }
        let gain = decrease(ctx.criterion, parent, left, right);
        if best.is_none_or(|(_, _, g)| gain > g) {
            best = Some((FeatureIndex::new(feat_idx), threshold, gain));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{SplitContext, SplitCriterion, SplitMethod, find_split};
    use crate::node::ClassCounts;

    fn counts(negative: usize, positive: usize) -> ClassCounts {
        ClassCounts { negative, positive }
    }

    #[test]
    fn gini_pure() {
        let imp = SplitCriterion::Gini.impurity(counts(10, 0));
        assert!(imp.value().abs() < f64::EPSILON);
    }

    #[test]
    fn gini_balanced() {
        let imp = SplitCriterion::Gini.impurity(counts(5, 5));
        assert!((imp.value() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_balanced() {
        let imp = SplitCriterion::Entropy.impurity(counts(5, 5));
        assert!((imp.value() - 2.0_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn entropy_empty_node_is_pure() {
        assert!(SplitCriterion::Entropy.impurity(counts(0, 0)).value().abs() < f64::EPSILON);
    }

    fn separable() -> (Vec<Vec<f64>>, Vec<bool>) {
        (
            vec![vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]],
            vec![false, false, false, true, true, true],
        )
    }

    #[test]
    fn exact_split_separates_classes() {
        let (features, labels) = separable();
        let ctx = SplitContext {
            features: &features,
            labels: &labels,
            criterion: SplitCriterion::Gini,
            max_features: 1,
            min_samples_leaf: 1,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let indices: Vec<usize> = (0..6).collect();
        let split = find_split(&ctx, SplitMethod::Exact, &indices, &mut rng).unwrap();
        assert_eq!(split.feature.index(), 0);
        assert!(split.threshold > 3.0 && split.threshold < 10.0);
        assert_eq!(split.left_indices, vec![0, 1, 2]);
        assert_eq!(split.right_indices, vec![3, 4, 5]);
    }

    #[test]
    fn random_threshold_lies_within_node_range() {
        let (features, labels) = separable();
        let ctx = SplitContext {
            features: &features,
            labels: &labels,
            criterion: SplitCriterion::Entropy,
            max_features: 1,
            min_samples_leaf: 1,
        };
        let indices: Vec<usize> = (0..6).collect();
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let split = find_split(&ctx, SplitMethod::ExtraTrees, &indices, &mut rng).unwrap();
            assert!(split.threshold >= 1.0 && split.threshold < 12.0);
            assert!(split.impurity_decrease >= 0.0);
        }
    }

    #[test]
    fn constant_feature_yields_no_split() {
        let features = vec![vec![5.0; 4]];
        let labels = vec![false, false, true, true];
        let ctx = SplitContext {
            features: &features,
            labels: &labels,
            criterion: SplitCriterion::Gini,
            max_features: 1,
            min_samples_leaf: 1,
        };
        let indices: Vec<usize> = (0..4).collect();
        for method in [SplitMethod::Exact, SplitMethod::ExtraTrees] {
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            assert!(find_split(&ctx, method, &indices, &mut rng).is_none());
        }
    }

    #[test]
    fn min_samples_leaf_enforced() {
        let features = vec![vec![1.0, 10.0]];
        let labels = vec![false, true];
        let ctx = SplitContext {
            features: &features,
            labels: &labels,
            criterion: SplitCriterion::Gini,
            max_features: 1,
            min_samples_leaf: 2,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(find_split(&ctx, SplitMethod::Exact, &[0, 1], &mut rng).is_none());
    }

    #[test]
    fn criterion_parses_lowercase_names() {
        let c: SplitCriterion = serde_json::from_str("\"entropy\"").unwrap();
        assert_eq!(c, SplitCriterion::Entropy);
    }
}
