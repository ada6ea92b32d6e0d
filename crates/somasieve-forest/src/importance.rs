//! Feature importance aggregation across trees.

/// A feature with its normalized importance and 1-based rank.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RankedFeature {
    /// Feature name.
    pub name: String,
    /// Normalized importance (sums to 1.0 across all features).
    pub importance: f64,
    /// 1-based rank (1 = most important).
    pub rank: usize,
}

/// Mean-decrease-in-impurity importances for every training column.
///
/// Kept in the order the features were supplied; [`ranked`](Self::ranked)
/// gives the descending view.
#[derive(Debug, Clone, Default)]
pub struct FeatureImportances {
    features: Vec<RankedFeature>,
}

impl FeatureImportances {
    /// Sum per-tree importances, normalize to 1.0 and assign ranks.
    pub(crate) fn aggregate(per_tree: &[Vec<f64>], names: &[String]) -> Self {
        let mut totals = vec![0.0f64; names.len()];
        for tree in per_tree {
            for (total, &value) in totals.iter_mut().zip(tree) {
                *total += value;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }

        let mut features: Vec<RankedFeature> = names
            .iter()
            .zip(&totals)
            .map(|(name, &importance)| RankedFeature {
                name: name.clone(),
                importance,
                rank: 0,
            })
            .collect();

        let mut order: Vec<usize> = (0..features.len()).collect();
        order.sort_by(|&a, &b| features[b].importance.total_cmp(&features[a].importance));
        for (rank, idx) in order.into_iter().enumerate() {
            features[idx].rank = rank + 1;
        }
        Self { features }
    }

    /// Importances in supplied feature order.
    #[must_use]
    pub fn in_order(&self) -> &[RankedFeature] {
        &self.features
    }

    /// Importances sorted by descending importance.
    #[must_use]
    pub fn ranked(&self) -> Vec<RankedFeature> {
        let mut sorted = self.features.clone();
        sorted.sort_by_key(|f| f.rank);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::FeatureImportances;

    #[test]
    fn keeps_supplied_order_and_ranks_descending() {
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let per_tree = vec![vec![0.1, 0.6, 0.3], vec![0.1, 0.2, 0.7]];
        let imp = FeatureImportances::aggregate(&per_tree, &names);

        let order: Vec<&str> = imp.in_order().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
        let ranked_features = imp.ranked();
        let ranked: Vec<&str> = ranked_features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(ranked, ["c", "b", "a"]);
        assert!((imp.in_order()[0].importance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn single_leaf_trees_give_zero_importances() {
        let names = vec!["a".to_string()];
        let imp = FeatureImportances::aggregate(&[vec![0.0]], &names);
        assert_eq!(imp.in_order()[0].importance, 0.0);
        assert_eq!(imp.in_order()[0].rank, 1);
    }
}
