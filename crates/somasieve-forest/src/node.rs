use std::fmt;

/// Zero-based feature column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node>` arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Criterion-agnostic impurity value (Gini or Entropy).
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Negative/positive sample counts reaching a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    /// Samples labelled `false`.
    pub negative: usize,
    /// Samples labelled `true`.
    pub positive: usize,
}

impl ClassCounts {
    /// Count the labels of the samples at `indices`.
    pub(crate) fn tally(labels: &[bool], indices: &[usize]) -> Self {
        let positive = indices.iter().filter(|&&i| labels[i]).count();
        Self {
            negative: indices.len() - positive,
            positive,
        }
    }

    pub(crate) fn add(&mut self, label: bool) {
        if label {
            self.positive += 1;
        } else {
            self.negative += 1;
        }
    }

    pub(crate) fn remove(&mut self, label: bool) {
        if label {
            self.positive -= 1;
        } else {
            self.negative -= 1;
        }
    }

    /// Total number of samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.negative + self.positive
    }

    /// Fraction of samples labelled `true`; 0.0 for an empty node.
    #[must_use]
    pub fn positive_fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.positive as f64 / total as f64
        }
    }

    /// `true` when every sample carries the same label.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.negative == 0 || self.positive == 0
    }
}

/// A node in a decision tree arena.
///
/// Children are referenced by [`NodeIndex`] rather than pointers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Feature used for the split.
        feature: FeatureIndex,
        /// Samples with feature <= threshold go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Impurity at this node before splitting.
        impurity: Impurity,
        /// Number of training samples that reached this node.
        n_samples: usize,
        /// Weighted decrease in impurity from this split.
        impurity_decrease: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Fraction of training samples in this leaf labelled `true`.
        positive_fraction: f64,
        /// Impurity at this leaf.
        impurity: Impurity,
        /// Number of training samples in this leaf.
        n_samples: usize,
    },
}

impl Node {
    /// Return the impurity at this node.
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the number of training samples that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{ClassCounts, Impurity, Node};

    #[test]
    fn tally_counts_selected_indices_only() {
        let labels = [true, false, true, true, false];
        let counts = ClassCounts::tally(&labels, &[0, 1, 2]);
        assert_eq!(counts.positive, 2);
        assert_eq!(counts.negative, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn add_and_remove_are_inverse() {
        let mut counts = ClassCounts::default();
        counts.add(true);
        counts.add(false);
        counts.remove(true);
        assert_eq!(counts, ClassCounts { negative: 1, positive: 0 });
        assert!(counts.is_pure());
    }

    #[test]
    fn empty_counts_have_zero_positive_fraction() {
        assert!((ClassCounts::default().positive_fraction() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn impurity_display() {
        assert_eq!(format!("{}", Impurity::new(0.333333)), "0.333333");
    }

    #[test]
    fn leaf_accessors() {
        let leaf = Node::Leaf {
            positive_fraction: 0.25,
            impurity: Impurity::new(0.375),
            n_samples: 8,
        };
        assert!(leaf.is_leaf());
        assert_eq!(leaf.n_samples(), 8);
        assert!((leaf.impurity().value() - 0.375).abs() < f64::EPSILON);
    }
}
