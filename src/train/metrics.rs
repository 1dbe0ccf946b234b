//! Classification metrics for training and validation.

/// Fraction of predictions matching their targets.
///
/// Empty input yields 0.0.
#[must_use]
pub fn accuracy(predictions: &[usize], targets: &[usize]) -> f32 {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return 0.0;
    }
    let correct = predictions
        .iter()
        .zip(targets)
        .filter(|(p, t)| p == t)
        .count();
    correct as f32 / predictions.len() as f32
}

/// Confusion counts over a fixed number of classes.
///
/// Rows are actual classes, columns predicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    n_classes: usize,
    counts: Vec<usize>,
}

impl ConfusionMatrix {
    #[must_use]
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Records one observation. Out-of-range classes are ignored.
    pub fn record(&mut self, actual: usize, predicted: usize) {
        if actual < self.n_classes && predicted < self.n_classes {
            self.counts[actual * self.n_classes + predicted] += 1;
        }
    }

    /// Count of rows with the given actual and predicted classes.
    #[must_use]
    pub fn count(&self, actual: usize, predicted: usize) -> usize {
        self.counts[actual * self.n_classes + predicted]
    }

    /// Total observations recorded.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Overall accuracy; 0.0 when empty.
    #[must_use]
    pub fn accuracy(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let diagonal: usize = (0..self.n_classes).map(|c| self.count(c, c)).sum();
        diagonal as f32 / total as f32
    }

    /// Recall for one class; 0.0 when the class never occurs.
    #[must_use]
    pub fn recall(&self, class: usize) -> f32 {
        let actual: usize = (0..self.n_classes).map(|p| self.count(class, p)).sum();
        if actual == 0 {
            return 0.0;
        }
        self.count(class, class) as f32 / actual as f32
    }

    /// Precision for one class; 0.0 when the class is never predicted.
    #[must_use]
    pub fn precision(&self, class: usize) -> f32 {
        let predicted: usize = (0..self.n_classes).map(|a| self.count(a, class)).sum();
        if predicted == 0 {
            return 0.0;
        }
        self.count(class, class) as f32 / predicted as f32
    }
}
