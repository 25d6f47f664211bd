use std::collections::{BTreeSet, HashMap, HashSet};

use crate::prediction::Prediction;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ClassSelection {
    #[default]
    All,
    Only(HashSet<String>),
}

impl ClassSelection {
    pub fn only<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClassSelection::Only(classes.into_iter().map(Into::into).collect())
    }

    /// An empty list means no restriction.
    pub fn from_list(classes: &[String]) -> Self {
        if classes.is_empty() {
            ClassSelection::All
        } else {
            ClassSelection::only(classes.iter().cloned())
        }
    }

    pub fn allows(&self, class_label: &str) -> bool {
        match self {
            ClassSelection::All => true,
            ClassSelection::Only(set) => set.contains(class_label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub min_confidence_pct: f64,
    pub classes: ClassSelection,
    pub class_thresholds: HashMap<String, f64>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            min_confidence_pct: 50.0,
            classes: ClassSelection::All,
            class_thresholds: HashMap::new(),
        }
    }
}

impl FilterOptions {
    pub fn new(min_confidence_pct: f64, classes: ClassSelection) -> Self {
        Self {
            min_confidence_pct: min_confidence_pct.clamp(0.0, 100.0),
            classes,
            class_thresholds: HashMap::new(),
        }
    }

    pub fn with_class_threshold(mut self, class_label: impl Into<String>, pct: f64) -> Self {
        self.class_thresholds
            .insert(class_label.into(), pct.clamp(0.0, 100.0));
        self
    }

    pub fn threshold_for(&self, class_label: &str) -> f64 {
        self.class_thresholds
            .get(class_label)
            .copied()
            .unwrap_or(self.min_confidence_pct)
    }

    pub fn passes(&self, prediction: &Prediction) -> bool {
        let label = prediction.class_label();
        self.classes.allows(label) && prediction.confidence_pct() >= self.threshold_for(label)
    }

    pub fn apply(&self, predictions: &[Prediction]) -> Vec<Prediction> {
        predictions
            .iter()
            .filter(|p| self.passes(p))
            .cloned()
            .collect()
    }
}

/// Keeps predictions at or above `min_confidence_pct` whose class is allowed.
/// Input order is preserved.
pub fn filter(
    predictions: &[Prediction],
    min_confidence_pct: f64,
    allowed_classes: &ClassSelection,
) -> Vec<Prediction> {
    predictions
        .iter()
        .filter(|p| {
            allowed_classes.allows(p.class_label()) && p.confidence_pct() >= min_confidence_pct
        })
        .cloned()
        .collect()
}

pub fn available_classes(predictions: &[Prediction]) -> BTreeSet<String> {
    predictions
        .iter()
        .map(|p| p.class_label().to_string())
        .collect()
}
