use serde::Serialize;

use crate::prediction::Prediction;

const EMPTY_SENTENCE: &str = "I detected nothing.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    #[serde(rename = "class")]
    pub class_label: String,
    pub count: usize,
}

/// Per-class counts in order of first appearance, and a one-line description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub counts: Vec<ClassCount>,
    pub sentence: String,
}

impl Summary {
    pub fn count_of(&self, class_label: &str) -> usize {
        self.counts
            .iter()
            .find(|c| c.class_label == class_label)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

pub fn summarize(predictions: &[Prediction]) -> Summary {
    let mut counts: Vec<ClassCount> = Vec::new();

    for prediction in predictions {
        let label = prediction.class_label();
        match counts.iter_mut().find(|c| c.class_label == label) {
            Some(entry) => entry.count += 1,
            None => counts.push(ClassCount {
                class_label: label.to_string(),
                count: 1,
            }),
        }
    }

    let sentence = describe(&counts);
    Summary { counts, sentence }
}

fn describe(counts: &[ClassCount]) -> String {
    if counts.is_empty() {
        return EMPTY_SENTENCE.to_string();
    }

    let parts: Vec<String> = counts
        .iter()
        .map(|c| {
            let suffix = if c.count == 1 { "" } else { "s" };
            format!("{} {}{}", c.count, c.class_label, suffix)
        })
        .collect();

    format!("I detected {}.", parts.join(" and "))
}
