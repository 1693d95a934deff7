use indexmap::IndexMap;
use serde::Serialize;

use crate::common::Label;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: Label,
    pub confidences: IndexMap<Label, f32>,
}

impl ClassificationResult {
    pub fn new(label: Label, confidences: IndexMap<Label, f32>) -> Self {
        Self { label, confidences }
    }

    pub fn confidence(&self, label: Label) -> f32 {
        self.confidences.get(&label).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Violating,
    Clear,
}

/// A cycle is violating only when the alert label wins and its confidence is
/// strictly above the threshold.
pub fn evaluate(result: &ClassificationResult, threshold: f32) -> Decision {
    if result.label == Label::ALERT && result.confidence(Label::ALERT) > threshold {
        Decision::Violating
    } else {
        Decision::Clear
    }
}
