use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CLASS_LABEL: &str = "object";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictionError {
    #[error("prediction {index} is missing numeric field '{field}'")]
    MalformedPrediction { index: usize, field: &'static str },
}

/// One record as returned by the inference service, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPrediction {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

/// Inference responses come either as a bare list or wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InferenceResponse {
    Bare(Vec<RawPrediction>),
    Wrapped { predictions: Vec<RawPrediction> },
}

impl InferenceResponse {
    pub fn into_records(self) -> Vec<RawPrediction> {
        match self {
            InferenceResponse::Bare(records) => records,
            InferenceResponse::Wrapped { predictions } => predictions,
        }
    }
}

/// A validated detection. Serializes back to the inbound field names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "class")]
    class_label: String,
    confidence: f64,
    #[serde(rename = "x")]
    center_x: f64,
    #[serde(rename = "y")]
    center_y: f64,
    width: f64,
    height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Prediction {
    /// Callers must pass a positive `width` and `height`; records from the
    /// inference service go through `TryFrom`, which enforces it.
    pub(crate) fn new(
        class_label: impl Into<String>,
        confidence: f64,
        center_x: f64,
        center_y: f64,
        width: f64,
        height: f64,
    ) -> Self {
        debug_assert!(width > 0.0 && height > 0.0, "box size must be positive");
        let class_label = class_label.into();
        Self {
            class_label: if class_label.is_empty() {
                DEFAULT_CLASS_LABEL.to_string()
            } else {
                class_label
            },
            confidence: confidence.clamp(0.0, 1.0),
            center_x,
            center_y,
            width,
            height,
        }
    }

    pub fn class_label(&self) -> &str {
        &self.class_label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn confidence_pct(&self) -> f64 {
        self.confidence * 100.0
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_x, self.center_y)
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        BoundingBox {
            left: self.center_x - half_w,
            top: self.center_y - half_h,
            right: self.center_x + half_w,
            bottom: self.center_y + half_h,
        }
    }

    /// Text drawn next to the box, e.g. `fish 90.0%`.
    pub fn label_text(&self) -> String {
        format!("{} {:.1}%", self.class_label, self.confidence_pct())
    }
}

impl TryFrom<(usize, RawPrediction)> for Prediction {
    type Error = PredictionError;

    fn try_from((index, raw): (usize, RawPrediction)) -> Result<Self, Self::Error> {
        let require = |value: Option<f64>, field: &'static str| {
            value
                .filter(|v| v.is_finite())
                .ok_or(PredictionError::MalformedPrediction { index, field })
        };

        let positive = |value: f64, field: &'static str| {
            if value > 0.0 {
                Ok(value)
            } else {
                Err(PredictionError::MalformedPrediction { index, field })
            }
        };

        let x = require(raw.x, "x")?;
        let y = require(raw.y, "y")?;
        let width = positive(require(raw.width, "width")?, "width")?;
        let height = positive(require(raw.height, "height")?, "height")?;

        let confidence = raw.confidence.filter(|c| c.is_finite()).unwrap_or(0.0);
        let class = raw
            .class
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CLASS_LABEL.to_string());

        Ok(Prediction::new(class, confidence, x, y, width, height))
    }
}

/// Validates a batch of raw records. Malformed records are skipped and
/// returned alongside the good ones; the batch itself never fails.
pub fn normalize(records: Vec<RawPrediction>) -> (Vec<Prediction>, Vec<PredictionError>) {
    let mut predictions = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for (index, raw) in records.into_iter().enumerate() {
        match Prediction::try_from((index, raw)) {
            Ok(p) => predictions.push(p),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed prediction");
                rejected.push(e);
            }
        }
    }

    (predictions, rejected)
}

pub fn parse_response(json: &str) -> Result<Vec<RawPrediction>, serde_json::Error> {
    let response: InferenceResponse = serde_json::from_str(json)?;
    Ok(response.into_records())
}

pub fn to_json(predictions: &[Prediction]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(predictions)
}
