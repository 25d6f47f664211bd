use opencv::core::Mat;
use rand::rngs::StdRng;
use rand::RngCore;
use thiserror::Error;

use crate::color::ColorAssignment;
use crate::config::Config;
use crate::filter::FilterOptions;
use crate::prediction::{self, Prediction, RawPrediction};
use crate::render::{self, RenderError, RenderOptions};
use crate::summary::{self, Summary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("invalid predictions json: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct DetectionReport {
    pub annotated: Mat,
    pub predictions: Vec<Prediction>,
    /// `None` when nothing survived filtering.
    pub summary: Option<Summary>,
    pub skipped: usize,
}

impl DetectionReport {
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn predictions_json(&self) -> Result<String, serde_json::Error> {
        prediction::to_json(&self.predictions)
    }
}

/// Filter and render settings plus the color table for one user session.
/// Colors persist across `analyze` calls so they stay put while the
/// threshold or class selection changes.
pub struct DetectionSession<R: RngCore = StdRng> {
    pub filter: FilterOptions,
    pub render: RenderOptions,
    colors: ColorAssignment<R>,
}

impl DetectionSession<StdRng> {
    pub fn new(filter: FilterOptions, render: RenderOptions) -> Self {
        Self::with_colors(filter, render, ColorAssignment::new())
    }

    pub fn from_config(config: &Config) -> Self {
        let mut colors = ColorAssignment::new();
        config.render.apply_colors(&mut colors);
        Self::with_colors(config.filter.to_options(), config.render.to_options(), colors)
    }
}

impl<R: RngCore> DetectionSession<R> {
    pub fn with_colors(
        filter: FilterOptions,
        render: RenderOptions,
        colors: ColorAssignment<R>,
    ) -> Self {
        Self {
            filter,
            render,
            colors,
        }
    }

    pub fn colors(&self) -> &ColorAssignment<R> {
        &self.colors
    }

    pub fn analyze(
        &mut self,
        image: &Mat,
        records: Vec<RawPrediction>,
    ) -> Result<DetectionReport, PipelineError> {
        let (predictions, rejected) = prediction::normalize(records);
        self.analyze_predictions(image, &predictions, rejected.len())
    }

    pub fn analyze_json(
        &mut self,
        image: &Mat,
        json: &str,
    ) -> Result<DetectionReport, PipelineError> {
        let records = prediction::parse_response(json)?;
        self.analyze(image, records)
    }

    fn analyze_predictions(
        &mut self,
        image: &Mat,
        predictions: &[Prediction],
        skipped: usize,
    ) -> Result<DetectionReport, PipelineError> {
        let filtered = self.filter.apply(predictions);
        let annotated = render::render(image, &filtered, &mut self.colors, &self.render)?;

        let summary = if annotated.predictions.is_empty() {
            tracing::debug!(total = predictions.len(), "no predictions passed the filter");
            None
        } else {
            Some(summary::summarize(&annotated.predictions))
        };

        tracing::debug!(
            total = predictions.len(),
            kept = annotated.predictions.len(),
            skipped,
            "detections analyzed"
        );

        Ok(DetectionReport {
            annotated: annotated.image,
            predictions: annotated.predictions,
            summary,
            skipped,
        })
    }
}
