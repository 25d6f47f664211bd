use opencv::core::{Mat, Point};
use opencv::imgproc;
use opencv::prelude::*;
use rand::RngCore;
use thiserror::Error;

use crate::color::ColorAssignment;
use crate::prediction::Prediction;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error("cannot annotate an empty image")]
    EmptyImage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub show_boxes: bool,
    pub stroke_width: i32,
    /// Distance the label baseline sits above the box's top edge.
    pub label_offset: i32,
    /// Labels never go above this row.
    pub label_min_y: i32,
    pub font_scale: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_boxes: true,
            stroke_width: 3,
            label_offset: 14,
            label_min_y: 15,
            font_scale: 0.5,
        }
    }
}

/// A fresh copy of the source image with boxes drawn, plus the predictions
/// that were drawn on it.
pub struct AnnotatedImage {
    pub image: Mat,
    pub predictions: Vec<Prediction>,
}

pub fn render<R: RngCore>(
    image: &Mat,
    predictions: &[Prediction],
    colors: &mut ColorAssignment<R>,
    options: &RenderOptions,
) -> Result<AnnotatedImage, RenderError> {
    if image.empty() {
        return Err(RenderError::EmptyImage);
    }

    let mut output = image.try_clone()?;

    if options.show_boxes {
        for prediction in predictions {
            draw_prediction(&mut output, prediction, colors, options)?;
        }
    }

    Ok(AnnotatedImage {
        image: output,
        predictions: predictions.to_vec(),
    })
}

fn draw_prediction<R: RngCore>(
    canvas: &mut Mat,
    prediction: &Prediction,
    colors: &mut ColorAssignment<R>,
    options: &RenderOptions,
) -> Result<(), RenderError> {
    let color = colors.color_for(prediction.class_label()).to_scalar();
    let bbox = prediction.bounding_box();

    let left = to_pixel(bbox.left).max(0);
    let top = to_pixel(bbox.top).max(0);
    let right = to_pixel(bbox.right).max(left);
    let bottom = to_pixel(bbox.bottom).max(top);

    imgproc::rectangle_points(
        canvas,
        Point::new(left, top),
        Point::new(right, bottom),
        color,
        options.stroke_width,
        imgproc::LINE_8,
        0,
    )?;

    let label_y = (top - options.label_offset).max(options.label_min_y);
    imgproc::put_text(
        canvas,
        &prediction.label_text(),
        Point::new(left, label_y),
        imgproc::FONT_HERSHEY_SIMPLEX,
        options.font_scale,
        color,
        1,
        imgproc::LINE_AA,
        false,
    )?;

    Ok(())
}

fn to_pixel(v: f64) -> i32 {
    v.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}
