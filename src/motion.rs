use opencv::{
    core::{self, Mat, Point, Rect, Size, Vector, CV_8UC1, CV_8UC3, CV_8UC4},
    imgproc,
    prelude::*,
};
use thiserror::Error;

use crate::config::MotionConfig;

const MASK_ON: f64 = 255.0;

#[derive(Debug, Error)]
pub enum MotionError {
    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error("empty frame")]
    EmptyFrame,
    #[error("unsupported frame type {0}, expected 8-bit gray, RGB or RGBA")]
    UnsupportedFrame(i32),
}

/// Reference frame carried between calls. The processed frame stays private;
/// callers only ever see masks.
#[derive(Default)]
pub struct MotionState {
    reference: Option<Mat>,
}

impl MotionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reset(&mut self) {
        self.reference = None;
    }

    pub fn reference_size(&self) -> Option<Size> {
        self.reference.as_ref().and_then(|r| r.size().ok())
    }
}

pub enum MotionOutcome {
    /// First frame after construction or reset; nothing to compare against.
    ReferenceStored,
    /// Frame size changed; the new frame replaced the old reference.
    ReferenceReset { previous: Size, current: Size },
    Motion(MotionMask),
}

impl MotionOutcome {
    pub fn mask(&self) -> Option<&MotionMask> {
        match self {
            MotionOutcome::Motion(mask) => Some(mask),
            _ => None,
        }
    }

    pub fn into_mask(self) -> Option<MotionMask> {
        match self {
            MotionOutcome::Motion(mask) => Some(mask),
            _ => None,
        }
    }
}

/// Single-channel mask, 255 where the frame changed and 0 elsewhere.
pub struct MotionMask {
    mask: Mat,
}

impl MotionMask {
    pub fn as_mat(&self) -> &Mat {
        &self.mask
    }

    pub fn size(&self) -> Result<Size, MotionError> {
        Ok(self.mask.size()?)
    }

    pub fn changed_pixels(&self) -> Result<i32, MotionError> {
        Ok(core::count_non_zero(&self.mask)?)
    }

    pub fn motion_ratio(&self) -> Result<f32, MotionError> {
        let total = self.mask.rows() * self.mask.cols();
        if total == 0 {
            return Ok(0.0);
        }
        Ok(self.changed_pixels()? as f32 / total as f32)
    }

    /// Foreground ratio scaled into [0, 1]; a tenth of the frame moving
    /// already saturates the score.
    pub fn motion_score(&self) -> Result<f32, MotionError> {
        Ok((self.motion_ratio()? * 10.0).min(1.0))
    }

    pub fn bounding_box(&self) -> Result<Option<Rect>, MotionError> {
        let mut points = Vector::<Point>::new();
        core::find_non_zero(&self.mask, &mut points)?;
        if points.is_empty() {
            return Ok(None);
        }
        Ok(Some(imgproc::bounding_rect(&points)?))
    }
}

pub struct MotionDetector {
    config: MotionConfig,
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn submit_frame(
        &self,
        frame: &Mat,
        state: &mut MotionState,
    ) -> Result<MotionOutcome, MotionError> {
        let processed = self.preprocess(frame)?;
        let current = processed.size()?;

        let Some(reference) = state.reference.take() else {
            tracing::debug!(
                width = current.width,
                height = current.height,
                "motion reference stored"
            );
            state.reference = Some(processed);
            return Ok(MotionOutcome::ReferenceStored);
        };

        let previous = reference.size()?;
        if previous != current {
            tracing::warn!(
                previous = ?previous,
                current = ?current,
                "frame size changed, resetting motion reference"
            );
            state.reference = Some(processed);
            return Ok(MotionOutcome::ReferenceReset { previous, current });
        }

        let mask = match self.difference(&reference, &processed) {
            Ok(mask) => mask,
            Err(e) => {
                state.reference = Some(reference);
                return Err(e);
            }
        };
        state.reference = Some(processed);

        let mask = MotionMask { mask };
        tracing::debug!(
            changed = mask.changed_pixels()?,
            ratio = format!("{:.3}", mask.motion_ratio()?),
            "motion mask computed"
        );

        Ok(MotionOutcome::Motion(mask))
    }

    fn preprocess(&self, frame: &Mat) -> Result<Mat, MotionError> {
        if frame.empty() {
            return Err(MotionError::EmptyFrame);
        }

        let gray = match frame.typ() {
            t if t == CV_8UC1 => frame.try_clone()?,
            t if t == CV_8UC3 => {
                let mut gray = Mat::default();
                imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_RGB2GRAY)?;
                gray
            }
            t if t == CV_8UC4 => {
                let mut gray = Mat::default();
                imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_RGBA2GRAY)?;
                gray
            }
            t => return Err(MotionError::UnsupportedFrame(t)),
        };

        let mut blurred = Mat::default();
        let k = self.config.blur_kernel;
        imgproc::gaussian_blur_def(&gray, &mut blurred, Size::new(k, k), 0.0)?;

        Ok(blurred)
    }

    fn difference(&self, reference: &Mat, current: &Mat) -> Result<Mat, MotionError> {
        let mut diff = Mat::default();
        core::absdiff(reference, current, &mut diff)?;

        let mut mask = Mat::default();
        imgproc::threshold(
            &diff,
            &mut mask,
            self.config.threshold as f64,
            MASK_ON,
            imgproc::THRESH_BINARY,
        )?;

        if self.config.dilate_iterations == 0 {
            return Ok(mask);
        }

        let mut dilated = Mat::default();
        imgproc::dilate(
            &mask,
            &mut dilated,
            &Mat::default(),
            Point::new(-1, -1),
            self.config.dilate_iterations as i32,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        Ok(dilated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC2};

    fn frame(rows: i32, cols: i32) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn with_square(rows: i32, cols: i32, square: Rect) -> Mat {
        let mut f = frame(rows, cols);
        imgproc::rectangle(
            &mut f,
            square,
            Scalar::all(255.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        f
    }

    #[test]
    fn test_first_frame_only_stores_reference() {
        let detector = MotionDetector::default();
        let mut state = MotionState::new();
        assert!(!state.is_ready());

        let outcome = detector.submit_frame(&frame(60, 80), &mut state).unwrap();

        assert!(matches!(outcome, MotionOutcome::ReferenceStored));
        assert!(outcome.mask().is_none());
        assert!(state.is_ready());
        assert_eq!(state.reference_size(), Some(Size::new(80, 60)));
    }

    #[test]
    fn test_same_frame_twice_has_no_motion() {
        let detector = MotionDetector::default();
        let mut state = MotionState::new();
        let f = with_square(100, 100, Rect::new(40, 40, 20, 20));

        detector.submit_frame(&f, &mut state).unwrap();
        let mask = detector
            .submit_frame(&f, &mut state)
            .unwrap()
            .into_mask()
            .unwrap();

        assert_eq!(mask.changed_pixels().unwrap(), 0);
        assert_eq!(mask.bounding_box().unwrap(), None);
        assert_eq!(mask.size().unwrap(), Size::new(100, 100));
        assert_eq!(mask.as_mat().typ(), CV_8UC1);
    }

    #[test]
    fn test_bright_square_is_detected_in_place() {
        let detector = MotionDetector::default();
        let mut state = MotionState::new();

        detector.submit_frame(&frame(100, 100), &mut state).unwrap();
        let outcome = detector
            .submit_frame(&with_square(100, 100, Rect::new(40, 40, 20, 20)), &mut state)
            .unwrap();
        let mask = outcome.mask().unwrap();

        assert_eq!(*mask.as_mat().at_2d::<u8>(50, 50).unwrap(), 255);
        assert_eq!(*mask.as_mat().at_2d::<u8>(5, 5).unwrap(), 0);
        assert_eq!(*mask.as_mat().at_2d::<u8>(95, 95).unwrap(), 0);

        let bbox = mask.bounding_box().unwrap().unwrap();
        assert!(bbox.x >= 25 && bbox.y >= 25, "bbox too large: {bbox:?}");
        assert!(
            bbox.x + bbox.width <= 75 && bbox.y + bbox.height <= 75,
            "bbox too large: {bbox:?}"
        );
        assert!(mask.motion_score().unwrap() > 0.0);
    }

    #[test]
    fn test_compares_against_previous_frame() {
        let detector = MotionDetector::default();
        let mut state = MotionState::new();
        let moved = with_square(100, 100, Rect::new(40, 40, 20, 20));

        detector.submit_frame(&frame(100, 100), &mut state).unwrap();
        detector.submit_frame(&moved, &mut state).unwrap();
        let mask = detector
            .submit_frame(&moved, &mut state)
            .unwrap()
            .into_mask()
            .unwrap();

        assert_eq!(mask.changed_pixels().unwrap(), 0);
    }

    #[test]
    fn test_size_change_resets_reference() {
        let detector = MotionDetector::default();
        let mut state = MotionState::new();

        detector.submit_frame(&frame(100, 100), &mut state).unwrap();
        let outcome = detector.submit_frame(&frame(50, 80), &mut state).unwrap();

        match outcome {
            MotionOutcome::ReferenceReset { previous, current } => {
                assert_eq!(previous, Size::new(100, 100));
                assert_eq!(current, Size::new(80, 50));
            }
            _ => panic!("expected reference reset"),
        }
        assert_eq!(state.reference_size(), Some(Size::new(80, 50)));

        let mask = detector
            .submit_frame(&frame(50, 80), &mut state)
            .unwrap()
            .into_mask()
            .unwrap();
        assert_eq!(mask.size().unwrap(), Size::new(80, 50));
    }

    #[test]
    fn test_reset_returns_to_uninitialized() {
        let detector = MotionDetector::default();
        let mut state = MotionState::new();
        detector.submit_frame(&frame(20, 20), &mut state).unwrap();

        state.reset();

        assert!(!state.is_ready());
        let outcome = detector.submit_frame(&frame(20, 20), &mut state).unwrap();
        assert!(matches!(outcome, MotionOutcome::ReferenceStored));
    }

    #[test]
    fn test_rejects_bad_frames() {
        let detector = MotionDetector::default();
        let mut state = MotionState::new();

        let empty = detector.submit_frame(&Mat::default(), &mut state);
        assert!(matches!(empty, Err(MotionError::EmptyFrame)));

        let two_channel =
            Mat::new_rows_cols_with_default(10, 10, CV_8UC2, Scalar::all(0.0)).unwrap();
        let err = detector.submit_frame(&two_channel, &mut state);
        assert!(matches!(err, Err(MotionError::UnsupportedFrame(_))));
        assert!(!state.is_ready());
    }

    #[test]
    fn test_gray_frames_accepted() {
        let detector = MotionDetector::new(MotionConfig {
            dilate_iterations: 0,
            ..MotionConfig::default()
        });
        let mut state = MotionState::new();
        let gray = Mat::new_rows_cols_with_default(30, 30, CV_8UC1, Scalar::all(10.0)).unwrap();

        detector.submit_frame(&gray, &mut state).unwrap();
        let mask = detector
            .submit_frame(&gray, &mut state)
            .unwrap()
            .into_mask()
            .unwrap();
        assert_eq!(mask.changed_pixels().unwrap(), 0);
    }
}
