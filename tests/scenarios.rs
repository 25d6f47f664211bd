use cvlab::filter::{self, ClassSelection};
use cvlab::prediction;
use cvlab::render::{self, RenderOptions};
use cvlab::{summarize, ColorAssignment, MotionDetector, MotionOutcome, MotionState};
use opencv::core::{Mat, Rect, Scalar, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn black(rows: i32, cols: i32) -> Mat {
    Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0)).unwrap()
}

#[test]
fn fish_example_end_to_end() {
    let records = prediction::parse_response(
        r#"[
            {"class":"fish","confidence":0.9,"x":10,"y":10,"width":4,"height":4},
            {"class":"fish","confidence":0.3,"x":50,"y":50,"width":4,"height":4}
        ]"#,
    )
    .unwrap();
    let (predictions, rejected) = prediction::normalize(records);
    assert!(rejected.is_empty());

    let filtered = filter::filter(&predictions, 50.0, &ClassSelection::All);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].class_label(), "fish");
    assert_eq!(filtered[0].confidence(), 0.9);
    assert_eq!(filtered[0].center(), (10.0, 10.0));

    let image = black(64, 64);
    let before = image.data_bytes().unwrap().to_vec();
    let mut colors = ColorAssignment::with_rng(StdRng::seed_from_u64(11));
    let annotated =
        render::render(&image, &filtered, &mut colors, &RenderOptions::default()).unwrap();
    assert_eq!(image.data_bytes().unwrap(), before.as_slice());
    assert_eq!(annotated.predictions.len(), 1);

    let summary = summarize(&annotated.predictions);
    assert_eq!(summary.count_of("fish"), 1);
    assert_eq!(summary.sentence, "I detected 1 fish.");

    let exported: serde_json::Value =
        serde_json::from_str(&prediction::to_json(&annotated.predictions).unwrap()).unwrap();
    assert_eq!(exported[0]["class"], "fish");
    assert_eq!(exported[0]["width"], 4.0);
}

#[test]
fn motion_sequence() {
    let detector = MotionDetector::default();
    let mut state = MotionState::new();
    let still = black(120, 160);
    let mut moved = black(120, 160);
    imgproc::rectangle(
        &mut moved,
        Rect::new(70, 50, 20, 20),
        Scalar::all(255.0),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )
    .unwrap();

    assert!(matches!(
        detector.submit_frame(&still, &mut state).unwrap(),
        MotionOutcome::ReferenceStored
    ));

    let quiet = detector.submit_frame(&still, &mut state).unwrap();
    assert_eq!(quiet.mask().unwrap().changed_pixels().unwrap(), 0);

    let active = detector.submit_frame(&moved, &mut state).unwrap();
    let mask = active.mask().unwrap();
    assert_eq!(mask.as_mat().rows(), 120);
    assert_eq!(mask.as_mat().cols(), 160);
    assert_eq!(*mask.as_mat().at_2d::<u8>(60, 80).unwrap(), 255);
    assert_eq!(*mask.as_mat().at_2d::<u8>(10, 10).unwrap(), 0);

    state.reset();
    assert!(!state.is_ready());
}
