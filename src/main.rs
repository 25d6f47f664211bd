use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;
use tracing_subscriber::EnvFilter;

use cvlab::{Config, DetectionSession, MotionDetector, MotionOutcome, MotionState};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "cvlab", version, about = "Annotate detections and compute motion masks")]
struct Cli {
    /// Config file (defaults to ./config.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Filter predictions, draw them onto the image and write the results
    Annotate {
        image: PathBuf,
        /// Inference response: a list of records or `{"predictions": [...]}`
        predictions: PathBuf,
        out_dir: PathBuf,
    },

    /// Diff consecutive frames and write a mask for each frame after the first
    Motion {
        out_dir: PathBuf,
        #[arg(required = true, num_args = 1..)]
        frames: Vec<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cvlab=debug".parse()?))
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default()?,
    };

    match &cli.command {
        Command::Annotate {
            image,
            predictions,
            out_dir,
        } => annotate(&config, image, predictions, out_dir),
        Command::Motion { out_dir, frames } => motion(&config, out_dir, frames),
    }
}

fn annotate(
    config: &Config,
    image_path: &Path,
    json_path: &Path,
    out_dir: &Path,
) -> CliResult<()> {
    let image = read_rgb(image_path)?;
    let json = std::fs::read_to_string(json_path)?;

    let mut session = DetectionSession::from_config(config);
    let report = session.analyze_json(&image, &json)?;

    if report.skipped > 0 {
        tracing::warn!(skipped = report.skipped, "some prediction records were malformed");
    }

    match &report.summary {
        Some(summary) => {
            for count in &summary.counts {
                tracing::info!(class = %count.class_label, count = count.count, "detected");
            }
            tracing::info!("{}", summary.sentence);
        }
        None => tracing::warn!("no objects detected"),
    }

    std::fs::create_dir_all(out_dir)?;
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");

    let image_out = out_dir.join(format!("{stem}_annotated.png"));
    write_rgb(&image_out, &report.annotated)?;

    let json_out = out_dir.join(format!("{stem}_predictions.json"));
    std::fs::write(&json_out, report.predictions_json()?)?;

    tracing::info!(
        image = %image_out.display(),
        predictions = %json_out.display(),
        "results written"
    );
    Ok(())
}

fn motion(config: &Config, out_dir: &Path, frames: &[PathBuf]) -> CliResult<()> {
    std::fs::create_dir_all(out_dir)?;

    let detector = MotionDetector::new(config.motion.clone());
    let mut state = MotionState::new();

    for (n, path) in frames.iter().enumerate() {
        let frame = read_rgb(path)?;

        match detector.submit_frame(&frame, &mut state)? {
            MotionOutcome::ReferenceStored => {
                tracing::info!(frame = %path.display(), "reference stored, submit another frame");
            }
            MotionOutcome::ReferenceReset { previous, current } => {
                tracing::warn!(
                    frame = %path.display(),
                    previous = ?previous,
                    current = ?current,
                    "frame size changed, reference reset"
                );
            }
            MotionOutcome::Motion(mask) => {
                let mask_path = out_dir.join(format!("mask_{n}.png"));
                imgcodecs::imwrite(&path_str(&mask_path)?, mask.as_mat(), &Vector::new())?;
                tracing::info!(
                    frame = %path.display(),
                    score = format!("{:.3}", mask.motion_score()?),
                    bbox = ?mask.bounding_box()?,
                    mask = %mask_path.display(),
                    "motion mask written"
                );
            }
        }
    }

    Ok(())
}

fn path_str(path: &Path) -> CliResult<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| format!("non-utf8 path: {}", path.display()).into())
}

fn read_rgb(path: &Path) -> CliResult<Mat> {
    let bgr = imgcodecs::imread(&path_str(path)?, imgcodecs::IMREAD_COLOR)?;
    if bgr.empty() {
        return Err(format!("failed to decode image: {}", path.display()).into());
    }
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;
    Ok(rgb)
}

fn write_rgb(path: &Path, rgb: &Mat) -> CliResult<()> {
    let mut bgr = Mat::default();
    imgproc::cvt_color_def(rgb, &mut bgr, imgproc::COLOR_RGB2BGR)?;
    if !imgcodecs::imwrite(&path_str(path)?, &bgr, &Vector::new())? {
        return Err(format!("failed to write image: {}", path.display()).into());
    }
    Ok(())
}
