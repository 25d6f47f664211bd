use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::color::{ColorAssignment, Rgb};
use crate::filter::{ClassSelection, FilterOptions};
use crate::render::RenderOptions;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_min_confidence() -> f64 {
    50.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_min_confidence")]
    pub min_confidence_pct: f64,
    /// Empty means every class is shown.
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub class_thresholds: HashMap<String, f64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_confidence_pct: default_min_confidence(),
            classes: Vec::new(),
            class_thresholds: HashMap::new(),
        }
    }
}

impl FilterConfig {
    pub fn to_options(&self) -> FilterOptions {
        let mut options = FilterOptions::new(
            self.min_confidence_pct,
            ClassSelection::from_list(&self.classes),
        );
        for (class, pct) in &self.class_thresholds {
            options = options.with_class_threshold(class.clone(), *pct);
        }
        options
    }
}

fn default_true() -> bool {
    true
}

fn default_stroke_width() -> i32 {
    3
}

fn default_label_offset() -> i32 {
    14
}

fn default_label_min_y() -> i32 {
    15
}

fn default_font_scale() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_true")]
    pub show_boxes: bool,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: i32,
    #[serde(default = "default_label_offset")]
    pub label_offset: i32,
    #[serde(default = "default_label_min_y")]
    pub label_min_y: i32,
    #[serde(default = "default_font_scale")]
    pub font_scale: f64,
    /// Class label to `#RRGGBB`.
    #[serde(default)]
    pub class_colors: HashMap<String, String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            show_boxes: true,
            stroke_width: default_stroke_width(),
            label_offset: default_label_offset(),
            label_min_y: default_label_min_y(),
            font_scale: default_font_scale(),
            class_colors: HashMap::new(),
        }
    }
}

impl RenderConfig {
    pub fn to_options(&self) -> RenderOptions {
        RenderOptions {
            show_boxes: self.show_boxes,
            stroke_width: self.stroke_width,
            label_offset: self.label_offset,
            label_min_y: self.label_min_y,
            font_scale: self.font_scale,
        }
    }

    /// Pins configured colors into a session. Call after `Config::validate`.
    pub fn apply_colors<R: rand::RngCore>(&self, colors: &mut ColorAssignment<R>) {
        for (class, hex) in &self.class_colors {
            match Rgb::from_hex(hex) {
                Ok(color) => colors.set_color(class.clone(), color),
                Err(e) => tracing::warn!(class = %class, error = %e, "ignoring class color"),
            }
        }
    }
}

fn default_blur_kernel() -> i32 {
    21
}

fn default_motion_threshold() -> u8 {
    25
}

fn default_dilate_iterations() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "default_blur_kernel")]
    pub blur_kernel: i32,
    #[serde(default = "default_motion_threshold")]
    pub threshold: u8,
    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            blur_kernel: default_blur_kernel(),
            threshold: default_motion_threshold(),
            dilate_iterations: default_dilate_iterations(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub motion: MotionConfig,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Like `load`, but a missing default file falls back to defaults.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load()
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pct_ok = |v: f64| (0.0..=100.0).contains(&v);

        if !pct_ok(self.filter.min_confidence_pct) {
            return Err(ConfigError::Invalid(format!(
                "filter.min_confidence_pct must be within 0..=100, got {}",
                self.filter.min_confidence_pct
            )));
        }
        for (class, pct) in &self.filter.class_thresholds {
            if !pct_ok(*pct) {
                return Err(ConfigError::Invalid(format!(
                    "threshold for '{class}' must be within 0..=100, got {pct}"
                )));
            }
        }

        if self.render.stroke_width <= 0 {
            return Err(ConfigError::Invalid("render.stroke_width must be positive".into()));
        }
        for (class, hex) in &self.render.class_colors {
            Rgb::from_hex(hex)
                .map_err(|e| ConfigError::Invalid(format!("color for '{class}': {e}")))?;
        }

        let k = self.motion.blur_kernel;
        if k <= 0 || k % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "motion.blur_kernel must be odd and positive, got {k}"
            )));
        }

        Ok(())
    }
}
