use std::collections::HashMap;

use opencv::core::Scalar;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid color '{0}', expected #RRGGBB")]
pub struct ColorParseError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Result<Self, ColorParseError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ColorParseError(hex.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ColorParseError(hex.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Scalar in RGB channel order, matching the frames the renderer draws on.
    pub fn to_scalar(self) -> Scalar {
        Scalar::new(self.r as f64, self.g as f64, self.b as f64, 0.0)
    }
}

/// Per-session label to color table. Entries are never removed, so a label
/// keeps its color for the lifetime of the session.
pub struct ColorAssignment<R: RngCore = StdRng> {
    colors: HashMap<String, Rgb>,
    rng: R,
}

impl ColorAssignment<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for ColorAssignment<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> ColorAssignment<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            colors: HashMap::new(),
            rng,
        }
    }

    /// Returns the color for `class_label`, drawing a fresh one the first
    /// time the label is seen.
    pub fn color_for(&mut self, class_label: &str) -> Rgb {
        if let Some(&color) = self.colors.get(class_label) {
            return color;
        }

        let color = Rgb::new(self.rng.gen(), self.rng.gen(), self.rng.gen());
        tracing::debug!(class = %class_label, color = %color.to_hex(), "assigned class color");
        self.colors.insert(class_label.to_string(), color);
        color
    }

    /// Pins a label to a chosen color, replacing any earlier entry.
    pub fn set_color(&mut self, class_label: impl Into<String>, color: Rgb) {
        self.colors.insert(class_label.into(), color);
    }

    pub fn get(&self, class_label: &str) -> Option<Rgb> {
        self.colors.get(class_label).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}
