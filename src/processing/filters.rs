use image::RgbaImage;

use crate::state::Adjustments;

use super::color::{self, ColorOp};
use super::{blur, shadow};

pub const HALO_COLOR: [u8; 3] = [0, 0, 0];
pub const HALO_OPACITY: f32 = 0.5;

/// One named step of a filter stack, parameterised the way CSS filter
/// functions are (percentages, degrees, pixels).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    Brightness(f32),
    Contrast(f32),
    Saturate(f32),
    HueRotate(f32),
    Blur(f32),
    Grayscale(f32),
    DropShadow {
        radius: f32,
        color: [u8; 3],
        opacity: f32,
    },
}

impl FilterOp {
    fn as_color(&self) -> Option<ColorOp> {
        match *self {
            FilterOp::Brightness(p) => Some(ColorOp::brightness(p)),
            FilterOp::Contrast(p) => Some(ColorOp::contrast(p)),
            FilterOp::Saturate(p) => Some(ColorOp::saturate(p)),
            FilterOp::HueRotate(d) => Some(ColorOp::hue_rotate(d)),
            FilterOp::Grayscale(p) => Some(ColorOp::grayscale(p)),
            FilterOp::Blur(_) | FilterOp::DropShadow { .. } => None,
        }
    }
}

/// Ordered list of filter steps applied together to one draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterStack {
    ops: Vec<FilterOp>,
}

impl FilterStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds brightness → contrast → saturate → hue-rotate → blur → grayscale.
    /// Steps at their neutral value are left out.
    pub fn from_adjustments(adj: &Adjustments) -> Self {
        let mut stack = Self::new();
        if adj.brightness != 100.0 {
            stack.push(FilterOp::Brightness(adj.brightness));
        }
        if adj.contrast != 100.0 {
            stack.push(FilterOp::Contrast(adj.contrast));
        }
        if adj.saturation != 100.0 {
            stack.push(FilterOp::Saturate(adj.saturation));
        }
        if adj.temperature.rem_euclid(360.0) != 0.0 {
            stack.push(FilterOp::HueRotate(adj.temperature));
        }
        if adj.blur > 0.0 {
            stack.push(FilterOp::Blur(adj.blur));
        }
        if adj.grayscale > 0.0 {
            stack.push(FilterOp::Grayscale(adj.grayscale));
        }
        stack
    }

    pub fn push(&mut self, op: FilterOp) {
        self.ops.push(op);
    }

    /// Returns a copy with the focus halo appended.
    pub fn with_halo(&self, radius: f32) -> Self {
        let mut stack = self.clone();
        stack.push(FilterOp::DropShadow {
            radius,
            color: HALO_COLOR,
            opacity: HALO_OPACITY,
        });
        stack
    }

    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Filters `img` through every step in order. Consecutive colour steps
    /// share one pass over the pixels.
    pub fn apply(&self, img: &RgbaImage) -> RgbaImage {
        let mut out = img.clone();
        let mut pending: Vec<ColorOp> = Vec::new();
        for op in &self.ops {
            if let Some(c) = op.as_color() {
                pending.push(c);
                continue;
            }
            color::apply(&mut out, &pending);
            pending.clear();
            out = match *op {
                FilterOp::Blur(radius) if radius > 0.0 => blur::blur_rgba(&out, radius),
                FilterOp::DropShadow {
                    radius,
                    color,
                    opacity,
                } => shadow::drop_shadow(&out, radius, color, opacity),
                _ => out,
            };
        }
        color::apply(&mut out, &pending);
        out
    }
}
