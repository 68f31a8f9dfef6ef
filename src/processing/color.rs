use image::RgbaImage;
use rayon::prelude::*;

// Rec. 709 luma weights as used by the CSS filter matrices.
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// A per-pixel colour transform on normalized, non-linear RGB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorOp {
    /// `c' = c * slope + intercept` on each channel.
    Transfer { slope: f32, intercept: f32 },
    Matrix([[f32; 3]; 3]),
}

impl ColorOp {
    /// `brightness(pct%)`
    pub fn brightness(pct: f32) -> Self {
        Self::Transfer {
            slope: pct.max(0.0) / 100.0,
            intercept: 0.0,
        }
    }

    /// `contrast(pct%)`, pivoting around mid-gray.
    pub fn contrast(pct: f32) -> Self {
        let slope = pct.max(0.0) / 100.0;
        Self::Transfer {
            slope,
            intercept: 0.5 - 0.5 * slope,
        }
    }

    /// `saturate(pct%)`
    pub fn saturate(pct: f32) -> Self {
        let s = pct.max(0.0) / 100.0;
        Self::Matrix([
            [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
            [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
            [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
        ])
    }

    /// `hue-rotate(deg)`
    pub fn hue_rotate(deg: f32) -> Self {
        let (sin, cos) = deg.to_radians().sin_cos();
        Self::Matrix([
            [
                0.213 + cos * 0.787 - sin * 0.213,
                0.715 - cos * 0.715 - sin * 0.715,
                0.072 - cos * 0.072 + sin * 0.928,
            ],
            [
                0.213 - cos * 0.213 + sin * 0.143,
                0.715 + cos * 0.285 + sin * 0.140,
                0.072 - cos * 0.072 - sin * 0.283,
            ],
            [
                0.213 - cos * 0.213 - sin * 0.787,
                0.715 - cos * 0.715 + sin * 0.715,
                0.072 + cos * 0.928 + sin * 0.072,
            ],
        ])
    }

    /// `grayscale(pct%)`, capped at full desaturation.
    pub fn grayscale(pct: f32) -> Self {
        let g = 1.0 - pct.clamp(0.0, 100.0) / 100.0;
        Self::Matrix([
            [
                LUMA_R + (1.0 - LUMA_R) * g,
                LUMA_G - LUMA_G * g,
                LUMA_B - LUMA_B * g,
            ],
            [
                LUMA_R - LUMA_R * g,
                LUMA_G + (1.0 - LUMA_G) * g,
                LUMA_B - LUMA_B * g,
            ],
            [
                LUMA_R - LUMA_R * g,
                LUMA_G - LUMA_G * g,
                LUMA_B + (1.0 - LUMA_B) * g,
            ],
        ])
    }

    fn apply_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let out = match self {
            Self::Transfer { slope, intercept } => rgb.map(|c| c * slope + intercept),
            Self::Matrix(m) => [0, 1, 2].map(|row| {
                m[row][0] * rgb[0] + m[row][1] * rgb[1] + m[row][2] * rgb[2]
            }),
        };
        out.map(|c| c.clamp(0.0, 1.0))
    }
}

/// Runs `ops` in order over every pixel, leaving alpha untouched.
pub fn apply(img: &mut RgbaImage, ops: &[ColorOp]) {
    if ops.is_empty() {
        return;
    }
    let raw: &mut [u8] = img;
    raw.par_chunks_exact_mut(4).for_each(|px| {
        let mut rgb = [px[0], px[1], px[2]].map(|c| c as f32 / 255.0);
        for op in ops {
            rgb = op.apply_rgb(rgb);
        }
        for (dst, c) in px.iter_mut().zip(rgb) {
            *dst = (c * 255.0).round() as u8;
        }
    });
}
