use std::io::Cursor;

use anyhow::Context;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, ImageEncoder, Rgba, RgbaImage};

use crate::processing::transform;

/// The mutable pixel canvas that renders land on and exports read from.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Resizes to `width` x `height`; like a canvas, this always clears.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::new(width, height);
    }

    /// Sets every pixel to transparent black.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Draws `img` over the surface at full surface size, rotated clockwise
    /// by `degrees` about the surface center.
    pub fn draw(&mut self, img: &RgbaImage, degrees: f32) {
        transform::draw_rotated(&mut self.pixels, img, degrees);
    }

    /// Covers the whole surface with `color` at `opacity`.
    pub fn fill(&mut self, color: Rgba<u8>, opacity: f32) {
        transform::fill(&mut self.pixels, color, opacity);
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    /// Swaps in a fully rendered frame, taking its dimensions.
    pub fn replace(&mut self, pixels: RgbaImage) {
        self.pixels = pixels;
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Encodes the current pixels as PNG.
    pub fn encode_png(&self) -> anyhow::Result<Vec<u8>> {
        encode_png(&self.pixels)
    }

    /// Encodes a copy scaled to fit within `max_edge` on its longest side.
    pub fn thumbnail_png(&self, max_edge: u32) -> anyhow::Result<Vec<u8>> {
        let (w, h) = self.dimensions();
        if w <= max_edge && h <= max_edge {
            return self.encode_png();
        }
        let thumb = DynamicImage::ImageRgba8(self.pixels.clone())
            .thumbnail(max_edge, max_edge)
            .into_rgba8();
        encode_png(&thumb)
    }
}

pub fn encode_png(img: &RgbaImage) -> anyhow::Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    let encoder =
        PngEncoder::new_with_quality(&mut out, CompressionType::Default, PngFilterType::Adaptive);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .context("png encode failed")?;
    Ok(out.into_inner())
}
