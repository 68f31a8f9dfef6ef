use image::RgbaImage;
use rand::Rng;

/// Half-open range of the per-pixel luminance shift.
pub const NOISE_MIN: f32 = -10.0;
pub const NOISE_MAX: f32 = 10.0;

/// Adds grain in place: each pixel draws one delta that shifts R, G and B
/// together. Channels are rounded and saturate at 0 and 255; alpha is left
/// alone.
pub fn add<R: Rng + ?Sized>(img: &mut RgbaImage, rng: &mut R) {
    for px in img.pixels_mut() {
        let delta: f32 = rng.random_range(NOISE_MIN..NOISE_MAX);
        for c in 0..3 {
            px[c] = shift(px[c], delta);
        }
    }
}

fn shift(value: u8, delta: f32) -> u8 {
    (value as f32 + delta).round().clamp(0.0, 255.0) as u8
}
