use image::{GrayImage, Luma, RgbaImage};

use super::blur::gaussian_clear_edges;

/// Composites `img` over a zero-offset shadow of itself.
///
/// The shadow is the image's alpha blurred with a standard deviation of half
/// `radius`, tinted `color` (straight RGB plus opacity).
pub fn drop_shadow(img: &RgbaImage, radius: f32, color: [u8; 3], opacity: f32) -> RgbaImage {
    let (w, h) = img.dimensions();
    let alpha = GrayImage::from_fn(w, h, |x, y| Luma([img.get_pixel(x, y)[3]]));
    let sigma = radius / 2.0;
    let spread = gaussian_clear_edges(&alpha, sigma);

    let mut out = img.clone();
    for (px, shadow) in out.pixels_mut().zip(spread.pixels()) {
        let sa = shadow[0] as f32 / 255.0 * opacity.clamp(0.0, 1.0);
        let a = px[3] as f32 / 255.0;
        let oa = a + sa * (1.0 - a);
        if oa <= 0.0 {
            continue;
        }
        for c in 0..3 {
            let top = px[c] as f32 * a;
            let under = color[c] as f32 * sa * (1.0 - a);
            px[c] = ((top + under) / oa).round().clamp(0.0, 255.0) as u8;
        }
        px[3] = (oa * 255.0).round() as u8;
    }
    out
}
