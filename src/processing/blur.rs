use image::{ImageBuffer, Pixel, RgbaImage, imageops};
use imageproc::filter::gaussian_blur_f32;

/// Gaussian blur that treats everything outside the image as transparent
/// black, so content fades toward the borders instead of smearing the edge
/// pixels outward.
pub fn gaussian_clear_edges<P>(img: &ImageBuffer<P, Vec<u8>>, sigma: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = img.dimensions();
    if sigma <= 0.0 || w == 0 || h == 0 {
        return img.clone();
    }
    let pad = (sigma * 3.0).ceil() as u32;
    let mut padded = ImageBuffer::<P, Vec<u8>>::new(w + 2 * pad, h + 2 * pad);
    imageops::replace(&mut padded, img, pad as i64, pad as i64);
    let blurred = gaussian_blur_f32(&padded, sigma);
    imageops::crop_imm(&blurred, pad, pad, w, h).to_image()
}

/// Blurs straight-alpha RGBA in premultiplied space, the way a canvas blur
/// filter does, so transparent pixels do not bleed black into colour.
pub fn blur_rgba(img: &RgbaImage, sigma: f32) -> RgbaImage {
    let mut pre = img.clone();
    for px in pre.pixels_mut() {
        let a = px[3] as u32;
        for c in 0..3 {
            px[c] = ((px[c] as u32 * a + 127) / 255) as u8;
        }
    }
    let mut out = gaussian_clear_edges(&pre, sigma);
    for px in out.pixels_mut() {
        let a = px[3] as u32;
        if a == 0 {
            px.0 = [0; 4];
            continue;
        }
        for c in 0..3 {
            px[c] = ((px[c] as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
    out
}
