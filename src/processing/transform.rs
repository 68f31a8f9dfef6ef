use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Sine and cosine of a clockwise rotation, exact on quarter turns so that
/// right-angle draws land on pixel centers.
fn rotation_sin_cos(degrees: f32) -> (f32, f32) {
    let turned = degrees.rem_euclid(360.0);
    match turned {
        t if t == 0.0 => (0.0, 1.0),
        t if t == 90.0 => (1.0, 0.0),
        t if t == 180.0 => (0.0, -1.0),
        t if t == 270.0 => (-1.0, 0.0),
        t => t.to_radians().sin_cos(),
    }
}

/// Bilinear sample at continuous pixel coordinates (pixel centers sit on
/// `n + 0.5`). Texels outside the image count as transparent. Returns
/// premultiplied RGBA in 0..1.
fn sample_premultiplied(img: &RgbaImage, x: f32, y: f32) -> [f32; 4] {
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let (w, h) = (img.width() as i64, img.height() as i64);

    let mut acc = [0.0f32; 4];
    for (dx, dy, weight) in [
        (0, 0, (1.0 - tx) * (1.0 - ty)),
        (1, 0, tx * (1.0 - ty)),
        (0, 1, (1.0 - tx) * ty),
        (1, 1, tx * ty),
    ] {
        if weight <= 0.0 {
            continue;
        }
        let sx = x0 as i64 + dx;
        let sy = y0 as i64 + dy;
        if sx < 0 || sy < 0 || sx >= w || sy >= h {
            continue;
        }
        let p = img.get_pixel(sx as u32, sy as u32);
        let a = p[3] as f32 / 255.0;
        for c in 0..3 {
            acc[c] += p[c] as f32 / 255.0 * a * weight;
        }
        acc[3] += a * weight;
    }
    acc
}

/// Source-over of one premultiplied colour onto a straight-alpha pixel.
fn composite_over(dst: &mut [u8], src: [f32; 4]) {
    let sa = src[3];
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let oa = sa + da * (1.0 - sa);
    for c in 0..3 {
        let under = dst[c] as f32 / 255.0 * da * (1.0 - sa);
        dst[c] = ((src[c] + under) / oa * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (oa * 255.0).round() as u8;
}

/// Draws `src` over `dst`, stretched to the full size of `dst` and rotated
/// clockwise by `degrees` about the center of `dst`.
pub fn draw_rotated(dst: &mut RgbaImage, src: &RgbaImage, degrees: f32) {
    let (dw, dh) = dst.dimensions();
    if dw == 0 || dh == 0 || src.width() == 0 || src.height() == 0 {
        return;
    }
    let (sin, cos) = rotation_sin_cos(degrees);
    let cx = dw as f32 / 2.0;
    let cy = dh as f32 / 2.0;
    let scale_x = src.width() as f32 / dw as f32;
    let scale_y = src.height() as f32 / dh as f32;
    let identity = sin == 0.0 && cos == 1.0 && src.dimensions() == dst.dimensions();

    let row_len = dw as usize * 4;
    let raw: &mut [u8] = dst;
    raw.par_chunks_exact_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                if identity {
                    let s = src.get_pixel(x as u32, y as u32);
                    if px[3] == 0 {
                        px.copy_from_slice(&s.0);
                    } else {
                        let a = s[3] as f32 / 255.0;
                        let pre = [s[0], s[1], s[2]].map(|c| c as f32 / 255.0 * a);
                        composite_over(px, [pre[0], pre[1], pre[2], a]);
                    }
                    continue;
                }
                // Inverse-map the destination pixel center into the source.
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let ux = cos * dx + sin * dy + cx;
                let uy = -sin * dx + cos * dy + cy;
                let sample = sample_premultiplied(src, ux * scale_x, uy * scale_y);
                if px[3] == 0 {
                    write_premultiplied(px, sample);
                } else {
                    composite_over(px, sample);
                }
            }
        });
}

fn write_premultiplied(px: &mut [u8], src: [f32; 4]) {
    let a = src[3];
    if a <= 0.0 {
        px.copy_from_slice(&[0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        px[c] = (src[c] / a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    px[3] = (a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Covers all of `dst` with `color` at `opacity`, source-over.
pub fn fill(dst: &mut RgbaImage, color: Rgba<u8>, opacity: f32) {
    let a = (color[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    let src = [
        color[0] as f32 / 255.0 * a,
        color[1] as f32 / 255.0 * a,
        color[2] as f32 / 255.0 * a,
        a,
    ];
    let raw: &mut [u8] = dst;
    raw.par_chunks_exact_mut(4)
        .for_each(|px| composite_over(px, src));
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgba, RgbaImage, imageops};

    use super::{draw_rotated, fill};

    fn pattern(w: u32, h: u32) -> RgbaImage {
        ImageBuffer::from_fn(w, h, |x, y| Rgba([(x * 50) as u8, (y * 60) as u8, 90, 255]))
    }

    #[test]
    fn unrotated_draw_onto_clear_surface_copies() {
        let src = ImageBuffer::from_fn(3, 3, |x, y| Rgba([x as u8 * 70, y as u8, 5, 100 + x as u8]));
        let mut dst = RgbaImage::new(3, 3);
        draw_rotated(&mut dst, &src, 0.0);
        assert_eq!(dst, src);
    }

    #[test]
    fn quarter_turn_matches_clockwise_rotate90() {
        let src = pattern(4, 4);
        let mut dst = RgbaImage::new(4, 4);
        draw_rotated(&mut dst, &src, 90.0);
        assert_eq!(dst, imageops::rotate90(&src));
    }

    #[test]
    fn negative_quarter_turn_is_counter_clockwise() {
        let src = pattern(5, 5);
        let mut dst = RgbaImage::new(5, 5);
        draw_rotated(&mut dst, &src, -90.0);
        assert_eq!(dst, imageops::rotate270(&src));
    }

    #[test]
    fn rotated_corners_uncover_transparent_pixels() {
        let src = pattern(10, 10);
        let mut dst = RgbaImage::new(10, 10);
        draw_rotated(&mut dst, &src, 45.0);
        assert_eq!(dst.get_pixel(0, 0)[3], 0);
        assert_eq!(dst.get_pixel(5, 5)[3], 255);
    }

    #[test]
    fn fill_tints_opaque_pixels() {
        let mut dst = ImageBuffer::from_pixel(2, 2, Rgba([0u8, 0, 255, 255]));
        fill(&mut dst, Rgba([255, 165, 0, 255]), 0.2);
        assert_eq!(dst.get_pixel(1, 1).0, [51, 33, 204, 255]);
    }

    #[test]
    fn opaque_draw_replaces_existing_pixels() {
        let src = pattern(3, 2);
        let mut dst = ImageBuffer::from_pixel(3, 2, Rgba([9u8, 9, 9, 255]));
        draw_rotated(&mut dst, &src, 0.0);
        assert_eq!(dst, src);
    }
}
