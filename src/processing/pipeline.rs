use image::{Rgba, RgbaImage};

use crate::state::Adjustments;
use crate::surface::Surface;

use super::filters::FilterStack;

pub const RETRO_TINT: Rgba<u8> = Rgba([255, 165, 0, 255]);
pub const RETRO_OPACITY: f32 = 0.2;

/// Renders `source` through `adj` onto `surface`, overwriting it.
///
/// Order is fixed: clear, rotate the draw frame, filter and draw the source,
/// optionally re-draw the surface onto itself with the focus halo, then the
/// retro tint.
pub fn render(source: &RgbaImage, adj: &Adjustments, surface: &mut Surface) {
    surface.clear();

    let stack = FilterStack::from_adjustments(adj);
    let filtered = stack.apply(source);
    surface.draw(&filtered, adj.rotation);

    // The halo pass runs the whole stack again over what is already on the
    // surface, under the same rotation.
    if adj.focus > 0.0 {
        let current = surface.pixels().clone();
        let haloed = stack.with_halo(adj.focus).apply(&current);
        surface.draw(&haloed, adj.rotation);
    }

    if adj.retro {
        surface.fill(RETRO_TINT, RETRO_OPACITY);
    }
}

/// Renders into a fresh surface sized to `source`.
pub fn render_to_image(source: &RgbaImage, adj: &Adjustments) -> RgbaImage {
    let mut surface = Surface::new(source.width(), source.height());
    render(source, adj, &mut surface);
    surface.into_pixels()
}
