use image::RgbaImage;
use palette::Srgb;

use crate::rgb_distance_sq;

/// Index of the palette entry closest to `rgb` in RGB space. On equal
/// distances the earlier entry wins.
#[inline(always)]
pub fn nearest_index(rgb: [u8; 3], palette: &[Srgb<u8>]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (idx, c) in palette.iter().enumerate() {
        let dist = rgb_distance_sq(rgb, [c.red, c.green, c.blue]);
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((idx, dist)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Recolor every foreground pixel with its nearest palette entry and make it
/// fully opaque. Background pixels are left untouched. Returns the number of
/// pixels rewritten; nothing happens when the palette is empty.
pub fn remap(img: &mut RgbaImage, mask: &[bool], palette: &[Srgb<u8>]) -> usize {
    if palette.is_empty() {
        log::debug!("remap skipped: empty palette");
        return 0;
    }

    let mut remapped = 0;
    for (pixel, _) in img
        .pixels_mut()
        .zip(mask.iter())
        .filter(|(_, is_fg)| **is_fg)
    {
        if let Some(idx) = nearest_index([pixel[0], pixel[1], pixel[2]], palette) {
            let c = palette[idx];
            pixel.0 = [c.red, c.green, c.blue, 255];
            remapped += 1;
        }
    }
    remapped
}
