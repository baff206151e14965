use image::{RgbaImage, imageops};
use serde::Serialize;

use crate::classify::BoundingBox;
use crate::error::{Result, TextureError};
use crate::settings::TextureSettings;

/// Where the content rectangle lands on the square canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub side: u32,
    pub dest_x: u32,
    pub dest_y: u32,
}

/// Compute the padded square side and the centered destination offset.
/// Offsets round half up on both axes, so any non-zero margin leaves the
/// canvas origin transparent.
pub fn placement(bounds: &BoundingBox, settings: &TextureSettings) -> Result<Placement> {
    let (content_w, content_h) = (bounds.width(), bounds.height());
    let side = settings.square_side(content_w, content_h);

    if side.saturating_mul(side) > settings.max_surface_pixels {
        return Err(TextureError::Surface(format!(
            "{side}x{side} canvas exceeds the {} pixel limit",
            settings.max_surface_pixels
        )));
    }
    let side = u32::try_from(side)
        .map_err(|_| TextureError::Surface(format!("canvas side {side} out of range")))?;

    Ok(Placement {
        side,
        dest_x: (side - content_w).div_ceil(2),
        dest_y: (side - content_h).div_ceil(2),
    })
}

/// Copy the bounded content onto a fresh transparent square canvas,
/// centered, without any resampling.
pub fn crop_and_center(
    img: &RgbaImage,
    bounds: &BoundingBox,
    settings: &TextureSettings,
) -> Result<(Placement, RgbaImage)> {
    let (width, height) = img.dimensions();
    if bounds.max_x >= width || bounds.max_y >= height {
        return Err(TextureError::Surface(format!(
            "bounds {bounds:?} fall outside the {width}x{height} buffer"
        )));
    }

    let place = placement(bounds, settings)?;
    let content =
        imageops::crop_imm(img, bounds.min_x, bounds.min_y, bounds.width(), bounds.height())
            .to_image();

    let mut canvas = RgbaImage::new(place.side, place.side);
    // `replace` copies pixels verbatim; `overlay` would alpha-blend.
    imageops::replace(
        &mut canvas,
        &content,
        i64::from(place.dest_x),
        i64::from(place.dest_y),
    );

    log::debug!(
        "cropped {}x{} content at ({}, {}) onto {}x{} canvas",
        bounds.width(),
        bounds.height(),
        place.dest_x,
        place.dest_y,
        place.side,
        place.side
    );

    Ok((place, canvas))
}
