use wasm_bindgen::prelude::*;
use js_sys::{Uint8Array, Array, Object, Reflect};
use palette::Srgb;

pub mod classify;
pub mod codec;
pub mod crop;
pub mod error;
pub mod pipeline;
pub mod quantize;
pub mod remap;
pub mod settings;

pub use classify::{BoundingBox, Classification, ColorBuckets, classify};
pub use crop::{Placement, crop_and_center};
pub use error::TextureError;
pub use pipeline::{
    DataUrlResult, PassThroughReason, ProcessedTexture, TextureOutcome, TextureReport,
    TextureResult, process_bytes, process_bytes_with_json, process_data_url, process_image,
};
pub use quantize::select_palette;
pub use remap::remap;
pub use settings::TextureSettings;

// ------------------------------------------------------------
// Color helpers shared by the pipeline stages
// ------------------------------------------------------------

/// Squared Euclidean distance in RGB space.
#[inline(always)]
pub(crate) fn rgb_distance_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

#[inline(always)]
pub(crate) fn srgb_distance_sq(a: Srgb<u8>, b: Srgb<u8>) -> u32 {
    rgb_distance_sq([a.red, a.green, a.blue], [b.red, b.green, b.blue])
}

/// Uppercase `RRGGBB` hex, the palette format handed to downstream services.
pub fn to_hex(c: Srgb<u8>) -> String {
    format!("{:02X}{:02X}{:02X}", c.red, c.green, c.blue)
}

// ------------------------------------------------------------
// WASM entry points
// ------------------------------------------------------------

/// Turn an uploaded image into an extrusion-ready texture.
///
/// Steps performed:
/// 1. Classify every pixel as background or foreground against the top-left pixel.
/// 2. Pick up to four dominant, mutually distinct colors from the foreground.
/// 3. Snap every foreground pixel to its nearest palette color at full opacity.
/// 4. Crop to the foreground, pad by 20% and center on a square canvas.
///
/// The returned object carries `image` (PNG bytes, or the untouched input when
/// processing was not possible), `palette` (hex strings), `processed` and,
/// for pass-throughs, a `reason` code (malformed settings JSON included).
#[wasm_bindgen]
pub fn process_texture(input: Vec<u8>, settings_json: Option<String>) -> Result<Object, JsValue> {
    let result = process_bytes_with_json(&input, settings_json.as_deref());

    let img_js = Uint8Array::from(result.bytes.as_slice());
    let palette_js = Array::new();
    for hex in &result.report.palette {
        palette_js.push(&JsValue::from_str(hex));
    }

    let object = Object::new();
    Reflect::set(&object, &JsValue::from_str("image"), &img_js)?;
    Reflect::set(&object, &JsValue::from_str("palette"), &palette_js)?;
    Reflect::set(
        &object,
        &JsValue::from_str("processed"),
        &JsValue::from_bool(result.report.processed),
    )?;
    if let Some(reason) = &result.report.reason {
        Reflect::set(&object, &JsValue::from_str("reason"), &JsValue::from_str(reason))?;
    }

    Ok(object)
}

/// Data-URL flavour of [`process_texture`]: resolves with a PNG data URL, or
/// with `reference` unchanged when processing was not possible.
#[wasm_bindgen]
pub fn process_texture_data_url(reference: String) -> String {
    process_data_url(&reference, &TextureSettings::default()).data_url
}
