//! Orchestration of the texture pipeline.
//!
//! Classification + accumulation, palette selection, remapping and the
//! square crop run as pure functions over an in-memory buffer. Decode and
//! encode stay at the edges (`process_bytes`, `process_data_url`), and any
//! failure degrades to returning the caller's original input together with
//! a [`PassThroughReason`].

use image::{Rgba, RgbaImage};
use palette::Srgb;
use serde::Serialize;
use thiserror::Error;

use crate::classify::{BoundingBox, classify};
use crate::codec;
use crate::crop::{Placement, crop_and_center};
use crate::error::TextureError;
use crate::quantize::select_palette;
use crate::remap::remap;
use crate::settings::TextureSettings;
use crate::to_hex;

/// Why the pipeline handed back its input instead of a processed texture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassThroughReason {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("drawing surface unavailable: {0}")]
    Surface(String),

    #[error("no foreground detected")]
    NoForeground,

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("invalid settings: {0}")]
    Settings(String),
}

impl PassThroughReason {
    /// Short machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Surface(_) => "surface",
            Self::NoForeground => "no_foreground",
            Self::Encode(_) => "encode",
            Self::Settings(_) => "settings",
        }
    }
}

impl From<TextureError> for PassThroughReason {
    fn from(err: TextureError) -> Self {
        match err {
            TextureError::Decode(_) | TextureError::DataUrl(_) | TextureError::Base64(_) => {
                Self::Decode(err.to_string())
            }
            TextureError::Surface(detail) => Self::Surface(detail),
            TextureError::Encode(detail) => Self::Encode(detail),
            TextureError::Settings(e) => Self::Settings(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedTexture {
    /// Square, alpha-masked, palette-flattened result.
    pub image: RgbaImage,
    /// Most prevalent first.
    pub palette: Vec<Srgb<u8>>,
    /// Foreground bounds in the input's coordinates.
    pub bounds: BoundingBox,
    pub placement: Placement,
    pub reference: Rgba<u8>,
}

impl ProcessedTexture {
    pub fn palette_hex(&self) -> Vec<String> {
        self.palette.iter().map(|c| to_hex(*c)).collect()
    }
}

#[derive(Debug, Clone)]
pub enum TextureOutcome {
    Processed(ProcessedTexture),
    PassThrough(PassThroughReason),
}

impl TextureOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed(_))
    }
}

/// Run the full pipeline over a decoded buffer.
///
/// The input is left untouched; a working copy is classified and remapped,
/// and a second, square buffer receives the final crop.
pub fn process_image(input: &RgbaImage, settings: &TextureSettings) -> TextureOutcome {
    let (width, height) = input.dimensions();
    if u64::from(width) * u64::from(height) > settings.max_surface_pixels {
        let reason = PassThroughReason::Surface(format!(
            "{width}x{height} input exceeds the {} pixel limit",
            settings.max_surface_pixels
        ));
        log::warn!("passing image through: {reason}");
        return TextureOutcome::PassThrough(reason);
    }

    let mut working = input.clone();
    let classification = classify(&mut working, settings);

    let Some(bounds) = classification.bounds else {
        log::warn!("passing image through: {}", PassThroughReason::NoForeground);
        return TextureOutcome::PassThrough(PassThroughReason::NoForeground);
    };

    let palette = select_palette(&classification.buckets, settings);
    let remapped = remap(&mut working, &classification.mask, &palette);
    log::debug!("remapped {remapped} foreground pixels onto {} colors", palette.len());

    match crop_and_center(&working, &bounds, settings) {
        Ok((place, image)) => TextureOutcome::Processed(ProcessedTexture {
            image,
            palette,
            bounds,
            placement: place,
            reference: classification.reference,
        }),
        Err(err) => {
            let reason = PassThroughReason::from(err);
            log::warn!("passing image through: {reason}");
            TextureOutcome::PassThrough(reason)
        }
    }
}

// ------------------------------------------------------------
// Boundary helpers
// ------------------------------------------------------------

/// Serializable summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextureReport {
    pub processed: bool,
    pub reason: Option<String>,
    pub detail: Option<String>,
    pub palette: Vec<String>,
    pub bounds: Option<BoundingBox>,
    pub placement: Option<Placement>,
}

impl TextureReport {
    fn processed(texture: &ProcessedTexture) -> Self {
        Self {
            processed: true,
            reason: None,
            detail: None,
            palette: texture.palette_hex(),
            bounds: Some(texture.bounds),
            placement: Some(texture.placement),
        }
    }

    fn pass_through(reason: &PassThroughReason) -> Self {
        Self {
            processed: false,
            reason: Some(reason.code().to_string()),
            detail: Some(reason.to_string()),
            palette: Vec::new(),
            bounds: None,
            placement: None,
        }
    }
}

/// Encoded output of [`process_bytes`]: PNG bytes when processed, otherwise
/// the original input bytes.
#[derive(Debug, Clone)]
pub struct TextureResult {
    pub bytes: Vec<u8>,
    pub report: TextureReport,
}

/// Output of [`process_data_url`]: a PNG data URL when processed, otherwise
/// the original reference string.
#[derive(Debug, Clone)]
pub struct DataUrlResult {
    pub data_url: String,
    pub report: TextureReport,
}

fn pass_through_bytes(input: &[u8], reason: PassThroughReason) -> TextureResult {
    TextureResult {
        bytes: input.to_vec(),
        report: TextureReport::pass_through(&reason),
    }
}

/// Decode, process and PNG-encode an image. Never fails: on any problem the
/// original bytes come back with the reason in the report.
pub fn process_bytes(input: &[u8], settings: &TextureSettings) -> TextureResult {
    let img = match codec::decode(input) {
        Ok(img) => img,
        Err(err) => {
            let reason = PassThroughReason::from(err);
            log::warn!("passing image through: {reason}");
            return pass_through_bytes(input, reason);
        }
    };

    match process_image(&img, settings) {
        TextureOutcome::Processed(texture) => match codec::encode_png(&texture.image) {
            Ok(bytes) => TextureResult {
                bytes,
                report: TextureReport::processed(&texture),
            },
            Err(err) => {
                let reason = PassThroughReason::from(err);
                log::warn!("passing image through: {reason}");
                pass_through_bytes(input, reason)
            }
        },
        TextureOutcome::PassThrough(reason) => pass_through_bytes(input, reason),
    }
}

/// [`process_bytes`] with settings given as JSON. Unparseable settings pass
/// the input through with a `settings` reason.
pub fn process_bytes_with_json(input: &[u8], settings_json: Option<&str>) -> TextureResult {
    let settings = match settings_json.map(TextureSettings::from_json).transpose() {
        Ok(settings) => settings.unwrap_or_default(),
        Err(err) => {
            let reason = PassThroughReason::from(err);
            log::warn!("passing image through: {reason}");
            return pass_through_bytes(input, reason);
        }
    };
    process_bytes(input, &settings)
}

/// Same as [`process_bytes`] for a `data:` URL (or bare base64) reference.
pub fn process_data_url(reference: &str, settings: &TextureSettings) -> DataUrlResult {
    let bytes = match codec::parse_data_url(reference) {
        Ok(bytes) => bytes,
        Err(err) => {
            let reason = PassThroughReason::from(err);
            log::warn!("passing reference through: {reason}");
            return DataUrlResult {
                data_url: reference.to_string(),
                report: TextureReport::pass_through(&reason),
            };
        }
    };

    let result = process_bytes(&bytes, settings);
    let data_url = if result.report.processed {
        codec::to_data_url(&result.bytes)
    } else {
        reference.to_string()
    };

    DataUrlResult {
        data_url,
        report: result.report,
    }
}
