//! Decode/encode boundary: raw image bytes, `data:` URLs and PNG output.

use base64::{Engine as _, engine::general_purpose};
use image::{ImageFormat, RgbaImage};

use crate::error::{Result, TextureError};

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Decode any format the `image` crate recognises into an RGBA buffer.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// PNG-encode an RGBA buffer.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut cursor = std::io::Cursor::new(&mut buf);
        img.write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| TextureError::Encode(e.to_string()))?;
    }
    Ok(buf)
}

/// Extract the payload of a `data:...;base64,` URL, or decode bare base64.
pub fn parse_data_url(reference: &str) -> Result<Vec<u8>> {
    let normalized = reference.trim();

    let payload = if normalized.starts_with(DATA_URL_PREFIX) {
        let start = normalized
            .find(BASE64_MARKER)
            .ok_or_else(|| TextureError::DataUrl("missing base64 marker".to_string()))?;
        &normalized[start + BASE64_MARKER.len()..]
    } else {
        normalized
    };

    if payload.is_empty() {
        return Err(TextureError::DataUrl("empty payload".to_string()));
    }

    Ok(general_purpose::STANDARD.decode(payload)?)
}

/// Wrap PNG bytes in a `data:image/png;base64,` URL.
pub fn to_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_data_url_round_trip_keeps_pixels() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(1, 1, Rgba([9, 8, 7, 255]));

        let url = to_data_url(&encode_png(&img).unwrap());
        assert!(url.starts_with("data:image/png;base64,"));

        let decoded = decode(&parse_data_url(&url).unwrap()).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_bare_base64_is_accepted() {
        let encoded = general_purpose::STANDARD.encode(b"abc");
        assert_eq!(parse_data_url(&encoded).unwrap(), b"abc");
    }

    #[test]
    fn test_missing_marker_is_rejected() {
        let err = parse_data_url("data:image/png,rawdata").unwrap_err();
        assert!(matches!(err, TextureError::DataUrl(_)));
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let err = parse_data_url("data:image/png;base64,@@@").unwrap_err();
        assert!(matches!(err, TextureError::Base64(_)));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        assert!(matches!(decode(b"not an image"), Err(TextureError::Decode(_))));
    }
}
