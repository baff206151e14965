use thiserror::Error;

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Unable to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid data URL: {0}")]
    DataUrl(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unable to allocate drawing surface: {0}")]
    Surface(String),

    #[error("PNG encode error: {0}")]
    Encode(String),

    #[error("Invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TextureError>;
