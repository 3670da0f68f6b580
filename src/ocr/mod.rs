pub mod bridge;
pub mod extractor;
pub mod normalize;

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

pub use bridge::OcrBridge;
pub use extractor::{find_images, is_supported_image, OrderOcr};

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("image file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR engine failed: {0}")]
    EngineFailed(String),

    #[error("OCR engine returned invalid JSON: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that turns an image into the engine's raw result payload.
pub trait OcrEngine {
    fn recognize(&self, image_path: &Path) -> Result<Value, OcrError>;
}
