use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::model::ExtractionResult;
use crate::ocr::normalize::{is_empty_payload, normalize_payload};
use crate::ocr::{OcrEngine, OcrError};

pub const NO_TEXT_RECOGNIZED: &str = "no text recognized";

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

/// Order-image text extractor on top of an [`OcrEngine`].
#[derive(Debug, Clone)]
pub struct OrderOcr<E> {
    engine: E,
}

impl<E: OcrEngine> OrderOcr<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn extract_text_from_image(&self, image_path: &Path) -> Result<ExtractionResult, OcrError> {
        if !image_path.is_file() {
            return Err(OcrError::FileNotFound(image_path.to_path_buf()));
        }

        let raw = self.engine.recognize(image_path)?;
        if is_empty_payload(&raw) {
            info!(image = %image_path.display(), "{}", NO_TEXT_RECOGNIZED);
            return Ok(ExtractionResult::empty(raw, NO_TEXT_RECOGNIZED));
        }

        let normalized = normalize_payload(&raw);
        let mut result = ExtractionResult::from_lines(raw, normalized.lines);
        if let Some(err) = normalized.fallback {
            result.error = Some(format!("payload kept verbatim: {err}"));
        }
        info!(
            image = %image_path.display(),
            lines = result.total_lines,
            "text extracted"
        );
        Ok(result)
    }
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Supported images directly inside `dir`, sorted by path.
pub fn find_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn recognizes_image_extensions() {
        assert!(is_supported_image(Path::new("order.png")));
        assert!(is_supported_image(Path::new("scan.JPEG")));
        assert!(is_supported_image(Path::new("a/b/c.Tif")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("png")));
    }

    #[test]
    fn finds_images_sorted() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b.jpg", "a.PNG", "readme.md", "c.bmp"] {
            fs::write(dir.path().join(name), b"")?;
        }
        fs::create_dir(dir.path().join("nested.png"))?;

        let names: Vec<_> = find_images(dir.path())?
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.jpg", "c.bmp"]);
        Ok(())
    }
}
