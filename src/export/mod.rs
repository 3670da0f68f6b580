pub mod json_export;
pub mod text_export;
pub mod visual_export;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::model::ExtractionResult;

pub use json_export::JsonExporter;
pub use text_export::TextExporter;
pub use visual_export::VisualExporter;

pub trait Exporter {
    fn export(&self, result: &ExtractionResult) -> Result<()>;
}

/// Writes `result` as structured JSON to `output_path` and its formatted text
/// next to it with a `.txt` extension.
pub fn save_result_to_file(result: &ExtractionResult, output_path: &Path) -> Result<()> {
    ensure_parent_dir(output_path)?;

    JsonExporter::new(output_path.to_path_buf()).export(result)?;
    TextExporter::new(output_path.with_extension("txt")).export(result)?;
    Ok(())
}

pub fn load_result(path: &Path) -> Result<ExtractionResult> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display())),
        _ => Ok(()),
    }
}
