use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::core::model::ExtractionResult;
use crate::export::Exporter;

/// Plain formatted text, the input handed to the field-extraction step.
#[derive(Debug, Clone)]
pub struct TextExporter {
    path: PathBuf,
}

impl TextExporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Exporter for TextExporter {
    fn export(&self, result: &ExtractionResult) -> Result<()> {
        fs::write(&self.path, &result.formatted_text)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
