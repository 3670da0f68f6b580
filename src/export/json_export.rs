use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::core::model::ExtractionResult;
use crate::export::Exporter;

#[derive(Debug, Clone)]
pub struct JsonExporter {
    path: PathBuf,
}

impl JsonExporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Exporter for JsonExporter {
    fn export(&self, result: &ExtractionResult) -> Result<()> {
        let data = serde_json::to_string_pretty(result)?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
