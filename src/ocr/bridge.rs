use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tracing::debug;

use crate::config::OcrSettings;
use crate::ocr::{OcrEngine, OcrError};

/// Runs the OCR library in its own interpreter and reads the payload it
/// prints on stdout.
#[derive(Debug, Clone)]
pub struct OcrBridge {
    interpreter: String,
    script_path: PathBuf,
    lang: String,
    extra_args: Vec<String>,
}

impl OcrBridge {
    pub fn new(interpreter: impl Into<String>, script_path: PathBuf) -> Self {
        Self {
            interpreter: interpreter.into(),
            script_path,
            lang: "ch".to_string(),
            extra_args: Vec::new(),
        }
    }

    pub fn from_settings(settings: &OcrSettings) -> Self {
        Self::new(settings.interpreter.clone(), settings.script.clone())
            .with_lang(settings.lang.clone())
            .with_args(settings.args.clone())
    }

    pub fn with_lang(mut self, lang: String) -> Self {
        self.lang = lang;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}

impl OcrEngine for OcrBridge {
    fn recognize(&self, image_path: &Path) -> Result<Value, OcrError> {
        debug!(
            interpreter = %self.interpreter,
            script = %self.script_path.display(),
            image = %image_path.display(),
            "invoking OCR bridge"
        );
        let output = Command::new(&self.interpreter)
            .args(&self.extra_args)
            .arg(&self.script_path)
            .arg("--image")
            .arg(image_path)
            .arg("--lang")
            .arg(&self.lang)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => OcrError::BackendNotAvailable(format!(
                    "interpreter '{}' not found",
                    self.interpreter
                )),
                _ => OcrError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::EngineFailed(format!(
                "bridge exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let payload = serde_json::from_str(stdout.trim())?;
        Ok(payload)
    }
}
