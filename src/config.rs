use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "order-ocr.toml";

/// Tool configuration, read from TOML. Every section and key is optional.
///
/// ```toml
/// [ocr]
/// interpreter = "conda"
/// args = ["run", "-n", "ocr_env", "python"]
/// script = "ocr/bridge/paddle_bridge.py"
/// lang = "ch"
///
/// [llm]
/// command = ["conda", "run", "-n", "llm_env", "python", "llm/extract.py"]
///
/// [output]
/// dir = "temp_results"
/// visualize = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ocr: OcrSettings,
    pub llm: LlmSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub interpreter: String,
    /// Arguments placed between the interpreter and the script.
    pub args: Vec<String>,
    pub script: PathBuf,
    pub lang: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            args: Vec::new(),
            script: PathBuf::from("ocr/bridge/paddle_bridge.py"),
            lang: "ch".to_string(),
        }
    }
}

/// External field-extraction step. It receives the OCR text file path as its
/// last argument and prints the model response on stdout. An empty command
/// disables the step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub command: Vec<String>,
}

impl LlmSettings {
    pub fn is_enabled(&self) -> bool {
        !self.command.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub visualize: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("temp_results"),
            visualize: true,
        }
    }
}

impl Config {
    /// Loads `explicit` if given (it must exist), otherwise
    /// `order-ocr.toml` from the working directory when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }
}
