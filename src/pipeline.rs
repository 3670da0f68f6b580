use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Instant;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, LlmSettings};
use crate::core::model::{
    BatchEntry, BatchSummary, ExtractionResult, FinalResult, LlmOutcome, OcrSummary, OrderFields,
};
use crate::export::{ensure_parent_dir, save_result_to_file, Exporter, VisualExporter};
use crate::fields::{extract_basic_fields, parse_model_response};
use crate::ocr::{find_images, OcrBridge, OcrEngine, OrderOcr};

pub const OCR_RESULT_FILE: &str = "ocr_result.json";
pub const OCR_TEXT_FILE: &str = "ocr_result.txt";
pub const FINAL_RESULT_FILE: &str = "final_result.json";
pub const VISUALIZATION_FILE: &str = "visualization.png";
pub const BATCH_SUMMARY_FILE: &str = "batch_summary.json";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub settings: Config,
    pub use_llm: bool,
}

impl PipelineConfig {
    pub fn new(input: PathBuf, output: PathBuf, settings: Config) -> Self {
        Self {
            input,
            output,
            settings,
            use_llm: true,
        }
    }

    pub fn without_llm(mut self) -> Self {
        self.use_llm = false;
        self
    }

    fn llm_enabled(&self) -> bool {
        self.use_llm && self.settings.llm.is_enabled()
    }
}

/// An external step exited unsuccessfully. Stops the whole run, batch
/// included.
#[derive(Debug, Error)]
#[error("{step} step exited with {status}: {stderr}")]
pub struct StepFailed {
    pub step: &'static str,
    pub status: ExitStatus,
    pub stderr: String,
}

/// Field-extraction command living in its own environment.
#[derive(Debug, Clone)]
pub struct ExternalStep {
    program: String,
    args: Vec<String>,
}

impl ExternalStep {
    pub fn from_settings(settings: &LlmSettings) -> Option<Self> {
        let (program, args) = settings.command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs the command with `text_path` appended and returns its stdout.
    pub fn run(&self, text_path: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(text_path)
            .output()
            .with_context(|| format!("failed to invoke extraction command '{}'", self.program))?;

        if !output.status.success() {
            return Err(StepFailed {
                step: "extraction",
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Fails unless every environment the configured steps need is present.
pub fn check_environment(config: &PipelineConfig) -> Result<()> {
    let ocr = &config.settings.ocr;
    which::which(&ocr.interpreter).with_context(|| {
        format!(
            "OCR environment not found: interpreter '{}' is not on PATH",
            ocr.interpreter
        )
    })?;
    if !ocr.script.is_file() {
        anyhow::bail!("OCR bridge script not found: {}", ocr.script.display());
    }

    if config.llm_enabled() {
        if let Some(step) = ExternalStep::from_settings(&config.settings.llm) {
            which::which(step.program()).with_context(|| {
                format!(
                    "extraction environment not found: '{}' is not on PATH",
                    step.program()
                )
            })?;
        }
    }
    Ok(())
}

/// OCR, field extraction and result consolidation for order images.
#[derive(Debug, Clone)]
pub struct Pipeline<E> {
    ocr: OrderOcr<E>,
    extraction: Option<ExternalStep>,
    visualize: bool,
}

impl Pipeline<OcrBridge> {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let extraction = if config.use_llm {
            ExternalStep::from_settings(&config.settings.llm)
        } else {
            None
        };
        Self::new(
            OrderOcr::new(OcrBridge::from_settings(&config.settings.ocr)),
            extraction,
            config.settings.output.visualize,
        )
    }
}

impl<E: OcrEngine> Pipeline<E> {
    pub fn new(ocr: OrderOcr<E>, extraction: Option<ExternalStep>, visualize: bool) -> Self {
        Self {
            ocr,
            extraction,
            visualize,
        }
    }

    /// Runs every step for one image and writes its results under `out_dir`.
    pub fn process_image(&self, image: &Path, out_dir: &Path) -> Result<FinalResult> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;

        let started = Instant::now();
        let result = self
            .ocr
            .extract_text_from_image(image)
            .with_context(|| format!("OCR failed for {}", image.display()))?;
        info!(
            lines = result.total_lines,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "OCR step finished"
        );

        save_result_to_file(&result, &out_dir.join(OCR_RESULT_FILE))?;
        if self.visualize && !result.lines.is_empty() {
            self.save_visualization(image, &result, &out_dir.join(VISUALIZATION_FILE));
        }

        let basic = extract_basic_fields(&result.lines);
        let llm = self.run_extraction(&result, &out_dir.join(OCR_TEXT_FILE))?;
        let final_extraction = llm
            .as_ref()
            .map(|outcome| outcome.fields.clone())
            .unwrap_or_else(|| basic.clone());

        let final_result = FinalResult {
            success: result.success,
            image_path: image.display().to_string(),
            processed_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ocr: OcrSummary {
                total_lines: result.total_lines,
                confidence_avg: result.average_confidence(),
                formatted_text: result.formatted_text.clone(),
                basic_extraction: basic,
            },
            llm,
            final_extraction,
        };
        write_json(&out_dir.join(FINAL_RESULT_FILE), &final_result)?;
        Ok(final_result)
    }

    /// Processes every supported image in `input_dir` in path order. An image
    /// that fails is recorded and skipped; a failing external step aborts.
    pub fn run_batch(&self, input_dir: &Path, out_dir: &Path) -> Result<BatchSummary> {
        if !input_dir.is_dir() {
            anyhow::bail!("input folder does not exist: {}", input_dir.display());
        }
        let images = find_images(input_dir)
            .with_context(|| format!("failed to list {}", input_dir.display()))?;
        if images.is_empty() {
            anyhow::bail!("no images found in {}", input_dir.display());
        }

        let mut summary = BatchSummary::new(images.len());
        for (idx, image) in images.iter().enumerate() {
            let image_name = image
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = image
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("image_{:03}", idx + 1));
            info!(
                "[{}/{}] processing {}",
                idx + 1,
                images.len(),
                image_name
            );

            let entry = match self.process_image(image, &out_dir.join(&stem)) {
                Ok(result) => BatchEntry {
                    image_name,
                    image_path: image.display().to_string(),
                    success: result.success,
                    total_lines: result.ocr.total_lines,
                    confidence_avg: result.ocr.confidence_avg,
                    error: None,
                    final_extraction: Some(result.final_extraction),
                },
                Err(err) if err.downcast_ref::<StepFailed>().is_some() => return Err(err),
                Err(err) => {
                    warn!(image = %image.display(), error = %format!("{err:#}"), "image failed");
                    BatchEntry {
                        image_name,
                        image_path: image.display().to_string(),
                        success: false,
                        total_lines: 0,
                        confidence_avg: 0.0,
                        error: Some(format!("{err:#}")),
                        final_extraction: None,
                    }
                }
            };
            summary.record(entry);
        }

        write_json(&out_dir.join(BATCH_SUMMARY_FILE), &summary)?;
        Ok(summary)
    }

    fn run_extraction(&self, result: &ExtractionResult, text_path: &Path) -> Result<Option<LlmOutcome>> {
        let Some(step) = &self.extraction else {
            return Ok(None);
        };
        if result.formatted_text.trim().is_empty() {
            warn!("no OCR text to hand to the extraction step");
            return Ok(Some(LlmOutcome {
                fields: OrderFields::default(),
                model_response: String::new(),
            }));
        }

        let started = Instant::now();
        let response = step.run(text_path)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extraction step finished"
        );
        Ok(Some(LlmOutcome {
            fields: parse_model_response(&response),
            model_response: response,
        }))
    }

    fn save_visualization(&self, image: &Path, result: &ExtractionResult, out: &Path) {
        let exporter = VisualExporter::new(image.to_path_buf(), out.to_path_buf());
        if let Err(err) = exporter.export(result) {
            warn!(error = %format!("{err:#}"), "could not save visualization");
        }
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::NOT_FOUND;
    use crate::ocr::OcrError;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    struct FixedEngine(Value);

    impl OcrEngine for FixedEngine {
        fn recognize(&self, _image_path: &Path) -> Result<Value, OcrError> {
            Ok(self.0.clone())
        }
    }

    fn order_payload() -> Value {
        json!([{
            "rec_texts": ["XX化工贸易公司", "数量：500斤", "下订单日期：2024年7月1日"],
            "rec_scores": [0.98, 0.9, 0.86]
        }])
    }

    fn shell_step(script: &str) -> ExternalStep {
        ExternalStep::from_settings(&LlmSettings {
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        })
        .unwrap()
    }

    #[test]
    fn external_step_needs_a_program() {
        assert!(ExternalStep::from_settings(&LlmSettings::default()).is_none());
    }

    #[test]
    fn without_extraction_basic_fields_are_final() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let image = dir.path().join("order.png");
        fs::write(&image, b"")?;
        let pipeline = Pipeline::new(OrderOcr::new(FixedEngine(order_payload())), None, false);

        let result = pipeline.process_image(&image, &dir.path().join("out"))?;

        assert!(result.success);
        assert!(result.llm.is_none());
        assert_eq!(result.final_extraction.company_name, "XX化工贸易公司");
        assert_eq!(result.final_extraction.product_quantity, "数量:500斤");
        assert!(dir.path().join("out").join(OCR_RESULT_FILE).exists());
        assert!(dir.path().join("out").join(OCR_TEXT_FILE).exists());
        assert!(dir.path().join("out").join(FINAL_RESULT_FILE).exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn extraction_response_overrides_basic_fields() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let image = dir.path().join("order.png");
        fs::write(&image, b"")?;
        let step = shell_step(
            r#"echo '{"company_name": "XX化工贸易公司", "product_name": "烧碱", "product_quantity": "500斤", "order_date": "2024年7月1日"}'"#,
        );
        let pipeline = Pipeline::new(OrderOcr::new(FixedEngine(order_payload())), Some(step), false);

        let result = pipeline.process_image(&image, dir.path())?;

        let llm = result.llm.expect("extraction outcome");
        assert_eq!(llm.fields.product_name, "烧碱");
        assert_eq!(result.final_extraction, llm.fields);
        assert_eq!(result.ocr.basic_extraction.product_name, NOT_FOUND);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn failing_step_halts_batch() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("images");
        fs::create_dir(&input)?;
        fs::write(input.join("a.png"), b"")?;
        fs::write(input.join("b.png"), b"")?;
        let pipeline = Pipeline::new(
            OrderOcr::new(FixedEngine(order_payload())),
            Some(shell_step("echo boom >&2; exit 3")),
            false,
        );

        let err = pipeline
            .run_batch(&input, &dir.path().join("out"))
            .expect_err("step failure must abort");
        let failed = err.downcast_ref::<StepFailed>().expect("StepFailed");
        assert_eq!(failed.stderr, "boom");
        assert!(!dir.path().join("out").join(BATCH_SUMMARY_FILE).exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn empty_text_skips_extraction_step() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let image = dir.path().join("blank.png");
        fs::write(&image, b"")?;
        let pipeline = Pipeline::new(
            OrderOcr::new(FixedEngine(json!([]))),
            Some(shell_step("exit 1")),
            false,
        );

        let result = pipeline.process_image(&image, dir.path())?;

        assert!(!result.success);
        assert_eq!(result.final_extraction, OrderFields::default());
        Ok(())
    }

    #[test]
    fn environment_check_rejects_missing_interpreter() {
        let mut settings = Config::default();
        settings.ocr.interpreter = "order-ocr-no-such-interpreter".to_string();
        let config = PipelineConfig::new(PathBuf::from("a.png"), PathBuf::from("out"), settings);
        assert!(check_environment(&config).is_err());
    }
}
