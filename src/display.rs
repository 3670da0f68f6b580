use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::core::model::{BatchSummary, FinalResult, OrderFields};
use crate::fields::Rating;
use crate::pipeline::BATCH_SUMMARY_FILE;

const RULE: &str = "============================================================";

pub fn print_fields(fields: &OrderFields) {
    println!("    Company:  {}", fields.company_name);
    println!("    Product:  {}", fields.product_name);
    println!("    Quantity: {}", fields.product_quantity);
    println!("    Date:     {}", fields.order_date);
}

pub fn print_final_result(result: &FinalResult) {
    println!("{RULE}");
    println!("Order extraction result: {}", result.image_path);
    println!("{RULE}");

    if !result.success {
        println!("[!] No text was recognized in the image");
    }

    println!("\n[*] OCR");
    println!("    Lines:          {}", result.ocr.total_lines);
    println!("    Avg confidence: {:.2}", result.ocr.confidence_avg);

    println!("\n[*] Extracted fields");
    print_fields(&result.final_extraction);

    let fields = &result.final_extraction;
    println!(
        "\n[*] Extraction rate: {:.1}% ({}/{}) - {}",
        fields.extraction_rate(),
        fields.extracted_count(),
        OrderFields::FIELD_COUNT,
        Rating::of(fields)
    );

    if !result.ocr.formatted_text.is_empty() {
        println!("\n[*] Recognized text");
        println!("------------------------------------------------------------");
        println!("{}", result.ocr.formatted_text);
        println!("------------------------------------------------------------");
    }
    println!("\nProcessed at {}", result.processed_at);
}

pub fn print_batch_summary(summary: &BatchSummary) {
    println!("{RULE}");
    println!("Batch summary");
    println!("{RULE}");
    for entry in &summary.results {
        let marker = if entry.success { "✓" } else { "✗" };
        println!(
            "[{marker}] {} - {} line(s), confidence {:.2}",
            entry.image_name, entry.total_lines, entry.confidence_avg
        );
        if let Some(error) = &entry.error {
            println!("    error: {error}");
        }
        if let Some(fields) = &entry.final_extraction {
            print_fields(fields);
        }
    }
    println!(
        "\n[*] {} image(s): {} succeeded, {} failed ({:.1}%)",
        summary.total_images,
        summary.processed_images,
        summary.failed_images,
        summary.success_rate()
    );
}

pub enum SavedResult {
    Single(Box<FinalResult>),
    Batch(BatchSummary),
}

/// Loads a final result or batch summary. A directory is taken to hold a
/// batch summary.
pub fn load_saved(path: &Path) -> Result<SavedResult> {
    let path: PathBuf = if path.is_dir() {
        path.join(BATCH_SUMMARY_FILE)
    } else {
        path.to_path_buf()
    };
    let data = fs::read_to_string(&path)
        .with_context(|| format!("no result file at {}", path.display()))?;
    let value: Value = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    if value.get("results").is_some() {
        Ok(SavedResult::Batch(serde_json::from_value(value)?))
    } else {
        Ok(SavedResult::Single(Box::new(serde_json::from_value(value)?)))
    }
}

pub fn show(path: &Path) -> Result<()> {
    match load_saved(path)? {
        SavedResult::Single(result) => print_final_result(&result),
        SavedResult::Batch(summary) => print_batch_summary(&summary),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{BatchEntry, OcrSummary};

    fn final_result() -> FinalResult {
        FinalResult {
            success: true,
            image_path: "order.png".to_string(),
            processed_at: "2024-07-01 09:00:00".to_string(),
            ocr: OcrSummary {
                total_lines: 1,
                confidence_avg: 0.9,
                formatted_text: "XX化工贸易公司".to_string(),
                basic_extraction: OrderFields::default(),
            },
            llm: None,
            final_extraction: OrderFields::default(),
        }
    }

    #[test]
    fn loads_single_and_batch_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let single = dir.path().join("final_result.json");
        fs::write(&single, serde_json::to_string(&final_result())?)?;
        assert!(matches!(load_saved(&single)?, SavedResult::Single(_)));

        let mut summary = BatchSummary::new(1);
        summary.record(BatchEntry {
            image_name: "order.png".to_string(),
            image_path: "order.png".to_string(),
            success: true,
            total_lines: 1,
            confidence_avg: 0.9,
            error: None,
            final_extraction: None,
        });
        fs::write(
            dir.path().join(BATCH_SUMMARY_FILE),
            serde_json::to_string(&summary)?,
        )?;
        match load_saved(dir.path())? {
            SavedResult::Batch(loaded) => assert_eq!(loaded.processed_images, 1),
            SavedResult::Single(_) => panic!("expected batch summary"),
        }
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(show(Path::new("/nonexistent/final_result.json")).is_err());
    }
}
