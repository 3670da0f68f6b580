use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::geometry::BoundingBox;

/// Placeholder stored for an order field that could not be extracted.
pub const NOT_FOUND: &str = "未找到";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineRecord {
    #[serde(rename = "bbox", default)]
    pub bounding_box: BoundingBox,
    pub text: String,
    pub confidence: f64,
}

/// Outcome of running OCR over one image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    pub formatted_text: String,
    pub total_lines: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineRecord>,
    /// Engine payload exactly as received.
    #[serde(default)]
    pub raw_result: Value,
}

impl ExtractionResult {
    pub fn from_lines(raw_result: Value, lines: Vec<LineRecord>) -> Self {
        let formatted_text = lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            formatted_text,
            total_lines: lines.len(),
            success: true,
            error: None,
            lines,
            raw_result,
        }
    }

    pub fn empty(raw_result: Value, reason: impl Into<String>) -> Self {
        Self {
            formatted_text: String::new(),
            total_lines: 0,
            success: false,
            error: Some(reason.into()),
            lines: Vec::new(),
            raw_result,
        }
    }

    pub fn average_confidence(&self) -> f64 {
        crate::core::confidence::average(&self.lines)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderFields {
    pub company_name: String,
    pub product_name: String,
    pub product_quantity: String,
    pub order_date: String,
}

impl Default for OrderFields {
    fn default() -> Self {
        Self {
            company_name: NOT_FOUND.to_string(),
            product_name: NOT_FOUND.to_string(),
            product_quantity: NOT_FOUND.to_string(),
            order_date: NOT_FOUND.to_string(),
        }
    }
}

impl OrderFields {
    pub const FIELD_COUNT: usize = 4;

    pub fn values(&self) -> [&str; 4] {
        [
            self.company_name.as_str(),
            self.product_name.as_str(),
            self.product_quantity.as_str(),
            self.order_date.as_str(),
        ]
    }

    pub fn extracted_count(&self) -> usize {
        self.values()
            .iter()
            .filter(|value| !value.is_empty() && **value != NOT_FOUND)
            .count()
    }

    /// Share of fields that were extracted, in percent.
    pub fn extraction_rate(&self) -> f64 {
        self.extracted_count() as f64 / Self::FIELD_COUNT as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSummary {
    pub total_lines: usize,
    pub confidence_avg: f64,
    pub formatted_text: String,
    pub basic_extraction: OrderFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOutcome {
    pub fields: OrderFields,
    pub model_response: String,
}

/// Consolidated record written once per processed image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    pub success: bool,
    pub image_path: String,
    pub processed_at: String,
    pub ocr: OcrSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmOutcome>,
    pub final_extraction: OrderFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub image_name: String,
    pub image_path: String,
    pub success: bool,
    pub total_lines: usize,
    pub confidence_avg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_extraction: Option<OrderFields>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: usize,
    pub results: Vec<BatchEntry>,
}

impl BatchSummary {
    pub fn new(total_images: usize) -> Self {
        Self {
            total_images,
            ..Self::default()
        }
    }

    pub fn record(&mut self, entry: BatchEntry) {
        if entry.success {
            self.processed_images += 1;
        } else {
            self.failed_images += 1;
        }
        self.results.push(entry);
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_images == 0 {
            return 0.0;
        }
        self.processed_images as f64 / self.total_images as f64 * 100.0
    }
}
