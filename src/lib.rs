pub mod config;
pub mod core;
pub mod display;
pub mod export;
pub mod fields;
pub mod ocr;
pub mod pipeline;

pub use crate::core::model::{ExtractionResult, FinalResult, LineRecord, OrderFields};
pub use crate::export::save_result_to_file;
pub use crate::ocr::{OcrEngine, OcrError, OrderOcr};
