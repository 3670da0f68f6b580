//! Order fields pulled out of the recognized text, either by keyword
//! heuristics or from the response of the external extraction model.

pub mod basic;
pub mod response;

use std::fmt;

pub use crate::core::model::{OrderFields, NOT_FOUND};
pub use basic::extract_basic_fields;
pub use response::parse_model_response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl Rating {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 75.0 {
            Rating::Excellent
        } else if rate >= 50.0 {
            Rating::Good
        } else if rate >= 25.0 {
            Rating::Fair
        } else {
            Rating::NeedsImprovement
        }
    }

    pub fn of(fields: &OrderFields) -> Self {
        Self::from_rate(fields.extraction_rate())
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Fair => "fair",
            Rating::NeedsImprovement => "needs improvement",
        };
        f.write_str(label)
    }
}
