use crate::core::model::LineRecord;

/// Confidence assigned to a line when the engine reports none.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

pub fn normalize(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE
    }
}

pub fn average(lines: &[LineRecord]) -> f64 {
    if lines.is_empty() {
        return 0.0;
    }
    lines.iter().map(|line| line.confidence).sum::<f64>() / lines.len() as f64
}
