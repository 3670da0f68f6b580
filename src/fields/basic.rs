use unicode_normalization::UnicodeNormalization;

use crate::core::model::{LineRecord, OrderFields};

const COMPANY_MARKER: &str = "公司";
const QUANTITY_UNITS: &[&str] = &["斤", "公斤", "吨", "升", "毫升", "立方米", "件", "个", "包"];
const DATE_KEYWORDS: &[&str] = &["日期", "年", "月", "日"];
const YEAR_PREFIX: &str = "202";

/// Keyword pass over the OCR lines. Each field takes the first line that
/// matches; the product name has no reliable marker and is left unset.
pub fn extract_basic_fields(lines: &[LineRecord]) -> OrderFields {
    let mut fields = OrderFields::default();
    let mut company = None;
    let mut quantity = None;
    let mut date = None;

    for line in lines {
        let text = line.text.nfkc().collect::<String>();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        if company.is_none() && text.contains(COMPANY_MARKER) {
            company = Some(text.to_string());
        }
        if quantity.is_none() && QUANTITY_UNITS.iter().any(|unit| text.contains(unit)) {
            quantity = Some(text.to_string());
        }
        if date.is_none()
            && DATE_KEYWORDS.iter().any(|kw| text.contains(kw))
            && text.contains(YEAR_PREFIX)
        {
            date = Some(text.to_string());
        }
    }

    if let Some(company) = company {
        fields.company_name = company;
    }
    if let Some(quantity) = quantity {
        fields.product_quantity = quantity;
    }
    if let Some(date) = date {
        fields.order_date = date;
    }
    fields
}
