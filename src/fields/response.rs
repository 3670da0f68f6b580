use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::model::{OrderFields, NOT_FOUND};

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>\s*").unwrap());
static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^}]*\}").unwrap());
static LABELLED_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[:：]\s*(.+)").unwrap());

const EMPTY_MARKERS: &[&str] = &["", NOT_FOUND, "null", "none"];

/// Reads order fields out of free-form model output.
///
/// The first `{...}` object wins; without one, `label: value` lines are
/// matched by their Chinese labels. Fields that cannot be read stay
/// [`NOT_FOUND`].
pub fn parse_model_response(response: &str) -> OrderFields {
    let response = THINK_BLOCK.replace_all(response, "");

    if let Some(object) = JSON_OBJECT.find(&response) {
        match serde_json::from_str::<Map<String, Value>>(object.as_str()) {
            Ok(map) => return fields_from_object(&map),
            Err(err) => debug!(error = %err, "model response object is not valid JSON"),
        }
    }
    fields_from_lines(&response)
}

fn fields_from_object(map: &Map<String, Value>) -> OrderFields {
    let read = |key: &str| {
        let value = match map.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        clean(&value)
    };
    OrderFields {
        company_name: read("company_name"),
        product_name: read("product_name"),
        product_quantity: read("product_quantity"),
        order_date: read("order_date"),
    }
}

fn fields_from_lines(response: &str) -> OrderFields {
    let mut fields = OrderFields::default();
    for line in response.lines().map(str::trim) {
        let Some(value) = LABELLED_VALUE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| clean(m.as_str()))
        else {
            continue;
        };

        let slot = if line.contains("公司") && line.contains("名称") {
            &mut fields.company_name
        } else if line.contains("物品") && line.contains("名称") {
            &mut fields.product_name
        } else if line.contains("数量") {
            &mut fields.product_quantity
        } else if line.contains("日期") {
            &mut fields.order_date
        } else {
            continue;
        };
        *slot = value;
    }
    fields
}

fn clean(value: &str) -> String {
    let value = value.trim();
    if EMPTY_MARKERS
        .iter()
        .any(|marker| value.eq_ignore_ascii_case(marker))
    {
        NOT_FOUND.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_embedded_json_object() {
        let response = r#"<think>
先找公司名称……
</think>
结果如下：
{"company_name": " XX化工贸易公司 ", "product_name": "烧碱", "product_quantity": "500斤", "order_date": null}
"#;
        let fields = parse_model_response(response);
        assert_eq!(
            fields,
            OrderFields {
                company_name: "XX化工贸易公司".to_string(),
                product_name: "烧碱".to_string(),
                product_quantity: "500斤".to_string(),
                order_date: NOT_FOUND.to_string(),
            }
        );
    }

    #[test]
    fn placeholder_values_normalize_to_not_found() {
        let fields = parse_model_response(
            r#"{"company_name": "None", "product_name": "", "product_quantity": 500, "order_date": "NULL"}"#,
        );
        assert_eq!(fields.company_name, NOT_FOUND);
        assert_eq!(fields.product_name, NOT_FOUND);
        assert_eq!(fields.product_quantity, "500");
        assert_eq!(fields.order_date, NOT_FOUND);
    }

    #[test]
    fn falls_back_to_labelled_lines() {
        let response = "甲方公司名称：XX化工贸易公司\n购买物品名称: 硫酸\n购买物品数量：10吨\n下订单日期：2024年7月1日\n备注：无";
        let fields = parse_model_response(response);
        assert_eq!(fields.company_name, "XX化工贸易公司");
        assert_eq!(fields.product_name, "硫酸");
        assert_eq!(fields.product_quantity, "10吨");
        assert_eq!(fields.order_date, "2024年7月1日");
    }

    #[test]
    fn unparseable_response_yields_defaults() {
        assert_eq!(parse_model_response(""), OrderFields::default());
        assert_eq!(parse_model_response("{not json}"), OrderFields::default());
    }
}
