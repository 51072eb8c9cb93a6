//! JSON parsing helpers for model responses
//!
//! Models are asked for a bare JSON object but often wrap it in markdown code
//! fences or surround it with prose. The payload is untrusted: every field is
//! optional and gets a default, and closed-set fields fall back when the value
//! is outside the set.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{Category, Direction, ExpenseDraft};

fn code_fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:json|JSON)?").expect("static regex"))
}

/// Remove markdown code-fence markers and surrounding whitespace
pub fn strip_code_fences(response: &str) -> String {
    code_fence_regex().replace_all(response, "").trim().to_string()
}

/// Loosely typed draft as the model returned it
#[derive(Debug, Default, Deserialize)]
struct RawDraft {
    #[serde(rename = "type", default)]
    kind: Option<Value>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    items: Option<Value>,
    #[serde(default)]
    category: Option<Value>,
}

/// Parse an expense draft from a model response
///
/// Fails only when no JSON object can be recovered from the response.
pub fn parse_expense_draft(response: &str) -> Result<ExpenseDraft> {
    let cleaned = strip_code_fences(response);
    let object = extract_json_object(&cleaned)?;
    let raw: RawDraft = serde_json::from_value(Value::Object(object))?;
    Ok(normalize(raw))
}

/// Find the JSON object in the cleaned response
///
/// Tries the whole text first, then the outermost `{...}` span.
fn extract_json_object(cleaned: &str) -> Result<serde_json::Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(cleaned) {
        return Ok(map);
    }

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &cleaned[s..=e];
            match serde_json::from_str::<Value>(json_str) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(Error::InvalidData("AI response is not a JSON object".into())),
                Err(e) => Err(Error::InvalidData(format!(
                    "Invalid JSON from AI: {} | Raw: {}",
                    e,
                    truncate(json_str, 200)
                ))),
            }
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(cleaned, 200)
        ))),
    }
}

fn normalize(raw: RawDraft) -> ExpenseDraft {
    let direction = match raw.kind {
        Some(Value::String(s)) => Direction::from_str(&s).unwrap_or_default(),
        _ => Direction::Expense,
    };

    let category = match raw.category {
        Some(Value::String(s)) => Category::from_str(&s).unwrap_or_default(),
        _ => Category::Other,
    };

    ExpenseDraft {
        direction,
        amount: raw.amount.as_ref().and_then(decimal_from_value).unwrap_or(Decimal::ZERO),
        items: raw.items.map(items_from_value).unwrap_or_default(),
        category,
    }
}

/// Largest amount accepted from a model (one quadrillion)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Amount as a non-negative decimal, `None` when unusable or above [`MAX_AMOUNT`]
fn decimal_from_value(value: &Value) -> Option<Decimal> {
    let amount = match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => {
            let s = s.trim().replace(',', "");
            Decimal::from_str(&s).ok()
        }
        _ => None,
    }?;

    let amount = amount.abs().normalize();
    (amount <= MAX_AMOUNT).then_some(amount)
}

fn items_from_value(value: Value) -> Vec<String> {
    let to_item = |v: Value| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    };

    match value {
        Value::Array(values) => values
            .into_iter()
            .filter_map(to_item)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_income_literal() {
        let response =
            r#"{"type":"income","amount":500,"items":["saree sale"],"category":"Income"}"#;
        let draft = parse_expense_draft(response).unwrap();
        assert_eq!(draft.direction, Direction::Income);
        assert_eq!(draft.amount, dec!(500));
        assert_eq!(draft.items, vec!["saree sale".to_string()]);
        assert_eq!(draft.category, Category::Income);
    }

    #[test]
    fn test_parse_empty_object_uses_defaults() {
        let draft = parse_expense_draft("{}").unwrap();
        assert_eq!(draft, ExpenseDraft::default());
        assert_eq!(draft.direction, Direction::Expense);
        assert_eq!(draft.amount, Decimal::ZERO);
        assert!(draft.items.is_empty());
        assert_eq!(draft.category, Category::Other);
    }

    #[test]
    fn test_parse_fenced_response() {
        let response = "```json\n{\"type\":\"expense\",\"amount\":200,\"items\":[\"dosa\",\"idly\"],\"category\":\"Food\"}\n```";
        let draft = parse_expense_draft(response).unwrap();
        assert_eq!(draft.amount, dec!(200));
        assert_eq!(draft.items, vec!["dosa", "idly"]);
        assert_eq!(draft.category, Category::Food);
    }

    #[test]
    fn test_parse_response_with_prose() {
        let response = r#"Sure! Here is the JSON:
{"type": "expense", "amount": 45.5, "items": ["auto fare"], "category": "Travel"}
Let me know if you need anything else."#;
        let draft = parse_expense_draft(response).unwrap();
        assert_eq!(draft.amount, dec!(45.5));
        assert_eq!(draft.category, Category::Travel);
    }

    #[test]
    fn test_unknown_labels_fall_back() {
        let response = r#"{"type":"transfer","amount":10,"category":"Groceries"}"#;
        let draft = parse_expense_draft(response).unwrap();
        assert_eq!(draft.direction, Direction::Expense);
        assert_eq!(draft.category, Category::Other);
    }

    #[test]
    fn test_invalid_amount_defaults_to_zero() {
        let draft = parse_expense_draft(r#"{"amount":"a lot"}"#).unwrap();
        assert_eq!(draft.amount, Decimal::ZERO);

        let draft = parse_expense_draft(r#"{"amount":null}"#).unwrap();
        assert_eq!(draft.amount, Decimal::ZERO);
    }

    #[test]
    fn test_string_and_negative_amounts() {
        let draft = parse_expense_draft(r#"{"amount":"1,250.75"}"#).unwrap();
        assert_eq!(draft.amount, dec!(1250.75));

        let draft = parse_expense_draft(r#"{"amount":-80}"#).unwrap();
        assert_eq!(draft.amount, dec!(80));
    }

    #[test]
    fn test_implausibly_large_amount_defaults_to_zero() {
        assert_eq!(MAX_AMOUNT, dec!(1000000000000000));

        let draft = parse_expense_draft(r#"{"amount":"50000000000000000000000000000"}"#).unwrap();
        assert_eq!(draft.amount, Decimal::ZERO);

        let draft = parse_expense_draft(r#"{"amount":1e300}"#).unwrap();
        assert_eq!(draft.amount, Decimal::ZERO);

        let draft = parse_expense_draft(r#"{"amount":"1000000000000000"}"#).unwrap();
        assert_eq!(draft.amount, MAX_AMOUNT);
    }

    #[test]
    fn test_items_accepts_single_string() {
        let draft = parse_expense_draft(r#"{"items":"petrol"}"#).unwrap();
        assert_eq!(draft.items, vec!["petrol"]);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(parse_expense_draft("{\"type\": \"expense\", ").is_err());
        assert!(parse_expense_draft("I could not understand that.").is_err());
        assert!(parse_expense_draft("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }
}
