//! Lenient field decoders for model replies.
//!
//! Models write prices as numbers, `"¥1,299"`, or `"299元"`, and lists where a
//! string was asked for. These helpers accept those shapes and leave the
//! judgement to the quality gate.

use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::sync::OnceLock;

fn number_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").ok()).as_ref()
}

/// First number in a free-form price string, ignoring currency marks and
/// thousands separators.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '，').collect();
    number_regex()?
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Number written either as a JSON number or as text.
pub fn f64_or_text<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => parse_price(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("not a number: '{}'", s))),
    }
}

/// Like [`f64_or_text`], but absent, null or unparseable values become `None`.
pub fn optional_f64_or_text<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        match Option::<NumberOrText>::deserialize(deserializer).unwrap_or(None) {
            Some(NumberOrText::Number(n)) => Some(n),
            Some(NumberOrText::Text(s)) => parse_price(&s),
            None => None,
        },
    )
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrList {
    Text(String),
    List(Vec<String>),
}

/// Text that may arrive as a list of strings; lists are joined with "；".
pub fn text_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TextOrList>::deserialize(deserializer)? {
        Some(TextOrList::Text(s)) => s,
        Some(TextOrList::List(items)) => items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("；"),
        None => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "f64_or_text")]
        price: f64,
        #[serde(default, deserialize_with = "optional_f64_or_text")]
        weight: Option<f64>,
        #[serde(default, deserialize_with = "text_or_list")]
        sources: String,
    }

    #[test]
    fn test_parse_price_variants() {
        assert_eq!(parse_price("¥1,299"), Some(1299.0));
        assert_eq!(parse_price("299元"), Some(299.0));
        assert_eq!(parse_price("约 89.5 元"), Some(89.5));
        assert_eq!(parse_price("1299-1599"), Some(1299.0));
        assert_eq!(parse_price("面议"), None);
    }

    #[test]
    fn test_number_or_text_fields() {
        let p: Probe = serde_json::from_str(r#"{"price": "¥199", "weight": "1.5"}"#).unwrap();
        assert_eq!(p.price, 199.0);
        assert_eq!(p.weight, Some(1.5));
        assert_eq!(p.sources, "");

        let p: Probe = serde_json::from_str(r#"{"price": 15, "weight": null}"#).unwrap();
        assert_eq!(p.price, 15.0);
        assert_eq!(p.weight, None);
    }

    #[test]
    fn test_unparseable_price_is_an_error() {
        assert!(serde_json::from_str::<Probe>(r#"{"price": "面议"}"#).is_err());
    }

    #[test]
    fn test_list_sources_are_joined() {
        let p: Probe =
            serde_json::from_str(r#"{"price": 1, "sources": ["京东商城", " 天猫 ", ""]}"#).unwrap();
        assert_eq!(p.sources, "京东商城；天猫");
    }
}
